//! api-server — HTTP API for the ER triage service.
//!
//! Records patients awaiting triage and answers wait-time queries:
//! - `POST /addPatient`, `GET /getTriageList`, `GET /getPatientWaitTime?name=`, `GET /`.
//! - Storage: MongoDB (default), SQLite file, or in-memory, chosen by
//!   `STORAGE_PROVIDER`. The store handle is opened once at startup and shared
//!   by every request; a failed connection aborts startup.
//! - Static files from `STATIC_DIR` for any other path, when the directory exists.
//!
//! Run:
//! ```bash
//! # pretty logs (default); PORT optional
//! MONGODB_URI=mongodb://localhost:27017 cargo run -p api-server
//!
//! # local file store instead of MongoDB
//! STORAGE_PROVIDER=sqlite DB_PATH=./data/triage.db cargo run -p api-server
//! ```
//!
//! Configuration: See `config.rs` for all environment variables.

mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::HeaderValue;
use axum::{
    extract::{RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use domain::adapters::memory_repo::InMemoryRepo;
use domain::service::TriageService;
use domain::validate::PatientDraft;
use domain::{CoreError, InsertReceipt, NewPatient, Patient, PatientRepository};
use serde::Serialize;
use serde_json::{Number, Value};
use tokio::signal;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// Store selected at startup; every variant implements the same port.
enum AnyRepo {
    Memory(InMemoryRepo),
    #[cfg(feature = "sqlite")]
    Sqlite(sqlite_adapter::SqliteRepo),
    #[cfg(feature = "mongo")]
    Mongo(mongo_adapter::MongoRepo),
}

#[async_trait]
impl PatientRepository for AnyRepo {
    async fn insert(&self, patient: NewPatient) -> Result<InsertReceipt, CoreError> {
        match self {
            AnyRepo::Memory(r) => r.insert(patient).await,
            #[cfg(feature = "sqlite")]
            AnyRepo::Sqlite(r) => r.insert(patient).await,
            #[cfg(feature = "mongo")]
            AnyRepo::Mongo(r) => r.insert(patient).await,
        }
    }

    async fn find_all(&self) -> Result<Vec<Patient>, CoreError> {
        match self {
            AnyRepo::Memory(r) => r.find_all().await,
            #[cfg(feature = "sqlite")]
            AnyRepo::Sqlite(r) => r.find_all().await,
            #[cfg(feature = "mongo")]
            AnyRepo::Mongo(r) => r.find_all().await,
        }
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Patient>, CoreError> {
        match self {
            AnyRepo::Memory(r) => r.find_by_name(name).await,
            #[cfg(feature = "sqlite")]
            AnyRepo::Sqlite(r) => r.find_by_name(name).await,
            #[cfg(feature = "mongo")]
            AnyRepo::Mongo(r) => r.find_by_name(name).await,
        }
    }

    async fn close(&self) -> Result<(), CoreError> {
        match self {
            AnyRepo::Memory(r) => r.close().await,
            #[cfg(feature = "sqlite")]
            AnyRepo::Sqlite(r) => r.close().await,
            #[cfg(feature = "mongo")]
            AnyRepo::Mongo(r) => r.close().await,
        }
    }
}

struct AppState<R: PatientRepository> {
    svc: Arc<TriageService<R>>,
}

impl<R: PatientRepository> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            svc: Arc::clone(&self.svc),
        }
    }
}

#[tokio::main]
async fn main() {
    // Load and validate config first (fail fast on misconfiguration)
    let cfg = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&cfg);
    cfg.warn_if_ephemeral();

    let repo = match build_repo(&cfg).await {
        Ok(r) => r,
        Err(e) => {
            error!(err = %e, "Failed to connect to the patient store");
            std::process::exit(1);
        }
    };
    let svc = Arc::new(TriageService::new(repo).with_empty_list_policy(cfg.empty_list_policy));
    let state = AppState {
        svc: Arc::clone(&svc),
    };

    // Request ID header name
    let x_request_id = axum::http::HeaderName::from_static("x-request-id");

    let mut app = routes(state);
    if cfg.static_dir.is_dir() {
        info!(dir = %cfg.static_dir.display(), "serving static files");
        app = app.fallback_service(ServeDir::new(&cfg.static_dir));
    }

    app = app
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid));

    // CORS - already validated in Config::from_env()
    let cors = if cfg.cors_allow_origin == HeaderValue::from_static("*") {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list([cfg.cors_allow_origin.clone()]))
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers([axum::http::header::CONTENT_TYPE])
    };
    app = app.layer(cors);

    let addr: SocketAddr = ([0, 0, 0, 0], cfg.port).into();
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(%addr, err = %e, "failed to bind");
            std::process::exit(1);
        }
    };
    info!(%addr, "api-server listening");
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(err = %e, "server error");
    }

    info!("Closing database connection...");
    if let Err(e) = svc.shutdown().await {
        error!(err = %e, "failed to close patient store");
    }
    info!("Service shutdown complete");
}

fn init_tracing(cfg: &config::Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    match cfg.log_format {
        config::LogFormat::Json => {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_timer(fmt::time::SystemTime)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
        config::LogFormat::Pretty => {
            registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_target(true)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
    }
}

// Open the configured store. Errors here are fatal to startup.
async fn build_repo(cfg: &config::Config) -> Result<AnyRepo, CoreError> {
    match cfg.storage_provider {
        config::StorageProvider::Memory => Ok(AnyRepo::Memory(InMemoryRepo::new())),
        #[cfg(feature = "sqlite")]
        config::StorageProvider::Sqlite => {
            let repo = sqlite_adapter::SqliteRepo::open_creating_dirs(&cfg.db_path)?;
            info!(path = %cfg.db_path.display(), "Successfully opened SQLite store");
            Ok(AnyRepo::Sqlite(repo))
        }
        #[cfg(feature = "mongo")]
        config::StorageProvider::Mongo => {
            let uri = cfg
                .mongodb_uri
                .clone()
                .ok_or_else(|| CoreError::StoreUnavailable("MONGODB_URI not set".into()))?;
            let settings = mongo_adapter::MongoSettings::new(
                uri,
                cfg.mongodb_database.clone(),
                cfg.mongodb_collection.clone(),
            );
            Ok(AnyRepo::Mongo(
                mongo_adapter::MongoRepo::connect(&settings).await?,
            ))
        }
        #[allow(unreachable_patterns)]
        ref other => Err(CoreError::StoreUnavailable(format!(
            "storage provider {:?} not compiled in",
            other
        ))),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(err = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                error!(err = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}

fn routes<R: PatientRepository + 'static>(state: AppState<R>) -> Router {
    Router::new()
        .route("/", get(home::<R>))
        .route("/addPatient", post(add_patient::<R>))
        .route("/getTriageList", get(get_triage_list::<R>))
        .route("/getPatientWaitTime", get(get_patient_wait_time::<R>))
        .with_state(state)
}

#[derive(Serialize)]
struct PatientOut {
    #[serde(rename = "_id")]
    id: String,
    name: String,
    code: String,
    severity: Number,
    #[serde(rename = "waitTime")]
    wait_time: Number,
}

fn patient_to_out(p: Patient) -> PatientOut {
    PatientOut {
        id: p.id.as_str().to_string(),
        name: p.name,
        code: p.code,
        severity: p.severity,
        wait_time: p.wait_time,
    }
}

fn json_response(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

async fn home<R: PatientRepository + 'static>(State(state): State<AppState<R>>) -> &'static str {
    state.svc.home()
}

// Parse the body leniently: an empty body counts as `{}` so it surfaces as a
// missing-field error, and the content type is not enforced.
fn parse_draft(body: &[u8]) -> Result<PatientDraft, &'static str> {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(PatientDraft::default());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => {
            serde_json::from_value(Value::Object(map)).map_err(|_| "invalid_body")
        }
        _ => Err("invalid_body"),
    }
}

async fn add_patient<R: PatientRepository + 'static>(
    State(state): State<AppState<R>>,
    body: Bytes,
) -> Response {
    let draft = match parse_draft(&body) {
        Ok(d) => d,
        Err(code) => {
            warn!("add patient rejected: body is not a JSON object");
            return json_response(StatusCode::BAD_REQUEST, http_common::json_err(code));
        }
    };

    match state.svc.add_patient(draft).await {
        Ok(id) => {
            info!(patient_id = %id, "patient added");
            json_response(StatusCode::CREATED, http_common::json_created(id.as_str()))
        }
        Err(e @ CoreError::MissingField(_)) => {
            warn!(err = %e, "add patient rejected: missing required fields");
            json_response(
                StatusCode::BAD_REQUEST,
                http_common::json_err("missing_fields"),
            )
        }
        Err(e @ CoreError::InvalidType("name" | "code")) => {
            warn!(err = %e, "add patient rejected: text fields are not strings");
            json_response(
                StatusCode::BAD_REQUEST,
                http_common::json_err("invalid_text"),
            )
        }
        Err(e @ CoreError::InvalidType(_)) => {
            warn!(err = %e, "add patient rejected: incorrect field types");
            json_response(
                StatusCode::BAD_REQUEST,
                http_common::json_err("invalid_types"),
            )
        }
        Err(CoreError::WriteNotAcknowledged) => {
            error!("add patient failed: insert not acknowledged");
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                http_common::json_err("insert_failed"),
            )
        }
        Err(e) => {
            error!(err = ?e, "add patient error");
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                http_common::json_err("internal"),
            )
        }
    }
}

async fn get_triage_list<R: PatientRepository + 'static>(
    State(state): State<AppState<R>>,
) -> Response {
    match state.svc.list_patients().await {
        Ok(patients) => {
            info!(count = patients.len(), "retrieved triage list");
            let out: Vec<PatientOut> = patients.into_iter().map(patient_to_out).collect();
            (StatusCode::OK, Json(out)).into_response()
        }
        Err(CoreError::NotFound) => {
            warn!("no patients found in the triage list");
            json_response(
                StatusCode::NOT_FOUND,
                http_common::json_message("No patients found"),
            )
        }
        Err(e) => {
            error!(err = ?e, "list patients error");
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                http_common::json_err("list_failed"),
            )
        }
    }
}

async fn get_patient_wait_time<R: PatientRepository + 'static>(
    State(state): State<AppState<R>>,
    RawQuery(query): RawQuery,
) -> Response {
    let name = match http_common::first_query_value(query.as_deref(), "name") {
        Ok(name) => name,
        Err(e) => {
            warn!(err = %e, "wait time rejected: malformed query string");
            return json_response(
                StatusCode::BAD_REQUEST,
                http_common::json_err("invalid_query"),
            );
        }
    };

    match state.svc.patient_wait_time(name.as_deref()).await {
        Ok(wait_time) => {
            info!(name = name.as_deref().unwrap_or_default(), "retrieved wait time");
            json_response(StatusCode::OK, http_common::json_wait_time(&wait_time))
        }
        Err(CoreError::MissingField(_)) => {
            warn!("wait time rejected: patient name is missing");
            json_response(
                StatusCode::BAD_REQUEST,
                http_common::json_err("name_required"),
            )
        }
        Err(CoreError::NotFound) => {
            warn!(name = name.as_deref().unwrap_or_default(), "patient not found");
            json_response(
                StatusCode::NOT_FOUND,
                http_common::json_err("patient_not_found"),
            )
        }
        Err(e) => {
            error!(err = ?e, "wait time lookup error");
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                http_common::json_err("internal"),
            )
        }
    }
}
