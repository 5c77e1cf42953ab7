//! MongoDB adapter implementing the `PatientRepository` port.
//!
//! - Stores each patient as one loosely structured document in a single
//!   collection (`name`, `code`, `severity`, `waitTime`, `_id`).
//! - Ids are server-side `ObjectId`s surfaced as 24-char hex strings.
//! - `connect()` pings the deployment so a bad URI fails at startup instead of
//!   on the first request.
//!
//! Notes:
//! - Numbers are stored as Int32/Int64 when the caller sent an integer and as
//!   Double otherwise, so integers read back as integers.
//! - A collection configured with write concern `w: 0` yields unacknowledged
//!   inserts; those are reported through `InsertReceipt::acknowledged`.
//! - Listing skips documents that do not decode as patients (written by other
//!   clients) and logs each one, so one bad document does not hide the rest.

use async_trait::async_trait;
use domain::{CoreError, InsertReceipt, NewPatient, Patient, PatientId, PatientRepository};
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::{Acknowledgment, IndexOptions, WriteConcern};
use mongodb::{Client, Collection, IndexModel};
use serde_json::Number;

/// Connection settings, fixed at startup.
#[derive(Clone, Debug)]
pub struct MongoSettings {
    pub uri: String,
    pub database: String,
    pub collection: String,
}

impl MongoSettings {
    pub fn new(
        uri: impl Into<String>,
        database: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            uri: uri.into(),
            database: database.into(),
            collection: collection.into(),
        }
    }
}

/// Repository backed by a MongoDB collection. Cheap to clone; the driver pools
/// connections internally.
#[derive(Clone)]
pub struct MongoRepo {
    client: Client,
    patients: Collection<Document>,
}

impl MongoRepo {
    /// Open a client, verify the deployment answers, and ensure the name index.
    pub async fn connect(settings: &MongoSettings) -> Result<Self, CoreError> {
        tracing::info!(database = %settings.database, "Connecting to MongoDB");
        let client = Client::with_uri_str(&settings.uri)
            .await
            .map_err(map_mongo_err)?;
        let db = client.database(&settings.database);
        db.run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(map_mongo_err)?;

        let repo = Self {
            patients: db.collection(&settings.collection),
            client,
        };
        repo.ensure_indexes().await?;
        tracing::info!(
            database = %settings.database,
            collection = %settings.collection,
            "Successfully connected to MongoDB"
        );
        Ok(repo)
    }

    /// Lookups are by exact name; not unique, duplicates are allowed.
    async fn ensure_indexes(&self) -> Result<(), CoreError> {
        let name_index = IndexModel::builder()
            .keys(doc! { "name": 1 })
            .options(IndexOptions::builder().name("name_idx".to_string()).build())
            .build();
        self.patients
            .create_index(name_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create name index: {}", e);
                map_mongo_err(e)
            })?;
        Ok(())
    }
}

#[async_trait]
impl PatientRepository for MongoRepo {
    async fn insert(&self, patient: NewPatient) -> Result<InsertReceipt, CoreError> {
        let result = self
            .patients
            .insert_one(domain_to_doc(&patient), None)
            .await
            .map_err(map_mongo_err)?;
        Ok(InsertReceipt {
            acknowledged: writes_acknowledged(self.patients.write_concern()),
            id: bson_to_id(&result.inserted_id),
        })
    }

    async fn find_all(&self) -> Result<Vec<Patient>, CoreError> {
        let cursor = self
            .patients
            .find(None, None)
            .await
            .map_err(map_mongo_err)?;
        let docs: Vec<Document> = cursor.try_collect().await.map_err(map_mongo_err)?;
        Ok(decode_listing(&docs))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Patient>, CoreError> {
        let found = self
            .patients
            .find_one(doc! { "name": name }, None)
            .await
            .map_err(map_mongo_err)?;
        found.as_ref().map(doc_to_domain).transpose()
    }

    async fn close(&self) -> Result<(), CoreError> {
        self.client.clone().shutdown().await;
        Ok(())
    }
}

fn map_mongo_err(e: mongodb::error::Error) -> CoreError {
    CoreError::StoreUnavailable(format!("mongodb error: {e}"))
}

fn writes_acknowledged(wc: Option<&WriteConcern>) -> bool {
    !matches!(
        wc.and_then(|wc| wc.w.as_ref()),
        Some(Acknowledgment::Nodes(0))
    )
}

fn bson_to_id(id: &Bson) -> PatientId {
    match id {
        Bson::ObjectId(oid) => PatientId::new(oid.to_hex()),
        Bson::String(s) => PatientId::new(s.clone()),
        other => PatientId::new(other.to_string()),
    }
}

fn number_to_bson(n: &Number) -> Bson {
    if let Some(i) = n.as_i64() {
        match i32::try_from(i) {
            Ok(small) => Bson::Int32(small),
            Err(_) => Bson::Int64(i),
        }
    } else if let Some(u) = n.as_u64() {
        // Only reached above i64::MAX.
        Bson::Double(u as f64)
    } else {
        Bson::Double(n.as_f64().unwrap_or_default())
    }
}

fn bson_to_number(field: &str, v: Option<&Bson>) -> Result<Number, CoreError> {
    match v {
        Some(Bson::Int32(i)) => Ok(Number::from(*i)),
        Some(Bson::Int64(i)) => Ok(Number::from(*i)),
        Some(Bson::Double(f)) => Number::from_f64(*f)
            .ok_or_else(|| CoreError::StoreUnavailable(format!("document {field} is not finite"))),
        _ => Err(CoreError::StoreUnavailable(format!(
            "document missing numeric {field}"
        ))),
    }
}

fn domain_to_doc(p: &NewPatient) -> Document {
    doc! {
        "name": p.name.as_str(),
        "code": p.code.as_str(),
        "severity": number_to_bson(&p.severity),
        "waitTime": number_to_bson(&p.wait_time),
    }
}

fn decode_listing(docs: &[Document]) -> Vec<Patient> {
    docs.iter()
        .filter_map(|d| match doc_to_domain(d) {
            Ok(p) => Some(p),
            Err(e) => {
                let id = d.get("_id").map(bson_to_id);
                tracing::warn!(
                    id = id.as_ref().map(PatientId::as_str).unwrap_or_default(),
                    err = %e,
                    "Skipping undecodable patient document"
                );
                None
            }
        })
        .collect()
}

fn doc_to_domain(d: &Document) -> Result<Patient, CoreError> {
    let id = d
        .get("_id")
        .map(bson_to_id)
        .ok_or_else(|| CoreError::StoreUnavailable("document missing _id".into()))?;
    let name = d
        .get_str("name")
        .map_err(|_| CoreError::StoreUnavailable("document missing name".into()))?
        .to_string();
    let code = d
        .get_str("code")
        .map_err(|_| CoreError::StoreUnavailable("document missing code".into()))?
        .to_string();
    let severity = bson_to_number("severity", d.get("severity"))?;
    let wait_time = bson_to_number("waitTime", d.get("waitTime"))?;
    Ok(Patient {
        id,
        name,
        code,
        severity,
        wait_time,
    })
}
