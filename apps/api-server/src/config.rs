//! Centralized configuration for api-server.
//!
//! All environment variables are loaded and validated at startup to fail fast
//! on misconfiguration rather than at request time.

use axum::http::HeaderValue;
use domain::service::EmptyListPolicy;
use std::env;
use std::fmt;
use std::path::PathBuf;

/// Storage backend provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageProvider {
    /// In-memory storage (data lost on restart)
    Memory,
    /// SQLite file-based storage
    Sqlite,
    /// MongoDB collection
    Mongo,
}

impl StorageProvider {
    fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Some(Self::Memory),
            "sqlite" => Some(Self::Sqlite),
            "mongo" | "mongodb" => Some(Self::Mongo),
            _ => None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    fn from_str(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Configuration error.
#[derive(Debug)]
pub struct ConfigError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Configuration error for {}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Server configuration loaded from environment variables.
///
/// All fields are validated at construction time.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 3001)
    pub port: u16,
    /// Storage provider (default: mongo)
    pub storage_provider: StorageProvider,
    /// MongoDB connection string (required for mongo storage)
    pub mongodb_uri: Option<String>,
    /// MongoDB database name
    pub mongodb_database: String,
    /// MongoDB collection name
    pub mongodb_collection: String,
    /// SQLite database path (sqlite storage)
    pub db_path: PathBuf,
    /// Response to listing an empty triage list
    pub empty_list_policy: EmptyListPolicy,
    /// Directory served for unmatched paths, when it exists
    pub static_dir: PathBuf,
    /// CORS allow origin
    pub cors_allow_origin: HeaderValue,
    /// Log format
    pub log_format: LogFormat,
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// Fails fast on invalid configuration.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Port
        let port = match get("PORT") {
            Some(s) => s.parse().map_err(|e| ConfigError {
                field: "PORT",
                message: format!("Invalid port '{}': {}", s, e),
            })?,
            None => 3001,
        };

        // Storage provider
        let provider_str = get("STORAGE_PROVIDER").unwrap_or_else(|| "mongo".into());
        let storage_provider =
            StorageProvider::from_str(&provider_str).ok_or_else(|| ConfigError {
                field: "STORAGE_PROVIDER",
                message: format!(
                    "Unknown provider '{}' (expected mongo, sqlite or memory)",
                    provider_str
                ),
            })?;

        // MongoDB
        let mongodb_uri = get("MONGODB_URI").filter(|s| !s.is_empty());
        if storage_provider == StorageProvider::Mongo && mongodb_uri.is_none() {
            return Err(ConfigError {
                field: "MONGODB_URI",
                message: "Required when STORAGE_PROVIDER=mongo".into(),
            });
        }
        let mongodb_database = get("MONGODB_DATABASE")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "Emergency_waitlist".into());
        let mongodb_collection = get("MONGODB_COLLECTION")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "Patients".into());

        // DB path (for sqlite)
        let db_path = PathBuf::from(get("DB_PATH").unwrap_or_else(|| "./data/triage.db".into()));

        // Empty list policy
        let policy_str = get("EMPTY_LIST_POLICY").unwrap_or_else(|| "not_found".into());
        let empty_list_policy =
            EmptyListPolicy::parse(&policy_str).ok_or_else(|| ConfigError {
                field: "EMPTY_LIST_POLICY",
                message: format!(
                    "Unknown policy '{}' (expected not_found or empty)",
                    policy_str
                ),
            })?;

        // Static files
        let static_dir = PathBuf::from(get("STATIC_DIR").unwrap_or_else(|| "public".into()));

        // CORS allow origin
        let cors_origin_str = get("CORS_ALLOW_ORIGIN").unwrap_or_else(|| "*".into());
        let cors_allow_origin = if cors_origin_str == "*" {
            HeaderValue::from_static("*")
        } else {
            HeaderValue::from_str(&cors_origin_str).map_err(|e| ConfigError {
                field: "CORS_ALLOW_ORIGIN",
                message: format!("Invalid header value '{}': {}", cors_origin_str, e),
            })?
        };

        // Log format
        let log_format = LogFormat::from_str(&get("LOG_FORMAT").unwrap_or_else(|| "pretty".into()));

        Ok(Self {
            port,
            storage_provider,
            mongodb_uri,
            mongodb_database,
            mongodb_collection,
            db_path,
            empty_list_policy,
            static_dir,
            cors_allow_origin,
            log_format,
        })
    }

    /// Log warnings about configuration that loses data or hides errors.
    pub fn warn_if_ephemeral(&self) {
        if self.storage_provider == StorageProvider::Memory {
            tracing::warn!(
                "STORAGE_PROVIDER=memory: patients are kept in process memory and lost on restart."
            );
        }
        if self.empty_list_policy == EmptyListPolicy::EmptyArray {
            tracing::info!("EMPTY_LIST_POLICY=empty: an empty triage list is returned as 200 []");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn storage_provider_parsing() {
        assert_eq!(StorageProvider::from_str("memory"), Some(StorageProvider::Memory));
        assert_eq!(StorageProvider::from_str("SQLITE"), Some(StorageProvider::Sqlite));
        assert_eq!(StorageProvider::from_str("mongodb"), Some(StorageProvider::Mongo));
        assert_eq!(StorageProvider::from_str("cassandra"), None);
    }

    #[test]
    fn log_format_parsing() {
        assert_eq!(LogFormat::from_str("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::from_str("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::from_str("anything"), LogFormat::Pretty);
    }

    #[test]
    fn defaults_with_mongo_uri() {
        let cfg = load(&[("MONGODB_URI", "mongodb://localhost:27017")]).unwrap();
        assert_eq!(cfg.port, 3001);
        assert_eq!(cfg.storage_provider, StorageProvider::Mongo);
        assert_eq!(cfg.mongodb_database, "Emergency_waitlist");
        assert_eq!(cfg.mongodb_collection, "Patients");
        assert_eq!(cfg.empty_list_policy, EmptyListPolicy::NotFound);
        assert_eq!(cfg.static_dir, PathBuf::from("public"));
        assert_eq!(cfg.log_format, LogFormat::Pretty);
    }

    #[test]
    fn mongo_requires_uri() {
        let err = load(&[]).unwrap_err();
        assert_eq!(err.field, "MONGODB_URI");
        assert!(load(&[("STORAGE_PROVIDER", "memory")]).is_ok());
    }

    #[test]
    fn rejects_bad_values() {
        let err = load(&[("STORAGE_PROVIDER", "memory"), ("PORT", "http")]).unwrap_err();
        assert_eq!(err.field, "PORT");

        let err = load(&[("STORAGE_PROVIDER", "redis")]).unwrap_err();
        assert_eq!(err.field, "STORAGE_PROVIDER");

        let err = load(&[("STORAGE_PROVIDER", "memory"), ("EMPTY_LIST_POLICY", "maybe")])
            .unwrap_err();
        assert_eq!(err.field, "EMPTY_LIST_POLICY");
    }

    #[test]
    fn overrides() {
        let cfg = load(&[
            ("STORAGE_PROVIDER", "sqlite"),
            ("DB_PATH", "/tmp/er.db"),
            ("PORT", "8080"),
            ("EMPTY_LIST_POLICY", "empty"),
            ("LOG_FORMAT", "json"),
            ("CORS_ALLOW_ORIGIN", "https://er.example.org"),
        ])
        .unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.storage_provider, StorageProvider::Sqlite);
        assert_eq!(cfg.db_path, PathBuf::from("/tmp/er.db"));
        assert_eq!(cfg.empty_list_policy, EmptyListPolicy::EmptyArray);
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert_eq!(cfg.cors_allow_origin, "https://er.example.org");
    }
}
