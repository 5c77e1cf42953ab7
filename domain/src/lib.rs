//! Domain library for the ER triage service.
//!
//! Holds the patient record types, the store port (`PatientRepository`), input
//! validation and error definitions. Keep adapters and IO concerns out of this
//! crate; the only async surface is the port itself.

use std::error::Error;
use std::fmt::{Display, Formatter};

use async_trait::async_trait;
use serde_json::Number;

/// Opaque identifier assigned by the store when a patient is inserted.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PatientId(String);

impl PatientId {
    pub fn new<S: Into<String>>(s: S) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PatientId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated patient awaiting insertion. Produced by `PatientDraft::validate`.
///
/// Numeric fields keep the JSON representation the caller sent, so an integer
/// wait time comes back out as an integer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewPatient {
    pub name: String,
    pub code: String,
    pub severity: Number,
    pub wait_time: Number,
}

/// Stored triage record. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Patient {
    pub id: PatientId,
    pub name: String,
    /// Triage category label, free-form.
    pub code: String,
    pub severity: Number,
    /// Wait time in whatever unit the caller submitted.
    pub wait_time: Number,
}

impl Patient {
    /// Attach a store-assigned id to a validated input.
    pub fn from_new(id: PatientId, input: NewPatient) -> Self {
        Self {
            id,
            name: input.name,
            code: input.code,
            severity: input.severity,
            wait_time: input.wait_time,
        }
    }
}

/// Outcome of a single insert as reported by the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InsertReceipt {
    /// False when the store accepted the write without confirming it.
    pub acknowledged: bool,
    pub id: PatientId,
}

/// Repository port for the triage collection.
///
/// Each method maps to exactly one store call. Implementations must be
/// shareable across request tasks.
#[async_trait]
pub trait PatientRepository: Send + Sync {
    /// Insert one record; no duplicate detection.
    async fn insert(&self, patient: NewPatient) -> Result<InsertReceipt, CoreError>;
    /// All records in store-native order.
    async fn find_all(&self) -> Result<Vec<Patient>, CoreError>;
    /// First record whose name equals `name` exactly.
    async fn find_by_name(&self, name: &str) -> Result<Option<Patient>, CoreError>;
    /// Release the underlying connection. Defaults to a no-op.
    async fn close(&self) -> Result<(), CoreError> {
        Ok(())
    }
}

/// Core domain errors (no external error crates in the domain).
#[derive(Debug)]
pub enum CoreError {
    /// A required input was absent, or a text field was null or empty.
    MissingField(&'static str),
    /// A field was present but had the wrong JSON type.
    InvalidType(&'static str),
    NotFound,
    /// Connection or query failure reported by the store.
    StoreUnavailable(String),
    /// The store took the write but did not confirm it.
    WriteNotAcknowledged,
}

impl CoreError {
    /// True for errors caused by the caller's input.
    pub fn is_validation(&self) -> bool {
        matches!(self, CoreError::MissingField(_) | CoreError::InvalidType(_))
    }
}

impl Display for CoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CoreError::MissingField(field) => write!(f, "missing required field: {}", field),
            CoreError::InvalidType(field) => write!(f, "invalid type for field: {}", field),
            CoreError::NotFound => write!(f, "not found"),
            CoreError::StoreUnavailable(msg) => write!(f, "store error: {}", msg),
            CoreError::WriteNotAcknowledged => write!(f, "write not acknowledged by store"),
        }
    }
}

impl Error for CoreError {}

/// Return a short about/version line for the binary to print.
pub fn about() -> String {
    let pkg = env!("CARGO_PKG_NAME");
    let ver = env!("CARGO_PKG_VERSION");
    format!("{} v{} - triage domain library loaded", pkg, ver)
}

pub mod adapters;
pub mod service;
pub mod validate;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patient_from_new_keeps_fields() {
        let input = NewPatient {
            name: "Alice".into(),
            code: "C1".into(),
            severity: Number::from(3),
            wait_time: Number::from(15),
        };
        let p = Patient::from_new(PatientId::new("abc"), input);
        assert_eq!(p.id.as_str(), "abc");
        assert_eq!(p.name, "Alice");
        assert_eq!(p.wait_time, Number::from(15));
    }

    #[test]
    fn validation_errors_are_flagged() {
        assert!(CoreError::MissingField("name").is_validation());
        assert!(CoreError::InvalidType("severity").is_validation());
        assert!(!CoreError::NotFound.is_validation());
        assert!(!CoreError::WriteNotAcknowledged.is_validation());
    }

    #[test]
    fn error_display() {
        assert_eq!(
            CoreError::MissingField("code").to_string(),
            "missing required field: code"
        );
        assert_eq!(
            CoreError::StoreUnavailable("timeout".into()).to_string(),
            "store error: timeout"
        );
    }
}
