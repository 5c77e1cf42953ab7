//! Input validation for request payloads. Runs before any store call.

use serde::Deserialize;
use serde_json::{Number, Value};

use crate::{CoreError, NewPatient};

/// Fields every add request must carry, in the order they are checked.
pub const REQUIRED_FIELDS: [&str; 4] = ["name", "code", "severity", "waitTime"];

/// Raw, untyped add-patient body. Each field keeps whatever JSON the caller
/// sent so that absence and wrong type can be told apart.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PatientDraft {
    #[serde(default)]
    pub name: Option<Value>,
    #[serde(default)]
    pub code: Option<Value>,
    #[serde(default)]
    pub severity: Option<Value>,
    #[serde(default, rename = "waitTime")]
    pub wait_time: Option<Value>,
}

impl PatientDraft {
    /// Check presence of all four fields first, then their types.
    ///
    /// Text fields are absent when missing, `null` or empty. Numeric fields are
    /// absent only when missing; `null` or a string there is a type error.
    pub fn validate(self) -> Result<NewPatient, CoreError> {
        let presence = [
            text_present(&self.name),
            text_present(&self.code),
            value_present(&self.severity),
            value_present(&self.wait_time),
        ];
        if let Some(idx) = presence.iter().position(|ok| !ok) {
            return Err(CoreError::MissingField(REQUIRED_FIELDS[idx]));
        }

        Ok(NewPatient {
            name: into_text("name", self.name)?,
            code: into_text("code", self.code)?,
            severity: into_number("severity", self.severity)?,
            wait_time: into_number("waitTime", self.wait_time)?,
        })
    }
}

fn value_present(v: &Option<Value>) -> bool {
    v.is_some()
}

fn text_present(v: &Option<Value>) -> bool {
    match v {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

fn into_text(field: &'static str, v: Option<Value>) -> Result<String, CoreError> {
    match v {
        Some(Value::String(s)) => Ok(s),
        _ => Err(CoreError::InvalidType(field)),
    }
}

fn into_number(field: &'static str, v: Option<Value>) -> Result<Number, CoreError> {
    match v {
        Some(Value::Number(n)) => Ok(n),
        _ => Err(CoreError::InvalidType(field)),
    }
}

/// Validate the `name` query parameter of a wait-time lookup.
///
/// Blank input is rejected, but the returned value is not trimmed: stored names
/// are compared exactly.
pub fn validate_lookup_name(name: Option<&str>) -> Result<&str, CoreError> {
    match name {
        Some(n) if !n.trim().is_empty() => Ok(n),
        _ => Err(CoreError::MissingField("name")),
    }
}
