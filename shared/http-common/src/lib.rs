//! Shared HTTP response bodies and query helpers for the triage service.
//!
//! Framework-agnostic: bodies are `serde_json::Value` and queries are raw
//! strings, so the api-server (or any other HTTP surface) can wrap them in its
//! own request and response types.

use serde_json::{json, Number, Value};

// ============================================================================
// Error Bodies
// ============================================================================

/// Canonical client-facing message for an error code.
///
/// Unknown codes fall back to the code itself.
pub fn error_message(code: &str) -> &str {
    match code {
        "missing_fields" => "Missing required fields: name, code, severity, waitTime",
        "invalid_types" => "Severity and waitTime must be numbers",
        "invalid_text" => "Name and code must be strings",
        "invalid_query" => "Query string could not be parsed",
        "invalid_body" => "Request body must be a JSON object",
        "name_required" => "Patient name is required",
        "patient_not_found" => "Patient not found",
        "insert_failed" => "Failed to add patient to the triage list",
        "list_failed" => "Unable to retrieve triage list due to server error",
        "internal" => "Internal Server Error",
        _ => code,
    }
}

/// Error JSON with the canonical message for `code`.
///
/// Returns: `{"error": "<message>"}`
pub fn json_err(code: &str) -> Value {
    json_error_with_message(error_message(code))
}

/// Error JSON with a custom message.
///
/// Returns: `{"error": "<message>"}`
pub fn json_error_with_message(message: &str) -> Value {
    json!({ "error": message })
}

/// Informational JSON used where the API answers with `message` instead of
/// `error` (the empty triage list).
///
/// Returns: `{"message": "<message>"}`
pub fn json_message(message: &str) -> Value {
    json!({ "message": message })
}

// ============================================================================
// Success Bodies
// ============================================================================

/// Returns: `{"success": true, "patientId": "<id>"}`
pub fn json_created(patient_id: &str) -> Value {
    json!({ "success": true, "patientId": patient_id })
}

/// Returns: `{"waitTime": <n>}`
pub fn json_wait_time(wait_time: &Number) -> Value {
    json!({ "waitTime": wait_time })
}

// ============================================================================
// Query Helpers
// ============================================================================

/// First value of `key` in a raw (still percent-encoded) query string.
///
/// Repeated keys are not an error; later occurrences are ignored. A missing
/// query string yields `Ok(None)`.
pub fn first_query_value(
    raw: Option<&str>,
    key: &str,
) -> Result<Option<String>, serde_urlencoded::de::Error> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(raw)?;
    Ok(pairs.into_iter().find(|(k, _)| k == key).map(|(_, v)| v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_err() {
        assert_eq!(
            json_err("patient_not_found"),
            json!({"error": "Patient not found"})
        );
        assert_eq!(
            json_err("missing_fields"),
            json!({"error": "Missing required fields: name, code, severity, waitTime"})
        );

        // Unknown code falls back to code as message
        assert_eq!(json_err("custom_error"), json!({"error": "custom_error"}));
    }

    #[test]
    fn test_json_message() {
        assert_eq!(
            json_message("No patients found"),
            json!({"message": "No patients found"})
        );
    }

    #[test]
    fn test_success_bodies() {
        assert_eq!(
            json_created("65f0c0ffee"),
            json!({"success": true, "patientId": "65f0c0ffee"})
        );
        assert_eq!(json_wait_time(&Number::from(15)).to_string(), r#"{"waitTime":15}"#);
        let half = Number::from_f64(7.5).unwrap();
        assert_eq!(json_wait_time(&half), json!({"waitTime": 7.5}));
    }

    #[test]
    fn test_first_query_value() {
        assert_eq!(first_query_value(None, "name").unwrap(), None);
        assert_eq!(first_query_value(Some(""), "name").unwrap(), None);
        assert_eq!(
            first_query_value(Some("name=Mary%20Ann"), "name").unwrap(),
            Some("Mary Ann".to_string())
        );
        assert_eq!(
            first_query_value(Some("name=a&name=b"), "name").unwrap(),
            Some("a".to_string())
        );
        assert_eq!(
            first_query_value(Some("other=1&name=Bob+Lee"), "name").unwrap(),
            Some("Bob Lee".to_string())
        );
        assert_eq!(first_query_value(Some("name="), "name").unwrap(), Some(String::new()));
        assert_eq!(first_query_value(Some("other=1"), "name").unwrap(), None);
    }

    #[test]
    fn test_text_type_message() {
        assert_eq!(
            json_err("invalid_text"),
            json!({"error": "Name and code must be strings"})
        );
    }
}
