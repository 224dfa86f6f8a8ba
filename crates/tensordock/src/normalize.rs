//! Response normalization.
//!
//! The TensorDock API reports success in several incompatible ways: a JSON
//! boolean, a string boolean, or implicitly through the HTTP status. Some
//! failure paths even answer with an HTML page and a `200`. Everything is
//! funnelled through [`normalize`] so that typed decoding only ever sees a
//! JSON object whose `success` key, when present, is a real boolean.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{Result, TensorDockError};
use crate::transport::RawResponse;

/// Error text synthesized for HTML responses.
pub const HTML_FAILURE_MESSAGE: &str = "api call failed";

const SUCCESS_KEY: &str = "success";
const ERROR_KEY: &str = "error";

/// Coerce a raw response into the canonical envelope document.
///
/// # Errors
/// Returns [`TensorDockError::Normalization`] when the body is not a JSON
/// object and was not an HTML page.
pub fn normalize(raw: &RawResponse) -> Result<Value> {
    if is_html(&raw.content_type) {
        warn!(
            status = raw.status,
            "API answered with an HTML page, treating as failure"
        );
        return Ok(html_failure());
    }

    let mut document = parse_object(&raw.body)?;

    match document.get(SUCCESS_KEY) {
        Some(Value::String(text)) => {
            let success = parse_bool(text).unwrap_or_else(|| {
                debug!(value = %text, "unparseable success flag, assuming false");
                false
            });
            document.insert(SUCCESS_KEY.to_string(), Value::Bool(success));
        }
        Some(_) => {}
        None if status_implies_success(raw.status) => {
            document.insert(SUCCESS_KEY.to_string(), Value::Bool(true));
        }
        None => {}
    }

    Ok(Value::Object(document))
}

/// Decode a normalized document into `T`.
///
/// # Errors
/// Returns [`TensorDockError::Decode`] when the document does not fit `T`.
pub fn decode<T: DeserializeOwned>(document: Value) -> Result<T> {
    serde_json::from_value(document).map_err(TensorDockError::Decode)
}

fn is_html(content_type: &str) -> bool {
    content_type
        .trim_start()
        .get(..9)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("text/html"))
}

fn html_failure() -> Value {
    let mut document = Map::new();
    document.insert(SUCCESS_KEY.to_string(), Value::Bool(false));
    document.insert(
        ERROR_KEY.to_string(),
        Value::String(HTML_FAILURE_MESSAGE.to_string()),
    );
    Value::Object(document)
}

fn parse_object(body: &[u8]) -> Result<Map<String, Value>> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(document)) => Ok(document),
        Ok(other) => Err(TensorDockError::Normalization(format!(
            "expected a JSON object, got {}",
            kind(&other)
        ))),
        Err(e) => {
            warn!(error = %e, body = %String::from_utf8_lossy(body), "Failed to parse response");
            Err(TensorDockError::Normalization(e.to_string()))
        }
    }
}

/// Parse a string-encoded boolean.
///
/// Only the lower, title and upper case spellings of `true`/`false` are
/// accepted, plus `t`, `T`, `1`, `f`, `F` and `0`. Mixed case such as `tRuE`
/// does not parse.
fn parse_bool(text: &str) -> Option<bool> {
    match text {
        "1" | "t" | "T" | "true" | "True" | "TRUE" => Some(true),
        "0" | "f" | "F" | "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

/// Statuses that count as success when the API omits the flag.
///
/// The upper bound is inclusive on purpose: `300` is treated as OK.
fn status_implies_success(status: u16) -> bool {
    (200..=300).contains(&status)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Envelope, ListServersResponse};
    use serde_json::json;

    fn json_response(status: u16, body: &str) -> RawResponse {
        RawResponse::new(status, "application/json", body)
    }

    #[test]
    fn test_native_boolean_is_untouched() {
        for flag in [true, false] {
            let body = json!({ "success": flag, "error": "" }).to_string();
            let doc = normalize(&json_response(500, &body)).unwrap();
            assert_eq!(doc["success"], json!(flag));
        }
    }

    #[test]
    fn test_string_boolean_is_coerced() {
        let cases = [
            ("true", true),
            ("True", true),
            ("TRUE", true),
            ("t", true),
            ("T", true),
            ("1", true),
            ("false", false),
            ("False", false),
            ("FALSE", false),
            ("f", false),
            ("F", false),
            ("0", false),
        ];

        for (text, expected) in cases {
            let body = json!({ "success": text }).to_string();
            let doc = normalize(&json_response(200, &body)).unwrap();
            assert_eq!(doc["success"], json!(expected), "input {text:?}");
        }
    }

    #[test]
    fn test_unparseable_string_fails_closed() {
        for text in ["yes", "", "ok", "truthy", "tRuE", "TrUe", "fAlSe", " true"] {
            let body = json!({ "success": text }).to_string();
            let doc = normalize(&json_response(200, &body)).unwrap();
            assert_eq!(doc["success"], json!(false), "input {text:?}");
        }
    }

    #[test]
    fn test_missing_success_inferred_from_status() {
        for status in [200, 201, 204, 299, 300] {
            let doc = normalize(&json_response(status, r#"{"id":"abc123"}"#)).unwrap();
            assert_eq!(doc["success"], json!(true), "status {status}");
        }
    }

    #[test]
    fn test_missing_success_left_absent_outside_ok_range() {
        for status in [199, 301, 404, 500] {
            let doc = normalize(&json_response(status, r#"{"id":"abc123"}"#)).unwrap();
            assert!(doc.get("success").is_none(), "status {status}");
        }
    }

    #[test]
    fn test_html_body_replaced_regardless_of_status() {
        for status in [200, 404, 502] {
            let raw = RawResponse::new(status, "text/html; charset=UTF-8", "<html>oops</html>");
            let doc = normalize(&raw).unwrap();
            assert_eq!(doc, json!({ "success": false, "error": "api call failed" }));
        }
    }

    #[test]
    fn test_html_check_wins_over_valid_json() {
        let raw = RawResponse::new(200, "text/html", r#"{"success":true}"#);
        let doc = normalize(&raw).unwrap();
        assert_eq!(doc["success"], json!(false));
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let err = normalize(&json_response(200, "not json")).unwrap_err();
        assert!(matches!(err, TensorDockError::Normalization(_)));
    }

    #[test]
    fn test_non_object_json_is_an_error() {
        let err = normalize(&json_response(200, "[1,2,3]")).unwrap_err();
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn test_other_fields_survive() {
        let body = r#"{"success":"true","servers":{"a":{"id":"a"}},"extra":1}"#;
        let doc = normalize(&json_response(200, body)).unwrap();
        assert_eq!(doc["servers"]["a"]["id"], json!("a"));
        assert_eq!(doc["extra"], json!(1));
    }

    #[test]
    fn test_string_success_decodes_into_listing() {
        let raw = json_response(200, r#"{"success":"True","servers":{}}"#);
        let listing: ListServersResponse = decode(normalize(&raw).unwrap()).unwrap();
        assert!(listing.envelope.success);
        assert!(listing.servers.is_empty());
    }

    #[test]
    fn test_html_decodes_into_failed_envelope() {
        let raw = RawResponse::new(200, "text/html", "<html>...</html>");
        let envelope: Envelope = decode(normalize(&raw).unwrap()).unwrap();
        assert_eq!(
            envelope,
            Envelope {
                success: false,
                error: "api call failed".to_string(),
            }
        );
    }

    #[test]
    fn test_created_without_flag_decodes_as_success() {
        let raw = json_response(201, r#"{"id":"abc123"}"#);
        let envelope: Envelope = decode(normalize(&raw).unwrap()).unwrap();
        assert!(envelope.success);
        assert!(envelope.error.is_empty());
    }

    #[test]
    fn test_absent_flag_decodes_as_failure() {
        let raw = json_response(503, r#"{"id":"abc123"}"#);
        let envelope: Envelope = decode(normalize(&raw).unwrap()).unwrap();
        assert!(!envelope.success);
    }

    #[test]
    fn test_decode_reports_shape_mismatch() {
        #[derive(Debug, serde::Deserialize)]
        struct Needs {
            #[allow(dead_code)]
            count: u32,
        }

        let err = decode::<Needs>(json!({ "count": "many" })).unwrap_err();
        assert!(matches!(err, TensorDockError::Decode(_)));
    }
}
