//! Response-shape normalization for the inference service. Every decoded
//! body resolves to either the inner `response` value or an
//! `InferenceError` right at this boundary, so downstream code never
//! inspects raw JSON keys.

use reqwest::StatusCode;
use serde_json::Value;

use teamcoach_core::domain::history::TeamSuggestion;

use crate::error::InferenceError;

const MISSING_WRAPPER: &str = "unexpected response shape: missing response key.";
const UNPARSED_RAW_NOTE: &str = " (raw model output could not be parsed as structured data)";

/// Normalize an HTTP status plus raw body into the inner `response` value.
///
/// Precedence: an explicit `error` field wins over the HTTP status; a
/// failure status without one maps to a generic message; a success status
/// with no `response` wrapper (or a non-JSON body) is a malformed-shape
/// failure.
pub fn decode_envelope(status: StatusCode, body: &[u8]) -> Result<Value, InferenceError> {
    let parsed: Option<Value> = serde_json::from_slice(body).ok();

    if let Some(Value::Object(ref fields)) = parsed {
        if let Some(error) = fields.get("error").and_then(Value::as_str) {
            let mut message = error.to_string();
            if fields.contains_key("raw_response") {
                message.push_str(UNPARSED_RAW_NOTE);
            }
            return Err(InferenceError::Service(message));
        }
    }

    if !status.is_success() {
        return Err(InferenceError::Service(format!(
            "service returned HTTP {}",
            status.as_u16()
        )));
    }

    match parsed {
        Some(Value::Object(mut fields)) => fields
            .remove("response")
            .ok_or_else(|| InferenceError::Service(MISSING_WRAPPER.to_string())),
        _ => Err(InferenceError::Service(MISSING_WRAPPER.to_string())),
    }
}

/// The `/suggest-team` inner payload: a structured team suggestion.
pub fn decode_team(value: Value) -> Result<TeamSuggestion, InferenceError> {
    serde_json::from_value(value)
        .map_err(|err| InferenceError::Service(format!("unexpected response shape: {err}")))
}

/// The `/ask-question` inner payload: a free-text answer.
pub fn decode_answer(value: Value) -> Result<String, InferenceError> {
    match value {
        Value::String(text) => Ok(text),
        other => Err(InferenceError::Service(format!(
            "unexpected response shape: expected a string answer, got {other}"
        ))),
    }
}
