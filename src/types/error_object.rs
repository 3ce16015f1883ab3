use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The `error` object the endpoint returns on failure, both as a whole response body and as a
/// mid-stream event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    /// Status-like code; a number for HTTP-derived failures, sometimes a string upstream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<Value>,

    /// Human-readable error message.
    #[serde(default)]
    pub message: String,
}

impl ErrorObject {
    /// The code as an HTTP-style status, if it is numeric and in range.
    pub fn status_code(&self) -> Option<u16> {
        self.code
            .as_ref()
            .and_then(Value::as_u64)
            .and_then(|code| u16::try_from(code).ok())
    }
}

/// Envelope of an error body: `{"error": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// The error details.
    pub error: ErrorObject,
}

impl ErrorResponse {
    /// Pull the human-readable message out of a raw error body, if it has the expected shape.
    pub fn message_from_body(body: &str) -> Option<String> {
        serde_json::from_str::<ErrorResponse>(body)
            .ok()
            .map(|response| response.error.message)
            .filter(|message| !message.is_empty())
    }
}
