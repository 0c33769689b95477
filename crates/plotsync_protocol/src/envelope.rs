//! Wire envelopes.
//!
//! ```text
//! Request:  { "command": <kind>, "params": { ... }, "requestId"?: <string> }
//! Success:  { "result": <value-or-null> }
//! Error:    { "error": { "message": <string>, "code": <int>, "errors"?: [..] } }
//! ```

use plotsync_core::ValidationReport;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Error codes carried in `error.code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Payload failed validation.
    Validation,
    /// Document not found or no active document.
    NotFound,
    /// Envelope unusable or command unknown.
    Malformed,
    /// Unexpected failure on the serving side.
    Internal,
    /// Serving side temporarily unavailable.
    Unavailable,
    /// Serving side timed out.
    Timeout,
    /// Client gave up after its retry budget.
    RetryExhausted,
    /// Client refused to call while its circuit was open.
    CircuitOpen,
    /// Client cancelled the call.
    Cancelled,
}

impl ErrorCode {
    /// Numeric wire value.
    pub fn as_i32(self) -> i32 {
        match self {
            ErrorCode::Validation => 400,
            ErrorCode::NotFound => 404,
            ErrorCode::Malformed => 422,
            ErrorCode::Internal => 500,
            ErrorCode::Unavailable => 503,
            ErrorCode::Timeout => 504,
            ErrorCode::RetryExhausted => 1001,
            ErrorCode::CircuitOpen => 1002,
            ErrorCode::Cancelled => 1003,
        }
    }

    /// Looks up a known code.
    pub fn from_i32(code: i32) -> Option<Self> {
        Some(match code {
            400 => ErrorCode::Validation,
            404 => ErrorCode::NotFound,
            422 => ErrorCode::Malformed,
            500 => ErrorCode::Internal,
            503 => ErrorCode::Unavailable,
            504 => ErrorCode::Timeout,
            1001 => ErrorCode::RetryExhausted,
            1002 => ErrorCode::CircuitOpen,
            1003 => ErrorCode::Cancelled,
            _ => return None,
        })
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i32())
    }
}

/// A request as carried over the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnvelope {
    /// Command or query name.
    pub command: String,
    /// Named parameters.
    #[serde(default)]
    pub params: Map<String, Value>,
    /// Idempotency key; duplicates are answered from cache.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl RequestEnvelope {
    /// Creates an envelope without params.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            params: Map::new(),
            request_id: None,
        }
    }

    /// Adds a parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Sets the idempotency key.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// Body of an error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable message.
    pub message: String,
    /// Numeric code; see [`ErrorCode`].
    pub code: i32,
    /// Every violated rule, for validation failures.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl ErrorBody {
    /// Known code, if the numeric code is one of ours.
    pub fn error_code(&self) -> Option<ErrorCode> {
        ErrorCode::from_i32(self.code)
    }
}

impl fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

/// A response as carried over the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseEnvelope {
    /// `{"error": {...}}`.
    Error {
        /// Error details.
        error: ErrorBody,
    },
    /// `{"result": ...}`.
    Success {
        /// Result value, `null` for plain mutations.
        result: Value,
    },
}

impl ResponseEnvelope {
    /// A success response.
    pub fn success(result: Value) -> Self {
        ResponseEnvelope::Success { result }
    }

    /// A success response with a `null` result.
    pub fn ok() -> Self {
        Self::success(Value::Null)
    }

    /// An error response.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ResponseEnvelope::Error {
            error: ErrorBody {
                message: message.into(),
                code: code.as_i32(),
                errors: Vec::new(),
            },
        }
    }

    /// A validation error response listing every violation.
    pub fn validation(report: &ValidationReport) -> Self {
        ResponseEnvelope::Error {
            error: ErrorBody {
                message: format!("validation failed: {report}"),
                code: ErrorCode::Validation.as_i32(),
                errors: report.errors().to_vec(),
            },
        }
    }

    /// Returns true for a success response.
    pub fn is_success(&self) -> bool {
        matches!(self, ResponseEnvelope::Success { .. })
    }

    /// The error body, if this is an error response.
    pub fn error_body(&self) -> Option<&ErrorBody> {
        match self {
            ResponseEnvelope::Error { error } => Some(error),
            ResponseEnvelope::Success { .. } => None,
        }
    }

    /// Splits into the result or the error body.
    pub fn into_result(self) -> Result<Value, ErrorBody> {
        match self {
            ResponseEnvelope::Success { result } => Ok(result),
            ResponseEnvelope::Error { error } => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_defaults_params() {
        let request: RequestEnvelope = serde_json::from_value(json!({"command": "getTime"})).unwrap();
        assert_eq!(request, RequestEnvelope::new("getTime"));
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"command": "getTime", "params": {}})
        );
    }

    #[test]
    fn request_id_is_camel_case() {
        let request = RequestEnvelope::new("addFeatures").with_request_id("r-1");
        assert_eq!(serde_json::to_value(&request).unwrap()["requestId"], json!("r-1"));
    }

    #[test]
    fn success_with_null_result() {
        let response: ResponseEnvelope = serde_json::from_value(json!({"result": null})).unwrap();
        assert_eq!(response, ResponseEnvelope::ok());
        assert_eq!(serde_json::to_value(&response).unwrap(), json!({"result": null}));
    }

    #[test]
    fn error_wire_shape() {
        let response = ResponseEnvelope::error(ErrorCode::NotFound, "no active document");
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"error": {"message": "no active document", "code": 404}})
        );

        let parsed: ResponseEnvelope = serde_json::from_value(json!({
            "error": {"message": "boom", "code": 503}
        }))
        .unwrap();
        let body = parsed.error_body().unwrap();
        assert_eq!(body.error_code(), Some(ErrorCode::Unavailable));
    }

    #[test]
    fn code_lookup_round_trips() {
        for code in [
            ErrorCode::Validation,
            ErrorCode::NotFound,
            ErrorCode::Malformed,
            ErrorCode::Internal,
            ErrorCode::Unavailable,
            ErrorCode::Timeout,
            ErrorCode::RetryExhausted,
            ErrorCode::CircuitOpen,
            ErrorCode::Cancelled,
        ] {
            assert_eq!(ErrorCode::from_i32(code.as_i32()), Some(code));
        }
        assert_eq!(ErrorCode::from_i32(418), None);
    }
}
