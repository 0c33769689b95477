//! Error types for remote command calls.

use crate::classify::{Classify, ErrorClass};
use crate::transport::TransportError;
use plotsync_core::ValidationReport;
use plotsync_protocol::{ErrorBody, ErrorCode, ProtocolError, ResponseEnvelope};
use std::time::Duration;
use thiserror::Error;

/// Result type for remote client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced to callers of [`crate::RemoteClient`].
#[derive(Error, Debug)]
pub enum ClientError {
    /// The request payload failed validation. Never retried.
    #[error("validation failed: {message}")]
    Validation {
        /// Error message.
        message: String,
        /// Every violated rule.
        errors: Vec<String>,
    },

    /// Network reset, timeout or a 5xx-equivalent.
    #[error("transient error ({code}): {message}")]
    Transient {
        /// Error message.
        message: String,
        /// Wire error code.
        code: i32,
    },

    /// A failure that will not go away by retrying.
    #[error("request failed ({code}): {message}")]
    Permanent {
        /// Error message.
        message: String,
        /// Wire error code.
        code: i32,
    },

    /// The retry budget ran out.
    #[error("still failing after {attempts} attempts: {last}")]
    RetryExhausted {
        /// Attempts made, including the first.
        attempts: u32,
        /// The last underlying error.
        last: Box<ClientError>,
    },

    /// The circuit breaker refused the call.
    #[error("circuit open, retry in {remaining:?}")]
    CircuitOpen {
        /// Time until the circuit half-opens.
        remaining: Duration,
    },

    /// The call was cancelled.
    #[error("cancelled after {attempts} attempts")]
    Cancelled {
        /// Attempts made before cancellation.
        attempts: u32,
    },

    /// The request could not be encoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl ClientError {
    /// Wire-compatible error code.
    pub fn code(&self) -> i32 {
        match self {
            ClientError::Validation { .. } => ErrorCode::Validation.as_i32(),
            ClientError::Transient { code, .. } | ClientError::Permanent { code, .. } => *code,
            ClientError::RetryExhausted { .. } => ErrorCode::RetryExhausted.as_i32(),
            ClientError::CircuitOpen { .. } => ErrorCode::CircuitOpen.as_i32(),
            ClientError::Cancelled { .. } => ErrorCode::Cancelled.as_i32(),
            ClientError::Protocol(e) => e.code().as_i32(),
        }
    }

    /// Short name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientError::Validation { .. } => "validation",
            ClientError::Transient { .. } => "transient",
            ClientError::Permanent { .. } => "permanent",
            ClientError::RetryExhausted { .. } => "retry-exhausted",
            ClientError::CircuitOpen { .. } => "circuit-open",
            ClientError::Cancelled { .. } => "cancelled",
            ClientError::Protocol(_) => "protocol",
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        self.class().is_retryable()
    }

    /// Attempts made, where the error carries them.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            ClientError::RetryExhausted { attempts, .. } | ClientError::Cancelled { attempts } => {
                Some(*attempts)
            }
            _ => None,
        }
    }

    /// Converts to an error response envelope.
    pub fn to_response(&self) -> ResponseEnvelope {
        let errors = match self {
            ClientError::Validation { errors, .. } => errors.clone(),
            _ => Vec::new(),
        };
        ResponseEnvelope::Error {
            error: ErrorBody {
                message: self.to_string(),
                code: self.code(),
                errors,
            },
        }
    }
}

impl Classify for ClientError {
    fn class(&self) -> ErrorClass {
        match self {
            ClientError::Validation { .. } => ErrorClass::Validation,
            ClientError::Transient { .. } => ErrorClass::Transient,
            ClientError::Protocol(ProtocolError::Validation(_)) => ErrorClass::Validation,
            ClientError::Permanent { .. }
            | ClientError::RetryExhausted { .. }
            | ClientError::CircuitOpen { .. }
            | ClientError::Cancelled { .. }
            | ClientError::Protocol(_) => ErrorClass::Permanent,
        }
    }
}

impl From<ErrorBody> for ClientError {
    fn from(body: ErrorBody) -> Self {
        match ErrorClass::from_code(body.code) {
            ErrorClass::Validation => ClientError::Validation {
                message: body.message,
                errors: body.errors,
            },
            ErrorClass::Transient => ClientError::Transient {
                message: body.message,
                code: body.code,
            },
            ErrorClass::Permanent => ClientError::Permanent {
                message: body.message,
                code: body.code,
            },
        }
    }
}

impl From<ValidationReport> for ClientError {
    fn from(report: ValidationReport) -> Self {
        ClientError::Validation {
            message: report.to_string(),
            errors: report.into_errors(),
        }
    }
}

impl From<TransportError> for ClientError {
    fn from(error: TransportError) -> Self {
        let code = error.code().as_i32();
        let message = error.to_string();
        match error.class() {
            ErrorClass::Transient => ClientError::Transient { message, code },
            _ => ClientError::Permanent { message, code },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_bodies_are_classified_by_code() {
        let body = |code| ErrorBody {
            message: "boom".into(),
            code,
            errors: vec!["bounds: expected 4 values, got 3".into()],
        };
        assert!(matches!(ClientError::from(body(400)), ClientError::Validation { errors, .. } if errors.len() == 1));
        assert!(ClientError::from(body(503)).is_retryable());
        assert!(!ClientError::from(body(404)).is_retryable());
        assert_eq!(ClientError::from(body(422)).code(), 422);
    }

    #[test]
    fn sentinel_codes() {
        let exhausted = ClientError::RetryExhausted {
            attempts: 4,
            last: Box::new(ClientError::from(TransportError::Timeout)),
        };
        assert_eq!(exhausted.code(), 1001);
        assert_eq!(exhausted.attempts(), Some(4));
        assert!(exhausted.to_string().contains("after 4 attempts"));
        assert!(!exhausted.is_retryable());

        let open = ClientError::CircuitOpen {
            remaining: Duration::from_secs(3),
        };
        assert_eq!(open.code(), 1002);
        assert_eq!(open.kind(), "circuit-open");
        assert_eq!(ClientError::Cancelled { attempts: 1 }.code(), 1003);
    }

    #[test]
    fn local_validation_report_keeps_every_error() {
        let mut report = ValidationReport::new();
        report.at("bounds", "south must not exceed north");
        report.at("bounds[1]", "latitude 95 outside [-90, 90]");
        let error = ClientError::from(report);
        assert_eq!(error.code(), 400);
        assert!(!error.is_retryable());
        assert!(matches!(error, ClientError::Validation { ref errors, .. } if errors.len() == 2));
    }

    #[test]
    fn to_response_keeps_validation_errors() {
        let error = ClientError::Validation {
            message: "bad".into(),
            errors: vec!["a".into(), "b".into()],
        };
        let response = error.to_response();
        let body = response.error_body().unwrap();
        assert_eq!(body.code, 400);
        assert_eq!(body.errors, ["a", "b"]);
    }
}
