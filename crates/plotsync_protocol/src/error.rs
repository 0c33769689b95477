//! Error types for the command protocol.

use crate::envelope::{ErrorCode, ResponseEnvelope};
use plotsync_core::ValidationReport;
use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while decoding or encoding requests.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The `command` name is not part of the protocol.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// The envelope itself is unusable.
    #[error("malformed request: {0}")]
    Malformed(String),

    /// The params do not describe a valid payload.
    #[error("invalid params: {0}")]
    Validation(ValidationReport),

    /// A payload could not be encoded to JSON.
    #[error("encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ProtocolError {
    /// Wire error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            ProtocolError::UnknownCommand(_) | ProtocolError::Malformed(_) => {
                ErrorCode::Malformed
            }
            ProtocolError::Validation(_) => ErrorCode::Validation,
            ProtocolError::Encode(_) => ErrorCode::Internal,
        }
    }

    /// Builds the error response for this failure.
    pub fn to_response(&self) -> ResponseEnvelope {
        match self {
            ProtocolError::Validation(report) => ResponseEnvelope::validation(report),
            other => ResponseEnvelope::error(other.code(), other.to_string()),
        }
    }
}
