//! Error types for the state store.

use plotsync_core::{CoreError, DocumentId, ValidationReport};
use plotsync_protocol::{ErrorCode, ProtocolError, ResponseEnvelope};
use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The command payload broke one or more rules. State is unchanged.
    #[error("validation failed: {0}")]
    Validation(ValidationReport),

    /// No open document has this ID.
    #[error("document not found: {0}")]
    DocumentNotFound(DocumentId),

    /// The request named no document and none is active.
    #[error("no active document")]
    NoActiveDocument,

    /// A persisted plot could not be read.
    #[error("invalid plot: {0}")]
    Plot(#[from] CoreError),

    /// A request envelope could not be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// JSON encoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StoreError {
    /// Wire error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            StoreError::Validation(_) => ErrorCode::Validation,
            StoreError::DocumentNotFound(_) | StoreError::NoActiveDocument => ErrorCode::NotFound,
            StoreError::Plot(CoreError::Validation(_)) => ErrorCode::Validation,
            StoreError::Plot(_) => ErrorCode::Malformed,
            StoreError::Protocol(e) => e.code(),
            StoreError::Json(_) | StoreError::Io(_) => ErrorCode::Internal,
        }
    }

    /// Returns true for validation failures.
    pub fn is_validation(&self) -> bool {
        self.code() == ErrorCode::Validation
    }

    /// Builds the error response for this failure.
    pub fn to_response(&self) -> ResponseEnvelope {
        match self {
            StoreError::Validation(report) | StoreError::Plot(CoreError::Validation(report)) => {
                ResponseEnvelope::validation(report)
            }
            StoreError::Protocol(e) => e.to_response(),
            other => ResponseEnvelope::error(other.code(), other.to_string()),
        }
    }
}

impl From<ValidationReport> for StoreError {
    fn from(report: ValidationReport) -> Self {
        StoreError::Validation(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes() {
        assert_eq!(
            StoreError::DocumentNotFound(DocumentId::new("x")).code(),
            ErrorCode::NotFound
        );
        assert_eq!(StoreError::NoActiveDocument.code().as_i32(), 404);
        assert!(StoreError::from(ValidationReport::single("bounds: required")).is_validation());
        assert_eq!(
            StoreError::Protocol(ProtocolError::UnknownCommand("fly".into())).code(),
            ErrorCode::Malformed
        );
    }

    #[test]
    fn validation_response_lists_errors() {
        let mut report = ValidationReport::new();
        report.push("start: must not be after end");
        report.push("bounds[1]: must be within [-90, 90]");
        let body = StoreError::Validation(report)
            .to_response()
            .into_result()
            .unwrap_err();
        assert_eq!(body.code, 400);
        assert_eq!(body.errors.len(), 2);
    }
}
