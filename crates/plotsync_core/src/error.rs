//! Error types for plotsync core.

use crate::validate::ValidationReport;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur when decoding editor state.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Input was not well-formed JSON.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Input was well-formed but broke one or more rules.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationReport),

    /// A slice name that is not one of the four editor slices.
    #[error("unknown state slice: {0}")]
    UnknownSlice(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_lists_every_rule() {
        let mut report = ValidationReport::new();
        report.push("start: must not be after end");
        report.push("current: required");

        let err = CoreError::from(report);
        let msg = err.to_string();
        assert!(msg.contains("start: must not be after end"));
        assert!(msg.contains("current: required"));
    }

    #[test]
    fn unknown_slice_display() {
        let err = CoreError::UnknownSlice("layers".into());
        assert_eq!(err.to_string(), "unknown state slice: layers");
    }
}
