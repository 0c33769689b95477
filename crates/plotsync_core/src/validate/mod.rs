//! Two-tier validation of editor state.
//!
//! - Narrowing predicates (`is_*`) are cheap shape checks over raw JSON,
//!   meant for branching.
//! - Comprehensive validators (`validate_*`, `parse_*`) enumerate every
//!   violated rule, structural and cross-field, in a [`ValidationReport`].
//!
//! Typed values implement [`Validate`], which runs only the cross-field
//! rules (their structure is already guaranteed by the type).

mod feature;
mod slices;

pub use feature::{
    is_annotation, is_feature, is_feature_collection, is_point, is_track, parse_feature,
    parse_feature_collection, validate_feature, validate_feature_collection,
};
pub use slices::{
    is_selection_state, is_time_state, is_viewport_state, parse_selection_state,
    parse_time_state, parse_viewport_state, validate_selection_state, validate_time_state,
    validate_viewport_state,
};

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;

/// Every rule a value violated. Empty means valid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    errors: Vec<String>,
}

impl ValidationReport {
    /// Creates an empty (valid) report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a report with a single error.
    pub fn single(error: impl Into<String>) -> Self {
        Self {
            errors: vec![error.into()],
        }
    }

    /// Returns true if no rule was violated.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// The violations, in discovery order.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Consumes the report, returning the violations.
    pub fn into_errors(self) -> Vec<String> {
        self.errors
    }

    /// Records a violation.
    pub fn push(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// Records a violation at `path`.
    pub fn at(&mut self, path: &str, message: impl fmt::Display) {
        if path.is_empty() {
            self.errors.push(message.to_string());
        } else {
            self.errors.push(format!("{path}: {message}"));
        }
    }

    /// Appends another report's violations, prefixing each with `prefix`.
    pub fn merge_prefixed(&mut self, prefix: &str, other: ValidationReport) {
        for error in other.errors {
            self.at(prefix, error);
        }
    }

    /// Returns `Ok(value)` if valid, otherwise the report.
    pub fn into_result<T>(self, value: T) -> Result<T, ValidationReport> {
        if self.is_valid() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return f.write_str("valid");
        }
        f.write_str(&self.errors.join("; "))
    }
}

impl std::error::Error for ValidationReport {}

impl Serialize for ValidationReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ValidationReport", 2)?;
        s.serialize_field("valid", &self.is_valid())?;
        s.serialize_field("errors", &self.errors)?;
        s.end()
    }
}

/// Whether `TimeState.current` must lie within `[start, end]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimePolicy {
    /// `current` may sit anywhere, e.g. while scrubbing past the period.
    #[default]
    Unconstrained,
    /// `current` must satisfy `start <= current <= end`.
    CurrentWithinRange,
}

/// Rule options shared by all validators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rules {
    /// Time range policy.
    pub time_policy: TimePolicy,
}

impl Rules {
    /// Rules with the given time policy.
    pub fn with_time_policy(time_policy: TimePolicy) -> Self {
        Self { time_policy }
    }
}

/// Cross-field validation of an already-typed value.
pub trait Validate {
    /// Records every violation under `path` into `report`.
    fn check(&self, rules: &Rules, path: &str, report: &mut ValidationReport);

    /// Runs [`Validate::check`] into a fresh report.
    fn validate(&self, rules: &Rules) -> ValidationReport {
        let mut report = ValidationReport::new();
        self.check(rules, "", &mut report);
        report
    }
}

impl<T: Validate> Validate for Option<T> {
    fn check(&self, rules: &Rules, path: &str, report: &mut ValidationReport) {
        if let Some(value) = self {
            value.check(rules, path, report);
        }
    }
}

impl Validate for crate::EditorState {
    fn check(&self, rules: &Rules, path: &str, report: &mut ValidationReport) {
        self.feature_collection
            .check(rules, &field(path, "featureCollection"), report);
        self.time_state.check(rules, &field(path, "timeState"), report);
        self.viewport_state
            .check(rules, &field(path, "viewportState"), report);
    }
}

/// `path.key`, or `key` at the root.
pub fn field(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

/// `path[index]`.
pub fn index(path: &str, index: usize) -> String {
    format!("{path}[{index}]")
}
