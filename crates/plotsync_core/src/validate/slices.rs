//! Validators for the time, viewport and selection slices.

use super::{field, index, Rules, TimePolicy, Validate, ValidationReport};
use crate::state::{SelectionState, TimeState, ViewportState};
use crate::types::{parse_timestamp, FeatureId, Timestamp};
use serde_json::Value;

const TIME_FIELDS: [&str; 3] = ["current", "start", "end"];

/// Returns true if `value` has the shape of a time state.
pub fn is_time_state(value: &Value) -> bool {
    value.as_object().is_some_and(|map| {
        TIME_FIELDS
            .iter()
            .all(|key| map.get(*key).is_some_and(Value::is_string))
    })
}

/// Returns true if `value` has the shape of a viewport state.
pub fn is_viewport_state(value: &Value) -> bool {
    value
        .get("bounds")
        .and_then(Value::as_array)
        .is_some_and(|bounds| bounds.len() == 4 && bounds.iter().all(Value::is_number))
}

/// Returns true if `value` has the shape of a selection state.
pub fn is_selection_state(value: &Value) -> bool {
    value
        .get("selectedIds")
        .and_then(Value::as_array)
        .is_some_and(|ids| ids.iter().all(|id| FeatureId::from_json(id).is_some()))
}

/// Decodes a time state, enumerating every violation.
pub fn parse_time_state(value: &Value, rules: &Rules) -> Result<TimeState, ValidationReport> {
    let mut report = ValidationReport::new();
    let Some(map) = value.as_object() else {
        report.push("expected a time state object");
        return Err(report);
    };

    let mut read = |key: &str| -> Option<Timestamp> {
        match map.get(key) {
            None | Some(Value::Null) => {
                report.at(key, "required");
                None
            }
            Some(Value::String(text)) => match parse_timestamp(text) {
                Ok(ts) => Some(ts),
                Err(e) => {
                    report.at(key, e);
                    None
                }
            },
            Some(_) => {
                report.at(key, "expected a date-time string");
                None
            }
        }
    };

    let current = read("current");
    let start = read("start");
    let end = read("end");

    match (current, start, end) {
        (Some(current), Some(start), Some(end)) => {
            let state = TimeState::new(current, start, end);
            state.check(rules, "", &mut report);
            report.into_result(state)
        }
        _ => Err(report),
    }
}

/// Comprehensive time state validator.
pub fn validate_time_state(value: &Value, rules: &Rules) -> ValidationReport {
    parse_time_state(value, rules).err().unwrap_or_default()
}

impl Validate for TimeState {
    fn check(&self, rules: &Rules, path: &str, report: &mut ValidationReport) {
        if self.start > self.end {
            report.at(&field(path, "start"), "must not be after end");
        }
        if rules.time_policy == TimePolicy::CurrentWithinRange && !self.contains_current() {
            report.at(&field(path, "current"), "must lie within [start, end]");
        }
    }
}

/// Decodes a viewport state, enumerating every violation.
pub fn parse_viewport_state(value: &Value) -> Result<ViewportState, ValidationReport> {
    let mut report = ValidationReport::new();
    let Some(bounds) = value.get("bounds") else {
        report.at("bounds", "required");
        return Err(report);
    };
    let Some(items) = bounds.as_array() else {
        report.at("bounds", "expected an array of 4 numbers");
        return Err(report);
    };
    if items.len() != 4 {
        report.at("bounds", format!("expected 4 values, got {}", items.len()));
    }

    let mut numbers = [0.0f64; 4];
    for (i, item) in items.iter().enumerate().take(4) {
        match item.as_f64() {
            Some(n) => numbers[i] = n,
            None => report.at(&index("bounds", i), "expected a number"),
        }
    }
    if !report.is_valid() {
        return Err(report);
    }

    let state = ViewportState { bounds: numbers };
    state.check(&Rules::default(), "", &mut report);
    report.into_result(state)
}

/// Comprehensive viewport state validator.
pub fn validate_viewport_state(value: &Value) -> ValidationReport {
    parse_viewport_state(value).err().unwrap_or_default()
}

impl Validate for ViewportState {
    fn check(&self, _rules: &Rules, path: &str, report: &mut ValidationReport) {
        let bounds = field(path, "bounds");
        let names = ["west", "south", "east", "north"];
        for (i, (value, name)) in self.bounds.iter().zip(names).enumerate() {
            let limit = if i % 2 == 0 { 180.0 } else { 90.0 };
            if !value.is_finite() || value.abs() > limit {
                report.at(
                    &index(&bounds, i),
                    format!("{name} {value} outside [-{limit}, {limit}]"),
                );
            }
        }
        // West/east ordering is not checked: west > east crosses the antimeridian.
        if self.south() > self.north() {
            report.at(
                &bounds,
                format!("south {} is north of north {}", self.south(), self.north()),
            );
        }
    }
}

/// Decodes a selection state, enumerating every violation.
pub fn parse_selection_state(value: &Value) -> Result<SelectionState, ValidationReport> {
    let mut report = ValidationReport::new();
    let Some(ids) = value.get("selectedIds").and_then(Value::as_array) else {
        report.at("selectedIds", "expected an array of feature ids");
        return Err(report);
    };

    let mut selected = Vec::with_capacity(ids.len());
    for (i, id) in ids.iter().enumerate() {
        match FeatureId::from_json(id) {
            Some(id) => selected.push(id),
            None => report.at(&index("selectedIds", i), "expected a string or integer id"),
        }
    }
    report.into_result(SelectionState::new(selected))
}

/// Comprehensive selection state validator.
pub fn validate_selection_state(value: &Value) -> ValidationReport {
    parse_selection_state(value).err().unwrap_or_default()
}

impl Validate for SelectionState {
    fn check(&self, _rules: &Rules, _path: &str, _report: &mut ValidationReport) {}
}
