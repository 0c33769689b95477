//! Editor state slices.

use crate::error::CoreError;
use crate::feature::FeatureCollection;
use crate::types::{FeatureId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Time position of a plot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeState {
    /// Current scrub position.
    pub current: Timestamp,
    /// Start of the plot period.
    pub start: Timestamp,
    /// End of the plot period.
    pub end: Timestamp,
}

impl TimeState {
    /// Creates a time state.
    pub fn new(current: Timestamp, start: Timestamp, end: Timestamp) -> Self {
        Self {
            current,
            start,
            end,
        }
    }

    /// Returns true if `current` lies within `[start, end]`.
    pub fn contains_current(&self) -> bool {
        self.start <= self.current && self.current <= self.end
    }
}

/// Visible map area as `[west, south, east, north]` in decimal degrees.
///
/// `west > east` describes a viewport that crosses the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportState {
    /// `[west, south, east, north]`.
    pub bounds: [f64; 4],
}

impl ViewportState {
    /// Creates a viewport from its four bounds.
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            bounds: [west, south, east, north],
        }
    }

    /// Western longitude.
    pub fn west(&self) -> f64 {
        self.bounds[0]
    }

    /// Southern latitude.
    pub fn south(&self) -> f64 {
        self.bounds[1]
    }

    /// Eastern longitude.
    pub fn east(&self) -> f64 {
        self.bounds[2]
    }

    /// Northern latitude.
    pub fn north(&self) -> f64 {
        self.bounds[3]
    }

    /// Returns true if the viewport wraps across 180°.
    pub fn crosses_antimeridian(&self) -> bool {
        self.west() > self.east()
    }
}

/// Selected feature IDs, in selection order.
///
/// Duplicates are kept as given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionState {
    /// Selected IDs.
    #[serde(rename = "selectedIds")]
    pub selected_ids: Vec<FeatureId>,
}

impl SelectionState {
    /// Creates a selection.
    pub fn new(selected_ids: Vec<FeatureId>) -> Self {
        Self { selected_ids }
    }

    /// Returns true if nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.selected_ids.is_empty()
    }
}

/// Aggregate state of one open document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorState {
    /// Features on the plot.
    pub feature_collection: Option<FeatureCollection>,
    /// Time position.
    pub time_state: Option<TimeState>,
    /// Map viewport.
    pub viewport_state: Option<ViewportState>,
    /// Current selection.
    pub selection_state: Option<SelectionState>,
}

impl EditorState {
    /// Returns a copy of one slice.
    pub fn slice(&self, kind: SliceKind) -> StateSlice {
        match kind {
            SliceKind::FeatureCollection => {
                StateSlice::FeatureCollection(self.feature_collection.clone())
            }
            SliceKind::Time => StateSlice::Time(self.time_state.clone()),
            SliceKind::Viewport => StateSlice::Viewport(self.viewport_state),
            SliceKind::Selection => StateSlice::Selection(self.selection_state.clone()),
        }
    }

    /// Number of features, treating a missing collection as empty.
    pub fn feature_count(&self) -> usize {
        self.feature_collection.as_ref().map_or(0, FeatureCollection::len)
    }
}

/// Names one of the four editor state slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SliceKind {
    /// `featureCollection`.
    FeatureCollection,
    /// `timeState`.
    Time,
    /// `viewportState`.
    Viewport,
    /// `selectionState`.
    Selection,
}

impl SliceKind {
    /// Every slice, in canonical order.
    pub const ALL: [SliceKind; 4] = [
        SliceKind::FeatureCollection,
        SliceKind::Time,
        SliceKind::Viewport,
        SliceKind::Selection,
    ];

    /// Wire name of the slice.
    pub fn as_str(self) -> &'static str {
        match self {
            SliceKind::FeatureCollection => "featureCollection",
            SliceKind::Time => "timeState",
            SliceKind::Viewport => "viewportState",
            SliceKind::Selection => "selectionState",
        }
    }

    /// Returns true if changes to this slice are recorded in undo history.
    pub fn is_historic(self) -> bool {
        !matches!(self, SliceKind::Selection)
    }
}

impl fmt::Display for SliceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SliceKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "featureCollection" => Ok(SliceKind::FeatureCollection),
            "timeState" | "time" => Ok(SliceKind::Time),
            "viewportState" | "viewport" => Ok(SliceKind::Viewport),
            "selectionState" | "selection" => Ok(SliceKind::Selection),
            other => Err(CoreError::UnknownSlice(other.to_string())),
        }
    }
}

/// A read-only copy of one slice. The inner value is `None` while the
/// slice has never been set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StateSlice {
    /// Feature collection.
    FeatureCollection(Option<FeatureCollection>),
    /// Time state.
    Time(Option<TimeState>),
    /// Viewport state.
    Viewport(Option<ViewportState>),
    /// Selection state.
    Selection(Option<SelectionState>),
}

impl StateSlice {
    /// Which slice this is.
    pub fn kind(&self) -> SliceKind {
        match self {
            StateSlice::FeatureCollection(_) => SliceKind::FeatureCollection,
            StateSlice::Time(_) => SliceKind::Time,
            StateSlice::Viewport(_) => SliceKind::Viewport,
            StateSlice::Selection(_) => SliceKind::Selection,
        }
    }

    /// Returns true if the slice has never been set.
    pub fn is_unset(&self) -> bool {
        match self {
            StateSlice::FeatureCollection(v) => v.is_none(),
            StateSlice::Time(v) => v.is_none(),
            StateSlice::Viewport(v) => v.is_none(),
            StateSlice::Selection(v) => v.is_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::parse_timestamp;
    use serde_json::json;

    #[test]
    fn slice_kind_names_round_trip() {
        for kind in SliceKind::ALL {
            assert_eq!(kind.as_str().parse::<SliceKind>().unwrap(), kind);
        }
        assert!("layers".parse::<SliceKind>().is_err());
        assert!(!SliceKind::Selection.is_historic());
        assert!(SliceKind::Viewport.is_historic());
    }

    #[test]
    fn antimeridian_detection() {
        assert!(ViewportState::new(170.0, -10.0, -170.0, 10.0).crosses_antimeridian());
        assert!(!ViewportState::new(-10.0, 40.0, 10.0, 60.0).crosses_antimeridian());
    }

    #[test]
    fn selection_wire_name() {
        let selection = SelectionState::new(vec!["a".into(), FeatureId::Number(2)]);
        assert_eq!(
            serde_json::to_value(&selection).unwrap(),
            json!({"selectedIds": ["a", 2]})
        );
    }

    #[test]
    fn default_state_is_all_unset() {
        let state = EditorState::default();
        for kind in SliceKind::ALL {
            assert!(state.slice(kind).is_unset());
            assert_eq!(state.slice(kind).kind(), kind);
        }
        assert_eq!(state.feature_count(), 0);
    }

    #[test]
    fn time_contains_current() {
        let t = |s| parse_timestamp(s).unwrap();
        let inside = TimeState::new(
            t("2024-01-01T12:00:00Z"),
            t("2024-01-01T00:00:00Z"),
            t("2024-01-02T00:00:00Z"),
        );
        assert!(inside.contains_current());

        let outside = TimeState {
            current: t("2024-01-03T00:00:00Z"),
            ..inside
        };
        assert!(!outside.contains_current());
    }
}
