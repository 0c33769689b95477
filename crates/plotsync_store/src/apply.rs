//! Pure command application.
//!
//! `apply` never touches a committed snapshot: it works on a copy of the
//! base state and reports which slices actually changed.

use crate::events::DisplayContent;
use plotsync_core::{EditorState, FeatureCollection, SliceKind};
use plotsync_protocol::{Command, LogMessage};
use std::collections::BTreeSet;

/// Non-state output of a command, delivered after the commit.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Forwarded {
    Display(DisplayContent),
    Log(LogMessage),
}

/// The result of applying a command to a base state.
#[derive(Debug)]
pub(crate) struct Transition {
    pub state: EditorState,
    pub changed: BTreeSet<SliceKind>,
    pub forwarded: Vec<Forwarded>,
}

impl Transition {
    /// Returns true if a slice recorded in history changed.
    pub fn is_historic(&self) -> bool {
        self.changed.iter().any(|kind| kind.is_historic())
    }
}

/// Applies an already-validated command to a copy of `base`.
pub(crate) fn apply(base: &EditorState, command: Command) -> Transition {
    let mut transition = Transition {
        state: base.clone(),
        changed: BTreeSet::new(),
        forwarded: Vec::new(),
    };
    apply_into(&mut transition, command);
    transition
}

fn apply_into(t: &mut Transition, command: Command) {
    match command {
        Command::AddFeatures(features) => {
            if !features.is_empty() {
                t.state
                    .feature_collection
                    .get_or_insert_with(FeatureCollection::default)
                    .append(features);
                t.changed.insert(SliceKind::FeatureCollection);
            }
        }
        Command::UpdateFeatures(features) => {
            if let Some(fc) = t.state.feature_collection.as_mut() {
                if fc.replace_matching(&features) > 0 {
                    t.changed.insert(SliceKind::FeatureCollection);
                }
            }
        }
        Command::DeleteFeatures(ids) => {
            if let Some(fc) = t.state.feature_collection.as_mut() {
                if fc.remove_ids(&ids) > 0 {
                    t.changed.insert(SliceKind::FeatureCollection);
                }
            }
        }
        Command::SetFeatureCollection(fc) => {
            replace(&mut t.state.feature_collection, fc, SliceKind::FeatureCollection, &mut t.changed)
        }
        Command::SetViewport(viewport) => {
            replace(&mut t.state.viewport_state, viewport, SliceKind::Viewport, &mut t.changed)
        }
        Command::SetSelection(selection) => {
            replace(&mut t.state.selection_state, selection, SliceKind::Selection, &mut t.changed)
        }
        Command::SetTime(time) => {
            replace(&mut t.state.time_state, time, SliceKind::Time, &mut t.changed)
        }
        Command::ShowText(text) => t.forwarded.push(Forwarded::Display(DisplayContent::Text(text))),
        Command::ShowData(data) => t.forwarded.push(Forwarded::Display(DisplayContent::Data(data))),
        Command::ShowImage(image) => {
            t.forwarded.push(Forwarded::Display(DisplayContent::Image(image)))
        }
        Command::LogMessage(message) => t.forwarded.push(Forwarded::Log(message)),
        Command::Composite(commands) => {
            for command in commands {
                apply_into(t, command);
            }
        }
    }
}

fn replace<T: PartialEq>(
    slot: &mut Option<T>,
    value: T,
    kind: SliceKind,
    changed: &mut BTreeSet<SliceKind>,
) {
    if slot.as_ref() != Some(&value) {
        *slot = Some(value);
        changed.insert(kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plotsync_core::{
        Feature, FeatureId, PointFeature, PointGeometry, PointProperties, SelectionState,
        ViewportState,
    };

    fn point(id: &str, lon: f64) -> Feature {
        Feature::Point(PointFeature {
            id: Some(id.into()),
            geometry: PointGeometry::new(lon, 50.0),
            properties: PointProperties::default(),
        })
    }

    #[test]
    fn add_initializes_missing_collection() {
        let t = apply(&EditorState::default(), Command::AddFeatures(vec![point("a", 1.0)]));
        assert_eq!(t.state.feature_count(), 1);
        assert!(t.changed.contains(&SliceKind::FeatureCollection));
        assert!(t.is_historic());
    }

    #[test]
    fn base_is_untouched() {
        let base = EditorState::default();
        let _ = apply(&base, Command::SetViewport(ViewportState::new(0.0, 0.0, 1.0, 1.0)));
        assert_eq!(base, EditorState::default());
    }

    #[test]
    fn unknown_ids_change_nothing() {
        let base = apply(&EditorState::default(), Command::AddFeatures(vec![point("a", 1.0)])).state;

        let t = apply(&base, Command::UpdateFeatures(vec![point("zzz", 2.0)]));
        assert!(t.changed.is_empty());

        let t = apply(&base, Command::DeleteFeatures(vec![FeatureId::Number(9)]));
        assert!(t.changed.is_empty());
        assert_eq!(t.state, base);
    }

    #[test]
    fn update_replaces_by_id() {
        let base = apply(&EditorState::default(), Command::AddFeatures(vec![point("a", 1.0)])).state;
        let t = apply(&base, Command::UpdateFeatures(vec![point("a", 7.0)]));
        let fc = t.state.feature_collection.unwrap();
        assert_eq!(fc.get(&"a".into()), Some(&point("a", 7.0)));
    }

    #[test]
    fn selection_only_is_not_historic() {
        let t = apply(
            &EditorState::default(),
            Command::SetSelection(SelectionState::new(vec!["a".into()])),
        );
        assert_eq!(t.changed.iter().copied().collect::<Vec<_>>(), [SliceKind::Selection]);
        assert!(!t.is_historic());
    }

    #[test]
    fn setting_same_value_is_not_a_change() {
        let viewport = ViewportState::new(0.0, 0.0, 1.0, 1.0);
        let base = apply(&EditorState::default(), Command::SetViewport(viewport)).state;
        assert!(apply(&base, Command::SetViewport(viewport)).changed.is_empty());
    }

    #[test]
    fn composite_collects_every_effect() {
        let t = apply(
            &EditorState::default(),
            Command::Composite(vec![
                Command::AddFeatures(vec![point("a", 1.0)]),
                Command::SetSelection(SelectionState::new(vec!["a".into()])),
                Command::ShowText("added".into()),
                Command::DeleteFeatures(vec!["a".into()]),
            ]),
        );
        assert_eq!(t.state.feature_count(), 0);
        assert!(t.changed.contains(&SliceKind::FeatureCollection));
        assert!(t.changed.contains(&SliceKind::Selection));
        assert_eq!(
            t.forwarded,
            [Forwarded::Display(DisplayContent::Text("added".into()))]
        );
    }
}
