//! Inspect command implementation.

use super::load_plot;
use plotsync_core::{DataType, EditorState, Rules};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Plot inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Plot path.
    pub path: String,
    /// Number of visible features.
    pub feature_count: usize,
    /// Track count.
    pub tracks: usize,
    /// Reference point count.
    pub points: usize,
    /// Annotation count.
    pub annotations: usize,
    /// Time slice, if set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<TimeSummary>,
    /// Viewport bounds `[west, south, east, north]`, if set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewport: Option<[f64; 4]>,
    /// Number of selected feature IDs.
    pub selected: usize,
}

/// Time slice in RFC 3339 form.
#[derive(Debug, Serialize)]
pub struct TimeSummary {
    /// Current time.
    pub current: String,
    /// Period start.
    pub start: String,
    /// Period end.
    pub end: String,
}

impl InspectResult {
    fn from_state(path: &Path, state: &EditorState) -> Self {
        let mut result = InspectResult {
            path: path.display().to_string(),
            feature_count: state.feature_count(),
            tracks: 0,
            points: 0,
            annotations: 0,
            time: state.time_state.as_ref().map(|t| TimeSummary {
                current: t.current.to_rfc3339(),
                start: t.start.to_rfc3339(),
                end: t.end.to_rfc3339(),
            }),
            viewport: state.viewport_state.as_ref().map(|v| v.bounds),
            selected: state
                .selection_state
                .as_ref()
                .map_or(0, |s| s.selected_ids.len()),
        };

        if let Some(collection) = &state.feature_collection {
            for feature in &collection.features {
                match feature.data_type() {
                    DataType::Track => result.tracks += 1,
                    DataType::Point => result.points += 1,
                    DataType::Annotation => result.annotations += 1,
                }
            }
        }
        result
    }
}

/// Runs the inspect command.
pub fn run(
    path: &Path,
    format: &str,
    rules: &Rules,
    out: &mut dyn Write,
) -> Result<(), Box<dyn std::error::Error>> {
    let state = load_plot(path, rules)?;
    let result = InspectResult::from_state(path, &state);

    match format {
        "json" => {
            writeln!(out, "{}", serde_json::to_string_pretty(&result)?)?;
        }
        _ => {
            print_text_output(&result, out)?;
        }
    }

    Ok(())
}

fn print_text_output(result: &InspectResult, out: &mut dyn Write) -> std::io::Result<()> {
    writeln!(out, "Plot: {}", result.path)?;
    writeln!(out)?;
    writeln!(out, "Features: {}", result.feature_count)?;
    writeln!(out, "  {:<16} {}", DataType::TRACK_TAG, result.tracks)?;
    writeln!(out, "  {:<16} {}", DataType::POINT_TAG, result.points)?;
    writeln!(out, "  {:<16} {}", DataType::ANNOTATION_TAG, result.annotations)?;
    writeln!(out)?;

    match &result.time {
        Some(time) => {
            writeln!(out, "Time: {}", time.current)?;
            writeln!(out, "  period {} .. {}", time.start, time.end)?;
        }
        None => writeln!(out, "Time: (unset)")?,
    }
    match result.viewport {
        Some([west, south, east, north]) => {
            writeln!(out, "Viewport: W {west} S {south} E {east} N {north}")?;
        }
        None => writeln!(out, "Viewport: (unset)")?,
    }
    writeln!(out, "Selected: {}", result.selected)?;
    Ok(())
}
