//! Plot files.
//!
//! A plot is stored as a GeoJSON FeatureCollection. The time, viewport and
//! selection slices travel inside it as features with a null geometry:
//!
//! ```json
//! {
//!   "type": "Feature",
//!   "geometry": null,
//!   "properties": { "dataType": "metadata", "metadataType": "viewport", "bounds": [..] }
//! }
//! ```
//!
//! Loading strips these out of the visible features; saving appends them
//! after the visible features.

use crate::error::StoreResult;
use plotsync_core::validate::{
    index, parse_feature, parse_selection_state, parse_time_state, parse_viewport_state,
};
use plotsync_core::{EditorState, FeatureCollection, Rules, ValidationReport};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fs;
use std::path::Path;

const METADATA: &str = "metadata";

fn metadata_feature<T: Serialize>(metadata_type: &str, value: &T) -> StoreResult<Value> {
    let mut properties = Map::new();
    properties.insert("dataType".into(), json!(METADATA));
    properties.insert("metadataType".into(), json!(metadata_type));
    if let Value::Object(fields) = serde_json::to_value(value)? {
        properties.extend(fields);
    }
    Ok(json!({
        "type": "Feature",
        "geometry": null,
        "properties": properties,
    }))
}

/// Encodes a state as a plot FeatureCollection.
pub fn to_plot(state: &EditorState) -> StoreResult<Value> {
    let mut features = match &state.feature_collection {
        Some(fc) => fc
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };
    if let Some(time) = &state.time_state {
        features.push(metadata_feature("time", time)?);
    }
    if let Some(viewport) = &state.viewport_state {
        features.push(metadata_feature("viewport", viewport)?);
    }
    if let Some(selection) = &state.selection_state {
        features.push(metadata_feature("selection", selection)?);
    }
    Ok(json!({
        "type": "FeatureCollection",
        "features": features,
    }))
}

/// Decodes a plot FeatureCollection, separating metadata from features.
///
/// Every violation in every feature is reported, with paths relative to
/// the file's `features` array.
pub fn from_plot(plot: &Value, rules: &Rules) -> StoreResult<EditorState> {
    let mut report = ValidationReport::new();
    if plot.get("type").and_then(Value::as_str) != Some("FeatureCollection") {
        report.at("type", "expected \"FeatureCollection\"");
    }
    let Some(items) = plot.get("features").and_then(Value::as_array) else {
        report.at("features", "expected an array");
        return Err(report.into());
    };

    let mut state = EditorState::default();
    let mut visible = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let path = index("features", i);
        let properties = item.get("properties");
        let is_metadata =
            properties.and_then(|p| p.get("dataType")).and_then(Value::as_str) == Some(METADATA);

        if !is_metadata {
            match parse_feature(item) {
                Ok(feature) => visible.push(feature),
                Err(e) => report.merge_prefixed(&path, e),
            }
            continue;
        }

        let properties = properties.unwrap_or(&Value::Null);
        let properties_path = format!("{path}.properties");
        match properties.get("metadataType").and_then(Value::as_str) {
            Some("time") => match parse_time_state(properties, rules) {
                Ok(time) => state.time_state = Some(time),
                Err(e) => report.merge_prefixed(&properties_path, e),
            },
            Some("viewport") => match parse_viewport_state(properties) {
                Ok(viewport) => state.viewport_state = Some(viewport),
                Err(e) => report.merge_prefixed(&properties_path, e),
            },
            Some("selection") => match parse_selection_state(properties) {
                Ok(selection) => state.selection_state = Some(selection),
                Err(e) => report.merge_prefixed(&properties_path, e),
            },
            Some(other) => report.at(
                &format!("{properties_path}.metadataType"),
                format!("unknown metadata type '{other}'"),
            ),
            None => report.at(&format!("{properties_path}.metadataType"), "required"),
        }
    }

    state.feature_collection = Some(FeatureCollection::new(visible));
    Ok(report.into_result(state)?)
}

/// Reads a plot file.
pub fn read_plot(path: impl AsRef<Path>, rules: &Rules) -> StoreResult<EditorState> {
    let text = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&text)?;
    from_plot(&value, rules)
}

/// Writes a plot file, pretty-printed.
pub fn write_plot(path: impl AsRef<Path>, state: &EditorState) -> StoreResult<()> {
    let text = serde_json::to_string_pretty(&to_plot(state)?)?;
    fs::write(path, text)?;
    Ok(())
}
