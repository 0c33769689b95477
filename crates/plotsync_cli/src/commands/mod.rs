//! CLI command implementations.

pub mod apply;
pub mod inspect;
pub mod validate;

use plotsync_core::Rules;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Reads a plot file as raw JSON.
pub fn read_json(path: &Path) -> Result<Value, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path).map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    Ok(serde_json::from_str(&text).map_err(|e| format!("{}: {e}", path.display()))?)
}

/// Reads and decodes a plot file.
pub fn load_plot(
    path: &Path,
    rules: &Rules,
) -> Result<plotsync_core::EditorState, Box<dyn std::error::Error>> {
    let value = read_json(path)?;
    Ok(plotsync_store::from_plot(&value, rules)?)
}
