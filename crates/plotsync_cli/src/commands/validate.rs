//! Validate command implementation.

use super::read_json;
use plotsync_core::Rules;
use plotsync_store::{from_plot, StoreError};
use std::io::Write;
use std::path::Path;

/// Runs the validate command.
///
/// Prints every violation and fails if there was at least one.
pub fn run(path: &Path, rules: &Rules, out: &mut dyn Write) -> Result<(), Box<dyn std::error::Error>> {
    let value = read_json(path)?;

    match from_plot(&value, rules) {
        Ok(state) => {
            writeln!(
                out,
                "{}: valid ({} features)",
                path.display(),
                state.feature_count()
            )?;
            Ok(())
        }
        Err(StoreError::Validation(report)) => {
            writeln!(out, "{}: {} problem(s)", path.display(), report.errors().len())?;
            for error in report.errors() {
                writeln!(out, "  - {error}")?;
            }
            Err(format!("{} is not a valid plot", path.display()).into())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    fn write(dir: &tempfile::TempDir, value: serde_json::Value) -> std::path::PathBuf {
        let path = dir.path().join("plot.json");
        fs::write(&path, value.to_string()).unwrap();
        path
    }

    #[test]
    fn valid_plot() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            json!({"type": "FeatureCollection", "features": [{
                "type": "Feature", "id": "p1",
                "geometry": {"type": "Point", "coordinates": [1.0, 2.0]},
                "properties": {"dataType": "reference-point"}
            }]}),
        );

        let mut out = Vec::new();
        run(&path, &Rules::default(), &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("valid (1 features)"));
    }

    #[test]
    fn lists_every_problem() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            json!({"type": "FeatureCollection", "features": [
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [1.0, 2.0]},
                 "properties": {"dataType": "submarine"}},
                {"type": "Feature", "geometry": null,
                 "properties": {"dataType": "metadata", "metadataType": "viewport",
                                "bounds": [0, 10, 5]}}
            ]}),
        );

        let mut out = Vec::new();
        assert!(run(&path, &Rules::default(), &mut out).is_err());
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("features[0]"));
        assert!(text.contains("features[1].properties"));
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut out = Vec::new();
        assert!(run(&dir.path().join("nope.json"), &Rules::default(), &mut out).is_err());
    }
}
