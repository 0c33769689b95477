//! Apply command implementation.

use super::load_plot;
use plotsync_core::{DocumentId, Rules};
use plotsync_protocol::{ErrorCode, RequestEnvelope, ResponseEnvelope};
use plotsync_store::{write_plot, CommandService, StateStore, StoreConfig};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Summary of an apply run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ApplySummary {
    /// Requests read.
    pub requests: usize,
    /// Requests that failed.
    pub failed: usize,
}

/// Runs the apply command.
///
/// The plot is opened as the active document, so envelopes without a
/// `documentId` act on it. One response is printed per request line.
pub fn run(
    plot: &Path,
    requests: &Path,
    out_path: &Path,
    rules: &Rules,
    out: &mut dyn Write,
) -> Result<ApplySummary, Box<dyn std::error::Error>> {
    let state = load_plot(plot, rules)?;
    let document = DocumentId::new(
        plot.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "plot".to_string()),
    );

    let store = Arc::new(StateStore::with_config(
        StoreConfig::new().with_time_policy(rules.time_policy),
    ));
    store.load_document(&document, state)?;
    store.set_active_document(&document)?;
    let service = CommandService::new(store.clone());

    let text = fs::read_to_string(requests)
        .map_err(|e| format!("cannot read {}: {e}", requests.display()))?;
    let mut summary = ApplySummary::default();
    for (n, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        summary.requests += 1;
        let response = match serde_json::from_str::<RequestEnvelope>(line) {
            Ok(envelope) => service.handle(&envelope),
            Err(e) => ResponseEnvelope::error(
                ErrorCode::Malformed,
                format!("line {}: {e}", n + 1),
            ),
        };
        if !response.is_success() {
            summary.failed += 1;
            debug!(line = n + 1, "request failed");
        }
        writeln!(out, "{}", serde_json::to_string(&response)?)?;
    }

    let result = store.snapshot(&document)?;
    write_plot(out_path, &result)?;
    info!(
        requests = summary.requests,
        failed = summary.failed,
        out = %out_path.display(),
        "plot saved"
    );
    Ok(summary)
}
