use std::{fs, path::Path};

use serde_json::json;
use tracing::warn;

/// Writes the pipeline's position for external progress displays. Failures are
/// logged and otherwise ignored.
pub fn write_progress(path: &Path, current: usize, total: usize, phase: &str, status: &str) {
    let json = json!({
        "current": current,
        "total": total,
        "phase": phase,
        "status": status,
    });
    if let Err(e) = fs::write(path, json.to_string()) {
        warn!("Could not write progress to {}: {}", path.display(), e);
    }
}
