use evcs_cli::manifest::record_manifest;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// Record a run manifest in `dir`; failures to record are only logged.
pub fn record_run_timed(
    dir: &Path,
    command: &str,
    params: &[(&str, &str)],
    outputs: &[String],
    start: Instant,
    result: &anyhow::Result<()>,
) {
    let duration_ms = start.elapsed().as_millis();
    let status = if result.is_ok() { "success" } else { "failure" };
    match record_manifest(dir, command, params, outputs, status, Some(duration_ms)) {
        Ok(path) => info!("Recorded run manifest {}", path.display()),
        Err(err) => warn!("Failed to record run manifest: {err:#}"),
    }
}

/// Directory that receives the manifest of a run writing `out`.
pub fn manifest_dir(out: &Path) -> &Path {
    match out.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}
