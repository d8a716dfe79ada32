//! Run manifests: one JSON record per CLI invocation.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub run_id: String,
    pub command: String,
    pub version: String,
    pub timestamp: String,
    pub status: String,
    pub duration_ms: Option<u128>,
    pub outputs: Vec<String>,
    pub params: Vec<Param>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub value: String,
}

/// Write `run-<uuid>.json` into `dir` and return its path.
pub fn record_manifest(
    dir: &Path,
    command: &str,
    params: &[(&str, &str)],
    outputs: &[String],
    status: &str,
    duration_ms: Option<u128>,
) -> Result<std::path::PathBuf> {
    let run_id = Uuid::new_v4().to_string();
    fs::create_dir_all(dir)
        .with_context(|| format!("creating manifest directory '{}'", dir.display()))?;
    let manifest = ManifestEntry {
        run_id: run_id.clone(),
        command: command.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
        status: status.to_string(),
        duration_ms,
        outputs: outputs.to_vec(),
        params: params
            .iter()
            .map(|(k, v)| Param {
                name: k.to_string(),
                value: v.to_string(),
            })
            .collect(),
    };
    let json = serde_json::to_string_pretty(&manifest)?;
    let path = dir.join(format!("run-{}.json", run_id));
    fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

pub fn read_manifest(path: &Path) -> Result<ManifestEntry> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("reading run manifest '{}'", path.display()))?;
    let manifest = serde_json::from_str(&json)
        .with_context(|| format!("parsing run manifest '{}'", path.display()))?;
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_reads_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = record_manifest(
            dir.path(),
            "optimize",
            &[("scenario", "urban-lv2")],
            &["out/Alpha CCD".to_string()],
            "success",
            Some(12),
        )
        .unwrap();
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("run-"));
        let entry = read_manifest(&path).unwrap();
        assert_eq!(entry.command, "optimize");
        assert_eq!(entry.params[0].value, "urban-lv2");
        assert_eq!(entry.status, "success");
    }
}
