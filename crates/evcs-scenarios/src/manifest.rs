use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::Path;

use crate::spec::ResolvedScenario;

/// Resolved scenarios as written by `evcs scenarios expand`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioManifest {
    pub created_at: DateTime<Utc>,
    pub source: Option<String>,
    pub scenarios: Vec<ResolvedScenario>,
}

impl ScenarioManifest {
    pub fn new(source: Option<&Path>, scenarios: Vec<ResolvedScenario>) -> Self {
        Self {
            created_at: Utc::now(),
            source: source.map(|p| p.display().to_string()),
            scenarios,
        }
    }
}

pub fn write_manifest(path: &Path, manifest: &ScenarioManifest) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating manifest directory '{}'", parent.display()))?;
    }
    let file = File::create(path)
        .with_context(|| format!("creating scenario manifest '{}'", path.display()))?;
    serde_json::to_writer_pretty(file, manifest)
        .with_context(|| format!("writing scenario manifest '{}'", path.display()))?;
    Ok(())
}

pub fn load_manifest(path: &Path) -> Result<ScenarioManifest> {
    let file = File::open(path)
        .with_context(|| format!("opening scenario manifest '{}'", path.display()))?;
    serde_json::from_reader(file)
        .with_context(|| format!("parsing scenario manifest '{}'", path.display()))
}
