//! Per-region optimization outputs.
//!
//! ```text
//! out_dir/
//!   <region>/
//!     <region>.csv          # greedy step trace
//!     <region>.geojson      # selected stations (EPSG:3857)
//!     <region>_stations.csv
//!     supply/supply_<n>.ssv # optional, supply over every candidate
//!     Ai/Ai_<n>.ssv         # optional, accessibility per demand point
//! ```

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use evcs_algo::{RegionOutcome, SelectedStation, StepSnapshot};
use geojson::{Feature, JsonObject};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::features::{point_xy, prop_f64, prop_string, read_feature_collection, write_feature_collection};
use crate::sanitize_name;

/// One row of the step trace CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRow {
    #[serde(rename = "Step")]
    pub step: usize,
    #[serde(rename = "Selected_Site")]
    pub selected_site: usize,
    pub osm_id: String,
    #[serde(rename = "A_hat")]
    pub a_hat: f64,
    #[serde(rename = "min_Ai")]
    pub min_ai: f64,
    #[serde(rename = "max_Ai")]
    pub max_ai: f64,
    #[serde(rename = "MD")]
    pub md: f64,
    #[serde(rename = "MAD")]
    pub mad: f64,
    #[serde(rename = "CV")]
    pub cv: f64,
    #[serde(rename = "Gini")]
    pub gini: f64,
    #[serde(rename = "Coverage")]
    pub coverage: f64,
}

pub fn write_steps_csv(path: &Path, outcome: &RegionOutcome) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating step trace '{}'", path.display()))?;
    for s in &outcome.selection.steps {
        writer.serialize(StepRow {
            step: s.step,
            selected_site: s.selected_site,
            osm_id: outcome.osm_id(s.selected_site).to_string(),
            a_hat: s.a_hat,
            min_ai: s.min_ai,
            max_ai: s.max_ai,
            md: s.md,
            mad: s.mad,
            cv: s.cv,
            gini: s.gini,
            coverage: s.coverage,
        })?;
    }
    writer
        .flush()
        .with_context(|| format!("writing step trace '{}'", path.display()))?;
    Ok(())
}

fn station_feature(region_id: &str, station: &SelectedStation) -> Feature {
    let mut props = JsonObject::new();
    props.insert("osm_id".into(), station.osm_id.clone().into());
    props.insert("fclass".into(), station.fclass.clone().into());
    props.insert("supply".into(), station.supply.into());
    props.insert("ports".into(), station.ports.into());
    props.insert("region".into(), region_id.into());
    Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geojson::Value::Point(vec![
            station.x, station.y,
        ]))),
        id: None,
        properties: Some(props),
        foreign_members: None,
    }
}

pub fn write_stations_geojson(path: &Path, region_id: &str, stations: &[SelectedStation]) -> Result<()> {
    let features = stations
        .iter()
        .map(|s| station_feature(region_id, s))
        .collect();
    write_feature_collection(path, features)
}

#[derive(Debug, Serialize)]
struct StationRow<'a> {
    region: &'a str,
    osm_id: &'a str,
    fclass: &'a str,
    x: f64,
    y: f64,
    supply: f64,
    ports: u32,
}

pub fn write_stations_csv(path: &Path, region_id: &str, stations: &[SelectedStation]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating station CSV '{}'", path.display()))?;
    for s in stations {
        writer.serialize(StationRow {
            region: region_id,
            osm_id: &s.osm_id,
            fclass: &s.fclass,
            x: s.x,
            y: s.y,
            supply: s.supply,
            ports: s.ports,
        })?;
    }
    writer
        .flush()
        .with_context(|| format!("writing station CSV '{}'", path.display()))?;
    Ok(())
}

fn write_ssv(path: &Path, values: &[f64], precision: Option<usize>) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating '{}'", path.display()))?;
    let mut w = BufWriter::new(file);
    for v in values {
        match precision {
            Some(p) => writeln!(w, "{:.*}", p, v)?,
            None => writeln!(w, "{:e}", v)?,
        }
    }
    w.flush().with_context(|| format!("writing '{}'", path.display()))?;
    Ok(())
}

/// Write `supply/supply_<n>.ssv` and `Ai/Ai_<n>.ssv` for every snapshot.
pub fn write_snapshots(region_dir: &Path, snapshots: &[StepSnapshot]) -> Result<()> {
    if snapshots.is_empty() {
        return Ok(());
    }
    let supply_dir = region_dir.join("supply");
    let ai_dir = region_dir.join("Ai");
    fs::create_dir_all(&supply_dir)
        .with_context(|| format!("creating '{}'", supply_dir.display()))?;
    fs::create_dir_all(&ai_dir).with_context(|| format!("creating '{}'", ai_dir.display()))?;
    for snap in snapshots {
        write_ssv(
            &supply_dir.join(format!("supply_{}.ssv", snap.step)),
            &snap.supply,
            Some(4),
        )?;
        write_ssv(&ai_dir.join(format!("Ai_{}.ssv", snap.step)), &snap.ai, None)?;
    }
    Ok(())
}

/// Paths written for one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionArtifacts {
    pub region_dir: PathBuf,
    pub steps_csv: PathBuf,
    pub stations_geojson: PathBuf,
    pub stations_csv: PathBuf,
}

/// Write every output of one region under `out_dir/<region>/`.
pub fn write_region_outputs(out_dir: &Path, outcome: &RegionOutcome) -> Result<RegionArtifacts> {
    let name = sanitize_name(&outcome.region_id);
    let region_dir = out_dir.join(&name);
    fs::create_dir_all(&region_dir)
        .with_context(|| format!("creating region directory '{}'", region_dir.display()))?;

    let stations = outcome.stations();
    let artifacts = RegionArtifacts {
        steps_csv: region_dir.join(format!("{name}.csv")),
        stations_geojson: region_dir.join(format!("{name}.geojson")),
        stations_csv: region_dir.join(format!("{name}_stations.csv")),
        region_dir: region_dir.clone(),
    };
    write_steps_csv(&artifacts.steps_csv, outcome)?;
    write_stations_geojson(&artifacts.stations_geojson, &outcome.region_id, &stations)?;
    write_stations_csv(&artifacts.stations_csv, &outcome.region_id, &stations)?;
    write_snapshots(&region_dir, &outcome.selection.snapshots)?;
    Ok(artifacts)
}

fn collect_station_files(dir: &Path, depth: usize, files: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("listing '{}'", dir.display()))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .collect();
    entries.sort();
    for path in entries {
        if path.is_dir() {
            collect_station_files(&path, depth + 1, files)?;
            continue;
        }
        let is_geojson = path.extension().is_some_and(|e| e == "geojson");
        // station files are named after their region directory
        let named_after_parent = path.file_stem().zip(dir.file_name()).is_some_and(|(s, d)| s == d);
        if depth > 0 && is_geojson && named_after_parent {
            files.push(path);
        }
    }
    Ok(())
}

/// Merge every per-region station GeoJSON under `dir` into `output`.
///
/// Unreadable files are logged and skipped. Returns the number of
/// stations written.
pub fn merge_station_files(dir: &Path, output: &Path) -> Result<usize> {
    let mut files = Vec::new();
    collect_station_files(dir, 0, &mut files)?;

    let mut features: Vec<Feature> = Vec::new();
    for path in &files {
        match read_feature_collection(path) {
            Ok(fc) => features.extend(fc.features),
            Err(err) => error!("Error reading {}: {err:#}", path.display()),
        }
    }
    let count = features.len();
    write_feature_collection(output, features)?;
    info!(
        files = files.len(),
        stations = count,
        "merged station files into {}",
        output.display()
    );
    Ok(count)
}

/// Station rows of a (merged) station GeoJSON.
pub fn read_stations(path: &Path) -> Result<Vec<(String, SelectedStation)>> {
    let fc = read_feature_collection(path)?;
    fc.features
        .iter()
        .map(|f| -> Result<(String, SelectedStation)> {
            let (x, y) = point_xy(f)?;
            let ports = prop_f64(f, "ports")?.unwrap_or(0.0);
            Ok((
                prop_string(f, "region").unwrap_or_default(),
                SelectedStation {
                    osm_id: prop_string(f, "osm_id").unwrap_or_default(),
                    fclass: prop_string(f, "fclass").unwrap_or_default(),
                    x,
                    y,
                    supply: prop_f64(f, "supply")?.unwrap_or(0.0),
                    ports: ports.max(0.0) as u32,
                    source: Default::default(),
                },
            ))
        })
        .collect()
}
