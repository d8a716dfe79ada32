//! # evcs-io: Pipeline File Formats
//!
//! Readers and writers for the artifacts that flow between stages:
//!
//! - Rasters: ESRI ASCII grid ([`raster`])
//! - POIs and road points: CSV or GeoJSON ([`pois`])
//! - Regions and the Stage 2 region plan: GeoJSON ([`regions`])
//! - Stage 3 outputs: step traces, station files, snapshots ([`exporters`])
//!
//! Vector inputs must be in EPSG:3857; GeoJSON collections that declare a
//! different CRS are rejected.

pub mod exporters;
pub mod features;
pub mod pois;
pub mod raster;
pub mod regions;

use std::path::Path;

use anyhow::{bail, Result};

pub use exporters::{
    merge_station_files, read_stations, write_region_outputs, write_snapshots,
    write_stations_csv, write_stations_geojson, write_steps_csv, RegionArtifacts, StepRow,
};
pub use pois::{read_pois, read_road_points, write_pois_csv, PoiRecord};
pub use raster::{parse_ascii_grid, read_ascii_grid, write_ascii_grid};
pub use regions::{read_regions, write_region_plan, REGION_ID_FIELD};

/// Vector file encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorFormat {
    Csv,
    GeoJson,
}

impl VectorFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(VectorFormat::Csv),
            "geojson" | "json" => Ok(VectorFormat::GeoJson),
            "gpkg" => bail!(
                "'{}' is a GeoPackage; convert it with `ogr2ogr -f GeoJSON`",
                path.display()
            ),
            _ => bail!(
                "cannot tell the format of '{}'; use .csv or .geojson",
                path.display()
            ),
        }
    }
}

/// Make a region or scenario id safe to use as a directory name.
pub fn sanitize_name(value: &str) -> String {
    let filtered: String = value
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    let trimmed = filtered.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_vector_formats() {
        assert_eq!(VectorFormat::from_path(Path::new("a.CSV")).unwrap(), VectorFormat::Csv);
        assert_eq!(
            VectorFormat::from_path(Path::new("a.geojson")).unwrap(),
            VectorFormat::GeoJson
        );
        assert!(VectorFormat::from_path(Path::new("a.gpkg")).is_err());
        assert!(VectorFormat::from_path(Path::new("a")).is_err());
    }

    #[test]
    fn sanitizes_names() {
        assert_eq!(sanitize_name("Atlanta CCD"), "Atlanta CCD");
        assert_eq!(sanitize_name("a/b\\c"), "a_b_c");
        assert_eq!(sanitize_name(".."), "unnamed");
        assert_eq!(sanitize_name(""), "unnamed");
    }
}
