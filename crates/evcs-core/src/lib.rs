//! # evcs-core: Siting Data Model
//!
//! Shared types for the EV charging station siting pipeline:
//!
//! - [`DemandPoint`]: a positive demand-raster cell, the unit over which
//!   accessibility is measured
//! - [`Poi`]: a candidate (or existing) charging site
//! - [`Region`]: a planning polygon with its port budget and site budget
//! - [`ChargerType`], [`SpatialCategory`], [`PortBounds`]: scenario axes
//! - [`raster::Raster`]: demand and capacity maps
//!
//! All coordinates are planar metres in EPSG:3857.

pub mod error;
pub mod geometry;
pub mod raster;
pub mod units;

use std::fmt;
use std::str::FromStr;

use geo::{Coord, MultiPolygon};
use serde::{Deserialize, Serialize};

pub use error::{EvcsError, EvcsResult};
pub use raster::Raster;
pub use units::Meters;

/// The projected CRS every input must share.
pub const EPSG_WEB_MERCATOR: u32 = 3857;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargerType {
    /// Level-2 AC charger
    Lv2,
    /// DC fast charger
    Dcfc,
}

impl ChargerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChargerType::Lv2 => "lv2",
            ChargerType::Dcfc => "dcfc",
        }
    }

    /// Region attribute holding the projected port count for this charger.
    pub fn count_column(&self) -> &'static str {
        match self {
            ChargerType::Lv2 => "lv2_count",
            ChargerType::Dcfc => "dcfc_count",
        }
    }
}

impl fmt::Display for ChargerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChargerType {
    type Err = EvcsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lv2" | "level2" | "l2" => Ok(ChargerType::Lv2),
            "dcfc" | "dc" => Ok(ChargerType::Dcfc),
            other => Err(EvcsError::Parse(format!(
                "unknown charger type '{other}'; use 'lv2' or 'dcfc'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpatialCategory {
    Urban,
    Suburban,
    Rural,
    Highway,
}

impl SpatialCategory {
    pub const ALL: [SpatialCategory; 4] = [
        SpatialCategory::Urban,
        SpatialCategory::Suburban,
        SpatialCategory::Rural,
        SpatialCategory::Highway,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SpatialCategory::Urban => "urban",
            SpatialCategory::Suburban => "suburban",
            SpatialCategory::Rural => "rural",
            SpatialCategory::Highway => "highway",
        }
    }

    /// Default 2SFCA capture range.
    pub fn capture_range(&self) -> Meters {
        match self {
            SpatialCategory::Urban => Meters(3000.0),
            SpatialCategory::Suburban | SpatialCategory::Rural | SpatialCategory::Highway => {
                Meters(4000.0)
            }
        }
    }

    /// Default Gaussian decay bandwidth.
    pub fn bandwidth(&self) -> Meters {
        match self {
            SpatialCategory::Urban => Meters(1000.0),
            SpatialCategory::Suburban | SpatialCategory::Rural | SpatialCategory::Highway => {
                Meters(1500.0)
            }
        }
    }

    /// Default per-site port bounds.
    pub fn port_bounds(&self) -> PortBounds {
        match self {
            SpatialCategory::Urban => PortBounds::new(2.0, Some(25.0)),
            _ => PortBounds::default(),
        }
    }
}

impl fmt::Display for SpatialCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpatialCategory {
    type Err = EvcsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "urban" => Ok(SpatialCategory::Urban),
            "suburban" => Ok(SpatialCategory::Suburban),
            "rural" => Ok(SpatialCategory::Rural),
            "highway" => Ok(SpatialCategory::Highway),
            other => Err(EvcsError::Parse(format!(
                "unknown spatial category '{other}'"
            ))),
        }
    }
}

/// Per-site lower/upper limits on allocated ports.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortBounds {
    pub min: f64,
    #[serde(default)]
    pub max: Option<f64>,
}

impl Default for PortBounds {
    fn default() -> Self {
        Self { min: 1.0, max: None }
    }
}

impl PortBounds {
    pub fn new(min: f64, max: Option<f64>) -> Self {
        Self { min, max }
    }

    pub fn validate(&self) -> EvcsResult<()> {
        if !(self.min.is_finite() && self.min >= 0.0) {
            return Err(EvcsError::Validation(format!(
                "minimum ports per site must be a non-negative number (got {})",
                self.min
            )));
        }
        if let Some(max) = self.max {
            if !max.is_finite() || max < self.min {
                return Err(EvcsError::Validation(format!(
                    "maximum ports per site ({max}) must be >= minimum ({})",
                    self.min
                )));
            }
        }
        Ok(())
    }

    /// Whether `sites` sites can share exactly `total` ports.
    pub fn admits(&self, sites: usize, total: f64) -> bool {
        let n = sites as f64;
        let lower_ok = n * self.min <= total + 1e-9;
        let upper_ok = self.max.map_or(true, |max| n * max >= total - 1e-9);
        sites > 0 && lower_ok && upper_ok
    }

    pub fn contains(&self, value: f64, tol: f64) -> bool {
        value >= self.min - tol && self.max.map_or(true, |max| value <= max + tol)
    }
}

/// One positive cell of the demand map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DemandPoint {
    pub x: f64,
    pub y: f64,
    pub demand: f64,
}

impl DemandPoint {
    pub fn coord(&self) -> Coord<f64> {
        Coord { x: self.x, y: self.y }
    }
}

/// Where a candidate site came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSource {
    #[default]
    Poi,
    /// Derived from the road network (DCFC fallback)
    Road,
}

/// A point of interest that can host (or already hosts) a station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poi {
    pub osm_id: String,
    pub fclass: String,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub lv2_count: Option<f64>,
    #[serde(default)]
    pub dcfc_count: Option<f64>,
    #[serde(default)]
    pub source: CandidateSource,
}

impl Poi {
    pub fn new(osm_id: impl Into<String>, fclass: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            osm_id: osm_id.into(),
            fclass: fclass.into(),
            x,
            y,
            lv2_count: None,
            dcfc_count: None,
            source: CandidateSource::Poi,
        }
    }

    pub fn coord(&self) -> Coord<f64> {
        Coord { x: self.x, y: self.y }
    }

    /// Existing port count for the given charger type.
    pub fn ports_for(&self, charger: ChargerType) -> Option<f64> {
        match charger {
            ChargerType::Lv2 => self.lv2_count,
            ChargerType::Dcfc => self.dcfc_count,
        }
    }
}

/// A planning region (census place / county subdivision).
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    /// `NAMELSAD20` in the source data
    pub id: String,
    pub geometry: MultiPolygon<f64>,
    /// Projected LV2 ports for the region, if known
    pub lv2_count: Option<f64>,
    /// Projected DCFC ports for the region, if known
    pub dcfc_count: Option<f64>,
    /// Ports to distribute, once resolved for a charger type
    pub total_supply: Option<f64>,
    /// Site budget `p`
    pub max_sites: Option<usize>,
    /// Existing stations kept as the greedy starting set
    pub initial_osm_ids: Vec<String>,
}

impl Region {
    pub fn new(id: impl Into<String>, geometry: MultiPolygon<f64>) -> Self {
        Self {
            id: id.into(),
            geometry,
            lv2_count: None,
            dcfc_count: None,
            total_supply: None,
            max_sites: None,
            initial_osm_ids: Vec::new(),
        }
    }

    pub fn projected_ports(&self, charger: ChargerType) -> Option<f64> {
        match charger {
            ChargerType::Lv2 => self.lv2_count,
            ChargerType::Dcfc => self.dcfc_count,
        }
    }

    pub fn contains(&self, point: Coord<f64>) -> bool {
        geometry::contains(&self.geometry, point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_defaults_match_catchment_table() {
        assert_eq!(SpatialCategory::Urban.capture_range(), Meters(3000.0));
        assert_eq!(SpatialCategory::Urban.bandwidth(), Meters(1000.0));
        assert_eq!(SpatialCategory::Rural.capture_range(), Meters(4000.0));
        assert_eq!(SpatialCategory::Suburban.bandwidth(), Meters(1500.0));
        assert_eq!(
            SpatialCategory::Urban.port_bounds(),
            PortBounds::new(2.0, Some(25.0))
        );
        assert_eq!(SpatialCategory::Rural.port_bounds(), PortBounds::default());
    }

    #[test]
    fn parses_charger_and_category() {
        assert_eq!("DCFC".parse::<ChargerType>().unwrap(), ChargerType::Dcfc);
        assert_eq!("lv2".parse::<ChargerType>().unwrap(), ChargerType::Lv2);
        assert!("ac".parse::<ChargerType>().is_err());
        assert_eq!(
            "Highway".parse::<SpatialCategory>().unwrap(),
            SpatialCategory::Highway
        );
    }

    #[test]
    fn port_bounds_feasibility() {
        let urban = PortBounds::new(2.0, Some(25.0));
        assert!(urban.admits(3, 30.0));
        assert!(!urban.admits(3, 5.0));
        assert!(!urban.admits(3, 80.0));
        assert!(!urban.admits(0, 10.0));
        assert!(PortBounds::default().admits(10, 10.0));
    }

    #[test]
    fn port_bounds_validation() {
        assert!(PortBounds::new(2.0, Some(1.0)).validate().is_err());
        assert!(PortBounds::new(-1.0, None).validate().is_err());
        assert!(PortBounds::new(1.0, None).validate().is_ok());
    }
}
