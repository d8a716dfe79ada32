//! POI and road-point readers.

use std::path::Path;

use anyhow::{bail, Context, Result};
use evcs_core::{CandidateSource, Poi};
use serde::{Deserialize, Serialize};

use crate::features::{point_xy, prop_f64, prop_string, read_feature_collection};
use crate::VectorFormat;

/// One row of a POI CSV file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoiRecord {
    pub osm_id: String,
    pub fclass: String,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub lv2_count: Option<f64>,
    #[serde(default)]
    pub dcfc_count: Option<f64>,
    #[serde(default)]
    pub source: Option<CandidateSource>,
}

impl From<PoiRecord> for Poi {
    fn from(r: PoiRecord) -> Self {
        Poi {
            osm_id: r.osm_id,
            fclass: r.fclass,
            x: r.x,
            y: r.y,
            lv2_count: r.lv2_count,
            dcfc_count: r.dcfc_count,
            source: r.source.unwrap_or_default(),
        }
    }
}

impl From<&Poi> for PoiRecord {
    fn from(p: &Poi) -> Self {
        PoiRecord {
            osm_id: p.osm_id.clone(),
            fclass: p.fclass.clone(),
            x: p.x,
            y: p.y,
            lv2_count: p.lv2_count,
            dcfc_count: p.dcfc_count,
            source: Some(p.source),
        }
    }
}

fn read_pois_csv(path: &Path) -> Result<Vec<Poi>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("opening POI CSV '{}'", path.display()))?;
    let mut pois = Vec::new();
    for (idx, row) in reader.deserialize::<PoiRecord>().enumerate() {
        let record =
            row.with_context(|| format!("parsing POI row {} of '{}'", idx + 1, path.display()))?;
        pois.push(record.into());
    }
    Ok(pois)
}

fn read_pois_geojson(path: &Path) -> Result<Vec<Poi>> {
    let collection = read_feature_collection(path)?;
    let mut pois = Vec::with_capacity(collection.features.len());
    for (idx, feature) in collection.features.iter().enumerate() {
        let ctx = || format!("POI feature {} of '{}'", idx, path.display());
        let (x, y) = point_xy(feature).with_context(ctx)?;
        let osm_id = prop_string(feature, "osm_id")
            .with_context(|| format!("{} has no osm_id", ctx()))?;
        let fclass = prop_string(feature, "fclass").unwrap_or_default();
        let mut poi = Poi::new(osm_id, fclass, x, y);
        poi.lv2_count = prop_f64(feature, "lv2_count").with_context(ctx)?;
        poi.dcfc_count = prop_f64(feature, "dcfc_count").with_context(ctx)?;
        if prop_string(feature, "source").as_deref() == Some("road") {
            poi.source = CandidateSource::Road;
        }
        pois.push(poi);
    }
    Ok(pois)
}

/// Read POIs from CSV (`osm_id,fclass,x,y[,lv2_count,dcfc_count]`) or
/// GeoJSON points.
pub fn read_pois(path: &Path) -> Result<Vec<Poi>> {
    let pois = match VectorFormat::from_path(path)? {
        VectorFormat::Csv => read_pois_csv(path)?,
        VectorFormat::GeoJson => read_pois_geojson(path)?,
    };
    if let Some(bad) = pois.iter().find(|p| !(p.x.is_finite() && p.y.is_finite())) {
        bail!("POI '{}' in '{}' has non-finite coordinates", bad.osm_id, path.display());
    }
    Ok(pois)
}

#[derive(Debug, Deserialize)]
struct RoadRecord {
    #[serde(default)]
    id: Option<String>,
    x: f64,
    y: f64,
}

fn road_candidate(idx: usize, id: Option<String>, x: f64, y: f64) -> Poi {
    let mut poi = Poi::new(id.unwrap_or_else(|| format!("road_{idx}")), "road", x, y);
    poi.source = CandidateSource::Road;
    poi
}

/// Read road-network points as road-sourced candidates.
///
/// Points without an id are named `road_<index>`.
pub fn read_road_points(path: &Path) -> Result<Vec<Poi>> {
    match VectorFormat::from_path(path)? {
        VectorFormat::Csv => {
            let mut reader = csv::ReaderBuilder::new()
                .trim(csv::Trim::All)
                .from_path(path)
                .with_context(|| format!("opening road CSV '{}'", path.display()))?;
            let mut roads = Vec::new();
            for (idx, row) in reader.deserialize::<RoadRecord>().enumerate() {
                let r = row
                    .with_context(|| format!("parsing road row {} of '{}'", idx + 1, path.display()))?;
                roads.push(road_candidate(idx, r.id, r.x, r.y));
            }
            Ok(roads)
        }
        VectorFormat::GeoJson => {
            let collection = read_feature_collection(path)?;
            collection
                .features
                .iter()
                .enumerate()
                .map(|(idx, f)| -> Result<Poi> {
                    let (x, y) = point_xy(f)
                        .with_context(|| format!("road feature {} of '{}'", idx, path.display()))?;
                    Ok(road_candidate(idx, prop_string(f, "id"), x, y))
                })
                .collect()
        }
    }
}

/// Write candidates as CSV with a `source` column.
pub fn write_pois_csv(path: &Path, pois: &[Poi]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating POI CSV '{}'", path.display()))?;
    for poi in pois {
        writer.serialize(PoiRecord::from(poi))?;
    }
    writer
        .flush()
        .with_context(|| format!("writing POI CSV '{}'", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn reads_csv_with_optional_counts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pois.csv");
        fs::write(
            &path,
            "osm_id,fclass,x,y,lv2_count,dcfc_count\n1,supermarket,10,20,2,\n2,hotel,30,40,,\n",
        )
        .unwrap();
        let pois = read_pois(&path).unwrap();
        assert_eq!(pois.len(), 2);
        assert_eq!(pois[0].lv2_count, Some(2.0));
        assert_eq!(pois[0].dcfc_count, None);
        assert_eq!(pois[1].source, CandidateSource::Poi);
    }

    #[test]
    fn reads_minimal_csv_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pois.csv");
        fs::write(&path, "osm_id,fclass,x,y\n7,fuel,1.5,2.5\n").unwrap();
        let pois = read_pois(&path).unwrap();
        assert_eq!(pois[0].osm_id, "7");
        assert_eq!(pois[0].lv2_count, None);
    }

    #[test]
    fn reads_geojson_points() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pois.geojson");
        fs::write(
            &path,
            r#"{"type":"FeatureCollection","features":[
                {"type":"Feature","geometry":{"type":"Point","coordinates":[5.0,6.0]},
                 "properties":{"osm_id":123,"fclass":"fuel","dcfc_count":"4"}}]}"#,
        )
        .unwrap();
        let pois = read_pois(&path).unwrap();
        assert_eq!(pois[0].osm_id, "123");
        assert_eq!(pois[0].dcfc_count, Some(4.0));
        assert_eq!((pois[0].x, pois[0].y), (5.0, 6.0));
    }

    #[test]
    fn road_points_get_generated_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roads.csv");
        fs::write(&path, "x,y\n1,2\n3,4\n").unwrap();
        let roads = read_road_points(&path).unwrap();
        assert_eq!(roads[1].osm_id, "road_1");
        assert_eq!(roads[1].source, CandidateSource::Road);
    }

    #[test]
    fn written_candidates_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("candidates.csv");
        let mut road = Poi::new("road_0", "road", 1.0, 2.0);
        road.source = CandidateSource::Road;
        write_pois_csv(&path, &[Poi::new("1", "hotel", 0.0, 0.0), road]).unwrap();
        let back = read_pois(&path).unwrap();
        assert_eq!(back[1].source, CandidateSource::Road);
        assert_eq!(back[0].fclass, "hotel");
    }
}
