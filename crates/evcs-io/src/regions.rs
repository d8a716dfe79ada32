//! Region polygons and the Stage 2 region plan.

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use evcs_algo::{CandidatePlan, PlanKind};
use evcs_core::{CandidateSource, Region};
use geo::{Geometry, MultiPolygon};
use geojson::{Feature, JsonObject, JsonValue};

use crate::features::{
    prop_f64, prop_id_list, prop_string, read_feature_collection, write_feature_collection,
};

/// Region id attribute of the census county subdivision layer.
pub const REGION_ID_FIELD: &str = "NAMELSAD20";

fn region_geometry(feature: &Feature) -> Result<MultiPolygon<f64>> {
    let geometry = feature
        .geometry
        .clone()
        .ok_or_else(|| anyhow!("feature has no geometry"))?;
    match Geometry::<f64>::try_from(geometry)? {
        Geometry::Polygon(p) => Ok(MultiPolygon::new(vec![p])),
        Geometry::MultiPolygon(mp) => Ok(mp),
        other => bail!("expected a Polygon or MultiPolygon, found {other:?}"),
    }
}

fn region_from_feature(feature: &Feature) -> Result<Region> {
    let id = prop_string(feature, REGION_ID_FIELD)
        .or_else(|| prop_string(feature, "id"))
        .ok_or_else(|| anyhow!("feature has no '{REGION_ID_FIELD}' attribute"))?;
    let mut region = Region::new(id, region_geometry(feature)?);
    region.lv2_count = prop_f64(feature, "lv2_count")?;
    region.dcfc_count = prop_f64(feature, "dcfc_count")?;
    region.total_supply = prop_f64(feature, "total_supply")?;
    region.max_sites = match prop_f64(feature, "p")? {
        Some(p) if p >= 0.0 && p.fract() == 0.0 => Some(p as usize),
        Some(p) => bail!("site budget 'p' must be a whole number (got {p})"),
        None => None,
    };
    region.initial_osm_ids = prop_id_list(feature, "osm_id_list");
    Ok(region)
}

/// Read region polygons from a GeoJSON FeatureCollection.
///
/// Recognised attributes: `NAMELSAD20`, `lv2_count`, `dcfc_count`,
/// `total_supply`, `p` and `osm_id_list`.
pub fn read_regions(path: &Path) -> Result<Vec<Region>> {
    let collection = read_feature_collection(path)?;
    let mut regions = Vec::with_capacity(collection.features.len());
    for (idx, feature) in collection.features.iter().enumerate() {
        let region = region_from_feature(feature)
            .with_context(|| format!("region feature {} of '{}'", idx, path.display()))?;
        regions.push(region);
    }
    Ok(regions)
}

fn opt_number(value: Option<f64>) -> JsonValue {
    value.map_or(JsonValue::Null, JsonValue::from)
}

/// Write the planned regions with their supply, budget and initial ids.
pub fn write_region_plan(path: &Path, plan: &CandidatePlan) -> Result<()> {
    let features = plan
        .regions
        .iter()
        .map(|planned| {
            let r = &planned.region;
            let mut props = JsonObject::new();
            props.insert(REGION_ID_FIELD.into(), r.id.clone().into());
            props.insert("lv2_count".into(), opt_number(r.lv2_count));
            props.insert("dcfc_count".into(), opt_number(r.dcfc_count));
            props.insert("total_supply".into(), opt_number(r.total_supply));
            props.insert("p".into(), r.max_sites.map_or(JsonValue::Null, JsonValue::from));
            props.insert("osm_id_list".into(), r.initial_osm_ids.clone().into());
            props.insert("initial_count".into(), planned.initial_count.into());
            props.insert("candidate_count".into(), planned.candidates.len().into());
            props.insert(
                "kind".into(),
                match planned.kind {
                    PlanKind::Mclp => "mclp",
                    PlanKind::Greedy => "greedy",
                }
                .into(),
            );
            props.insert(
                "source".into(),
                match planned.source {
                    CandidateSource::Poi => "poi",
                    CandidateSource::Road => "road",
                }
                .into(),
            );
            Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::from(&r.geometry))),
                id: None,
                properties: Some(props),
                foreign_members: None,
            }
        })
        .collect();
    write_feature_collection(path, features)
}
