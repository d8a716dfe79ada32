//! GeoJSON plumbing shared by the vector readers and writers.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use evcs_core::EPSG_WEB_MERCATOR;
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject, JsonValue};

/// Named CRS member declaring EPSG:3857.
pub fn crs_member() -> JsonObject {
    let mut members = JsonObject::new();
    members.insert(
        "crs".into(),
        serde_json::json!({
            "type": "name",
            "properties": { "name": format!("urn:ogc:def:crs:EPSG::{EPSG_WEB_MERCATOR}") }
        }),
    );
    members
}

/// Reject collections that declare a CRS other than EPSG:3857.
///
/// Collections without a `crs` member are assumed to be in EPSG:3857.
pub fn check_crs(collection: &FeatureCollection) -> Result<()> {
    let Some(crs) = collection
        .foreign_members
        .as_ref()
        .and_then(|m| m.get("crs"))
    else {
        return Ok(());
    };
    let name = crs
        .pointer("/properties/name")
        .and_then(JsonValue::as_str)
        .unwrap_or_default();
    let code = EPSG_WEB_MERCATOR.to_string();
    let accepted = name
        .rsplit(|c| c == ':' || c == '/')
        .next()
        .is_some_and(|tail| tail == code || tail == "900913");
    if !accepted {
        bail!("expected EPSG:{EPSG_WEB_MERCATOR} coordinates, found CRS '{name}'");
    }
    Ok(())
}

pub fn read_feature_collection(path: &Path) -> Result<FeatureCollection> {
    let file = File::open(path)
        .with_context(|| format!("opening GeoJSON '{}'", path.display()))?;
    let geojson = GeoJson::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing GeoJSON '{}'", path.display()))?;
    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        GeoJson::Feature(feature) => FeatureCollection {
            bbox: None,
            features: vec![feature],
            foreign_members: None,
        },
        GeoJson::Geometry(_) => bail!(
            "'{}' holds a bare geometry; expected a FeatureCollection",
            path.display()
        ),
    };
    check_crs(&collection).with_context(|| format!("checking CRS of '{}'", path.display()))?;
    Ok(collection)
}

pub fn write_feature_collection(path: &Path, features: Vec<Feature>) -> Result<()> {
    let collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: Some(crs_member()),
    };
    let file = File::create(path)
        .with_context(|| format!("creating GeoJSON '{}'", path.display()))?;
    serde_json::to_writer(BufWriter::new(file), &collection)
        .with_context(|| format!("writing GeoJSON '{}'", path.display()))?;
    Ok(())
}

/// String property; numbers are rendered without a trailing `.0`.
pub fn prop_string(feature: &Feature, key: &str) -> Option<String> {
    match feature.property(key)? {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(match n.as_i64() {
            Some(i) => i.to_string(),
            None => n.to_string(),
        }),
        _ => None,
    }
}

/// Numeric property; numeric strings are accepted, `null` and empty
/// strings are `None`.
pub fn prop_f64(feature: &Feature, key: &str) -> Result<Option<f64>> {
    match feature.property(key) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::Number(n)) => Ok(n.as_f64()),
        Some(JsonValue::String(s)) if s.trim().is_empty() => Ok(None),
        Some(JsonValue::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("property '{key}' is not a number: '{s}'")),
        Some(other) => Err(anyhow!("property '{key}' is not a number: {other}")),
    }
}

/// List of ids from a JSON array or a delimited string such as
/// `"['1', '2']"` or `"1,2"`.
pub fn prop_id_list(feature: &Feature, key: &str) -> Vec<String> {
    let clean = |s: &str| s.trim().trim_matches(|c| c == '\'' || c == '"').trim().to_string();
    match feature.property(key) {
        Some(JsonValue::Array(items)) => items
            .iter()
            .filter_map(|v| match v {
                JsonValue::String(s) => Some(clean(s)),
                JsonValue::Number(n) => Some(n.as_i64().map_or_else(|| n.to_string(), |i| i.to_string())),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(JsonValue::String(s)) => s
            .trim()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .split(',')
            .map(clean)
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// Point coordinates of a feature.
pub fn point_xy(feature: &Feature) -> Result<(f64, f64)> {
    let geometry = feature
        .geometry
        .as_ref()
        .ok_or_else(|| anyhow!("feature has no geometry"))?;
    match &geometry.value {
        geojson::Value::Point(pos) if pos.len() >= 2 => Ok((pos[0], pos[1])),
        geojson::Value::MultiPoint(points) if points.len() == 1 && points[0].len() >= 2 => {
            Ok((points[0][0], points[0][1]))
        }
        _ => bail!("expected a Point geometry"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature(props: JsonValue) -> Feature {
        Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(geojson::Value::Point(vec![1.0, 2.0]))),
            id: None,
            properties: props.as_object().cloned(),
            foreign_members: None,
        }
    }

    #[test]
    fn id_lists_from_arrays_and_strings() {
        let f = feature(serde_json::json!({
            "a": ["1", 2],
            "b": "['10', '11']",
            "c": "",
        }));
        assert_eq!(prop_id_list(&f, "a"), vec!["1", "2"]);
        assert_eq!(prop_id_list(&f, "b"), vec!["10", "11"]);
        assert!(prop_id_list(&f, "c").is_empty());
        assert!(prop_id_list(&f, "missing").is_empty());
    }

    #[test]
    fn numbers_and_numeric_strings() {
        let f = feature(serde_json::json!({ "n": 4, "s": " 2.5 ", "bad": "x", "null": null }));
        assert_eq!(prop_f64(&f, "n").unwrap(), Some(4.0));
        assert_eq!(prop_f64(&f, "s").unwrap(), Some(2.5));
        assert_eq!(prop_f64(&f, "null").unwrap(), None);
        assert!(prop_f64(&f, "bad").is_err());
        assert_eq!(prop_string(&f, "n").as_deref(), Some("4"));
        assert_eq!(point_xy(&f).unwrap(), (1.0, 2.0));
    }

    #[test]
    fn foreign_crs_is_rejected() {
        let mut fc = FeatureCollection {
            bbox: None,
            features: vec![],
            foreign_members: Some(crs_member()),
        };
        assert!(check_crs(&fc).is_ok());
        let mut members = JsonObject::new();
        members.insert(
            "crs".into(),
            serde_json::json!({ "type": "name", "properties": { "name": "EPSG:4326" } }),
        );
        fc.foreign_members = Some(members);
        assert!(check_crs(&fc).is_err());
    }
}
