use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const DEMAND: &str = "ncols 10
nrows 10
xllcorner 0
yllcorner 0
cellsize 500
1 1 1 1 1 1 1 1 1 1
1 1 1 1 1 1 1 1 1 1
1 1 1 1 1 1 1 1 1 1
1 1 1 1 1 1 1 1 1 1
1 1 1 1 1 1 1 1 1 1
1 1 1 1 1 1 1 1 1 1
1 1 1 1 1 1 1 1 1 1
1 1 1 1 1 1 1 1 1 1
1 1 1 1 1 1 1 1 1 1
1 1 1 1 1 1 1 1 1 1
";

const REGIONS: &str = r#"{"type":"FeatureCollection","features":[
  {"type":"Feature",
   "geometry":{"type":"Polygon","coordinates":[[[0,0],[2500,0],[2500,5000],[0,5000],[0,0]]]},
   "properties":{"NAMELSAD20":"East CCD","lv2_count":8}},
  {"type":"Feature",
   "geometry":{"type":"Polygon","coordinates":[[[2500,0],[5000,0],[5000,5000],[2500,5000],[2500,0]]]},
   "properties":{"NAMELSAD20":"West CCD","lv2_count":3}}
]}"#;

const POIS: &str = "osm_id,fclass,x,y,lv2_count,dcfc_count
1,supermarket,500,2500,,
2,hotel,2000,4000,,
3,library,1500,800,,
4,mall,3500,2500,2,
5,hotel,4500,500,,
";

fn write_fixture(dir: &Path) {
    fs::write(dir.join("demand.asc"), DEMAND).unwrap();
    fs::write(dir.join("regions.geojson"), REGIONS).unwrap();
    fs::write(dir.join("pois.csv"), POIS).unwrap();
}

fn evcs() -> Command {
    Command::cargo_bin("evcs").unwrap()
}

#[test]
fn scenarios_list_shows_builtin_set() {
    evcs()
        .args(["scenarios", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("urban-lv2"))
        .stdout(predicate::str::contains("highway-dcfc"));
}

#[test]
fn scenarios_list_as_csv() {
    evcs()
        .args(["scenarios", "list", "--format", "csv"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("scenario_id,category,charger"))
        .stdout(predicate::str::contains("rural-dcfc,rural,dcfc"));
}

#[test]
fn validate_rejects_spec_without_inputs() {
    let tmp = tempdir().unwrap();
    let spec = tmp.path().join("spec.yaml");
    fs::write(&spec, "version: 1\nscenarios:\n  - scenario_id: urban-lv2\n").unwrap();
    evcs()
        .args(["scenarios", "validate", "--spec", spec.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing input paths"));
}

#[test]
fn expand_writes_resolved_scenarios() {
    let tmp = tempdir().unwrap();
    write_fixture(tmp.path());
    let spec = tmp.path().join("spec.yaml");
    fs::write(
        &spec,
        "defaults:
  inputs:
    demand: demand.asc
    regions: regions.geojson
    pois: pois.csv
scenarios:
  - scenario_id: rural-lv2
  - scenario_id: urban-dcfc
    capture_range: 2000
    bandwidth: 1000
",
    )
    .unwrap();
    let out = tmp.path().join("expanded.json");
    evcs()
        .args([
            "scenarios",
            "expand",
            "--spec",
            spec.to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Expanded 2 scenarios"));
    let json = fs::read_to_string(&out).unwrap();
    assert!(json.contains("urban-dcfc"));
    assert!(json.contains("demand.asc"));
}

#[test]
fn capacity_map_is_written() {
    let tmp = tempdir().unwrap();
    let registrations = tmp.path().join("registrations.asc");
    fs::write(
        &registrations,
        "ncols 2\nnrows 2\nxllcorner 0\nyllcorner 0\ncellsize 100\n40 40\n0 20\n",
    )
    .unwrap();
    let out = tmp.path().join("capacity.asc");
    evcs()
        .args([
            "maps",
            "capacity",
            "--registrations",
            registrations.to_str().unwrap(),
            "--charger",
            "lv2",
            "-o",
            out.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("capacity map"));
    assert!(fs::read_to_string(&out).unwrap().starts_with("ncols"));
}

#[test]
fn demand_map_needs_a_grid() {
    let tmp = tempdir().unwrap();
    let out = tmp.path().join("demand.asc");
    evcs()
        .args(["maps", "demand", "-o", out.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--grid or --od"));
}

#[test]
fn candidates_plan_writes_region_plan() {
    let tmp = tempdir().unwrap();
    write_fixture(tmp.path());
    let out = tmp.path().join("plan");
    evcs()
        .args([
            "candidates",
            "plan",
            "--scenario",
            "rural-lv2",
            "--regions",
            tmp.path().join("regions.geojson").to_str().unwrap(),
            "--pois",
            tmp.path().join("pois.csv").to_str().unwrap(),
            "--out-dir",
            out.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("East CCD"));
    assert!(out.join("region_plan.geojson").exists());
    assert!(out.join("candidates.csv").exists());
}

#[test]
fn optimize_then_merge() {
    let tmp = tempdir().unwrap();
    write_fixture(tmp.path());
    let out = tmp.path().join("out");
    evcs()
        .args([
            "optimize",
            "--scenario",
            "rural-lv2",
            "--demand",
            tmp.path().join("demand.asc").to_str().unwrap(),
            "--regions",
            tmp.path().join("regions.geojson").to_str().unwrap(),
            "--pois",
            tmp.path().join("pois.csv").to_str().unwrap(),
            "--threads",
            "1",
            "--out-dir",
            out.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 regions optimized, 0 failed"));

    let scenario_dir = out.join("rural-lv2");
    assert!(scenario_dir.join("East CCD/East CCD.csv").exists());
    assert!(scenario_dir.join("stations.geojson").exists());
    assert!(out.join("batch_manifest.json").exists());

    let merged = tmp.path().join("merged.geojson");
    evcs()
        .args([
            "merge",
            "--dir",
            scenario_dir.to_str().unwrap(),
            "-o",
            merged.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Merged"));
    assert!(merged.exists());
}

#[test]
fn optimize_rejects_unknown_scenario() {
    let tmp = tempdir().unwrap();
    evcs()
        .args([
            "optimize",
            "--scenario",
            "lunar-lv2",
            "--out-dir",
            tmp.path().to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown scenario 'lunar-lv2'"));
}

#[test]
fn batch_run_uses_spec_relative_inputs() {
    let tmp = tempdir().unwrap();
    write_fixture(tmp.path());
    let spec = tmp.path().join("spec.yaml");
    fs::write(
        &spec,
        "defaults:
  inputs:
    demand: demand.asc
    regions: regions.geojson
    pois: pois.csv
scenarios:
  - scenario_id: rural-lv2
",
    )
    .unwrap();
    let out = tmp.path().join("batch");
    evcs()
        .args([
            "batch",
            "run",
            "--spec",
            spec.to_str().unwrap(),
            "--out-dir",
            out.to_str().unwrap(),
            "--threads",
            "2",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 succeeded, 0 failed"));
    assert!(out.join("batch_manifest.json").exists());
    assert!(out.join("rural-lv2/stations.geojson").exists());
}
