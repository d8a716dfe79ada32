//! Stage 3 outputs written to disk and read back.

use std::fs;

use evcs_algo::{optimize_region, CandidatePlan, OptimizeParams, PlanKind, RegionPlan, RegionProblem};
use evcs_core::{CandidateSource, ChargerType, DemandPoint, Poi, Region, SpatialCategory};
use evcs_io::{merge_station_files, read_regions, read_stations, write_region_outputs, write_region_plan};
use geo::{polygon, MultiPolygon};

fn problem(region_id: &str) -> RegionProblem {
    let demand_points = vec![
        DemandPoint { x: 0.0, y: 0.0, demand: 1.0 },
        DemandPoint { x: 10_000.0, y: 0.0, demand: 3.0 },
    ];
    let candidates = vec![
        Poi::new("11", "hotel", 0.0, 0.0),
        Poi::new("12", "supermarket", 10_000.0, 0.0),
        Poi::new("13", "library", 20_000.0, 0.0),
    ];
    let distances = demand_points
        .iter()
        .map(|d| candidates.iter().map(|c| (c.x - d.x).abs()).collect())
        .collect();
    RegionProblem {
        region_id: region_id.into(),
        total_supply: 8.0,
        max_sites: 2,
        demand_points,
        candidates,
        distances,
        initial_sites: vec![],
    }
}

#[test]
fn region_outputs_have_expected_layout() {
    let dir = tempfile::tempdir().unwrap();
    let mut params = OptimizeParams::new(SpatialCategory::Suburban, ChargerType::Lv2);
    params.keep_snapshots = true;
    let outcome = optimize_region(problem("Alpha/Beta CCD"), PlanKind::Greedy, &params).unwrap();

    let artifacts = write_region_outputs(dir.path(), &outcome).unwrap();
    assert_eq!(artifacts.region_dir, dir.path().join("Alpha_Beta CCD"));
    assert!(artifacts.steps_csv.ends_with("Alpha_Beta CCD/Alpha_Beta CCD.csv"));

    let trace = fs::read_to_string(&artifacts.steps_csv).unwrap();
    let mut lines = trace.lines();
    assert_eq!(
        lines.next().unwrap(),
        "Step,Selected_Site,osm_id,A_hat,min_Ai,max_Ai,MD,MAD,CV,Gini,Coverage"
    );
    assert_eq!(lines.count(), outcome.selection.steps.len());

    let supply = fs::read_to_string(artifacts.region_dir.join("supply/supply_1.ssv")).unwrap();
    assert_eq!(supply.lines().count(), 3);
    let ai = fs::read_to_string(artifacts.region_dir.join("Ai/Ai_1.ssv")).unwrap();
    assert_eq!(ai.lines().count(), 2);

    let stations = read_stations(&artifacts.stations_geojson).unwrap();
    assert_eq!(stations.len(), 2);
    let ports: u32 = stations.iter().map(|(_, s)| s.ports).sum();
    assert_eq!(ports, 8);
    assert!(stations.iter().all(|(region, _)| region == "Alpha/Beta CCD"));
}

#[test]
fn merge_collects_station_files_only() {
    let dir = tempfile::tempdir().unwrap();
    let params = OptimizeParams::new(SpatialCategory::Rural, ChargerType::Lv2);
    for id in ["East CCD", "West CCD"] {
        let outcome = optimize_region(problem(id), PlanKind::Greedy, &params).unwrap();
        write_region_outputs(dir.path(), &outcome).unwrap();
    }
    // not named after its directory, so it is ignored
    fs::write(
        dir.path().join("East CCD/notes.geojson"),
        r#"{"type":"FeatureCollection","features":[]}"#,
    )
    .unwrap();

    let merged = dir.path().join("merged.geojson");
    let count = merge_station_files(dir.path(), &merged).unwrap();
    assert_eq!(count, 4);

    let stations = read_stations(&merged).unwrap();
    let regions: Vec<&str> = stations.iter().map(|(r, _)| r.as_str()).collect();
    assert_eq!(regions, vec!["East CCD", "East CCD", "West CCD", "West CCD"]);
}

#[test]
fn region_plan_reads_back_as_regions() {
    let dir = tempfile::tempdir().unwrap();
    let square = polygon![
        (x: 0.0, y: 0.0),
        (x: 1000.0, y: 0.0),
        (x: 1000.0, y: 1000.0),
        (x: 0.0, y: 1000.0),
        (x: 0.0, y: 0.0),
    ];
    let mut region = Region::new("Gamma CCD", MultiPolygon::new(vec![square]));
    region.lv2_count = Some(9.0);
    region.total_supply = Some(9.0);
    region.max_sites = Some(2);
    region.initial_osm_ids = vec!["5".into()];
    let plan = CandidatePlan {
        regions: vec![RegionPlan {
            region,
            kind: PlanKind::Greedy,
            candidates: vec![Poi::new("5", "hotel", 10.0, 10.0), Poi::new("6", "mall", 20.0, 20.0)],
            initial_count: 1,
            source: CandidateSource::Poi,
        }],
        skipped: vec![],
    };

    let path = dir.path().join("plan.geojson");
    write_region_plan(&path, &plan).unwrap();
    let back = read_regions(&path).unwrap();
    assert_eq!(back.len(), 1);
    assert_eq!(back[0].id, "Gamma CCD");
    assert_eq!(back[0].total_supply, Some(9.0));
    assert_eq!(back[0].max_sites, Some(2));
    assert_eq!(back[0].initial_osm_ids, vec!["5"]);
    assert_eq!(back[0].dcfc_count, None);
}
