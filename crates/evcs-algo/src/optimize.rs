//! Region-level optimization: one call per planned region.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use evcs_core::{
    CandidateSource, ChargerType, EvcsError, EvcsResult, Meters, PortBounds, SpatialCategory,
};

use crate::accessibility::TwoStepFca;
use crate::candidates::PlanKind;
use crate::capacity::CapacityOptimizer;
use crate::greedy::{GreedyConfig, GreedyOutcome, GreedySelector, Termination};
use crate::problem::RegionProblem;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizeParams {
    /// Selects the existing-port column kept by single-site regions
    pub charger: ChargerType,
    pub bandwidth: Meters,
    pub capture_range: Meters,
    pub bounds: PortBounds,
    pub min_improvement: Option<f64>,
    pub keep_snapshots: bool,
}

impl OptimizeParams {
    pub fn new(category: SpatialCategory, charger: ChargerType) -> Self {
        Self {
            charger,
            bandwidth: category.bandwidth(),
            capture_range: category.capture_range(),
            bounds: category.port_bounds(),
            min_improvement: Some(0.0),
            keep_snapshots: false,
        }
    }
}

/// A chosen site with its allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedStation {
    pub osm_id: String,
    pub fclass: String,
    pub x: f64,
    pub y: f64,
    pub supply: f64,
    pub ports: u32,
    pub source: CandidateSource,
}

#[derive(Debug, Clone)]
pub struct RegionOutcome {
    pub region_id: String,
    pub kind: PlanKind,
    pub problem: RegionProblem,
    pub selection: GreedyOutcome,
}

impl RegionOutcome {
    pub fn stations(&self) -> Vec<SelectedStation> {
        self.selection
            .selected
            .iter()
            .enumerate()
            .map(|(k, &j)| {
                let poi = &self.problem.candidates[j];
                SelectedStation {
                    osm_id: poi.osm_id.clone(),
                    fclass: poi.fclass.clone(),
                    x: poi.x,
                    y: poi.y,
                    supply: self.selection.supply.get(k).copied().unwrap_or(0.0),
                    ports: self.selection.ports.get(k).copied().unwrap_or(0),
                    source: poi.source,
                }
            })
            .collect()
    }

    pub fn final_a_hat(&self) -> Option<f64> {
        self.selection.metrics.map(|m| m.a_hat)
    }

    /// osm id of a candidate index.
    pub fn osm_id(&self, site: usize) -> &str {
        self.problem
            .candidates
            .get(site)
            .map_or("", |poi| poi.osm_id.as_str())
    }
}

/// Candidate covering the most demand within the capture range.
///
/// Ties go to the lowest index; `None` when nothing is covered.
pub fn best_covering_site(model: &TwoStepFca) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for j in 0..model.num_sites() {
        let cov = model.coverage(&[j]);
        if cov > 0.0 && best.map_or(true, |(_, b)| cov > b) {
            best = Some((j, cov));
        }
    }
    best.map(|(j, _)| j)
}

/// Port counts of the existing stations, when every one of them has one.
fn existing_ports(problem: &RegionProblem, charger: ChargerType) -> Option<Vec<f64>> {
    if problem.initial_sites.is_empty() {
        return None;
    }
    problem
        .initial_sites
        .iter()
        .map(|&j| problem.candidates.get(j).and_then(|poi| poi.ports_for(charger)))
        .collect()
}

/// Existing stations as they are, with their own port counts.
fn keep_existing(model: &TwoStepFca, sites: &[usize], supply: Vec<f64>) -> GreedyOutcome {
    let ai = match model.accessibility(sites, &supply) {
        Ok(ai) => ai,
        Err(err) => {
            warn!(%err, "existing stations cannot be evaluated");
            Vec::new()
        }
    };
    let metrics = (!ai.is_empty()).then(|| model.metrics(&ai));
    let ports = supply.iter().map(|s| s.round().max(0.0) as u32).collect();
    GreedyOutcome {
        selected: sites.to_vec(),
        supply,
        ports,
        ai,
        metrics,
        coverage: model.coverage(sites),
        initial_count: sites.len(),
        steps: Vec::new(),
        snapshots: Vec::new(),
        termination: Termination::BudgetReached,
    }
}

/// Site and size stations for one prepared region.
///
/// Greedy regions run the selector up to the site budget. Single-site
/// regions keep their existing stations with each station's own port count;
/// when a count is missing the region total is allocated over them by the
/// QP. Without existing stations the best covering candidate is taken.
pub fn optimize_region(
    problem: RegionProblem,
    kind: PlanKind,
    params: &OptimizeParams,
) -> EvcsResult<RegionOutcome> {
    let model = problem.model(params.bandwidth, params.capture_range)?;
    let selection = match (kind, existing_ports(&problem, params.charger)) {
        (PlanKind::Mclp, Some(counts)) => keep_existing(&model, &problem.initial_sites, counts),
        _ => select_sites(&problem, model, kind, params)?,
    };
    info!(
        region = %problem.region_id,
        ?kind,
        sites = selection.selected.len(),
        a_hat = selection.metrics.map(|m| m.a_hat),
        coverage = format_args!("{:.2}%", selection.coverage),
        "optimization complete"
    );

    Ok(RegionOutcome {
        region_id: problem.region_id.clone(),
        kind,
        problem,
        selection,
    })
}

fn select_sites(
    problem: &RegionProblem,
    model: TwoStepFca,
    kind: PlanKind,
    params: &OptimizeParams,
) -> EvcsResult<GreedyOutcome> {
    let (initial, max_sites) = match kind {
        PlanKind::Greedy => (problem.initial_sites.clone(), problem.max_sites),
        PlanKind::Mclp => {
            let initial = if problem.initial_sites.is_empty() {
                let site = best_covering_site(&model).ok_or_else(|| {
                    EvcsError::EmptyInput(format!(
                        "region '{}' has no candidate within range of demand",
                        problem.region_id
                    ))
                })?;
                vec![site]
            } else {
                problem.initial_sites.clone()
            };
            let count = initial.len();
            (initial, count)
        }
    };

    let optimizer = CapacityOptimizer::new(model, params.bounds)?;
    let config = GreedyConfig {
        max_sites,
        min_improvement: params.min_improvement,
        keep_snapshots: params.keep_snapshots,
    };
    GreedySelector::new(&optimizer, config).run(&initial)
}

#[cfg(test)]
mod tests {
    use super::*;
    use evcs_core::{DemandPoint, Poi};

    fn problem(initial: Vec<usize>, max_sites: usize) -> RegionProblem {
        let demand_points = vec![
            DemandPoint { x: 0.0, y: 0.0, demand: 1.0 },
            DemandPoint { x: 10_000.0, y: 0.0, demand: 3.0 },
        ];
        let candidates = vec![
            Poi::new("a", "hotel", 0.0, 0.0),
            Poi::new("b", "supermarket", 10_000.0, 0.0),
        ];
        RegionProblem {
            region_id: "Line CCD".into(),
            total_supply: 8.0,
            max_sites,
            distances: vec![vec![0.0, 10_000.0], vec![10_000.0, 0.0]],
            demand_points,
            candidates,
            initial_sites: initial,
        }
    }

    #[test]
    fn greedy_region_returns_stations_with_ports() {
        let params = OptimizeParams::new(SpatialCategory::Suburban, ChargerType::Lv2);
        let outcome = optimize_region(problem(vec![], 2), PlanKind::Greedy, &params).unwrap();
        let stations = outcome.stations();
        assert_eq!(stations.len(), 2);
        let total: u32 = stations.iter().map(|s| s.ports).sum();
        assert_eq!(total, 8);
        let b = stations.iter().find(|s| s.osm_id == "b").unwrap();
        assert_eq!(b.ports, 6);
        assert!(outcome.final_a_hat().unwrap() < 1e-3);
    }

    #[test]
    fn mclp_keeps_existing_station() {
        let params = OptimizeParams::new(SpatialCategory::Rural, ChargerType::Lv2);
        let outcome = optimize_region(problem(vec![0], 1), PlanKind::Mclp, &params).unwrap();
        let stations = outcome.stations();
        assert_eq!(stations.len(), 1);
        assert_eq!(stations[0].osm_id, "a");
        assert_eq!(stations[0].ports, 8);
        assert!(outcome.selection.steps.is_empty());
    }

    #[test]
    fn mclp_keeps_each_station_port_count() {
        let mut p = problem(vec![0], 1);
        p.candidates[0].lv2_count = Some(5.0);
        let params = OptimizeParams::new(SpatialCategory::Rural, ChargerType::Lv2);
        let outcome = optimize_region(p.clone(), PlanKind::Mclp, &params).unwrap();
        let stations = outcome.stations();
        assert_eq!(stations.len(), 1);
        assert_eq!((stations[0].supply, stations[0].ports), (5.0, 5));
        assert!(outcome.final_a_hat().is_some());

        // no DCFC count on record: the region total is allocated instead
        let params = OptimizeParams::new(SpatialCategory::Rural, ChargerType::Dcfc);
        let outcome = optimize_region(p, PlanKind::Mclp, &params).unwrap();
        assert_eq!(outcome.stations()[0].ports, 8);
    }

    #[test]
    fn urban_existing_stations_stay_within_bounds() {
        let params = OptimizeParams::new(SpatialCategory::Urban, ChargerType::Lv2);

        let mut p = problem(vec![0], 1);
        p.total_supply = 40.0;
        let err = optimize_region(p, PlanKind::Mclp, &params).unwrap_err();
        assert!(matches!(err, EvcsError::Solver(_)));

        for total in [60.0, 3.0] {
            let mut p = problem(vec![0, 1], 2);
            p.total_supply = total;
            let err = optimize_region(p, PlanKind::Greedy, &params).unwrap_err();
            assert!(matches!(err, EvcsError::Solver(_)), "total {total}");
        }

        let mut p = problem(vec![0, 1], 2);
        p.total_supply = 20.0;
        let outcome = optimize_region(p, PlanKind::Greedy, &params).unwrap();
        let ports: Vec<u32> = outcome.stations().iter().map(|s| s.ports).collect();
        assert_eq!(ports, vec![5, 15]);
        let supply: f64 = outcome.selection.supply.iter().sum();
        assert!((supply - 20.0).abs() < 1e-4);
    }

    #[test]
    fn mclp_without_existing_takes_best_covering_site() {
        let params = OptimizeParams::new(SpatialCategory::Rural, ChargerType::Lv2);
        let outcome = optimize_region(problem(vec![], 1), PlanKind::Mclp, &params).unwrap();
        assert_eq!(outcome.stations()[0].osm_id, "b");
        assert_eq!(outcome.osm_id(1), "b");
    }
}
