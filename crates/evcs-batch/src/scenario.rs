//! Loading a scenario's layers and turning them into batch jobs.
//!
//! ```text
//! output_root/
//!   <scenario_id>/
//!     region_plan.geojson   # Stage 2 result
//!     candidates.csv        # every planned candidate
//!     <region>/...          # Stage 3 outputs, one directory per job
//! ```

use anyhow::{Context, Result};
use evcs_algo::{plan_regions, CandidatePlan, CandidatePolicy, OptimizeParams, PlanConfig, PlanInputs};
use evcs_core::{ChargerType, Poi, Raster, Region};
use evcs_io::{read_ascii_grid, read_pois, read_regions, read_road_points, sanitize_name};
use evcs_io::{write_pois_csv, write_region_plan};
use evcs_scenarios::{ResolvedScenario, ScenarioInputs};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::job::{jobs_from_plan, skipped_from_plan, BatchJob, SkippedItem};

/// Every input layer of a scenario, in memory.
#[derive(Debug, Clone)]
pub struct ScenarioData {
    pub demand: Raster,
    pub capacity: Option<Raster>,
    pub regions: Vec<Region>,
    pub pois: Vec<Poi>,
    pub roads: Vec<Poi>,
}

impl ScenarioData {
    pub fn load(inputs: &ScenarioInputs) -> Result<Self> {
        let demand = read_ascii_grid(inputs.demand()?)?;
        let capacity = inputs
            .capacity
            .as_deref()
            .map(read_ascii_grid)
            .transpose()?;
        let regions = read_regions(inputs.regions()?)?;
        let pois = read_pois(inputs.pois()?)?;
        let roads = match inputs.roads.as_deref() {
            Some(path) => read_road_points(path)?,
            None => Vec::new(),
        };
        Ok(Self {
            demand,
            capacity,
            regions,
            pois,
            roads,
        })
    }

    /// Stage 2 for `scenario` over these layers.
    pub fn plan(&self, scenario: &ResolvedScenario) -> Result<CandidatePlan> {
        if scenario.charger == ChargerType::Dcfc && self.roads.is_empty() {
            warn!(
                scenario = %scenario.scenario_id,
                "no road points; regions without eligible POIs will be skipped"
            );
        }
        let inputs = PlanInputs {
            regions: &self.regions,
            pois: &self.pois,
            roads: &self.roads,
            capacity: self.capacity.as_ref(),
            demand: Some(&self.demand),
        };
        let plan = plan_regions(inputs, &plan_config(scenario))
            .with_context(|| format!("planning candidates for '{}'", scenario.scenario_id))?;
        Ok(plan)
    }
}

pub fn plan_config(scenario: &ResolvedScenario) -> PlanConfig {
    PlanConfig {
        category: scenario.category,
        charger: scenario.charger,
        policy: CandidatePolicy::default(),
        site_threshold: scenario.site_threshold,
        max_candidates: scenario.max_candidates,
        bandwidth: scenario.bandwidth,
        capture_range: scenario.capture_range,
    }
}

pub fn optimize_params(scenario: &ResolvedScenario) -> OptimizeParams {
    OptimizeParams {
        charger: scenario.charger,
        bandwidth: scenario.bandwidth,
        capture_range: scenario.capture_range,
        bounds: scenario.bounds,
        min_improvement: scenario.min_improvement,
        keep_snapshots: scenario.save_intermediate,
    }
}

pub fn scenario_dir(output_root: &Path, scenario_id: &str) -> PathBuf {
    output_root.join(sanitize_name(scenario_id))
}

/// Stage 2 result of one scenario, ready to run.
#[derive(Debug, Clone)]
pub struct PreparedScenario {
    pub scenario_id: String,
    pub plan: CandidatePlan,
    pub plan_path: PathBuf,
    pub candidates_path: PathBuf,
    pub jobs: Vec<BatchJob>,
}

/// Load, plan and write the Stage 2 files of one scenario.
pub fn prepare_scenario(scenario: &ResolvedScenario, output_root: &Path) -> Result<PreparedScenario> {
    let data = ScenarioData::load(&scenario.inputs)
        .with_context(|| format!("loading inputs of scenario '{}'", scenario.scenario_id))?;
    let plan = data.plan(scenario)?;

    let dir = scenario_dir(output_root, &scenario.scenario_id);
    fs::create_dir_all(&dir)
        .with_context(|| format!("creating scenario directory '{}'", dir.display()))?;
    let plan_path = dir.join("region_plan.geojson");
    write_region_plan(&plan_path, &plan)?;
    let candidates_path = dir.join("candidates.csv");
    write_pois_csv(&candidates_path, &plan.candidates())?;

    let jobs = jobs_from_plan(
        &scenario.scenario_id,
        &plan,
        Arc::new(data.demand),
        optimize_params(scenario),
        dir,
    );
    info!(
        scenario = %scenario.scenario_id,
        jobs = jobs.len(),
        skipped = plan.skipped.len(),
        "scenario prepared"
    );
    Ok(PreparedScenario {
        scenario_id: scenario.scenario_id.clone(),
        plan,
        plan_path,
        candidates_path,
        jobs,
    })
}

/// Jobs for a set of scenarios.
#[derive(Debug, Clone, Default)]
pub struct BatchPlan {
    pub jobs: Vec<BatchJob>,
    pub skipped: Vec<SkippedItem>,
}

/// Prepare every scenario; a scenario whose inputs fail to load is
/// skipped and recorded.
pub fn prepare_batch(scenarios: &[ResolvedScenario], output_root: &Path) -> BatchPlan {
    let mut batch = BatchPlan::default();
    for scenario in scenarios {
        match prepare_scenario(scenario, output_root) {
            Ok(prepared) => {
                batch
                    .skipped
                    .extend(skipped_from_plan(&prepared.scenario_id, &prepared.plan));
                batch.jobs.extend(prepared.jobs);
            }
            Err(err) => {
                warn!(scenario = %scenario.scenario_id, "skipping scenario: {err:#}");
                batch.skipped.push(SkippedItem {
                    scenario_id: scenario.scenario_id.clone(),
                    region_id: None,
                    reason: format!("{err:#}"),
                });
            }
        }
    }
    batch
}
