use evcs_algo::{CandidatePlan, OptimizeParams, PlanKind, RegionPlan, Termination};
use evcs_core::Raster;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Stage 3 for one region of one scenario.
#[derive(Debug, Clone)]
pub struct BatchJob {
    /// `<scenario_id>:<region_id>`
    pub job_id: String,
    pub scenario_id: String,
    pub plan: RegionPlan,
    /// Demand map shared by every job of the scenario
    pub demand: Arc<Raster>,
    pub params: OptimizeParams,
    /// Scenario directory; the job writes under `<output_dir>/<region>/`
    pub output_dir: PathBuf,
}

impl BatchJob {
    pub fn region_id(&self) -> &str {
        &self.plan.region.id
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJobRecord {
    pub job_id: String,
    pub scenario_id: String,
    pub region_id: String,
    pub kind: PlanKind,
    pub status: String,
    pub error: Option<String>,
    #[serde(default)]
    pub sites: usize,
    #[serde(default)]
    pub initial_sites: usize,
    #[serde(default)]
    pub ports: u32,
    pub a_hat: Option<f64>,
    pub coverage: Option<f64>,
    pub termination: Option<Termination>,
    #[serde(default)]
    pub outputs: Vec<String>,
    pub duration_ms: u64,
}

impl BatchJobRecord {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// A scenario or region that produced no job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedItem {
    pub scenario_id: String,
    /// `None` when the whole scenario was skipped
    pub region_id: Option<String>,
    pub reason: String,
}

/// One job per planned region.
pub fn jobs_from_plan(
    scenario_id: &str,
    plan: &CandidatePlan,
    demand: Arc<Raster>,
    params: OptimizeParams,
    output_dir: PathBuf,
) -> Vec<BatchJob> {
    plan.regions
        .iter()
        .map(|region_plan| BatchJob {
            job_id: format!("{}:{}", scenario_id, region_plan.region.id),
            scenario_id: scenario_id.to_string(),
            plan: region_plan.clone(),
            demand: Arc::clone(&demand),
            params,
            output_dir: output_dir.clone(),
        })
        .collect()
}

pub fn skipped_from_plan(scenario_id: &str, plan: &CandidatePlan) -> Vec<SkippedItem> {
    plan.skipped
        .iter()
        .map(|(region, reason)| SkippedItem {
            scenario_id: scenario_id.to_string(),
            region_id: Some(region.clone()),
            reason: reason.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use evcs_core::{CandidateSource, ChargerType, Region, SpatialCategory};
    use geo::{polygon, MultiPolygon};

    fn make_plan() -> CandidatePlan {
        let square = polygon![
            (x: 0.0, y: 0.0),
            (x: 10.0, y: 0.0),
            (x: 10.0, y: 10.0),
            (x: 0.0, y: 0.0),
        ];
        CandidatePlan {
            regions: vec![RegionPlan {
                region: Region::new("Alpha CCD", MultiPolygon::new(vec![square])),
                kind: PlanKind::Mclp,
                candidates: vec![],
                initial_count: 0,
                source: CandidateSource::Poi,
            }],
            skipped: vec![("Beta CCD".into(), "no candidate sites".into())],
        }
    }

    #[test]
    fn jobs_from_plan_builds_identifiers() {
        let demand = Raster::from_values(1, 1, 0.0, 1.0, 1.0, None, vec![1.0]).unwrap();
        let plan = make_plan();
        let jobs = jobs_from_plan(
            "urban-lv2",
            &plan,
            Arc::new(demand),
            OptimizeParams::new(SpatialCategory::Urban, ChargerType::Lv2),
            PathBuf::from("out/urban-lv2"),
        );
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].job_id, "urban-lv2:Alpha CCD");
        assert_eq!(jobs[0].region_id(), "Alpha CCD");

        let skipped = skipped_from_plan("urban-lv2", &plan);
        assert_eq!(skipped[0].region_id.as_deref(), Some("Beta CCD"));
    }
}
