//! Batch execution of the optimization stage.
//!
//! Each scenario is planned once ([`prepare_batch`]); every planned region
//! becomes a [`BatchJob`]. [`run_batch`] runs the jobs on a bounded rayon
//! pool, writes each region's outputs, and records the outcome of every job
//! in `batch_manifest.json`. A failing job never stops the others.

pub mod job;
pub mod manifest;
pub mod runner;
pub mod scenario;

pub use job::{jobs_from_plan, skipped_from_plan, BatchJob, BatchJobRecord, SkippedItem};
pub use manifest::{load_batch_manifest, write_batch_manifest, BatchManifest};
pub use runner::{run_batch, run_job, BatchRunnerConfig, BatchSummary};
pub use scenario::{
    optimize_params, plan_config, prepare_batch, prepare_scenario, scenario_dir, BatchPlan,
    PreparedScenario, ScenarioData,
};
