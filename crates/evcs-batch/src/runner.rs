use crate::job::{BatchJob, BatchJobRecord, SkippedItem};
use crate::manifest::{write_batch_manifest, BatchManifest};
use anyhow::{Context, Result};
use chrono::Utc;
use evcs_algo::{optimize_region, RegionOutcome, RegionProblem};
use evcs_io::{merge_station_files, write_region_outputs, RegionArtifacts};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

pub struct BatchRunnerConfig {
    pub jobs: Vec<BatchJob>,
    pub skipped: Vec<SkippedItem>,
    pub output_root: PathBuf,
    /// Worker threads; 0 uses every CPU
    pub threads: usize,
    /// Merge each scenario's station files into `<scenario>/stations.geojson`
    pub merge_stations: bool,
}

pub struct BatchSummary {
    pub success: usize,
    pub failure: usize,
    pub manifest_path: PathBuf,
    pub jobs: Vec<BatchJobRecord>,
}

pub fn run_batch(config: &BatchRunnerConfig) -> Result<BatchSummary> {
    fs::create_dir_all(&config.output_root).with_context(|| {
        format!(
            "creating batch output root '{}'",
            config.output_root.display()
        )
    })?;

    let thread_count = if config.threads == 0 {
        num_cpus::get()
    } else {
        config.threads
    };
    let pool = ThreadPoolBuilder::new()
        .num_threads(thread_count)
        .build()
        .context("building Rayon thread pool for batch runs")?;
    info!(jobs = config.jobs.len(), threads = thread_count, "starting batch");

    let job_records: Vec<BatchJobRecord> =
        pool.install(|| config.jobs.par_iter().map(run_job).collect());

    let success = job_records.iter().filter(|record| record.is_ok()).count();
    let failure = job_records.len() - success;

    if config.merge_stations {
        let dirs: BTreeSet<&PathBuf> = config.jobs.iter().map(|job| &job.output_dir).collect();
        for dir in dirs {
            let merged = dir.join("stations.geojson");
            if let Err(err) = merge_station_files(dir, &merged) {
                warn!("merging stations under {} failed: {err:#}", dir.display());
            }
        }
    }

    let manifest = BatchManifest {
        created_at: Utc::now(),
        num_jobs: job_records.len(),
        success,
        failure,
        skipped: config.skipped.clone(),
        jobs: job_records.clone(),
    };
    let manifest_path = config.output_root.join("batch_manifest.json");
    write_batch_manifest(&manifest_path, &manifest)?;
    info!(success, failure, "batch finished");
    Ok(BatchSummary {
        success,
        failure,
        manifest_path,
        jobs: job_records,
    })
}

/// Prepare the region, run the selector and write the region's outputs.
///
/// Errors are captured in the returned record.
pub fn run_job(job: &BatchJob) -> BatchJobRecord {
    let start = Instant::now();
    let runner = || -> Result<(RegionOutcome, RegionArtifacts)> {
        let problem = RegionProblem::prepare(
            &job.plan.region,
            &job.demand,
            &job.plan.candidates,
            job.params.capture_range,
        )?;
        let outcome = optimize_region(problem, job.plan.kind, &job.params)?;
        let artifacts = write_region_outputs(&job.output_dir, &outcome)?;
        Ok((outcome, artifacts))
    };

    let mut record = BatchJobRecord {
        job_id: job.job_id.clone(),
        scenario_id: job.scenario_id.clone(),
        region_id: job.region_id().to_string(),
        kind: job.plan.kind,
        status: "ok".to_string(),
        error: None,
        sites: 0,
        initial_sites: 0,
        ports: 0,
        a_hat: None,
        coverage: None,
        termination: None,
        outputs: Vec::new(),
        duration_ms: 0,
    };
    match runner() {
        Ok((outcome, artifacts)) => {
            let selection = &outcome.selection;
            record.sites = selection.selected.len();
            record.initial_sites = selection.initial_count;
            record.ports = selection.ports.iter().sum();
            record.a_hat = outcome.final_a_hat();
            record.coverage = Some(selection.coverage);
            record.termination = Some(selection.termination);
            record.outputs = [
                &artifacts.steps_csv,
                &artifacts.stations_geojson,
                &artifacts.stations_csv,
            ]
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        }
        Err(err) => {
            warn!("batch job {} failed: {err:#}", job.job_id);
            record.status = "error".to_string();
            record.error = Some(format!("{err:#}"));
        }
    }
    record.duration_ms = start.elapsed().as_millis() as u64;
    record
}
