use std::time::Instant;

use anyhow::Result;
use evcs_batch::{prepare_batch, run_batch, BatchRunnerConfig};
use evcs_cli::BatchCommands;
use evcs_scenarios::{load_spec_from_path, resolve_scenarios};

use super::telemetry::record_run_timed;

pub fn handle(command: &BatchCommands) -> Result<()> {
    match command {
        BatchCommands::Run {
            spec,
            out_dir,
            threads,
            no_merge,
        } => {
            let start = Instant::now();
            let mut outputs = Vec::new();
            let res = (|| -> Result<()> {
                let set = load_spec_from_path(spec)?;
                let scenarios = resolve_scenarios(&set)?;
                let plan = prepare_batch(&scenarios, out_dir);
                let skipped = plan.skipped.len();
                let summary = run_batch(&BatchRunnerConfig {
                    jobs: plan.jobs,
                    skipped: plan.skipped,
                    output_root: out_dir.clone(),
                    threads: *threads,
                    merge_stations: !no_merge,
                })?;
                outputs.push(summary.manifest_path.display().to_string());
                println!(
                    "Batch run: {} succeeded, {} failed, {} skipped. Manifest: {}",
                    summary.success,
                    summary.failure,
                    skipped,
                    summary.manifest_path.display()
                );
                Ok(())
            })();
            record_run_timed(
                out_dir,
                "batch run",
                &[
                    ("spec", spec.display().to_string().as_str()),
                    ("threads", threads.to_string().as_str()),
                    ("merge", (!no_merge).to_string().as_str()),
                ],
                &outputs,
                start,
                &res,
            );
            res
        }
    }
}
