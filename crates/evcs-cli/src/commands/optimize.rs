use std::io::{self, Write};
use std::time::Instant;

use anyhow::{bail, Result};
use evcs_batch::{prepare_scenario, run_batch, skipped_from_plan, BatchJobRecord, BatchRunnerConfig};
use evcs_cli::OptimizeArgs;
use tabwriter::TabWriter;

use super::telemetry::record_run_timed;
use super::{require_inputs, resolve_scenario};

pub fn handle(args: &OptimizeArgs) -> Result<()> {
    let start = Instant::now();
    let mut outputs = Vec::new();
    let res = (|| -> Result<()> {
        let mut scenario = resolve_scenario(&args.scenario)?;
        require_inputs(&scenario, &["demand", "regions", "pois"])?;
        if let Some(min) = args.min_improvement {
            scenario.min_improvement = Some(min);
        }
        scenario.save_intermediate |= args.save_intermediate;

        let prepared = prepare_scenario(&scenario, &args.out_dir)?;
        outputs.push(prepared.plan_path.display().to_string());
        outputs.push(prepared.candidates_path.display().to_string());
        let skipped = skipped_from_plan(&prepared.scenario_id, &prepared.plan);
        let summary = run_batch(&BatchRunnerConfig {
            jobs: prepared.jobs,
            skipped,
            output_root: args.out_dir.clone(),
            threads: args.threads,
            merge_stations: true,
        })?;
        outputs.push(summary.manifest_path.display().to_string());
        for record in &summary.jobs {
            outputs.extend(record.outputs.iter().cloned());
        }

        print_records(&summary.jobs)?;
        println!(
            "{} regions optimized, {} failed; manifest {}",
            summary.success,
            summary.failure,
            summary.manifest_path.display()
        );
        if summary.success == 0 && summary.failure > 0 {
            bail!("every region of '{}' failed", scenario.scenario_id);
        }
        Ok(())
    })();
    record_run_timed(
        &args.out_dir,
        "optimize",
        &[
            ("scenario", args.scenario.scenario.as_str()),
            ("threads", args.threads.to_string().as_str()),
            (
                "min_improvement",
                args.min_improvement
                    .map(|v| v.to_string())
                    .unwrap_or_default()
                    .as_str(),
            ),
        ],
        &outputs,
        start,
        &res,
    );
    res
}

fn print_records(records: &[BatchJobRecord]) -> Result<()> {
    let mut writer = TabWriter::new(io::stdout());
    writeln!(writer, "REGION\tKIND\tSITES\tPORTS\tA_HAT\tCOVERAGE\tSTATUS")?;
    for record in records {
        let status = match (&record.error, record.termination) {
            (Some(err), _) => format!("error: {err}"),
            (None, Some(termination)) => format!("{termination:?}"),
            (None, None) => record.status.clone(),
        };
        writeln!(
            writer,
            "{}\t{:?}\t{}\t{}\t{}\t{}\t{}",
            record.region_id,
            record.kind,
            record.sites,
            record.ports,
            record.a_hat.map_or_else(|| "-".to_string(), |a| format!("{a:.4}")),
            record
                .coverage
                .map_or_else(|| "-".to_string(), |c| format!("{c:.0}")),
            status
        )?;
    }
    writer.flush()?;
    Ok(())
}
