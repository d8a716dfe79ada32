use std::fs;
use std::io::{self, Write};
use std::time::Instant;

use anyhow::{Context, Result};
use evcs_algo::{plan_regions, CandidatePlan, PlanInputs};
use evcs_batch::plan_config;
use evcs_cli::CandidatesCommands;
use evcs_io::{read_ascii_grid, read_pois, read_regions, read_road_points};
use evcs_io::{write_pois_csv, write_region_plan};
use tabwriter::TabWriter;
use tracing::info;

use super::telemetry::record_run_timed;
use super::{require_inputs, resolve_scenario};

pub fn handle(command: &CandidatesCommands) -> Result<()> {
    match command {
        CandidatesCommands::Plan { scenario, out_dir } => {
            let start = Instant::now();
            let mut outputs = Vec::new();
            let res = (|| -> Result<()> {
                let scenario = resolve_scenario(scenario)?;
                require_inputs(&scenario, &["regions", "pois"])?;
                let inputs = &scenario.inputs;

                let regions = read_regions(inputs.regions()?)?;
                let pois = read_pois(inputs.pois()?)?;
                let roads = match inputs.roads.as_deref() {
                    Some(path) => read_road_points(path)?,
                    None => Vec::new(),
                };
                let capacity = inputs.capacity.as_deref().map(read_ascii_grid).transpose()?;
                let demand = inputs.demand.as_deref().map(read_ascii_grid).transpose()?;
                if demand.is_none() {
                    info!("no demand raster; candidates keep their input order");
                }

                let plan = plan_regions(
                    PlanInputs {
                        regions: &regions,
                        pois: &pois,
                        roads: &roads,
                        capacity: capacity.as_ref(),
                        demand: demand.as_ref(),
                    },
                    &plan_config(&scenario),
                )
                .with_context(|| format!("planning candidates for '{}'", scenario.scenario_id))?;

                fs::create_dir_all(out_dir)
                    .with_context(|| format!("creating output directory '{}'", out_dir.display()))?;
                let plan_path = out_dir.join("region_plan.geojson");
                write_region_plan(&plan_path, &plan)?;
                let candidates_path = out_dir.join("candidates.csv");
                write_pois_csv(&candidates_path, &plan.candidates())?;
                outputs.push(plan_path.display().to_string());
                outputs.push(candidates_path.display().to_string());

                print_plan(&plan)?;
                Ok(())
            })();
            record_run_timed(
                out_dir,
                "candidates plan",
                &[
                    ("scenario", scenario.scenario.as_str()),
                    ("out_dir", out_dir.display().to_string().as_str()),
                ],
                &outputs,
                start,
                &res,
            );
            res
        }
    }
}

fn print_plan(plan: &CandidatePlan) -> Result<()> {
    let mut writer = TabWriter::new(io::stdout());
    writeln!(writer, "REGION\tKIND\tSUPPLY\tSITES\tCANDIDATES\tEXISTING")?;
    for region in &plan.regions {
        writeln!(
            writer,
            "{}\t{:?}\t{}\t{}\t{}\t{}",
            region.region.id,
            region.kind,
            region.region.total_supply.unwrap_or_default(),
            region.region.max_sites.unwrap_or_default(),
            region.candidates.len(),
            region.initial_count
        )?;
    }
    for (region, reason) in &plan.skipped {
        writeln!(writer, "{region}\tskipped\t\t\t\t{reason}")?;
    }
    writer.flush()?;
    Ok(())
}
