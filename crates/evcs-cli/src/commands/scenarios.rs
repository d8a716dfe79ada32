use std::io::{self, stdout, Write};
use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use evcs_cli::common::{write_csv, write_json, write_jsonl, OutputFormat};
use evcs_cli::ScenariosCommands;
use evcs_scenarios::{
    builtin_scenario_set, load_spec_from_path, resolve_parameters, resolve_scenarios, validate,
    write_manifest, ResolvedScenario, ScenarioManifest,
};
use serde::Serialize;
use tabwriter::TabWriter;

use super::telemetry::{manifest_dir, record_run_timed};

pub fn handle(command: &ScenariosCommands) -> Result<()> {
    match command {
        ScenariosCommands::List { spec, format } => list(spec.as_deref(), *format),
        ScenariosCommands::Validate { spec } => validate_spec(spec),
        ScenariosCommands::Expand { spec, out } => expand(spec, out),
    }
}

#[derive(Serialize)]
struct ScenarioRow<'a> {
    scenario_id: &'a str,
    category: &'a str,
    charger: &'a str,
    capture_range_m: f64,
    bandwidth_m: f64,
    min_ports: f64,
    max_ports: Option<f64>,
    site_threshold: f64,
    min_improvement: Option<f64>,
}

impl<'a> From<&'a ResolvedScenario> for ScenarioRow<'a> {
    fn from(s: &'a ResolvedScenario) -> Self {
        ScenarioRow {
            scenario_id: &s.scenario_id,
            category: s.category.as_str(),
            charger: s.charger.as_str(),
            capture_range_m: s.capture_range.value(),
            bandwidth_m: s.bandwidth.value(),
            min_ports: s.bounds.min,
            max_ports: s.bounds.max,
            site_threshold: s.site_threshold,
            min_improvement: s.min_improvement,
        }
    }
}

fn list(spec: Option<&Path>, format: OutputFormat) -> Result<()> {
    let set = match spec {
        Some(path) => load_spec_from_path(path)?,
        None => builtin_scenario_set(),
    };
    let resolved = resolve_parameters(&set)?;

    match format {
        OutputFormat::Table => {
            let mut writer = TabWriter::new(io::stdout());
            writeln!(
                writer,
                "SCENARIO\tCATEGORY\tCHARGER\tCAPTURE (m)\tBANDWIDTH (m)\tPORTS/SITE"
            )?;
            for s in &resolved {
                let max = s
                    .bounds
                    .max
                    .map_or_else(|| "inf".to_string(), |m| m.to_string());
                writeln!(
                    writer,
                    "{}\t{}\t{}\t{}\t{}\t[{}, {}]",
                    s.scenario_id,
                    s.category,
                    s.charger,
                    s.capture_range.value(),
                    s.bandwidth.value(),
                    s.bounds.min,
                    max
                )?;
            }
            writer.flush()?;
        }
        OutputFormat::Json => write_json(&resolved, &mut stdout(), true)?,
        OutputFormat::Jsonl => write_jsonl(&resolved, &mut stdout())?,
        OutputFormat::Csv => {
            let rows: Vec<ScenarioRow> = resolved.iter().map(ScenarioRow::from).collect();
            write_csv(&rows, stdout())?;
        }
    }
    Ok(())
}

fn validate_spec(spec: &Path) -> Result<()> {
    let set = load_spec_from_path(spec)?;
    validate(&set)?;
    println!("Scenario spec validated successfully");
    Ok(())
}

fn expand(spec: &Path, out: &Path) -> Result<()> {
    let start = Instant::now();
    let spec_str = spec.display().to_string();
    let res = (|| -> Result<()> {
        let set = load_spec_from_path(spec)?;
        let resolved = resolve_scenarios(&set)?;
        let count = resolved.len();
        write_manifest(out, &ScenarioManifest::new(Some(spec), resolved))?;
        println!("Expanded {} scenarios into {}", count, out.display());
        Ok(())
    })();
    record_run_timed(
        manifest_dir(out),
        "scenarios expand",
        &[("spec", spec_str.as_str())],
        &[out.display().to_string()],
        start,
        &res,
    );
    res
}
