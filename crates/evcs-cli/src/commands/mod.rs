pub mod batch;
pub mod candidates;
pub mod maps;
pub mod merge;
pub mod optimize;
pub mod scenarios;
pub mod telemetry;

use anyhow::{anyhow, bail, Result};
use evcs_cli::ScenarioArgs;
use evcs_scenarios::{
    builtin_scenario_set, load_spec_from_path, resolve_parameters, ResolvedScenario,
    ScenarioInputs,
};

/// Pick `--scenario` from the spec (or the built-in set) and apply the
/// command-line overrides. Inputs given on the command line win over the
/// spec's.
pub fn resolve_scenario(args: &ScenarioArgs) -> Result<ResolvedScenario> {
    let set = match args.spec.as_deref() {
        Some(path) => load_spec_from_path(path)?,
        None => builtin_scenario_set(),
    };
    let mut scenario = resolve_parameters(&set)?
        .into_iter()
        .find(|s| s.scenario_id == args.scenario)
        .ok_or_else(|| anyhow!("unknown scenario '{}'", args.scenario))?;

    let cli_inputs = ScenarioInputs {
        demand: args.demand.clone(),
        capacity: args.capacity.clone(),
        regions: args.regions.clone(),
        pois: args.pois.clone(),
        roads: args.roads.clone(),
    };
    scenario.inputs = cli_inputs.or(&scenario.inputs);
    if let Some(threshold) = args.site_threshold {
        if !(threshold > 0.0) {
            bail!("--site-threshold must be positive, got {threshold}");
        }
        scenario.site_threshold = threshold;
    }
    if let Some(max) = args.max_candidates {
        if max == 0 {
            bail!("--max-candidates must be at least 1");
        }
        scenario.max_candidates = Some(max);
    }
    Ok(scenario)
}

/// Fail with the names of required inputs that are still unset.
pub fn require_inputs(scenario: &ResolvedScenario, required: &[&str]) -> Result<()> {
    let missing: Vec<&str> = scenario
        .inputs
        .missing()
        .into_iter()
        .filter(|name| required.contains(name))
        .collect();
    if !missing.is_empty() {
        bail!(
            "scenario '{}' needs {}",
            scenario.scenario_id,
            missing
                .iter()
                .map(|name| format!("--{name}"))
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    Ok(())
}
