//! Scenario specs for the siting pipeline.
//!
//! A scenario fixes a spatial category and charger type together with the
//! catchment parameters, port bounds and input layers of one optimization
//! run. Specs are YAML or JSON; [`builtin_scenario_set`] provides the seven
//! standard scenarios.

pub mod manifest;
pub mod spec;

pub use manifest::{load_manifest, write_manifest, ScenarioManifest};
pub use spec::{
    builtin_scenario_set, load_spec_from_path, resolve_parameters, resolve_scenarios, scenario_id,
    validate, ResolvedScenario, ScenarioDefaults, ScenarioInputs, ScenarioSet, ScenarioSpec,
    BUILTIN_SCENARIOS,
};
