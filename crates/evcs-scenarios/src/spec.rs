use anyhow::{anyhow, bail, Context, Result};
use evcs_algo::DEFAULT_SITE_THRESHOLD;
use evcs_core::{ChargerType, Meters, PortBounds, SpatialCategory};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// The fixed (category, charger) combinations studied by the pipeline.
pub const BUILTIN_SCENARIOS: [(SpatialCategory, ChargerType); 7] = [
    (SpatialCategory::Urban, ChargerType::Lv2),
    (SpatialCategory::Urban, ChargerType::Dcfc),
    (SpatialCategory::Suburban, ChargerType::Lv2),
    (SpatialCategory::Suburban, ChargerType::Dcfc),
    (SpatialCategory::Rural, ChargerType::Lv2),
    (SpatialCategory::Rural, ChargerType::Dcfc),
    (SpatialCategory::Highway, ChargerType::Dcfc),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSet {
    pub version: Option<u32>,
    #[serde(default)]
    pub defaults: ScenarioDefaults,
    #[serde(default)]
    pub scenarios: Vec<ScenarioSpec>,
}

/// Input layers of a scenario. Missing entries fall back to the defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioInputs {
    /// Demand raster (`.asc`)
    pub demand: Option<PathBuf>,
    /// Capacity raster used when a region carries no port count
    pub capacity: Option<PathBuf>,
    pub regions: Option<PathBuf>,
    pub pois: Option<PathBuf>,
    /// Road points for the DCFC fallback
    pub roads: Option<PathBuf>,
}

impl ScenarioInputs {
    /// Fill every missing entry from `fallback`.
    pub fn or(&self, fallback: &ScenarioInputs) -> ScenarioInputs {
        ScenarioInputs {
            demand: self.demand.clone().or_else(|| fallback.demand.clone()),
            capacity: self.capacity.clone().or_else(|| fallback.capacity.clone()),
            regions: self.regions.clone().or_else(|| fallback.regions.clone()),
            pois: self.pois.clone().or_else(|| fallback.pois.clone()),
            roads: self.roads.clone().or_else(|| fallback.roads.clone()),
        }
    }

    fn paths_mut(&mut self) -> [&mut Option<PathBuf>; 5] {
        [
            &mut self.demand,
            &mut self.capacity,
            &mut self.regions,
            &mut self.pois,
            &mut self.roads,
        ]
    }

    /// Make relative paths relative to `base`.
    pub fn rebase(&mut self, base: &Path) {
        for path in self.paths_mut().into_iter().flatten() {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    /// Names of the required inputs that are not set.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.demand.is_none() {
            missing.push("demand");
        }
        if self.regions.is_none() {
            missing.push("regions");
        }
        if self.pois.is_none() {
            missing.push("pois");
        }
        missing
    }

    pub fn demand(&self) -> Result<&Path> {
        self.demand.as_deref().ok_or_else(|| anyhow!("no demand raster configured"))
    }

    pub fn regions(&self) -> Result<&Path> {
        self.regions.as_deref().ok_or_else(|| anyhow!("no region layer configured"))
    }

    pub fn pois(&self) -> Result<&Path> {
        self.pois.as_deref().ok_or_else(|| anyhow!("no POI layer configured"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioDefaults {
    #[serde(default)]
    pub inputs: ScenarioInputs,
    #[serde(default = "default_site_threshold")]
    pub site_threshold: f64,
    /// `null` disables the early stop
    #[serde(default = "default_min_improvement")]
    pub min_improvement: Option<f64>,
    #[serde(default)]
    pub max_candidates: Option<usize>,
    #[serde(default)]
    pub save_intermediate: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

fn default_site_threshold() -> f64 {
    DEFAULT_SITE_THRESHOLD
}

fn default_min_improvement() -> Option<f64> {
    Some(0.0)
}

impl Default for ScenarioDefaults {
    fn default() -> Self {
        Self {
            inputs: ScenarioInputs::default(),
            site_threshold: default_site_threshold(),
            min_improvement: default_min_improvement(),
            max_candidates: None,
            save_intermediate: false,
            tags: Vec::new(),
            metadata: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioSpec {
    /// `<category>-<charger>`, e.g. `urban-lv2`
    pub scenario_id: String,
    pub description: Option<String>,
    /// Parsed from `scenario_id` when absent
    pub category: Option<SpatialCategory>,
    pub charger: Option<ChargerType>,
    /// Metres
    pub capture_range: Option<f64>,
    /// Metres
    pub bandwidth: Option<f64>,
    pub min_ports: Option<f64>,
    pub max_ports: Option<f64>,
    pub site_threshold: Option<f64>,
    pub min_improvement: Option<f64>,
    pub max_candidates: Option<usize>,
    #[serde(default)]
    pub inputs: Option<ScenarioInputs>,
    pub save_intermediate: Option<bool>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedScenario {
    pub scenario_id: String,
    pub description: Option<String>,
    pub category: SpatialCategory,
    pub charger: ChargerType,
    pub capture_range: Meters,
    pub bandwidth: Meters,
    pub bounds: PortBounds,
    pub site_threshold: f64,
    pub min_improvement: Option<f64>,
    pub max_candidates: Option<usize>,
    pub inputs: ScenarioInputs,
    pub save_intermediate: bool,
    pub tags: Vec<String>,
    pub metadata: HashMap<String, String>,
}

impl ScenarioSet {
    /// Make every relative input path relative to `base`.
    pub fn rebase_inputs(&mut self, base: &Path) {
        self.defaults.inputs.rebase(base);
        for scenario in &mut self.scenarios {
            if let Some(inputs) = scenario.inputs.as_mut() {
                inputs.rebase(base);
            }
        }
    }
}

pub fn scenario_id(category: SpatialCategory, charger: ChargerType) -> String {
    format!("{category}-{charger}")
}

/// The seven built-in scenarios with their category defaults.
pub fn builtin_scenario_set() -> ScenarioSet {
    let scenarios = BUILTIN_SCENARIOS
        .iter()
        .map(|&(category, charger)| ScenarioSpec {
            scenario_id: scenario_id(category, charger),
            category: Some(category),
            charger: Some(charger),
            ..ScenarioSpec::default()
        })
        .collect();
    ScenarioSet {
        version: Some(1),
        defaults: ScenarioDefaults::default(),
        scenarios,
    }
}

/// Load a scenario set from YAML or JSON.
///
/// Relative input paths are taken relative to the spec file.
pub fn load_spec_from_path(path: &Path) -> Result<ScenarioSet> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading scenario spec '{}'", path.display()))?;
    let mut set: ScenarioSet = match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
            serde_yaml::from_str(&data).context("parsing scenario spec yaml")?
        }
        Some(ext) if ext.eq_ignore_ascii_case("json") => {
            serde_json::from_str(&data).context("parsing scenario spec json")?
        }
        _ => serde_yaml::from_str(&data)
            .or_else(|_| serde_json::from_str(&data))
            .context("parsing scenario spec")?,
    };
    if let Some(base) = path.parent() {
        set.rebase_inputs(base);
    }
    Ok(set)
}

fn category_and_charger(scenario: &ScenarioSpec) -> Result<(SpatialCategory, ChargerType)> {
    let mut parts = scenario.scenario_id.splitn(2, '-');
    let from_id = (parts.next(), parts.next());
    let category = match (scenario.category, from_id.0) {
        (Some(c), _) => c,
        (None, Some(s)) => s.parse().with_context(|| {
            format!(
                "scenario '{}' has no category and its id does not start with one",
                scenario.scenario_id
            )
        })?,
        (None, None) => bail!("scenario '{}' has no category", scenario.scenario_id),
    };
    let charger = match (scenario.charger, from_id.1) {
        (Some(c), _) => c,
        (None, Some(s)) => s.parse().with_context(|| {
            format!(
                "scenario '{}' has no charger type and its id does not end with one",
                scenario.scenario_id
            )
        })?,
        (None, None) => bail!("scenario '{}' has no charger type", scenario.scenario_id),
    };
    Ok((category, charger))
}

fn resolve_one(scenario: &ScenarioSpec, defaults: &ScenarioDefaults) -> Result<ResolvedScenario> {
    let id = &scenario.scenario_id;
    let (category, charger) = category_and_charger(scenario)?;

    let capture_range = scenario.capture_range.unwrap_or(category.capture_range().value());
    let bandwidth = scenario.bandwidth.unwrap_or(category.bandwidth().value());
    if !(capture_range.is_finite() && capture_range > 0.0) {
        bail!("scenario '{id}': capture_range must be positive (got {capture_range})");
    }
    if !(bandwidth.is_finite() && bandwidth > 0.0) {
        bail!("scenario '{id}': bandwidth must be positive (got {bandwidth})");
    }
    if bandwidth >= capture_range {
        bail!(
            "scenario '{id}': bandwidth ({bandwidth}) must be smaller than capture_range ({capture_range})"
        );
    }

    let category_bounds = category.port_bounds();
    let bounds = PortBounds::new(
        scenario.min_ports.unwrap_or(category_bounds.min),
        scenario.max_ports.or(category_bounds.max),
    );
    bounds
        .validate()
        .with_context(|| format!("scenario '{id}': invalid port bounds"))?;

    let site_threshold = scenario.site_threshold.unwrap_or(defaults.site_threshold);
    if !(site_threshold.is_finite() && site_threshold > 0.0) {
        bail!("scenario '{id}': site_threshold must be positive (got {site_threshold})");
    }
    let min_improvement = scenario.min_improvement.or(defaults.min_improvement);
    if min_improvement.is_some_and(|m| !m.is_finite()) {
        bail!("scenario '{id}': min_improvement must be finite");
    }
    let max_candidates = scenario.max_candidates.or(defaults.max_candidates);
    if max_candidates == Some(0) {
        bail!("scenario '{id}': max_candidates must be at least 1");
    }

    let inputs = scenario
        .inputs
        .as_ref()
        .map_or_else(|| defaults.inputs.clone(), |i| i.or(&defaults.inputs));

    Ok(ResolvedScenario {
        scenario_id: id.clone(),
        description: scenario.description.clone(),
        category,
        charger,
        capture_range: Meters(capture_range),
        bandwidth: Meters(bandwidth),
        bounds,
        site_threshold,
        min_improvement,
        max_candidates,
        inputs,
        save_intermediate: scenario.save_intermediate.unwrap_or(defaults.save_intermediate),
        tags: scenario.tags.clone().unwrap_or_else(|| defaults.tags.clone()),
        metadata: scenario
            .metadata
            .clone()
            .unwrap_or_else(|| defaults.metadata.clone()),
    })
}

/// Apply defaults and check every scenario parameter, without requiring
/// input paths.
pub fn resolve_parameters(set: &ScenarioSet) -> Result<Vec<ResolvedScenario>> {
    if set.scenarios.is_empty() {
        return Err(anyhow!("scenario set contains no scenarios"));
    }
    let mut seen = HashSet::new();
    let mut resolved = Vec::with_capacity(set.scenarios.len());
    for scenario in &set.scenarios {
        if scenario.scenario_id.trim().is_empty() {
            return Err(anyhow!("scenario_id cannot be empty"));
        }
        if !seen.insert(scenario.scenario_id.clone()) {
            return Err(anyhow!(
                "duplicate scenario_id '{}' in spec",
                scenario.scenario_id
            ));
        }
        resolved.push(resolve_one(scenario, &set.defaults)?);
    }
    Ok(resolved)
}

/// Resolve every scenario and require its input layers.
pub fn resolve_scenarios(set: &ScenarioSet) -> Result<Vec<ResolvedScenario>> {
    let resolved = resolve_parameters(set)?;
    for scenario in &resolved {
        let missing = scenario.inputs.missing();
        if !missing.is_empty() {
            bail!(
                "scenario '{}' is missing input paths: {}",
                scenario.scenario_id,
                missing.join(", ")
            );
        }
    }
    Ok(resolved)
}

pub fn validate(set: &ScenarioSet) -> Result<()> {
    resolve_scenarios(set).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_inputs(mut set: ScenarioSet) -> ScenarioSet {
        set.defaults.inputs = ScenarioInputs {
            demand: Some("demand.asc".into()),
            regions: Some("regions.geojson".into()),
            pois: Some("pois.csv".into()),
            ..ScenarioInputs::default()
        };
        set
    }

    #[test]
    fn builtin_set_uses_category_defaults() {
        let resolved = resolve_scenarios(&with_inputs(builtin_scenario_set())).unwrap();
        let ids: Vec<_> = resolved.iter().map(|s| s.scenario_id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "urban-lv2",
                "urban-dcfc",
                "suburban-lv2",
                "suburban-dcfc",
                "rural-lv2",
                "rural-dcfc",
                "highway-dcfc"
            ]
        );
        let urban = &resolved[0];
        assert_eq!(urban.capture_range, Meters(3000.0));
        assert_eq!(urban.bandwidth, Meters(1000.0));
        assert_eq!(urban.bounds, PortBounds::new(2.0, Some(25.0)));
        let highway = &resolved[6];
        assert_eq!(highway.capture_range, Meters(4000.0));
        assert_eq!(highway.bounds.max, None);
        assert_eq!(highway.min_improvement, Some(0.0));
    }

    #[test]
    fn builtin_set_needs_inputs() {
        assert!(resolve_scenarios(&builtin_scenario_set()).is_err());
        assert_eq!(resolve_parameters(&builtin_scenario_set()).unwrap().len(), 7);
    }

    #[test]
    fn parses_yaml_overrides() {
        let yaml = r#"
version: 1
defaults:
  inputs:
    demand: maps/demand.asc
    regions: regions.geojson
    pois: pois.csv
  save_intermediate: true
  tags: [ga]
scenarios:
  - scenario_id: urban-lv2
    max_ports: 10
    min_improvement: 0.001
  - scenario_id: corridor
    category: highway
    charger: dcfc
    capture_range: 8000
    bandwidth: 3000
    inputs:
      pois: corridor_pois.geojson
"#;
        let set: ScenarioSet = serde_yaml::from_str(yaml).unwrap();
        let resolved = resolve_scenarios(&set).unwrap();
        assert_eq!(resolved[0].bounds, PortBounds::new(2.0, Some(10.0)));
        assert_eq!(resolved[0].min_improvement, Some(0.001));
        assert!(resolved[0].save_intermediate);
        assert_eq!(resolved[0].tags, vec!["ga"]);
        let corridor = &resolved[1];
        assert_eq!(corridor.category, SpatialCategory::Highway);
        assert_eq!(corridor.capture_range, Meters(8000.0));
        assert_eq!(corridor.inputs.pois, Some(PathBuf::from("corridor_pois.geojson")));
        assert_eq!(corridor.inputs.demand, Some(PathBuf::from("maps/demand.asc")));
    }

    #[test]
    fn rejects_invalid_scenarios() {
        let mut set = with_inputs(builtin_scenario_set());
        set.scenarios[0].bandwidth = Some(5000.0);
        assert!(resolve_scenarios(&set).is_err());

        let mut set = with_inputs(builtin_scenario_set());
        set.scenarios[1].scenario_id = "urban-lv2".into();
        assert!(resolve_scenarios(&set).is_err());

        let mut set = with_inputs(builtin_scenario_set());
        set.scenarios[2].min_ports = Some(5.0);
        set.scenarios[2].max_ports = Some(3.0);
        assert!(resolve_scenarios(&set).is_err());

        let mut set = with_inputs(builtin_scenario_set());
        set.scenarios.push(ScenarioSpec {
            scenario_id: "downtown".into(),
            ..ScenarioSpec::default()
        });
        assert!(resolve_scenarios(&set).is_err());
    }

    #[test]
    fn relative_inputs_follow_the_spec_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenarios.json");
        fs::write(
            &path,
            r#"{"defaults":{"inputs":{"demand":"demand.asc","regions":"/abs/regions.geojson","pois":"pois.csv"}},
                "scenarios":[{"scenario_id":"rural-lv2"}]}"#,
        )
        .unwrap();
        let set = load_spec_from_path(&path).unwrap();
        let resolved = resolve_scenarios(&set).unwrap();
        assert_eq!(resolved[0].inputs.demand, Some(dir.path().join("demand.asc")));
        assert_eq!(
            resolved[0].inputs.regions,
            Some(PathBuf::from("/abs/regions.geojson"))
        );
    }
}
