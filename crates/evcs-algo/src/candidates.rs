//! Candidate filtering, ranking and region planning.
//!
//! Planning turns regions plus the POI layer into the per-region inputs of
//! the optimizer: which POIs are eligible, which already host stations, how
//! many ports to distribute and how many sites the region may hold.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use evcs_core::{
    CandidateSource, ChargerType, EvcsError, EvcsResult, Meters, Poi, Raster, Region,
    SpatialCategory,
};

use crate::decay::gaussian_decay;

/// Default ports-per-site threshold used by [`site_budget`].
pub const DEFAULT_SITE_THRESHOLD: f64 = 4.0;

/// Eligible `fclass` values per (category, charger type).
///
/// A missing or empty set admits every class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidatePolicy {
    classes: HashMap<String, BTreeSet<String>>,
}

fn policy_key(category: SpatialCategory, charger: ChargerType) -> String {
    format!("{category}-{charger}")
}

const LV2_CLASSES: &[&str] = &[
    "supermarket",
    "mall",
    "department_store",
    "town_hall",
    "library",
    "community_centre",
    "hotel",
    "motel",
    "university",
    "college",
    "hospital",
    "car_dealership",
];

const DCFC_CLASSES: &[&str] = &[
    "fuel",
    "supermarket",
    "mall",
    "convenience",
    "fast_food",
    "restaurant",
    "hotel",
    "motel",
    "car_dealership",
];

const HIGHWAY_CLASSES: &[&str] = &[
    "fuel",
    "convenience",
    "fast_food",
    "restaurant",
    "motel",
    "hotel",
];

impl Default for CandidatePolicy {
    fn default() -> Self {
        let mut policy = Self::permissive();
        for category in SpatialCategory::ALL {
            let (lv2, dcfc) = match category {
                SpatialCategory::Highway => (HIGHWAY_CLASSES, HIGHWAY_CLASSES),
                _ => (LV2_CLASSES, DCFC_CLASSES),
            };
            policy = policy
                .with_classes(category, ChargerType::Lv2, lv2.iter().copied())
                .with_classes(category, ChargerType::Dcfc, dcfc.iter().copied());
        }
        policy
    }
}

impl CandidatePolicy {
    /// Policy that admits every class.
    pub fn permissive() -> Self {
        Self {
            classes: HashMap::new(),
        }
    }

    pub fn with_classes<I, S>(mut self, category: SpatialCategory, charger: ChargerType, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set = classes
            .into_iter()
            .map(|c| c.into().trim().to_ascii_lowercase())
            .collect();
        self.classes.insert(policy_key(category, charger), set);
        self
    }

    pub fn classes(&self, category: SpatialCategory, charger: ChargerType) -> Option<&BTreeSet<String>> {
        self.classes.get(&policy_key(category, charger))
    }

    pub fn admits(&self, category: SpatialCategory, charger: ChargerType, fclass: &str) -> bool {
        match self.classes(category, charger) {
            Some(set) if !set.is_empty() => set.contains(&fclass.trim().to_ascii_lowercase()),
            _ => true,
        }
    }
}

/// POIs whose class is eligible for the scenario.
pub fn filter_candidates(
    pois: &[Poi],
    policy: &CandidatePolicy,
    category: SpatialCategory,
    charger: ChargerType,
) -> Vec<Poi> {
    pois.iter()
        .filter(|poi| policy.admits(category, charger, &poi.fclass))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub poi: Poi,
    /// Gaussian-weighted demand within the capture range
    pub score: f64,
}

/// Gaussian-weighted demand around `poi`.
pub fn demand_score(poi: &Poi, demand: &Raster, bandwidth: Meters, capture_range: Meters) -> f64 {
    demand
        .points_within(poi.coord(), capture_range)
        .iter()
        .map(|p| {
            let d = evcs_core::geometry::distance(p.coord(), poi.coord());
            p.demand * gaussian_decay(d, bandwidth, capture_range)
        })
        .sum()
}

/// Score candidates by nearby demand and sort best first.
///
/// Equal scores are ordered by `osm_id`. `limit` keeps only the top entries.
pub fn rank_candidates(
    candidates: &[Poi],
    demand: &Raster,
    bandwidth: Meters,
    capture_range: Meters,
    limit: Option<usize>,
) -> Vec<RankedCandidate> {
    let mut ranked: Vec<RankedCandidate> = candidates
        .par_iter()
        .map(|poi| RankedCandidate {
            score: demand_score(poi, demand, bandwidth, capture_range),
            poi: poi.clone(),
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.poi.osm_id.cmp(&b.poi.osm_id))
    });
    if let Some(limit) = limit {
        ranked.truncate(limit);
    }
    ranked
}

/// Site budget `p` for a region.
///
/// One site when there is a single candidate or the supply does not exceed
/// `threshold`; otherwise one site per `threshold` ports, at least two.
/// Never more than the number of candidates.
pub fn site_budget(candidate_count: usize, total_supply: f64, threshold: f64) -> usize {
    if candidate_count == 0 {
        return 0;
    }
    let p = if candidate_count == 1 || total_supply <= threshold {
        1
    } else {
        ((total_supply / threshold).floor() as usize).max(2)
    };
    p.min(candidate_count)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanKind {
    /// Single-site region: existing stations are kept as they are
    Mclp,
    /// Multi-site region handled by the greedy selector
    Greedy,
}

impl PlanKind {
    pub fn for_budget(max_sites: usize) -> Self {
        if max_sites > 1 {
            PlanKind::Greedy
        } else {
            PlanKind::Mclp
        }
    }
}

/// Planning output for one region.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionPlan {
    /// The region with `total_supply`, `max_sites` and initial ids filled in
    pub region: Region,
    pub kind: PlanKind,
    pub candidates: Vec<Poi>,
    pub initial_count: usize,
    pub source: CandidateSource,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CandidatePlan {
    pub regions: Vec<RegionPlan>,
    /// Regions dropped during planning, with the reason
    pub skipped: Vec<(String, String)>,
}

impl CandidatePlan {
    pub fn of_kind(&self, kind: PlanKind) -> impl Iterator<Item = &RegionPlan> {
        self.regions.iter().filter(move |r| r.kind == kind)
    }

    /// Every planned candidate once, in region order.
    pub fn candidates(&self) -> Vec<Poi> {
        let mut seen = HashSet::new();
        self.regions
            .iter()
            .flat_map(|r| r.candidates.iter())
            .filter(|poi| seen.insert(poi.osm_id.clone()))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanConfig {
    pub category: SpatialCategory,
    pub charger: ChargerType,
    pub policy: CandidatePolicy,
    pub site_threshold: f64,
    /// Keep at most this many ranked candidates per region
    pub max_candidates: Option<usize>,
    pub bandwidth: Meters,
    pub capture_range: Meters,
}

impl PlanConfig {
    pub fn new(category: SpatialCategory, charger: ChargerType) -> Self {
        Self {
            category,
            charger,
            policy: CandidatePolicy::default(),
            site_threshold: DEFAULT_SITE_THRESHOLD,
            max_candidates: None,
            bandwidth: category.bandwidth(),
            capture_range: category.capture_range(),
        }
    }
}

/// Layers consumed by [`plan_regions`].
#[derive(Debug, Clone, Copy)]
pub struct PlanInputs<'a> {
    pub regions: &'a [Region],
    pub pois: &'a [Poi],
    /// Road-derived points used when a DCFC region has no eligible POI
    pub roads: &'a [Poi],
    /// Aggregated when a region has no projected port count
    pub capacity: Option<&'a Raster>,
    /// Enables ranking and `max_candidates` truncation
    pub demand: Option<&'a Raster>,
}

fn resolve_supply(region: &Region, charger: ChargerType, capacity: Option<&Raster>) -> Option<f64> {
    if let Some(total) = region.total_supply {
        return Some(total);
    }
    if let Some(ports) = region.projected_ports(charger) {
        return Some(ports);
    }
    capacity.map(|map| map.sum_within(&region.geometry).round())
}

/// Plan every region for one scenario.
pub fn plan_regions(inputs: PlanInputs<'_>, config: &PlanConfig) -> EvcsResult<CandidatePlan> {
    if config.site_threshold <= 0.0 {
        return Err(EvcsError::Config(format!(
            "site threshold must be positive (got {})",
            config.site_threshold
        )));
    }
    let eligible = filter_candidates(inputs.pois, &config.policy, config.category, config.charger);
    let mut plan = CandidatePlan::default();

    for region in inputs.regions {
        let Some(total_supply) = resolve_supply(region, config.charger, inputs.capacity) else {
            warn!(region = %region.id, "no {} port count or capacity map; skipping", config.charger);
            plan.skipped.push((region.id.clone(), "no projected port count".into()));
            continue;
        };
        if total_supply <= 0.0 {
            debug!(region = %region.id, "zero projected ports; skipping");
            plan.skipped.push((region.id.clone(), "zero projected ports".into()));
            continue;
        }

        let initial: Vec<&Poi> = inputs
            .pois
            .iter()
            .filter(|poi| poi.ports_for(config.charger).is_some_and(|n| n > 0.0))
            .filter(|poi| region.contains(poi.coord()))
            .collect();

        let mut source = CandidateSource::Poi;
        let mut pool: Vec<Poi> = eligible
            .iter()
            .filter(|poi| region.contains(poi.coord()))
            .cloned()
            .collect();
        if pool.is_empty() && config.charger == ChargerType::Dcfc {
            pool = inputs
                .roads
                .iter()
                .filter(|p| region.contains(p.coord()))
                .cloned()
                .collect();
            if !pool.is_empty() {
                debug!(region = %region.id, roads = pool.len(), "falling back to road candidates");
                source = CandidateSource::Road;
            }
        }

        if let (Some(demand), Some(limit)) = (inputs.demand, config.max_candidates) {
            pool = rank_candidates(&pool, demand, config.bandwidth, config.capture_range, Some(limit))
                .into_iter()
                .map(|r| r.poi)
                .collect();
        }

        // existing stations always stay in the candidate pool
        let mut seen: HashSet<String> = pool.iter().map(|p| p.osm_id.clone()).collect();
        for poi in &initial {
            if seen.insert(poi.osm_id.clone()) {
                pool.push((*poi).clone());
            }
        }

        if pool.is_empty() {
            warn!(region = %region.id, "no candidate sites; skipping");
            plan.skipped.push((region.id.clone(), "no candidate sites".into()));
            continue;
        }

        let max_sites = site_budget(pool.len(), total_supply, config.site_threshold);
        let kind = PlanKind::for_budget(max_sites);
        let mut planned = region.clone();
        planned.total_supply = Some(total_supply);
        planned.max_sites = Some(max_sites);
        planned.initial_osm_ids = initial.iter().map(|p| p.osm_id.clone()).collect();

        debug!(
            region = %region.id,
            total_supply,
            candidates = pool.len(),
            initial = initial.len(),
            p = max_sites,
            ?kind,
            "planned region"
        );
        plan.regions.push(RegionPlan {
            region: planned,
            kind,
            initial_count: initial.len(),
            candidates: pool,
            source,
        });
    }

    info!(
        scenario = %format!("{}-{}", config.category, config.charger),
        greedy = plan.of_kind(PlanKind::Greedy).count(),
        mclp = plan.of_kind(PlanKind::Mclp).count(),
        skipped = plan.skipped.len(),
        "candidate planning complete"
    );
    Ok(plan)
}
