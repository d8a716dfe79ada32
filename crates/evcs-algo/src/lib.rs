//! # evcs-algo: Siting and Sizing Algorithms
//!
//! The three pipeline stages on top of [`evcs_core`]:
//!
//! | Stage | Module | Output |
//! |-------|--------|--------|
//! | 1. Mapping | [`mapping`] | Demand and capacity rasters |
//! | 2. Candidates | [`candidates`] | Per-region candidate sets, supply and site budget |
//! | 3. Optimization | [`greedy`], [`capacity`] | Station sites and port counts |
//!
//! ## Accessibility Model
//!
//! [`TwoStepFca`] implements the Two-Step Floating Catchment Area model with
//! Gaussian distance decay ([`decay`]). Accessibility is linear in supply,
//! which makes the equity objective `Â` a convex quadratic.
//!
//! ## Optimization
//!
//! - [`CapacityOptimizer`]: Clarabel QP distributing a fixed number of ports
//!   over a fixed site set to minimise `Â` under per-site bounds
//! - [`GreedySelector`]: adds one site per step, evaluating every remaining
//!   candidate in parallel with rayon
//! - [`round_to_ports`]: whole-port rounding that keeps the bounds
//!
//! ## Example
//!
//! ```ignore
//! use evcs_algo::{optimize_region, OptimizeParams, PlanKind, RegionProblem};
//! use evcs_core::{ChargerType, SpatialCategory};
//!
//! let problem = RegionProblem::prepare(&region, &demand, &pois, capture_range)?;
//! let params = OptimizeParams::new(SpatialCategory::Urban, ChargerType::Lv2);
//! let outcome = optimize_region(problem, PlanKind::Greedy, &params)?;
//! for station in outcome.stations() {
//!     println!("{} -> {} ports", station.osm_id, station.ports);
//! }
//! ```

pub mod accessibility;
pub mod candidates;
pub mod capacity;
pub mod decay;
pub mod greedy;
pub mod mapping;
pub mod optimize;
pub mod ports;
pub mod problem;

pub use accessibility::{weighted_gini, AccessibilityMetrics, TwoStepFca};
pub use candidates::{
    filter_candidates, plan_regions, rank_candidates, site_budget, CandidatePlan, CandidatePolicy,
    PlanConfig, PlanInputs, PlanKind, RankedCandidate, RegionPlan, DEFAULT_SITE_THRESHOLD,
};
pub use capacity::{CapacityAllocation, CapacityOptimizer};
pub use decay::gaussian_decay;
pub use greedy::{GreedyConfig, GreedyOutcome, GreedySelector, StepRecord, StepSnapshot, Termination};
pub use mapping::{CapacityMapBuilder, DemandMapBuilder, LayerWeights};
pub use optimize::{optimize_region, OptimizeParams, RegionOutcome, SelectedStation};
pub use ports::round_to_ports;
pub use problem::RegionProblem;
