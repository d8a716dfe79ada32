//! Greedy station siting.
//!
//! Starting from the QP allocation over the existing stations, each step
//! tries every remaining candidate, solves the capacity QP for
//! `selected ∪ {candidate}`, and keeps the candidate whose optimal allocation
//! gives the lowest `Â`. Candidate evaluations are independent and run on
//! the rayon pool.
//!
//! The loop stops when the site budget is reached, when no candidate admits
//! a feasible allocation, or when the best step improves `Â` by less than
//! `min_improvement` (that step is discarded). With a non-negative
//! threshold the recorded `Â` sequence is non-increasing.
//!
//! Existing stations that admit no allocation within the port bounds are a
//! solver error unless a later step finds a feasible extension.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use evcs_core::{EvcsError, EvcsResult};

use crate::accessibility::AccessibilityMetrics;
use crate::capacity::{CapacityAllocation, CapacityOptimizer};
use crate::ports::round_to_ports;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GreedyConfig {
    /// Site budget `p`, including existing stations
    pub max_sites: usize,
    /// Smallest accepted drop in `Â`; `None` disables the check
    pub min_improvement: Option<f64>,
    /// Keep per-step supply/accessibility snapshots
    pub keep_snapshots: bool,
}

impl GreedyConfig {
    pub fn new(max_sites: usize) -> Self {
        Self {
            max_sites,
            min_improvement: Some(0.0),
            keep_snapshots: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    BudgetReached,
    CandidatesExhausted,
    NoFeasibleCandidate,
    BelowImprovement,
}

/// One accepted greedy step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Number of sites after this step
    pub step: usize,
    /// Candidate index added in this step
    pub selected_site: usize,
    pub a_hat: f64,
    pub min_ai: f64,
    pub max_ai: f64,
    pub md: f64,
    pub mad: f64,
    pub cv: f64,
    pub gini: f64,
    /// Percentage of demand within range of the selected set
    pub coverage: f64,
}

/// Supply over every candidate and accessibility over every demand point
/// after a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSnapshot {
    pub step: usize,
    pub supply: Vec<f64>,
    pub ai: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GreedyOutcome {
    /// Candidate indices in selection order (existing stations first)
    pub selected: Vec<usize>,
    /// Continuous supply aligned with `selected`
    pub supply: Vec<f64>,
    /// Whole ports aligned with `selected`
    pub ports: Vec<u32>,
    pub ai: Vec<f64>,
    pub metrics: Option<AccessibilityMetrics>,
    pub coverage: f64,
    pub initial_count: usize,
    pub steps: Vec<StepRecord>,
    pub snapshots: Vec<StepSnapshot>,
    pub termination: Termination,
}

pub struct GreedySelector<'a> {
    optimizer: &'a CapacityOptimizer,
    config: GreedyConfig,
}

impl<'a> GreedySelector<'a> {
    pub fn new(optimizer: &'a CapacityOptimizer, config: GreedyConfig) -> Self {
        Self { optimizer, config }
    }

    /// Evaluate adding each of `remaining` to `selected`, in parallel.
    ///
    /// Returns the best allocation; ties keep the earliest candidate.
    fn best_extension(&self, selected: &[usize], remaining: &[usize]) -> Option<CapacityAllocation> {
        let results: Vec<(usize, EvcsResult<CapacityAllocation>)> = remaining
            .par_iter()
            .map(|&candidate| {
                let mut sites = Vec::with_capacity(selected.len() + 1);
                sites.extend_from_slice(selected);
                sites.push(candidate);
                (candidate, self.optimizer.optimize(&sites))
            })
            .collect();

        let mut best: Option<CapacityAllocation> = None;
        for (candidate, result) in results {
            match result {
                Ok(alloc) if alloc.a_hat.is_finite() => {
                    if best.as_ref().map_or(true, |b| alloc.a_hat < b.a_hat) {
                        best = Some(alloc);
                    }
                }
                Ok(_) => debug!(candidate, "non-finite A_hat"),
                Err(err) => debug!(candidate, %err, "candidate rejected"),
            }
        }
        best
    }

    pub fn run(&self, initial_sites: &[usize]) -> EvcsResult<GreedyOutcome> {
        let model = self.optimizer.model();
        let n = model.num_sites();

        let mut selected: Vec<usize> = Vec::new();
        for &site in initial_sites {
            if site < n && !selected.contains(&site) {
                selected.push(site);
            }
        }
        let initial_count = selected.len();
        let mut remaining: Vec<usize> = (0..n).filter(|j| !selected.contains(j)).collect();

        let mut baseline_err = None;
        let mut current = if selected.is_empty() {
            None
        } else {
            match self.optimizer.optimize(&selected) {
                Ok(alloc) => Some(alloc),
                Err(err) => {
                    warn!(%err, "existing stations admit no allocation");
                    baseline_err = Some(err);
                    None
                }
            }
        };
        let mut prev_a_hat = current.as_ref().map_or(f64::INFINITY, |a| a.a_hat);

        info!(
            total_supply = model.total_supply(),
            a_bar = format_args!("{:.4}", model.a_bar()),
            initial_sites = initial_count,
            initial_coverage = format_args!("{:.2}%", model.coverage(&selected)),
            max_sites = self.config.max_sites,
            "starting greedy selection"
        );

        let mut steps = Vec::new();
        let mut snapshots = Vec::new();
        let mut termination = Termination::BudgetReached;

        for step in (initial_count + 1)..=self.config.max_sites {
            if remaining.is_empty() {
                termination = Termination::CandidatesExhausted;
                break;
            }
            let Some(best) = self.best_extension(&selected, &remaining) else {
                warn!(step, "no candidate admits a feasible allocation; stopping early");
                termination = Termination::NoFeasibleCandidate;
                break;
            };
            if let Some(threshold) = self.config.min_improvement {
                if prev_a_hat.is_finite() && prev_a_hat - best.a_hat < threshold {
                    info!(
                        step,
                        previous = prev_a_hat,
                        best = best.a_hat,
                        "improvement below threshold; stopping"
                    );
                    termination = Termination::BelowImprovement;
                    break;
                }
            }

            let site = best.sites[best.sites.len() - 1];
            selected.push(site);
            remaining.retain(|j| *j != site);

            let coverage = model.coverage(&selected);
            let m = model.metrics(&best.ai);
            info!(
                "Selecting site {:2}/{:2} | Selected Site: {:3} | A_hat: {:.5} | Coverage: {:6.2}%",
                step, self.config.max_sites, site, best.a_hat, coverage
            );
            steps.push(StepRecord {
                step,
                selected_site: site,
                a_hat: best.a_hat,
                min_ai: m.min_ai,
                max_ai: m.max_ai,
                md: m.md,
                mad: m.mad,
                cv: m.cv,
                gini: m.gini,
                coverage,
            });
            if self.config.keep_snapshots {
                let mut supply = vec![0.0; n];
                for (j, s) in best.sites.iter().zip(&best.supply) {
                    supply[*j] = *s;
                }
                snapshots.push(StepSnapshot {
                    step,
                    supply,
                    ai: best.ai.clone(),
                });
            }
            prev_a_hat = best.a_hat;
            current = Some(best);
        }

        let (supply, ai) = match (current, baseline_err) {
            (Some(alloc), _) => (alloc.supply, alloc.ai),
            (None, Some(err)) => {
                return Err(EvcsError::Solver(format!(
                    "existing stations {selected:?} cannot share {} ports: {err}",
                    model.total_supply()
                )))
            }
            (None, None) => (Vec::new(), Vec::new()),
        };
        let metrics = (!ai.is_empty()).then(|| model.metrics(&ai));
        let ports = round_to_ports(&supply, self.optimizer.bounds());

        Ok(GreedyOutcome {
            coverage: model.coverage(&selected),
            selected,
            supply,
            ports,
            ai,
            metrics,
            initial_count,
            steps,
            snapshots,
            termination,
        })
    }
}
