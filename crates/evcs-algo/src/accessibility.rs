//! Two-Step Floating Catchment Area (2SFCA) accessibility.
//!
//! For demand points `i` with demand `Dᵢ` and candidate sites `j` with
//! supply `Sⱼ`, and Gaussian-decayed weights `Fᵢⱼ`:
//!
//! ```text
//! Step 1 (supply side):  Rⱼ = Sⱼ / Σᵢ Dᵢ·Fᵢⱼ
//! Step 2 (demand side):  Aᵢ = Σⱼ Fᵢⱼ·Rⱼ
//! ```
//!
//! Writing `Gⱼ = 1 / Σᵢ Dᵢ·Fᵢⱼ` and `W = F·diag(G)` gives `A = W·S`, which is
//! linear in the supply vector. The capacity QP exploits that.
//!
//! The reference level is the regional mean `Ā = ΣS / ΣD`: when every
//! site has demand in range, `Σᵢ Dᵢ·Aᵢ = ΣS`, so `Ā` is the demand-weighted
//! mean accessibility. Equity is measured by the demand-weighted RMS
//! deviation `Â = sqrt(Σ Dᵢ (Aᵢ − Ā)² / ΣD)`.
//!
//! Reference: Li, Wang, Kwan, Chen & Wang (2022), "Equalizing the spatial
//! accessibility of emergency medical services in Shanghai: A trade-off
//! perspective", CEUS 92, 101745.

use evcs_core::{EvcsError, EvcsResult, Meters};
use serde::{Deserialize, Serialize};

use crate::decay::decay_matrix;

/// Summary statistics of an accessibility vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccessibilityMetrics {
    /// Demand-weighted RMS deviation from `Ā`
    pub a_hat: f64,
    pub min_ai: f64,
    pub max_ai: f64,
    /// Maximum absolute deviation from `Ā`
    pub md: f64,
    /// Demand-weighted mean absolute deviation from `Ā`
    pub mad: f64,
    /// Coefficient of variation `Â / Ā`
    pub cv: f64,
    /// Demand-weighted Gini coefficient
    pub gini: f64,
}

/// Precomputed 2SFCA model for one region.
#[derive(Debug, Clone)]
pub struct TwoStepFca {
    distances: Vec<Vec<f64>>,
    decay: Vec<Vec<f64>>,
    demand: Vec<f64>,
    total_demand: f64,
    total_supply: f64,
    a_bar: f64,
    capture_range: Meters,
    num_sites: usize,
}

impl TwoStepFca {
    /// Build the model from a `demand × sites` distance matrix.
    pub fn new(
        distances: Vec<Vec<f64>>,
        demand: Vec<f64>,
        total_supply: f64,
        bandwidth: Meters,
        capture_range: Meters,
    ) -> EvcsResult<Self> {
        if demand.is_empty() {
            return Err(EvcsError::EmptyInput("no demand points".into()));
        }
        if distances.len() != demand.len() {
            return Err(EvcsError::Validation(format!(
                "distance matrix has {} rows but there are {} demand points",
                distances.len(),
                demand.len()
            )));
        }
        let num_sites = distances[0].len();
        if distances.iter().any(|row| row.len() != num_sites) {
            return Err(EvcsError::Validation(
                "distance matrix rows have inconsistent lengths".into(),
            ));
        }
        if demand.iter().any(|d| !d.is_finite() || *d < 0.0) {
            return Err(EvcsError::Validation(
                "demand values must be finite and non-negative".into(),
            ));
        }
        if !(bandwidth.value() > 0.0 && capture_range.value() > 0.0) {
            return Err(EvcsError::Validation(format!(
                "bandwidth ({bandwidth}) and capture range ({capture_range}) must be positive"
            )));
        }
        if !(total_supply.is_finite() && total_supply >= 0.0) {
            return Err(EvcsError::Validation(format!(
                "total supply must be finite and non-negative (got {total_supply})"
            )));
        }
        let total_demand: f64 = demand.iter().sum();
        if total_demand <= 0.0 {
            return Err(EvcsError::EmptyInput("total demand is zero".into()));
        }
        let decay = decay_matrix(&distances, bandwidth, capture_range);
        Ok(Self {
            distances,
            decay,
            demand,
            total_demand,
            total_supply,
            a_bar: total_supply / total_demand,
            capture_range,
            num_sites,
        })
    }

    pub fn num_demand_points(&self) -> usize {
        self.demand.len()
    }

    pub fn num_sites(&self) -> usize {
        self.num_sites
    }

    pub fn demand(&self) -> &[f64] {
        &self.demand
    }

    pub fn total_demand(&self) -> f64 {
        self.total_demand
    }

    pub fn total_supply(&self) -> f64 {
        self.total_supply
    }

    /// Average supply per unit of demand, `Ā`.
    pub fn a_bar(&self) -> f64 {
        self.a_bar
    }

    pub fn capture_range(&self) -> Meters {
        self.capture_range
    }

    fn check_sites(&self, sites: &[usize]) -> EvcsResult<()> {
        if let Some(bad) = sites.iter().find(|j| **j >= self.num_sites) {
            return Err(EvcsError::Validation(format!(
                "site index {bad} out of range ({} candidate sites)",
                self.num_sites
            )));
        }
        Ok(())
    }

    /// `Gⱼ = 1 / Σᵢ Dᵢ·Fᵢⱼ` for each site.
    ///
    /// A site with no demand inside its catchment has no finite ratio and
    /// is rejected.
    pub fn site_ratios(&self, sites: &[usize]) -> EvcsResult<Vec<f64>> {
        self.check_sites(sites)?;
        sites
            .iter()
            .map(|&j| {
                let served: f64 = self
                    .decay
                    .iter()
                    .zip(&self.demand)
                    .map(|(row, d)| row[j] * d)
                    .sum();
                if served > 0.0 {
                    Ok(1.0 / served)
                } else {
                    Err(EvcsError::Solver(format!(
                        "candidate site {j} has no demand within the capture range"
                    )))
                }
            })
            .collect()
    }

    /// The `demand × sites` matrix `W = F[:, sites]·diag(G)`.
    pub fn weights(&self, sites: &[usize]) -> EvcsResult<Vec<Vec<f64>>> {
        let ratios = self.site_ratios(sites)?;
        Ok(self
            .decay
            .iter()
            .map(|row| {
                sites
                    .iter()
                    .zip(&ratios)
                    .map(|(&j, g)| row[j] * g)
                    .collect()
            })
            .collect())
    }

    /// Accessibility at every demand point for `supply` placed at `sites`.
    pub fn accessibility(&self, sites: &[usize], supply: &[f64]) -> EvcsResult<Vec<f64>> {
        if sites.len() != supply.len() {
            return Err(EvcsError::Validation(format!(
                "{} sites but {} supply values",
                sites.len(),
                supply.len()
            )));
        }
        let weights = self.weights(sites)?;
        Ok(apply_weights(&weights, supply))
    }

    pub fn a_hat(&self, ai: &[f64]) -> f64 {
        let weighted: f64 = ai
            .iter()
            .zip(&self.demand)
            .map(|(a, d)| (a - self.a_bar).powi(2) * d)
            .sum();
        (weighted / self.total_demand).sqrt()
    }

    pub fn metrics(&self, ai: &[f64]) -> AccessibilityMetrics {
        let a_hat = self.a_hat(ai);
        let min_ai = ai.iter().copied().fold(f64::INFINITY, f64::min);
        let max_ai = ai.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let md = ai
            .iter()
            .map(|a| (a - self.a_bar).abs())
            .fold(0.0, f64::max);
        let mad = ai
            .iter()
            .zip(&self.demand)
            .map(|(a, d)| (a - self.a_bar).abs() * d)
            .sum::<f64>()
            / self.total_demand;
        let cv = if self.a_bar > 0.0 {
            a_hat / self.a_bar
        } else {
            0.0
        };
        AccessibilityMetrics {
            a_hat,
            min_ai,
            max_ai,
            md,
            mad,
            cv,
            gini: weighted_gini(ai, &self.demand),
        }
    }

    /// Percentage of demand within the capture range (inclusive) of at
    /// least one of `sites`.
    pub fn coverage(&self, sites: &[usize]) -> f64 {
        let covered: f64 = self
            .distances
            .iter()
            .zip(&self.demand)
            .filter(|(row, _)| {
                sites
                    .iter()
                    .any(|&j| row.get(j).is_some_and(|d| *d <= self.capture_range.value()))
            })
            .map(|(_, d)| d)
            .sum();
        covered / self.total_demand * 100.0
    }
}

pub(crate) fn apply_weights(weights: &[Vec<f64>], supply: &[f64]) -> Vec<f64> {
    weights
        .iter()
        .map(|row| row.iter().zip(supply).map(|(w, s)| w * s).sum())
        .collect()
}

/// Demand-weighted Gini coefficient from the Lorenz curve of `values`.
///
/// With cumulative demand shares `P` and cumulative value shares `T`
/// sorted by value, `G = Σₖ (Pₖ₋₁·Tₖ − Tₖ₋₁·Pₖ)`.
///
/// Traces computed as `1 + Σ PₖTₖ₊₁ − Σ TₖPₖ₊₁` report `1 + G`.
pub fn weighted_gini(values: &[f64], weights: &[f64]) -> f64 {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|a, b| values[*a].total_cmp(&values[*b]));

    let total_weight: f64 = weights.iter().sum();
    let total_mass: f64 = order.iter().map(|&i| values[i] * weights[i]).sum();
    if total_weight <= 0.0 || total_mass == 0.0 {
        return 0.0;
    }

    let mut p_prev = 0.0;
    let mut t_prev = 0.0;
    let mut gini = 0.0;
    let (mut p_acc, mut t_acc) = (0.0, 0.0);
    for &i in &order {
        p_acc += weights[i];
        t_acc += values[i] * weights[i];
        let p = p_acc / total_weight;
        let t = t_acc / total_mass;
        gini += p_prev * t - t_prev * p;
        p_prev = p;
        t_prev = t;
    }
    gini
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two demand points 1 km apart on a line, two sites on top of them.
    fn line_model() -> TwoStepFca {
        let distances = vec![vec![0.0, 1000.0], vec![1000.0, 0.0]];
        TwoStepFca::new(
            distances,
            vec![10.0, 30.0],
            8.0,
            Meters(1000.0),
            Meters(3000.0),
        )
        .unwrap()
    }

    #[test]
    fn a_bar_is_supply_over_demand() {
        let m = line_model();
        assert!((m.a_bar() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn demand_weighted_accessibility_sums_to_supply() {
        let m = line_model();
        let ai = m.accessibility(&[0, 1], &[3.0, 5.0]).unwrap();
        let weighted: f64 = ai.iter().zip(m.demand()).map(|(a, d)| a * d).sum();
        assert!((weighted - 8.0).abs() < 1e-9);
        assert!(ai.iter().all(|a| *a >= 0.0));
    }

    #[test]
    fn single_site_matches_hand_computation() {
        let m = line_model();
        let f = (-0.5f64).exp();
        let served = 10.0 + 30.0 * f;
        let ai = m.accessibility(&[0], &[8.0]).unwrap();
        assert!((ai[0] - 8.0 / served).abs() < 1e-12);
        assert!((ai[1] - 8.0 * f / served).abs() < 1e-12);
    }

    #[test]
    fn site_without_demand_in_range_is_rejected() {
        let distances = vec![vec![0.0, 5000.0]];
        let m = TwoStepFca::new(distances, vec![1.0], 1.0, Meters(1000.0), Meters(3000.0)).unwrap();
        assert!(matches!(m.site_ratios(&[1]), Err(EvcsError::Solver(_))));
        assert!(matches!(m.site_ratios(&[2]), Err(EvcsError::Validation(_))));
    }

    #[test]
    fn uniform_accessibility_has_zero_spread() {
        let m = line_model();
        let ai = vec![m.a_bar(); 2];
        let metrics = m.metrics(&ai);
        assert!(metrics.a_hat.abs() < 1e-12);
        assert!(metrics.md.abs() < 1e-12);
        assert!(metrics.gini.abs() < 1e-12);
        assert!(metrics.cv.abs() < 1e-12);
    }

    #[test]
    fn gini_of_two_point_extreme() {
        // half the demand gets everything
        let g = weighted_gini(&[0.0, 1.0], &[1.0, 1.0]);
        assert!((g - 0.5).abs() < 1e-12);
    }

    #[test]
    fn coverage_counts_inclusive_range() {
        let distances = vec![vec![3000.0], vec![3000.1]];
        let m = TwoStepFca::new(
            distances,
            vec![1.0, 3.0],
            1.0,
            Meters(1000.0),
            Meters(3000.0),
        )
        .unwrap();
        assert!((m.coverage(&[0]) - 25.0).abs() < 1e-12);
        assert_eq!(m.coverage(&[]), 0.0);
    }

    #[test]
    fn rejects_empty_and_ragged_inputs() {
        assert!(TwoStepFca::new(vec![], vec![], 1.0, Meters(1.0), Meters(2.0)).is_err());
        let ragged = vec![vec![0.0, 1.0], vec![0.0]];
        assert!(TwoStepFca::new(ragged, vec![1.0, 1.0], 1.0, Meters(1.0), Meters(2.0)).is_err());
    }
}
