//! Quadratic-programming port allocation over a fixed site set.
//!
//! With `A = W·x` (see [`crate::accessibility`]), the demand-weighted
//! squared deviation of accessibility from `Ā` is
//!
//! ```text
//! Σᵢ Dᵢ (Aᵢ − Ā)² = xᵀ(WᵀDW)x − 2(WᵀDĀ)ᵀx + const
//! ```
//!
//! so minimising `Â` over supply vectors is the convex QP
//!
//! ```text
//! minimize    ½ xᵀ (WᵀDW + εI) x − (WᵀDĀ)ᵀ x
//! subject to  Σⱼ xⱼ = total_supply
//!             min ≤ xⱼ ≤ max
//! ```
//!
//! `WᵀDW` is PSD but can be near-singular when catchments overlap heavily;
//! the `εI` ridge keeps the KKT system well conditioned.
//!
//! ## Solver Backend
//!
//! Clarabel solves `min ½xᵀPx + qᵀx  s.t.  Ax + s = b, s ∈ K`. The sum
//! constraint goes in a zero cone, the bounds in a non-negative cone:
//!
//! ```text
//! row 0           :  Σ xⱼ + s = T           s ∈ {0}
//! rows 1..=n      : −xⱼ   + s = −min        s ≥ 0
//! rows n+1..=2n   :  xⱼ   + s =  max        s ≥ 0   (only with an upper bound)
//! ```

use clarabel::{
    algebra::CscMatrix,
    solver::{DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT},
};
use evcs_core::{EvcsError, EvcsResult, PortBounds};
use serde::{Deserialize, Serialize};

use crate::accessibility::{apply_weights, TwoStepFca};

/// Diagonal regularisation added to `WᵀDW`.
pub const RIDGE_EPSILON: f64 = 1e-8;

/// Optimal supply for one site set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityAllocation {
    /// Candidate indices, in the order supply is reported
    pub sites: Vec<usize>,
    pub supply: Vec<f64>,
    /// Accessibility at each demand point
    pub ai: Vec<f64>,
    pub a_hat: f64,
    pub iterations: u32,
}

impl CapacityAllocation {
    pub fn total_supply(&self) -> f64 {
        self.supply.iter().sum()
    }
}

/// QP allocator bound to one region's 2SFCA model.
#[derive(Debug, Clone)]
pub struct CapacityOptimizer {
    model: TwoStepFca,
    bounds: PortBounds,
}

impl CapacityOptimizer {
    pub fn new(model: TwoStepFca, bounds: PortBounds) -> EvcsResult<Self> {
        bounds.validate()?;
        Ok(Self { model, bounds })
    }

    pub fn model(&self) -> &TwoStepFca {
        &self.model
    }

    pub fn bounds(&self) -> PortBounds {
        self.bounds
    }

    /// Solve the allocation QP for `sites`.
    pub fn optimize(&self, sites: &[usize]) -> EvcsResult<CapacityAllocation> {
        if sites.is_empty() {
            return Err(EvcsError::Validation(
                "capacity allocation needs at least one site".into(),
            ));
        }
        let n = sites.len();
        let total = self.model.total_supply();
        if !self.bounds.admits(n, total) {
            return Err(EvcsError::Solver(format!(
                "{n} sites cannot share {total} ports within bounds [{}, {}]",
                self.bounds.min,
                self.bounds
                    .max
                    .map_or_else(|| "inf".to_string(), |m| m.to_string())
            )));
        }

        let weights = self.model.weights(sites)?;
        let demand = self.model.demand();
        let a_bar = self.model.a_bar();

        // Hessian WᵀDW + εI and linear term −WᵀDĀ
        let mut hessian = vec![vec![0.0; n]; n];
        let mut linear = vec![0.0; n];
        for (row, d) in weights.iter().zip(demand) {
            for a in 0..n {
                let wa = row[a] * d;
                if wa == 0.0 {
                    continue;
                }
                linear[a] -= wa * a_bar;
                for b in a..n {
                    hessian[a][b] += wa * row[b];
                }
            }
        }
        for (a, row) in hessian.iter_mut().enumerate() {
            row[a] += RIDGE_EPSILON;
        }

        // Upper triangle of P in CSC form
        let mut p_col_ptr = vec![0usize];
        let mut p_row_idx = Vec::with_capacity(n * (n + 1) / 2);
        let mut p_values = Vec::with_capacity(n * (n + 1) / 2);
        for col in 0..n {
            for (row, values) in hessian.iter().enumerate().take(col + 1) {
                p_row_idx.push(row);
                p_values.push(values[col]);
            }
            p_col_ptr.push(p_row_idx.len());
        }

        let has_upper = self.bounds.max.is_some();
        let n_rows = 1 + n + if has_upper { n } else { 0 };
        let mut col_ptr = vec![0usize];
        let mut row_idx = Vec::new();
        let mut values = Vec::new();
        for j in 0..n {
            row_idx.push(0);
            values.push(1.0);
            row_idx.push(1 + j);
            values.push(-1.0);
            if has_upper {
                row_idx.push(1 + n + j);
                values.push(1.0);
            }
            col_ptr.push(row_idx.len());
        }

        let mut rhs = Vec::with_capacity(n_rows);
        rhs.push(total);
        rhs.extend(std::iter::repeat(-self.bounds.min).take(n));
        if let Some(max) = self.bounds.max {
            rhs.extend(std::iter::repeat(max).take(n));
        }
        let cones = [
            SupportedConeT::ZeroConeT(1),
            SupportedConeT::NonnegativeConeT(n_rows - 1),
        ];

        let p_mat = CscMatrix::new(n, n, p_col_ptr, p_row_idx, p_values);
        let a_mat = CscMatrix::new(n_rows, n, col_ptr, row_idx, values);

        let settings = DefaultSettingsBuilder::default()
            .verbose(false)
            .build()
            .map_err(|e| EvcsError::Solver(format!("Clarabel settings error: {:?}", e)))?;
        let mut solver = DefaultSolver::new(&p_mat, &linear, &a_mat, &rhs, &cones, settings)
            .map_err(|e| EvcsError::Solver(format!("Clarabel initialization failed: {:?}", e)))?;
        solver.solve();

        let sol = &solver.solution;
        if !matches!(sol.status, SolverStatus::Solved | SolverStatus::AlmostSolved) {
            return Err(EvcsError::Solver(format!(
                "Clarabel returned status {:?} for {n} sites",
                sol.status
            )));
        }

        // Interior-point iterates can sit a hair outside the bounds
        let supply: Vec<f64> = sol
            .x
            .iter()
            .map(|x| {
                let lo = x.max(self.bounds.min);
                self.bounds.max.map_or(lo, |max| lo.min(max))
            })
            .collect();
        let ai = apply_weights(&weights, &supply);
        let a_hat = self.model.a_hat(&ai);

        Ok(CapacityAllocation {
            sites: sites.to_vec(),
            supply,
            ai,
            a_hat,
            iterations: sol.iterations,
        })
    }
}
