//! Error type for the siting core.
//!
//! [`EvcsError`] covers the failure modes of the numeric pipeline: bad
//! inputs, empty candidate sets and QP infeasibility. Orchestration crates
//! wrap it in `anyhow` with file context.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvcsError {
    /// Unrecognised names in typed fields
    #[error("Parse error: {0}")]
    Parse(String),

    /// Inconsistent or out-of-range input data
    #[error("Validation error: {0}")]
    Validation(String),

    /// QP infeasibility or non-convergence
    #[error("Solver error: {0}")]
    Solver(String),

    /// A region is missing planning results
    #[error("Configuration error: {0}")]
    Config(String),

    /// A region produced no demand points or no candidate sites
    #[error("Empty input: {0}")]
    EmptyInput(String),
}

pub type EvcsResult<T> = Result<T, EvcsError>;
