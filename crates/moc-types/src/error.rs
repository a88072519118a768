// ─────────────────────────────────────────────────────────────────────
// SCPN Neutron MOC — Error
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use thiserror::Error;

/// Error taxonomy for the transport solver.
///
/// Convergence failure is deliberately absent: exhausting the iteration cap
/// is non-fatal and reported through `SolveReport::converged`, with the last
/// computed state left queryable.
#[derive(Error, Debug)]
pub enum SolverError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{quantity} index {index} outside [{lo}, {hi})")]
    OutOfRange {
        quantity: &'static str,
        index: usize,
        lo: usize,
        hi: usize,
    },

    #[error("Not ready: {0}")]
    NotReady(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type SolverResult<T> = Result<T, SolverError>;
