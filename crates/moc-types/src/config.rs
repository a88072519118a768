// ─────────────────────────────────────────────────────────────────────
// SCPN Neutron MOC — Config
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CONVERGENCE_THRESHOLD, DEFAULT_EXP_PRECISION, DEFAULT_MAX_OPTICAL_LENGTH,
};
use crate::error::{SolverError, SolverResult};

/// How the attenuation exponential `1 - exp(-tau)` is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExpStrategy {
    /// Precomputed piecewise-linear table.
    Interpolation,
    /// Direct call to the libm exponential.
    Intrinsic,
}

/// Quantity compared iteration-to-iteration by the convergence test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResidualType {
    /// Regionwise scalar flux relative change, per energy group.
    ScalarFlux,
    /// Regionwise total (fission + scatter + fixed) source relative change.
    TotalSource,
    /// Regionwise fission source relative change.
    FissionSource,
}

/// Runtime options recognized by the solver.
///
/// Every field carries a serde default so a partial JSON file is enough.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverOptions {
    #[serde(default = "default_convergence_threshold")]
    pub convergence_threshold: f64,
    #[serde(default = "default_max_optical_length")]
    pub max_optical_length: f64,
    #[serde(default = "default_exp_precision")]
    pub exp_precision: f64,
    #[serde(default = "default_exp_strategy")]
    pub exp_strategy: ExpStrategy,
    #[serde(default = "default_residual_type")]
    pub residual_type: ResidualType,
}

fn default_convergence_threshold() -> f64 {
    DEFAULT_CONVERGENCE_THRESHOLD
}
fn default_max_optical_length() -> f64 {
    DEFAULT_MAX_OPTICAL_LENGTH
}
fn default_exp_precision() -> f64 {
    DEFAULT_EXP_PRECISION
}
fn default_exp_strategy() -> ExpStrategy {
    ExpStrategy::Interpolation
}
fn default_residual_type() -> ResidualType {
    ResidualType::FissionSource
}

impl Default for SolverOptions {
    fn default() -> Self {
        SolverOptions {
            convergence_threshold: default_convergence_threshold(),
            max_optical_length: default_max_optical_length(),
            exp_precision: default_exp_precision(),
            exp_strategy: default_exp_strategy(),
            residual_type: default_residual_type(),
        }
    }
}

impl SolverOptions {
    /// Load options from a JSON file.
    pub fn from_file(path: &str) -> SolverResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let options: Self = serde_json::from_str(&contents)?;
        options.validate()?;
        Ok(options)
    }

    /// Reject out-of-domain numeric fields.
    pub fn validate(&self) -> SolverResult<()> {
        if self.convergence_threshold <= 0.0 {
            return Err(SolverError::InvalidArgument(format!(
                "convergence threshold {} is not positive",
                self.convergence_threshold
            )));
        }
        if self.max_optical_length <= 0.0 {
            return Err(SolverError::InvalidArgument(format!(
                "max optical length {} is not positive",
                self.max_optical_length
            )));
        }
        if self.exp_precision <= 0.0 {
            return Err(SolverError::InvalidArgument(format!(
                "exponential table precision {} is not positive",
                self.exp_precision
            )));
        }
        Ok(())
    }
}
