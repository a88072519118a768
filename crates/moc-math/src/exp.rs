// ─────────────────────────────────────────────────────────────────────
// SCPN Neutron MOC — Exponential Evaluator
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Evaluation of the attenuation factor `1 - exp(-tau / sin(theta_p))`.
//!
//! Two runtime-switchable strategies: the libm intrinsic, or a piecewise
//! linear slope/intercept table built over `[0, max_optical_length]` whose
//! spacing is sized so the interpolation error stays below a configured
//! precision. The table folds the per-angle secant `1/sin(theta_p)` into its
//! coefficients, so it must be rebuilt whenever the polar quadrature changes.

use moc_types::constants::{DEFAULT_EXP_PRECISION, DEFAULT_MAX_OPTICAL_LENGTH};
use moc_types::error::{SolverError, SolverResult};

use crate::quadrature::PolarQuadrature;

#[derive(Debug, Clone)]
pub struct ExpEvaluator {
    interpolate: bool,
    max_optical_length: f64,
    exp_precision: f64,
    sin_thetas: Vec<f64>,
    inv_sin_thetas: Vec<f64>,
    /// Slope/intercept pairs, laid out `[interval][polar][2]`.
    table: Vec<f64>,
    inv_table_spacing: f64,
    num_intervals: usize,
}

impl ExpEvaluator {
    pub fn new() -> Self {
        ExpEvaluator {
            interpolate: true,
            max_optical_length: DEFAULT_MAX_OPTICAL_LENGTH,
            exp_precision: DEFAULT_EXP_PRECISION,
            sin_thetas: Vec::new(),
            inv_sin_thetas: Vec::new(),
            table: Vec::new(),
            inv_table_spacing: 0.0,
            num_intervals: 0,
        }
    }

    pub fn set_max_optical_length(&mut self, max_optical_length: f64) -> SolverResult<()> {
        if max_optical_length <= 0.0 {
            return Err(SolverError::InvalidArgument(format!(
                "max optical length {max_optical_length} is not positive"
            )));
        }
        self.max_optical_length = max_optical_length;
        self.table.clear();
        Ok(())
    }

    pub fn max_optical_length(&self) -> f64 {
        self.max_optical_length
    }

    pub fn set_exp_precision(&mut self, precision: f64) -> SolverResult<()> {
        if precision <= 0.0 {
            return Err(SolverError::InvalidArgument(format!(
                "exponential table precision {precision} is not positive"
            )));
        }
        self.exp_precision = precision;
        self.table.clear();
        Ok(())
    }

    pub fn exp_precision(&self) -> f64 {
        self.exp_precision
    }

    pub fn use_interpolation(&mut self) {
        self.interpolate = true;
    }

    pub fn use_intrinsic(&mut self) {
        self.interpolate = false;
    }

    pub fn is_using_interpolation(&self) -> bool {
        self.interpolate
    }

    /// Bind the polar quadrature whose secants scale the stored lengths.
    /// Invalidates any previously built table.
    pub fn set_polar_quadrature(&mut self, quadrature: &PolarQuadrature) {
        self.sin_thetas = quadrature.sin_thetas().to_vec();
        self.inv_sin_thetas = self.sin_thetas.iter().map(|&s| 1.0 / s).collect();
        self.table.clear();
    }

    pub fn num_polar(&self) -> usize {
        self.sin_thetas.len()
    }

    /// Build the interpolation table.
    ///
    /// Spacing comes from the linear-interpolation error bound
    /// `err <= h^2 * max|f''| / 8` with `max|f''| = 1 / sin^2(theta_min)`,
    /// so `h = sin(theta_min) * sqrt(8 * precision)`.
    pub fn initialize(&mut self) -> SolverResult<()> {
        if self.sin_thetas.is_empty() {
            return Err(SolverError::Configuration(
                "no polar quadrature bound to the exponential evaluator".into(),
            ));
        }
        if !self.interpolate {
            self.table.clear();
            return Ok(());
        }

        let num_polar = self.sin_thetas.len();
        let sin_min = self.sin_thetas[0];
        let spacing = sin_min * (8.0 * self.exp_precision).sqrt();
        let num_intervals = (self.max_optical_length / spacing).ceil() as usize + 1;

        let mut table = vec![0.0; num_intervals * num_polar * 2];
        for i in 0..num_intervals {
            let tau_lo = i as f64 * spacing;
            let tau_hi = tau_lo + spacing;
            for (p, &inv_sin) in self.inv_sin_thetas.iter().enumerate() {
                let f_lo = 1.0 - (-tau_lo * inv_sin).exp();
                let f_hi = 1.0 - (-tau_hi * inv_sin).exp();
                let slope = (f_hi - f_lo) / spacing;
                let intercept = f_lo - slope * tau_lo;
                table[(i * num_polar + p) * 2] = slope;
                table[(i * num_polar + p) * 2 + 1] = intercept;
            }
        }

        self.table = table;
        self.inv_table_spacing = 1.0 / spacing;
        self.num_intervals = num_intervals;
        Ok(())
    }

    /// `1 - exp(-tau / sin(theta_p))` for optical length `tau` and polar
    /// angle index `p`.
    #[inline]
    pub fn compute_exponential(&self, tau: f64, p: usize) -> f64 {
        if self.interpolate && !self.table.is_empty() {
            let index = ((tau * self.inv_table_spacing) as usize).min(self.num_intervals - 1);
            let base = (index * self.inv_sin_thetas.len() + p) * 2;
            self.table[base] * tau + self.table[base + 1]
        } else {
            1.0 - (-tau * self.inv_sin_thetas[p]).exp()
        }
    }
}

impl Default for ExpEvaluator {
    fn default() -> Self {
        Self::new()
    }
}
