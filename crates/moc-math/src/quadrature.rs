// ─────────────────────────────────────────────────────────────────────
// SCPN Neutron MOC — Polar Quadrature
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Polar-angle quadratures for the characteristic integration.
//!
//! A quadrature supplies, per polar angle over the upper half-space, the
//! sine of the angle, a weight, and the precomputed "multiple"
//! `weight * sin(theta)` that scales track tallies. Weights sum to one over
//! the half-space, independent of azimuthal discretization.

use moc_types::error::{SolverError, SolverResult};

/// Tabuchi-Yamamoto optimal sines/weights, 1 to 3 angles.
const TY_SIN_THETAS: [&[f64]; 3] = [
    &[0.798184],
    &[0.363900, 0.899900],
    &[0.166648, 0.537707, 0.932954],
];
const TY_WEIGHTS: [&[f64]; 3] = [
    &[1.0],
    &[0.212854, 0.787146],
    &[0.046233, 0.283619, 0.670148],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuadratureFamily {
    TabuchiYamamoto,
    GaussLegendre,
}

#[derive(Debug, Clone)]
pub struct PolarQuadrature {
    family: QuadratureFamily,
    sin_thetas: Vec<f64>,
    weights: Vec<f64>,
    multiples: Vec<f64>,
}

impl PolarQuadrature {
    /// Tabuchi-Yamamoto quadrature, tabulated for 1-3 polar angles.
    pub fn tabuchi_yamamoto(num_polar: usize) -> SolverResult<Self> {
        if !(1..=3).contains(&num_polar) {
            return Err(SolverError::InvalidArgument(format!(
                "Tabuchi-Yamamoto quadrature is tabulated for 1-3 polar angles, not {num_polar}"
            )));
        }
        Ok(Self::from_parts(
            QuadratureFamily::TabuchiYamamoto,
            TY_SIN_THETAS[num_polar - 1].to_vec(),
            TY_WEIGHTS[num_polar - 1].to_vec(),
        ))
    }

    /// Gauss-Legendre quadrature over the half-space for any angle count.
    ///
    /// The abscissae are the positive roots of the Legendre polynomial of
    /// order `2 * num_polar` in `mu = cos(theta)`, found by Newton iteration.
    pub fn gauss_legendre(num_polar: usize) -> SolverResult<Self> {
        if num_polar == 0 {
            return Err(SolverError::InvalidArgument(
                "Gauss-Legendre quadrature requires at least one polar angle".into(),
            ));
        }
        let order = 2 * num_polar;
        let mut sin_thetas = Vec::with_capacity(num_polar);
        let mut weights = Vec::with_capacity(num_polar);

        for i in 1..=num_polar {
            // Positive roots correspond to the first half of the guesses.
            let mut x = (std::f64::consts::PI * (i as f64 - 0.25) / (order as f64 + 0.5)).cos();
            for _ in 0..100 {
                let (p, dp) = legendre(order, x);
                let dx = p / dp;
                x -= dx;
                if dx.abs() < 1e-15 {
                    break;
                }
            }
            let (_, dp) = legendre(order, x);
            // Standard weight over (-1, 1); the positive half sums to 1.
            let w = 2.0 / ((1.0 - x * x) * dp * dp);
            sin_thetas.push((1.0 - x * x).sqrt());
            weights.push(w);
        }

        // Order by increasing sin(theta), matching the tabulated families.
        let mut order_idx: Vec<usize> = (0..num_polar).collect();
        order_idx.sort_by(|&a, &b| sin_thetas[a].total_cmp(&sin_thetas[b]));
        let sin_thetas: Vec<f64> = order_idx.iter().map(|&i| sin_thetas[i]).collect();
        let weights: Vec<f64> = order_idx.iter().map(|&i| weights[i]).collect();

        Ok(Self::from_parts(
            QuadratureFamily::GaussLegendre,
            sin_thetas,
            weights,
        ))
    }

    fn from_parts(family: QuadratureFamily, sin_thetas: Vec<f64>, weights: Vec<f64>) -> Self {
        let multiples = sin_thetas
            .iter()
            .zip(&weights)
            .map(|(&s, &w)| s * w)
            .collect();
        PolarQuadrature {
            family,
            sin_thetas,
            weights,
            multiples,
        }
    }

    pub fn family(&self) -> QuadratureFamily {
        self.family
    }

    pub fn num_polar(&self) -> usize {
        self.sin_thetas.len()
    }

    pub fn sin_theta(&self, p: usize) -> f64 {
        self.sin_thetas[p]
    }

    pub fn weight(&self, p: usize) -> f64 {
        self.weights[p]
    }

    /// `weight(p) * sin_theta(p)`, the tally multiplier for angle `p`.
    pub fn multiple(&self, p: usize) -> f64 {
        self.multiples[p]
    }

    pub fn sin_thetas(&self) -> &[f64] {
        &self.sin_thetas
    }

    pub fn multiples(&self) -> &[f64] {
        &self.multiples
    }
}

impl Default for PolarQuadrature {
    /// Three-angle Tabuchi-Yamamoto, the standard MOC default.
    fn default() -> Self {
        Self::tabuchi_yamamoto(3).expect("3-angle TY quadrature is tabulated")
    }
}

/// Legendre polynomial P_n and its derivative at `x`, by upward recurrence.
fn legendre(n: usize, x: f64) -> (f64, f64) {
    let mut p_prev = 1.0;
    let mut p = x;
    for k in 2..=n {
        let k = k as f64;
        let p_next = ((2.0 * k - 1.0) * x * p - (k - 1.0) * p_prev) / k;
        p_prev = p;
        p = p_next;
    }
    let dp = n as f64 * (x * p - p_prev) / (x * x - 1.0);
    (p, dp)
}
