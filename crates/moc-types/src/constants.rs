// ─────────────────────────────────────────────────────────────────────
// SCPN Neutron MOC — Constants
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
/// Total solid angle of the unit sphere.
pub const FOUR_PI: f64 = 4.0 * std::f64::consts::PI;

/// Isotropic normalization applied to every assembled source.
pub const ONE_OVER_FOUR_PI: f64 = 1.0 / FOUR_PI;

/// Scalar flux / source entries below this magnitude are excluded from
/// relative-change residuals.
pub const FLUX_EPSILON: f64 = 1e-12;

/// Default threshold on the iteration-to-iteration residual.
pub const DEFAULT_CONVERGENCE_THRESHOLD: f64 = 1e-5;

/// Default cap on a single segment's optical length.
pub const DEFAULT_MAX_OPTICAL_LENGTH: f64 = 10.0;

/// Default maximum approximation error of the exponential interpolation
/// table (the linear-interpolation tolerance from Yamamoto's 2003 analysis).
pub const DEFAULT_EXP_PRECISION: f64 = 1e-5;
