// ─────────────────────────────────────────────────────────────────────
// SCPN Neutron MOC — Source Assembly
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Per-region, per-group source assembly.
//!
//! The total isotropic source in region `r`, group `g` is the chi-weighted
//! fission source divided by k-effective, plus in-scatter from every group,
//! plus any user fixed source, normalized by solid angle. The sweep consumes
//! the *reduced* form, additionally divided by the group total cross section.

use ndarray::{Array1, ArrayView2, ArrayViewMut2};

use moc_types::constants::ONE_OVER_FOUR_PI;

use crate::geometry::Geometry;

/// Total (un-reduced) source for one region and 0-based group.
pub fn fsr_source(
    geometry: &Geometry,
    scalar_flux: ArrayView2<'_, f64>,
    fixed_sources: ArrayView2<'_, f64>,
    k_eff: f64,
    fsr: usize,
    group: usize,
) -> f64 {
    let material = geometry.fsr_material(fsr);
    let num_groups = geometry.num_groups();

    let mut source = 0.0;
    if material.is_fissionable() {
        let mut fission = 0.0;
        for e in 0..num_groups {
            fission += scalar_flux[[fsr, e]] * material.nu_sigma_f[e];
        }
        source += fission * material.chi[group] / k_eff;
    }

    for e in 0..num_groups {
        source += material.sigma_s(e, group) * scalar_flux[[fsr, e]];
    }

    source += fixed_sources[[fsr, group]];
    source * ONE_OVER_FOUR_PI
}

/// Assemble the reduced sources the transport sweep consumes:
/// `fsr_source / sigma_t[g]` for every region and group.
pub fn compute_reduced_sources(
    geometry: &Geometry,
    scalar_flux: ArrayView2<'_, f64>,
    fixed_sources: ArrayView2<'_, f64>,
    k_eff: f64,
    mut reduced_sources: ArrayViewMut2<'_, f64>,
) {
    let num_groups = geometry.num_groups();
    for fsr in 0..geometry.num_fsrs() {
        let sigma_t = &geometry.fsr_material(fsr).sigma_t;
        for g in 0..num_groups {
            let source = fsr_source(geometry, scalar_flux, fixed_sources, k_eff, fsr, g);
            reduced_sources[[fsr, g]] = source / sigma_t[g];
        }
    }
}

/// Volume-integrated fission source over the whole problem.
pub fn total_fission_source(
    geometry: &Geometry,
    scalar_flux: ArrayView2<'_, f64>,
    fsr_volumes: &[f64],
) -> f64 {
    let mut total = 0.0;
    for fsr in 0..geometry.num_fsrs() {
        let material = geometry.fsr_material(fsr);
        if !material.is_fissionable() {
            continue;
        }
        for e in 0..geometry.num_groups() {
            total += material.nu_sigma_f[e] * scalar_flux[[fsr, e]] * fsr_volumes[fsr];
        }
    }
    total
}

/// Per-region fission source, used by the fission-source residual.
pub fn fission_source_by_fsr(
    geometry: &Geometry,
    scalar_flux: ArrayView2<'_, f64>,
) -> Array1<f64> {
    let mut sources = Array1::zeros(geometry.num_fsrs());
    for fsr in 0..geometry.num_fsrs() {
        let material = geometry.fsr_material(fsr);
        if !material.is_fissionable() {
            continue;
        }
        for e in 0..geometry.num_groups() {
            sources[fsr] += material.nu_sigma_f[e] * scalar_flux[[fsr, e]];
        }
    }
    sources
}

/// Per-region total source summed over groups, used by the total-source
/// residual.
pub fn total_source_by_fsr(
    geometry: &Geometry,
    scalar_flux: ArrayView2<'_, f64>,
    fixed_sources: ArrayView2<'_, f64>,
    k_eff: f64,
) -> Array1<f64> {
    let mut sources = Array1::zeros(geometry.num_fsrs());
    for fsr in 0..geometry.num_fsrs() {
        for g in 0..geometry.num_groups() {
            sources[fsr] += fsr_source(geometry, scalar_flux, fixed_sources, k_eff, fsr, g);
        }
    }
    sources
}
