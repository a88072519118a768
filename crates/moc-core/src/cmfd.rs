// ─────────────────────────────────────────────────────────────────────
// SCPN Neutron MOC — CMFD Coupling
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Coupling protocol to a coarse-mesh finite-difference accelerator.
//!
//! The diffusion solve itself is an external collaborator; the solver only
//! defines the handshake. All views are borrowed per call — the accelerator
//! may read and replace values through them but must never resize the
//! underlying arrays, and must not retain them across calls.

use ndarray::{ArrayViewMut2, ArrayViewMut3};

use moc_types::error::SolverResult;
use moc_types::material::Material;

use crate::track::Track;

/// Problem dimensions and per-region data handed to the accelerator once
/// per solve, before the first outer iteration.
pub struct CmfdProblemView<'a> {
    pub fsr_volumes: &'a [f64],
    pub fsr_materials: &'a [usize],
    pub materials: &'a [Material],
    /// Polar-quadrature multiples `weight * sin(theta)` per polar angle.
    pub polar_multiples: &'a [f64],
    pub num_groups: usize,
}

pub trait CmfdAccelerator {
    /// Whether the accelerated flux update is enabled. A disabled
    /// accelerator leaves the k-effective update to the transport solver.
    fn is_flux_update_on(&self) -> bool {
        true
    }

    /// Bind problem dimensions and per-region data for the coming solve.
    fn prepare(&mut self, view: &CmfdProblemView<'_>) -> SolverResult<()>;

    /// Solve the coarse-mesh diffusion problem after transport sweep
    /// `iteration` and return the updated k-effective. `scalar_flux` is
    /// `[fsr][group]`; entries may be rescaled in place.
    fn compute_keff(
        &mut self,
        iteration: usize,
        scalar_flux: ArrayViewMut2<'_, f64>,
    ) -> SolverResult<f64>;

    /// Correct the track boundary angular fluxes
    /// (`[track][direction][polar * group]`) to be consistent with the
    /// updated coarse-mesh solution.
    fn update_boundary_flux(
        &mut self,
        tracks: &[Track],
        boundary_flux: ArrayViewMut3<'_, f64>,
    ) -> SolverResult<()>;
}
