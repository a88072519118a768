// ─────────────────────────────────────────────────────────────────────
// SCPN Neutron MOC — Slab Transport Scenarios
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! End-to-end solves on hand-built slab track sets.
//!
//! Ray tracing is out of scope for the solver, so these scenarios construct
//! `TrackStore` contents directly: one-dimensional slabs traced by a single
//! azimuthal angle.

use moc_core::cmfd::{CmfdAccelerator, CmfdProblemView};
use moc_core::geometry::{Cell, CellFill, Geometry};
use moc_core::solver::MocSolver;
use moc_core::track::{BoundaryType, Segment, Track, TrackLink, TrackStore};
use moc_types::config::{ResidualType, SolverOptions};
use moc_types::error::{SolverError, SolverResult};
use moc_types::material::Material;
use ndarray::{ArrayViewMut2, ArrayViewMut3};

fn absorber(sigma_t: f64, sigma_s: f64) -> Material {
    Material::new(
        0,
        "absorber",
        vec![sigma_t],
        vec![sigma_t - sigma_s],
        vec![0.0],
        vec![0.0],
        vec![vec![sigma_s]],
    )
    .unwrap()
}

fn fuel(sigma_t: f64, sigma_s: f64, nu_sigma_f: f64) -> Material {
    Material::new(
        0,
        "fuel",
        vec![sigma_t],
        vec![sigma_t - sigma_s],
        vec![nu_sigma_f],
        vec![1.0],
        vec![vec![sigma_s]],
    )
    .unwrap()
}

/// Single-region slab traced by one track of `num_segments` equal pieces.
fn single_region_store(
    material: Material,
    length: f64,
    num_segments: usize,
    boundary: BoundaryType,
) -> TrackStore {
    let cells = vec![Cell {
        id: 0,
        name: "slab".into(),
        fill: CellFill::Material(0),
    }];
    let geometry = Geometry::new(1, vec![material], cells, vec![0], vec![0]).unwrap();
    let mut store = TrackStore::new(geometry, 1, 1.0, vec![1.0]).unwrap();

    let segment_length = length / num_segments as f64;
    store
        .push_track(Track {
            azim_index: 0,
            segments: (0..num_segments)
                .map(|_| Segment {
                    fsr: 0,
                    material: 0,
                    length: segment_length,
                })
                .collect(),
            forward: TrackLink {
                track: 0,
                to_forward: false,
                boundary,
            },
            backward: TrackLink {
                track: 0,
                to_forward: true,
                boundary,
            },
        })
        .unwrap();
    store
}

/// Two-region slab (one segment per region) behind a nested cell tree:
/// container cell 2 holds the two material leaves.
fn two_region_store(mut materials: Vec<Material>, region_length: f64) -> TrackStore {
    for (id, material) in materials.iter_mut().enumerate() {
        material.id = id;
    }
    let cells = vec![
        Cell {
            id: 0,
            name: "left".into(),
            fill: CellFill::Material(0),
        },
        Cell {
            id: 1,
            name: "right".into(),
            fill: CellFill::Material(1),
        },
        Cell {
            id: 2,
            name: "slab".into(),
            fill: CellFill::Container(vec![0, 1]),
        },
    ];
    let geometry = Geometry::new(1, materials, cells, vec![0, 1], vec![0, 1]).unwrap();
    let mut store = TrackStore::new(geometry, 1, 1.0, vec![1.0]).unwrap();
    store
        .push_track(Track {
            azim_index: 0,
            segments: vec![
                Segment {
                    fsr: 0,
                    material: 0,
                    length: region_length,
                },
                Segment {
                    fsr: 1,
                    material: 1,
                    length: region_length,
                },
            ],
            forward: TrackLink {
                track: 0,
                to_forward: false,
                boundary: BoundaryType::Vacuum,
            },
            backward: TrackLink {
                track: 0,
                to_forward: true,
                boundary: BoundaryType::Vacuum,
            },
        })
        .unwrap();
    store
}

#[test]
fn homogeneous_slab_flux_matches_analytic_solution() {
    // Optically thick slab, vacuum boundaries, uniform fixed source: the
    // flat-flux solution q / sigma_t holds away from the surface layer.
    let sigma_t = 100.0;
    let q = 1.0;
    let mut store = single_region_store(absorber(sigma_t, 0.0), 100.0, 1, BoundaryType::Vacuum);
    let mut solver = MocSolver::new(SolverOptions::default()).unwrap();
    solver.set_track_source(&mut store).unwrap();
    solver.set_fixed_source_by_fsr(0, 1, q).unwrap();

    let report = solver.compute_flux(100, true).unwrap();
    assert!(report.converged);

    let flux = solver.fsr_scalar_flux(0, 1).unwrap();
    let analytic = q / sigma_t;
    assert!(
        ((flux - analytic) / analytic).abs() < 1e-3,
        "flux = {flux}, analytic = {analytic}"
    );
    assert!(flux.is_finite() && flux >= 0.0);
    // Vacuum boundaries leak part of the source.
    assert!(solver.leakage() > 0.0);
}

#[test]
fn infinite_medium_eigenvalue_matches_k_infinity() {
    // Reflective single-region medium: k = nu_sigma_f / sigma_a.
    let mut store =
        single_region_store(fuel(1.0, 0.6, 0.5), 10.0, 4, BoundaryType::Reflective);
    let mut solver = MocSolver::new(SolverOptions::default()).unwrap();
    solver.set_track_source(&mut store).unwrap();
    solver.set_convergence_threshold(1e-7).unwrap();

    let report = solver
        .compute_eigenvalue(500, ResidualType::FissionSource)
        .unwrap();
    assert!(report.converged, "residual = {}", report.residual);

    let k_infinity = 0.5 / 0.4;
    assert!(
        (solver.keff() - k_infinity).abs() < 1e-4,
        "k_eff = {}, expected {k_infinity}",
        solver.keff()
    );
    // Reflective problem leaks nothing.
    assert!(solver.leakage().abs() < 1e-10);
}

#[test]
fn eigenvalue_solve_is_idempotent() {
    let mut store =
        single_region_store(fuel(1.0, 0.5, 0.45), 10.0, 4, BoundaryType::Reflective);
    let mut solver = MocSolver::new(SolverOptions::default()).unwrap();
    solver.set_track_source(&mut store).unwrap();

    solver
        .compute_eigenvalue(300, ResidualType::FissionSource)
        .unwrap();
    let first = solver.keff();

    solver
        .compute_eigenvalue(300, ResidualType::FissionSource)
        .unwrap();
    let second = solver.keff();

    assert!(
        (first - second).abs() < 1e-10,
        "k drifted between identical solves: {first} vs {second}"
    );
}

#[test]
fn subcritical_source_calculation_converges() {
    // Fissionable slab with vacuum boundaries driven by an external source
    // at a guessed sub-critical eigenvalue.
    let mut store = single_region_store(fuel(1.0, 0.3, 0.2), 20.0, 8, BoundaryType::Vacuum);
    let mut solver = MocSolver::new(SolverOptions::default()).unwrap();
    solver.set_track_source(&mut store).unwrap();
    solver.set_fixed_source_by_fsr(0, 1, 0.5).unwrap();

    let report = solver
        .compute_source(500, 0.9, ResidualType::TotalSource)
        .unwrap();
    assert!(report.converged, "residual = {}", report.residual);
    assert!((solver.keff() - 0.9).abs() < 1e-15, "caller-supplied k is kept");

    let flux = solver.fsr_scalar_flux(0, 1).unwrap();
    assert!(flux.is_finite() && flux > 0.0);
    let source = solver.fsr_source(0, 1).unwrap();
    assert!(source.is_finite() && source > 0.0);
}

#[test]
fn failed_attachment_leaves_prior_source_intact() {
    let mut good = single_region_store(absorber(1.0, 0.0), 10.0, 4, BoundaryType::Vacuum);
    let mut empty = {
        let cells = vec![Cell {
            id: 0,
            name: "slab".into(),
            fill: CellFill::Material(0),
        }];
        let geometry =
            Geometry::new(1, vec![absorber(1.0, 0.0)], cells, vec![0], vec![0]).unwrap();
        TrackStore::new(geometry, 1, 1.0, vec![1.0]).unwrap()
    };

    let mut solver = MocSolver::new(SolverOptions::default()).unwrap();
    solver.set_track_source(&mut good).unwrap();
    solver.set_fixed_source_by_fsr(0, 1, 1.0).unwrap();

    assert!(matches!(
        solver.set_track_source(&mut empty),
        Err(SolverError::Configuration(_))
    ));

    // The original attachment still drives a successful solve.
    let report = solver.compute_flux(50, true).unwrap();
    assert!(report.converged);
}

#[test]
fn fixed_source_by_cell_and_material_match_by_fsr() {
    let materials = || vec![absorber(1.0, 0.2), absorber(2.0, 0.4)];
    let q = 0.8;

    let mut by_fsr_store = two_region_store(materials(), 10.0);
    let mut by_fsr = MocSolver::new(SolverOptions::default()).unwrap();
    by_fsr.set_track_source(&mut by_fsr_store).unwrap();
    by_fsr.set_fixed_source_by_fsr(0, 1, q).unwrap();
    by_fsr.set_fixed_source_by_fsr(1, 1, q).unwrap();
    by_fsr.compute_flux(100, true).unwrap();

    // The container cell expands through its leaves to both regions.
    let mut by_cell_store = two_region_store(materials(), 10.0);
    let mut by_cell = MocSolver::new(SolverOptions::default()).unwrap();
    by_cell.set_track_source(&mut by_cell_store).unwrap();
    by_cell.set_fixed_source_by_cell(2, 1, q).unwrap();
    by_cell.compute_flux(100, true).unwrap();

    // Material 0 and 1 cover region 0 and 1 respectively.
    let mut by_mat_store = two_region_store(materials(), 10.0);
    let mut by_mat = MocSolver::new(SolverOptions::default()).unwrap();
    by_mat.set_track_source(&mut by_mat_store).unwrap();
    by_mat.set_fixed_source_by_material(0, 1, q).unwrap();
    by_mat.set_fixed_source_by_material(1, 1, q).unwrap();
    by_mat.compute_flux(100, true).unwrap();

    for fsr in 0..2 {
        let reference = by_fsr.fsr_scalar_flux(fsr, 1).unwrap();
        assert!(reference > 0.0);
        assert_eq!(reference, by_cell.fsr_scalar_flux(fsr, 1).unwrap());
        assert_eq!(reference, by_mat.fsr_scalar_flux(fsr, 1).unwrap());
    }
}

#[test]
fn interpolation_and_intrinsic_exponentials_agree() {
    let run = |intrinsic: bool| -> f64 {
        let mut store =
            single_region_store(absorber(2.0, 0.5), 20.0, 8, BoundaryType::Vacuum);
        let mut solver = MocSolver::new(SolverOptions::default()).unwrap();
        if intrinsic {
            solver.use_exponential_intrinsic();
        }
        solver.set_track_source(&mut store).unwrap();
        solver.set_fixed_source_by_fsr(0, 1, 1.0).unwrap();
        solver.compute_flux(100, true).unwrap();
        solver.fsr_scalar_flux(0, 1).unwrap()
    };

    let interpolated = run(false);
    let exact = run(true);
    assert!(
        ((interpolated - exact) / exact).abs() < 1e-3,
        "{interpolated} vs {exact}"
    );
}

#[test]
fn superposed_flux_after_eigenvalue_solve() {
    let mut store =
        single_region_store(fuel(1.0, 0.5, 0.45), 10.0, 4, BoundaryType::Reflective);
    let mut solver = MocSolver::new(SolverOptions::default()).unwrap();
    solver.set_track_source(&mut store).unwrap();

    let eigen = solver
        .compute_eigenvalue(300, ResidualType::FissionSource)
        .unwrap();
    assert!(eigen.converged);
    let k_converged = solver.keff();

    solver.set_fixed_source_by_fsr(0, 1, 0.1).unwrap();
    let report = solver.compute_flux(300, false).unwrap();
    assert!(report.converged);
    // The superposition keeps the converged eigenvalue untouched.
    assert!((solver.keff() - k_converged).abs() < 1e-15);
    assert!(solver.fsr_scalar_flux(0, 1).unwrap() > 0.0);
}

// ── CMFD coupling ────────────────────────────────────────────────────

/// Validates the handshake views and pins k-effective to a fixed value.
struct PinnedCmfd {
    pinned_keff: f64,
}

impl CmfdAccelerator for PinnedCmfd {
    fn prepare(&mut self, view: &CmfdProblemView<'_>) -> SolverResult<()> {
        assert_eq!(view.fsr_materials.len(), view.fsr_volumes.len());
        assert!(!view.polar_multiples.is_empty());
        assert!(view.num_groups > 0);
        Ok(())
    }

    fn compute_keff(
        &mut self,
        _iteration: usize,
        _scalar_flux: ArrayViewMut2<'_, f64>,
    ) -> SolverResult<f64> {
        Ok(self.pinned_keff)
    }

    fn update_boundary_flux(
        &mut self,
        tracks: &[Track],
        boundary_flux: ArrayViewMut3<'_, f64>,
    ) -> SolverResult<()> {
        assert_eq!(tracks.len(), boundary_flux.shape()[0]);
        Ok(())
    }
}

#[test]
fn cmfd_collaborator_owns_the_keff_update() {
    let mut store =
        single_region_store(fuel(1.0, 0.6, 0.5), 10.0, 4, BoundaryType::Reflective);
    let mut solver = MocSolver::new(SolverOptions::default()).unwrap();
    solver.set_track_source(&mut store).unwrap();
    solver.set_cmfd(Box::new(PinnedCmfd { pinned_keff: 1.1 }));

    solver
        .compute_eigenvalue(5, ResidualType::ScalarFlux)
        .unwrap();

    // The accelerator's estimate replaces the transport ratio.
    assert!((solver.keff() - 1.1).abs() < 1e-15);
}
