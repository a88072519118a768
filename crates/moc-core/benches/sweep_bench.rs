// ─────────────────────────────────────────────────────────────────────
// SCPN Neutron MOC — Transport Sweep Benchmarks
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────

use criterion::{criterion_group, criterion_main, Criterion};
use moc_core::geometry::{Cell, CellFill, Geometry};
use moc_core::solver::MocSolver;
use moc_core::track::{BoundaryType, Segment, Track, TrackLink, TrackStore};
use moc_types::config::{ResidualType, SolverOptions};
use moc_types::material::Material;
use std::hint::black_box;

/// A reflective pseudo-lattice: `num_tracks` parallel tracks, each crossing
/// every region once. Each track reflects onto itself, so the problem is an
/// infinite medium with a known k-infinity.
///
/// `max_iters` in the benches is kept small so the measurement captures
/// per-iteration cost rather than full convergence time.
fn lattice_store(num_regions: usize, num_tracks: usize) -> TrackStore {
    let material = Material::new(
        0,
        "bench-fuel",
        vec![1.0],
        vec![0.4],
        vec![0.5],
        vec![1.0],
        vec![vec![0.6]],
    )
    .unwrap();
    let cells = vec![Cell {
        id: 0,
        name: "bench-cell".into(),
        fill: CellFill::Material(0),
    }];
    let geometry = Geometry::new(
        1,
        vec![material],
        cells,
        vec![0; num_regions],
        vec![0; num_regions],
    )
    .unwrap();
    let mut store =
        TrackStore::new(geometry, 1, 1.0, vec![1.0]).unwrap();

    for t in 0..num_tracks {
        store
            .push_track(Track {
                azim_index: 0,
                segments: (0..num_regions)
                    .map(|fsr| Segment {
                        fsr,
                        material: 0,
                        length: 2.0,
                    })
                    .collect(),
                forward: TrackLink {
                    track: t,
                    to_forward: false,
                    boundary: BoundaryType::Reflective,
                },
                backward: TrackLink {
                    track: t,
                    to_forward: true,
                    boundary: BoundaryType::Reflective,
                },
            })
            .unwrap();
    }
    store
}

/// Ten eigenvalue iterations on a 64-region, 64-track lattice.
fn bench_eigenvalue_iterations_64x64(c: &mut Criterion) {
    let mut group = c.benchmark_group("eigenvalue_iterations");
    group.sample_size(10);

    group.bench_function("lattice_64x64", |b| {
        b.iter(|| {
            let mut store = lattice_store(64, 64);
            let mut solver = MocSolver::new(SolverOptions::default())
                .expect("default options validate");
            solver
                .set_track_source(&mut store)
                .expect("lattice store contains tracks");
            let report = solver
                .compute_eigenvalue(10, ResidualType::FissionSource)
                .expect("eigenvalue iterations should run");
            black_box(report.iterations);
        })
    });

    group.finish();
}

/// Ten fixed-source sweeps on a 256-track lattice, large enough to cross
/// the CPU backend's parallel threshold.
fn bench_flux_iterations_parallel(c: &mut Criterion) {
    let mut group = c.benchmark_group("flux_iterations");
    group.sample_size(10);

    group.bench_function("lattice_32x256", |b| {
        b.iter(|| {
            let mut store = lattice_store(32, 256);
            let mut solver = MocSolver::new(SolverOptions::default())
                .expect("default options validate");
            solver
                .set_track_source(&mut store)
                .expect("lattice store contains tracks");
            for fsr in 0..32 {
                solver
                    .set_fixed_source_by_fsr(fsr, 1, 1.0)
                    .expect("fixed source indices are in range");
            }
            let report = solver
                .compute_flux(10, true)
                .expect("flux iterations should run");
            black_box(report.residual);
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_eigenvalue_iterations_64x64,
    bench_flux_iterations_parallel
);
criterion_main!(benches);
