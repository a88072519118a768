// ─────────────────────────────────────────────────────────────────────
// SCPN Neutron MOC — Transport Sweep
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! The transport-sweep capability and its CPU reference backend.
//!
//! A sweep integrates the attenuation equation along every track in both
//! directions against the current reduced sources, accumulates
//! angularly-weighted contributions into the scalar flux, and propagates
//! outgoing angular flux into connected tracks' incoming slots. Backends are
//! strategy objects selected at solver construction; the contract is:
//! sources are fixed before the sweep starts, no two sweeps over the same
//! iteration overlap, and scalar-flux accumulation is order-independent.

use ndarray::{s, Array2, Array3, ArrayView2, ArrayView3, ArrayViewMut2, Axis};
use rayon::prelude::*;

use moc_math::exp::ExpEvaluator;
use moc_types::material::Material;

use crate::track::{BoundaryType, Track};

/// Borrowed, iteration-scoped inputs to one sweep.
#[derive(Clone, Copy)]
pub struct SweepContext<'a> {
    pub tracks: &'a [Track],
    pub materials: &'a [Material],
    /// Reduced sources, `[fsr][group]`.
    pub reduced_sources: ArrayView2<'a, f64>,
    pub exp: &'a ExpEvaluator,
    /// `azim_weight * polar multiple * 4 pi`, `[azim][polar]`.
    pub polar_weights: ArrayView2<'a, f64>,
    pub num_fsrs: usize,
    pub num_groups: usize,
    pub num_polar: usize,
}

pub trait TransportSweep {
    /// Run one full sweep. Overwrites `scalar_flux` with this iteration's
    /// track tallies, replaces every incoming slot of `boundary_flux`, and
    /// returns the flux leaked through vacuum boundaries.
    fn sweep(
        &mut self,
        ctx: &SweepContext<'_>,
        scalar_flux: &mut Array2<f64>,
        boundary_flux: &mut Array3<f64>,
    ) -> f64;
}

/// CPU backend: rayon over tracks with per-thread partial tallies, then a
/// transfer pass moving outgoing flux into connected incoming slots.
///
/// Phase 1 reads `boundary_flux` and writes each track's private outgoing
/// slots, so tracks are independent work items; scalar-flux contributions
/// are folded per thread and reduced by summation. Problems below the
/// parallel threshold run serially, which also keeps small tests bitwise
/// deterministic.
pub struct CpuSweep {
    parallel_threshold: usize,
    outgoing: Array3<f64>,
}

impl CpuSweep {
    pub fn new() -> Self {
        CpuSweep {
            parallel_threshold: 128,
            outgoing: Array3::zeros((0, 0, 0)),
        }
    }

    pub fn with_parallel_threshold(parallel_threshold: usize) -> Self {
        CpuSweep {
            parallel_threshold,
            outgoing: Array3::zeros((0, 0, 0)),
        }
    }
}

impl Default for CpuSweep {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportSweep for CpuSweep {
    fn sweep(
        &mut self,
        ctx: &SweepContext<'_>,
        scalar_flux: &mut Array2<f64>,
        boundary_flux: &mut Array3<f64>,
    ) -> f64 {
        let num_tracks = ctx.tracks.len();
        let polar_times_groups = ctx.num_polar * ctx.num_groups;
        if self.outgoing.dim() != (num_tracks, 2, polar_times_groups) {
            self.outgoing = Array3::zeros((num_tracks, 2, polar_times_groups));
        }

        scalar_flux.fill(0.0);
        let incoming = boundary_flux.view();

        if num_tracks < self.parallel_threshold {
            for (t, mut out) in self.outgoing.axis_iter_mut(Axis(0)).enumerate() {
                trace_track(ctx, t, incoming, out.view_mut(), scalar_flux);
            }
        } else {
            let tally = self
                .outgoing
                .axis_iter_mut(Axis(0))
                .into_par_iter()
                .enumerate()
                .fold(
                    || Array2::zeros((ctx.num_fsrs, ctx.num_groups)),
                    |mut partial, (t, mut out)| {
                        trace_track(ctx, t, incoming, out.view_mut(), &mut partial);
                        partial
                    },
                )
                .reduce(
                    || Array2::zeros((ctx.num_fsrs, ctx.num_groups)),
                    |a, b| a + b,
                );
            scalar_flux.assign(&tally);
        }

        // Transfer pass: every incoming slot has exactly one producer, so
        // the order over tracks is immaterial.
        let mut leakage = 0.0;
        for (t, track) in ctx.tracks.iter().enumerate() {
            for (dir, link) in [(0usize, track.forward), (1, track.backward)] {
                let slot = if link.to_forward { 0 } else { 1 };
                match link.boundary {
                    BoundaryType::Vacuum => {
                        for p in 0..ctx.num_polar {
                            let weight = 0.5 * ctx.polar_weights[[track.azim_index, p]];
                            for g in 0..ctx.num_groups {
                                leakage +=
                                    weight * self.outgoing[[t, dir, p * ctx.num_groups + g]];
                            }
                        }
                        boundary_flux.slice_mut(s![link.track, slot, ..]).fill(0.0);
                    }
                    BoundaryType::Reflective | BoundaryType::Periodic => {
                        boundary_flux
                            .slice_mut(s![link.track, slot, ..])
                            .assign(&self.outgoing.slice(s![t, dir, ..]));
                    }
                }
            }
        }
        leakage
    }
}

/// Trace one track in both directions, tallying into `tally` and leaving the
/// attenuated angular flux in `out`.
fn trace_track(
    ctx: &SweepContext<'_>,
    t: usize,
    incoming: ArrayView3<'_, f64>,
    mut out: ArrayViewMut2<'_, f64>,
    tally: &mut Array2<f64>,
) {
    let track = &ctx.tracks[t];
    let num_groups = ctx.num_groups;
    let mut psi = vec![0.0; ctx.num_polar * num_groups];

    for dir in 0..2 {
        psi.copy_from_slice(
            incoming
                .slice(s![t, dir, ..])
                .as_slice()
                .expect("boundary flux rows are contiguous"),
        );

        let mut advance = |segment: &crate::track::Segment| {
            let material = &ctx.materials[segment.material];
            for g in 0..num_groups {
                let tau = material.sigma_t[g] * segment.length;
                let q = ctx.reduced_sources[[segment.fsr, g]];
                for p in 0..ctx.num_polar {
                    let attenuation = ctx.exp.compute_exponential(tau, p);
                    let idx = p * num_groups + g;
                    let delta_psi = (psi[idx] - q) * attenuation;
                    tally[[segment.fsr, g]] +=
                        delta_psi * ctx.polar_weights[[track.azim_index, p]];
                    psi[idx] -= delta_psi;
                }
            }
        };

        if dir == 0 {
            track.segments.iter().for_each(&mut advance);
        } else {
            track.segments.iter().rev().for_each(&mut advance);
        }

        out.slice_mut(s![dir, ..])
            .as_slice_mut()
            .expect("outgoing rows are contiguous")
            .copy_from_slice(&psi);
    }
}
