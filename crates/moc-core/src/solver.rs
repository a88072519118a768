// ─────────────────────────────────────────────────────────────────────
// SCPN Neutron MOC — Solver
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! The outer-iteration convergence engine.
//!
//! `MocSolver` drives repeated transport sweeps to convergence in three
//! modes: fixed-source flux calculation, scaled-source calculation with a
//! caller-supplied k-effective, and power iteration for the critical
//! eigenvalue. It owns every iteration-scoped array (scalar flux buffers,
//! reduced sources, boundary angular flux) and borrows geometry, tracks and
//! materials from an externally owned track source. The per-track
//! integration kernel is a strategy object chosen at construction; an
//! optional CMFD collaborator may take over the k-effective update once per
//! outer iteration.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use ndarray::{Array2, Array3};

use moc_math::exp::ExpEvaluator;
use moc_math::quadrature::PolarQuadrature;
use moc_types::config::{ExpStrategy, ResidualType, SolverOptions};
use moc_types::constants::{FLUX_EPSILON, FOUR_PI};
use moc_types::error::{SolverError, SolverResult};

use crate::cmfd::{CmfdAccelerator, CmfdProblemView};
use crate::source;
use crate::sweep::{CpuSweep, SweepContext, TransportSweep};
use crate::timer::Timer;
use crate::track::TrackStore;

/// Outcome of one top-level solve call.
///
/// `converged == false` is the non-fatal convergence warning: the iteration
/// cap ran out first, and the last computed state remains queryable.
#[derive(Debug, Clone)]
pub struct SolveReport {
    pub converged: bool,
    pub iterations: usize,
    pub residual: f64,
    pub k_eff: f64,
    pub solve_time_s: f64,
}

pub struct MocSolver<'a> {
    track_source: Option<&'a mut TrackStore>,
    options: SolverOptions,
    quadrature: PolarQuadrature,
    exp_evaluator: ExpEvaluator,
    sweep: Box<dyn TransportSweep>,
    cmfd: Option<Box<dyn CmfdAccelerator>>,

    num_azim: usize,
    num_groups: usize,
    num_fsrs: usize,
    num_materials: usize,
    polar_times_groups: usize,
    num_fissionable_fsrs: usize,

    fsr_volumes: Vec<f64>,
    /// `azim_weight * polar multiple * 4 pi`, `[azim][polar]`.
    polar_weights: Array2<f64>,
    scalar_flux: Array2<f64>,
    old_scalar_flux: Array2<f64>,
    reduced_sources: Array2<f64>,
    /// Sparse user overlay; persists across solve calls.
    fixed_source_map: HashMap<(usize, usize), f64>,
    /// Dense overlay materialized at solve setup.
    fixed_sources: Array2<f64>,
    boundary_flux: Array3<f64>,

    k_eff: f64,
    num_iterations: usize,
    leakage: f64,
    flux_computed: bool,
    timer: Timer,
}

impl<'a> MocSolver<'a> {
    /// Solver with the CPU reference sweep backend.
    pub fn new(options: SolverOptions) -> SolverResult<Self> {
        Self::with_sweep(options, Box::new(CpuSweep::new()))
    }

    /// Solver with a caller-chosen sweep backend.
    pub fn with_sweep(
        options: SolverOptions,
        sweep: Box<dyn TransportSweep>,
    ) -> SolverResult<Self> {
        options.validate()?;
        let mut exp_evaluator = ExpEvaluator::new();
        exp_evaluator.set_max_optical_length(options.max_optical_length)?;
        exp_evaluator.set_exp_precision(options.exp_precision)?;
        match options.exp_strategy {
            ExpStrategy::Interpolation => exp_evaluator.use_interpolation(),
            ExpStrategy::Intrinsic => exp_evaluator.use_intrinsic(),
        }
        Ok(MocSolver {
            track_source: None,
            options,
            quadrature: PolarQuadrature::default(),
            exp_evaluator,
            sweep,
            cmfd: None,
            num_azim: 0,
            num_groups: 0,
            num_fsrs: 0,
            num_materials: 0,
            polar_times_groups: 0,
            num_fissionable_fsrs: 0,
            fsr_volumes: Vec::new(),
            polar_weights: Array2::zeros((0, 0)),
            scalar_flux: Array2::zeros((0, 0)),
            old_scalar_flux: Array2::zeros((0, 0)),
            reduced_sources: Array2::zeros((0, 0)),
            fixed_source_map: HashMap::new(),
            fixed_sources: Array2::zeros((0, 0)),
            boundary_flux: Array3::zeros((0, 0, 0)),
            k_eff: 1.0,
            num_iterations: 0,
            leakage: 0.0,
            flux_computed: false,
            timer: Timer::new(),
        })
    }

    // ── Attachment ───────────────────────────────────────────────────

    /// Bind a track source whose generator has already produced and
    /// segmented its tracks. Problem dimensions are derived from the
    /// source's geometry. On failure any previously attached source stays
    /// bound.
    pub fn set_track_source(&mut self, track_source: &'a mut TrackStore) -> SolverResult<()> {
        if !track_source.contains_tracks() {
            return Err(SolverError::Configuration(
                "track source has not yet generated tracks".into(),
            ));
        }
        let geometry = track_source.geometry();
        self.num_azim = track_source.num_azim();
        self.num_fsrs = geometry.num_fsrs();
        self.num_groups = geometry.num_groups();
        self.num_materials = geometry.num_materials();
        self.polar_times_groups = self.num_groups * self.quadrature.num_polar();
        self.track_source = Some(track_source);
        self.fsr_volumes.clear();
        self.num_iterations = 0;
        self.flux_computed = false;
        Ok(())
    }

    /// Replace the default polar quadrature. The exponential table is
    /// rebuilt against the new angles at the next solve.
    pub fn set_polar_quadrature(&mut self, quadrature: PolarQuadrature) {
        self.quadrature = quadrature;
        self.polar_times_groups = self.num_groups * self.quadrature.num_polar();
    }

    /// Attach a CMFD accelerator; it takes over the k-effective update and
    /// boundary-flux correction in eigenvalue solves.
    pub fn set_cmfd(&mut self, cmfd: Box<dyn CmfdAccelerator>) {
        self.cmfd = Some(cmfd);
    }

    // ── Configuration surface ────────────────────────────────────────

    pub fn set_convergence_threshold(&mut self, threshold: f64) -> SolverResult<()> {
        if threshold <= 0.0 {
            return Err(SolverError::InvalidArgument(format!(
                "convergence threshold {threshold} is not positive"
            )));
        }
        self.options.convergence_threshold = threshold;
        Ok(())
    }

    pub fn convergence_threshold(&self) -> f64 {
        self.options.convergence_threshold
    }

    pub fn set_max_optical_length(&mut self, max_optical_length: f64) -> SolverResult<()> {
        self.exp_evaluator.set_max_optical_length(max_optical_length)?;
        self.options.max_optical_length = max_optical_length;
        Ok(())
    }

    pub fn set_exp_precision(&mut self, precision: f64) -> SolverResult<()> {
        self.exp_evaluator.set_exp_precision(precision)?;
        self.options.exp_precision = precision;
        Ok(())
    }

    pub fn use_exponential_interpolation(&mut self) {
        self.exp_evaluator.use_interpolation();
        self.options.exp_strategy = ExpStrategy::Interpolation;
    }

    pub fn use_exponential_intrinsic(&mut self) {
        self.exp_evaluator.use_intrinsic();
        self.options.exp_strategy = ExpStrategy::Intrinsic;
    }

    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    // ── Fixed-source surface ─────────────────────────────────────────

    /// Assign a fixed source to one region and 1-based energy group.
    /// Persists across solve calls until overwritten.
    pub fn set_fixed_source_by_fsr(
        &mut self,
        fsr: usize,
        group: usize,
        value: f64,
    ) -> SolverResult<()> {
        self.ensure_attached()?;
        self.check_fsr(fsr)?;
        self.check_group(group)?;
        self.fixed_source_map.insert((fsr, group - 1), value);
        Ok(())
    }

    /// Assign a fixed source to every region of a cell, expanding nested
    /// container cells down to their material-filled leaves.
    pub fn set_fixed_source_by_cell(
        &mut self,
        cell_id: usize,
        group: usize,
        value: f64,
    ) -> SolverResult<()> {
        self.ensure_attached()?;
        self.check_group(group)?;
        let Some(track_source) = self.track_source.as_deref() else {
            return Err(no_track_source());
        };
        let geometry = track_source.geometry();
        let leaves: HashSet<usize> = geometry
            .material_cell_descendants(cell_id)?
            .into_iter()
            .collect();
        for fsr in 0..self.num_fsrs {
            if leaves.contains(&geometry.fsr_cell_id(fsr)) {
                self.fixed_source_map.insert((fsr, group - 1), value);
            }
        }
        Ok(())
    }

    /// Assign a fixed source to every region currently bound to a material.
    /// A linear scan of the region-to-material map; runs once per
    /// configuration change, never per iteration.
    pub fn set_fixed_source_by_material(
        &mut self,
        material_id: usize,
        group: usize,
        value: f64,
    ) -> SolverResult<()> {
        self.ensure_attached()?;
        self.check_group(group)?;
        if material_id >= self.num_materials {
            return Err(SolverError::OutOfRange {
                quantity: "material",
                index: material_id,
                lo: 0,
                hi: self.num_materials,
            });
        }
        let Some(track_source) = self.track_source.as_deref() else {
            return Err(no_track_source());
        };
        let geometry = track_source.geometry();
        for fsr in 0..self.num_fsrs {
            if geometry.fsr_material_id(fsr) == material_id {
                self.fixed_source_map.insert((fsr, group - 1), value);
            }
        }
        Ok(())
    }

    // ── Solve operations ─────────────────────────────────────────────

    /// Flux from user fixed sources. With `only_fixed_source == false` the
    /// frozen source also carries fission and scatter from a previously
    /// converged flux, superposing the two; the prior flux then seeds the
    /// iteration instead of zero.
    pub fn compute_flux(
        &mut self,
        max_iters: usize,
        only_fixed_source: bool,
    ) -> SolverResult<SolveReport> {
        self.ensure_attached()?;
        log::info!("Computing the flux...");
        self.timer.clear_splits();
        self.timer.start();

        self.initialize_polar_quadrature()?;
        self.initialize_exp_evaluator()?;

        let stale = self.scalar_flux.dim() != (self.num_fsrs, self.num_groups)
            || self.boundary_flux.dim().2 != self.polar_times_groups;
        if only_fixed_source || self.num_iterations == 0 || stale {
            self.initialize_flux_arrays();
            self.flatten_fsr_fluxes(0.0)?;
        }
        self.initialize_source_arrays();
        self.initialize_fsrs()?;
        self.zero_track_fluxes();

        // A flux calculation inverts transport against a frozen total
        // source: assemble once, outside the loop.
        self.compute_fsr_sources()?;

        let threshold = self.options.convergence_threshold;
        let mut residual = f64::INFINITY;
        for i in 0..max_iters {
            self.do_sweep()?;
            self.add_source_to_scalar_flux()?;
            residual = self.compute_residual(ResidualType::ScalarFlux)?;
            self.store_fsr_fluxes();

            log::info!("Iteration {i}: res = {residual:.3e}");

            if i > 1 && residual < threshold {
                self.num_iterations = i;
                self.flux_computed = true;
                return Ok(self.finish_solve(true, residual));
            }
        }

        log::warn!("Unable to converge the flux in {max_iters} iterations");
        self.num_iterations = max_iters;
        self.flux_computed = true;
        Ok(self.finish_solve(false, residual))
    }

    /// Scaled-source calculation for a sub/super-critical problem with a
    /// caller-supplied eigenvalue guess.
    pub fn compute_source(
        &mut self,
        max_iters: usize,
        k_eff: f64,
        residual_type: ResidualType,
    ) -> SolverResult<SolveReport> {
        self.ensure_attached()?;
        if k_eff <= 0.0 {
            return Err(SolverError::InvalidArgument(format!(
                "cannot compute the source with k_eff = {k_eff}"
            )));
        }
        log::info!("Computing the source with k_eff = {k_eff}...");
        self.timer.clear_splits();
        self.timer.start();

        self.k_eff = k_eff;
        self.initialize_polar_quadrature()?;
        self.initialize_exp_evaluator()?;
        self.initialize_flux_arrays();
        self.initialize_source_arrays();
        self.initialize_fsrs()?;

        self.flatten_fsr_fluxes(1.0)?;
        self.zero_track_fluxes();

        let threshold = self.options.convergence_threshold;
        let mut residual = f64::INFINITY;
        for i in 0..max_iters {
            self.compute_fsr_sources()?;
            self.do_sweep()?;
            self.add_source_to_scalar_flux()?;
            residual = self.compute_residual(residual_type)?;
            self.store_fsr_fluxes();

            log::info!("Iteration {i}: res = {residual:.3e}");

            if i > 1 && residual < threshold {
                self.num_iterations = i;
                self.flux_computed = true;
                return Ok(self.finish_solve(true, residual));
            }
        }

        log::warn!("Unable to converge the source in {max_iters} iterations");
        self.num_iterations = max_iters;
        self.flux_computed = true;
        Ok(self.finish_solve(false, residual))
    }

    /// Power iteration for the critical eigenvalue.
    pub fn compute_eigenvalue(
        &mut self,
        max_iters: usize,
        residual_type: ResidualType,
    ) -> SolverResult<SolveReport> {
        self.ensure_attached()?;
        log::info!("Computing the eigenvalue...");
        self.timer.clear_splits();
        self.timer.start();

        self.k_eff = 1.0;
        self.initialize_polar_quadrature()?;
        self.initialize_exp_evaluator()?;
        self.initialize_flux_arrays();
        self.initialize_source_arrays();
        self.initialize_fsrs()?;
        self.prepare_cmfd()?;

        self.flatten_fsr_fluxes(1.0)?;
        self.zero_track_fluxes();

        let threshold = self.options.convergence_threshold;
        let mut residual = f64::INFINITY;
        for i in 0..max_iters {
            self.normalize_fluxes()?;
            self.compute_fsr_sources()?;
            self.do_sweep()?;
            self.add_source_to_scalar_flux()?;
            residual = self.compute_residual(residual_type)?;
            self.store_fsr_fluxes();

            // Either the diffusion accelerator or the transport ratio
            // updates k-effective, once per outer iteration.
            let mut updated_by_cmfd = false;
            if let Some(cmfd) = self.cmfd.as_mut() {
                if cmfd.is_flux_update_on() {
                    self.k_eff = cmfd.compute_keff(i, self.scalar_flux.view_mut())?;
                    let Some(track_source) = self.track_source.as_deref() else {
                        return Err(no_track_source());
                    };
                    cmfd.update_boundary_flux(
                        track_source.tracks(),
                        self.boundary_flux.view_mut(),
                    )?;
                    updated_by_cmfd = true;
                }
            }
            if !updated_by_cmfd {
                self.update_keff_from_fission()?;
            }

            log::info!(
                "Iteration {i}: k_eff = {:.6}  res = {residual:.3e}",
                self.k_eff
            );

            if i > 1 && residual < threshold {
                self.num_iterations = i;
                self.flux_computed = true;
                return Ok(self.finish_solve(true, residual));
            }
        }

        log::warn!("Unable to converge the source distribution in {max_iters} iterations");
        self.num_iterations = max_iters;
        self.flux_computed = true;
        Ok(self.finish_solve(false, residual))
    }

    // ── Query surface ────────────────────────────────────────────────

    pub fn keff(&self) -> f64 {
        self.k_eff
    }

    pub fn num_iterations(&self) -> usize {
        self.num_iterations
    }

    /// Flux leaked through vacuum boundaries in the last sweep.
    pub fn leakage(&self) -> f64 {
        self.leakage
    }

    pub fn num_polar_angles(&self) -> usize {
        self.quadrature.num_polar()
    }

    pub fn num_fsrs(&self) -> usize {
        self.num_fsrs
    }

    pub fn num_groups(&self) -> usize {
        self.num_groups
    }

    pub fn num_fissionable_fsrs(&self) -> usize {
        self.num_fissionable_fsrs
    }

    /// Accumulated seconds of the "Total time" split.
    pub fn total_time(&self) -> f64 {
        self.timer.split("Total time")
    }

    pub fn fsr_volume(&self, fsr: usize) -> SolverResult<f64> {
        self.check_fsr(fsr)?;
        if self.fsr_volumes.is_empty() {
            return Err(SolverError::NotReady(
                "FSR volumes have not yet been computed".into(),
            ));
        }
        Ok(self.fsr_volumes[fsr])
    }

    /// Scalar flux for a region and 1-based energy group.
    pub fn fsr_scalar_flux(&self, fsr: usize, group: usize) -> SolverResult<f64> {
        self.check_fsr(fsr)?;
        self.check_group(group)?;
        if !self.flux_computed {
            return Err(SolverError::NotReady(
                "scalar flux has not yet been computed".into(),
            ));
        }
        Ok(self.scalar_flux[[fsr, group - 1]])
    }

    /// Total source for a region and 1-based energy group, assembled from
    /// the current flux, k-effective and fixed sources.
    pub fn fsr_source(&self, fsr: usize, group: usize) -> SolverResult<f64> {
        self.check_fsr(fsr)?;
        self.check_group(group)?;
        if !self.flux_computed {
            return Err(SolverError::NotReady(
                "sources have not yet been computed".into(),
            ));
        }
        let Some(track_source) = self.track_source.as_deref() else {
            return Err(no_track_source());
        };
        Ok(source::fsr_source(
            track_source.geometry(),
            self.scalar_flux.view(),
            self.fixed_sources.view(),
            self.k_eff,
            fsr,
            group - 1,
        ))
    }

    /// Set every region/group scalar flux to `value`.
    pub fn flatten_fsr_fluxes(&mut self, value: f64) -> SolverResult<()> {
        self.ensure_attached()?;
        if self.scalar_flux.dim() != (self.num_fsrs, self.num_groups) {
            self.initialize_flux_arrays();
        }
        if self.fixed_sources.dim() != (self.num_fsrs, self.num_groups) {
            self.initialize_source_arrays();
        }
        self.scalar_flux.fill(value);
        self.flux_computed = true;
        Ok(())
    }

    // ── Reporting ────────────────────────────────────────────────────

    /// Human-readable timing summary for the last solve.
    pub fn timing_report(&self) -> SolverResult<String> {
        let Some(track_source) = self.track_source.as_deref() else {
            return Err(no_track_source());
        };
        let total = self.timer.split("Total time");
        let time_per_iter = total / self.num_iterations.max(1) as f64;
        let num_tracks = track_source.total_num_tracks();
        let num_segments = track_source.total_num_segments();
        let num_integrations =
            (2 * self.quadrature.num_polar() * self.num_groups * num_segments).max(1);
        let time_per_integration = time_per_iter / num_integrations as f64;

        let mut report = String::new();
        let _ = writeln!(report, "TIMING REPORT");
        let _ = writeln!(
            report,
            "{:.<53}{total:1.4e} s",
            "Total time to solution"
        );
        let _ = writeln!(
            report,
            "{:.<53}{time_per_iter:1.4e} s",
            "Solution time per iteration"
        );
        let _ = writeln!(
            report,
            "{:.<53}{time_per_integration:1.4e} s",
            "Integration time per segment integration"
        );
        let _ = writeln!(
            report,
            "# tracks: {num_tracks}   # segments: {num_segments}   # FSRs: {}",
            self.num_fsrs
        );
        Ok(report)
    }

    pub fn log_timing_report(&self) -> SolverResult<()> {
        for line in self.timing_report()?.lines() {
            log::info!("{line}");
        }
        Ok(())
    }

    // ── Iteration-scoped lifecycle ───────────────────────────────────

    fn ensure_attached(&self) -> SolverResult<()> {
        if self.track_source.is_none() {
            return Err(no_track_source());
        }
        Ok(())
    }

    fn check_fsr(&self, fsr: usize) -> SolverResult<()> {
        if fsr >= self.num_fsrs {
            return Err(SolverError::OutOfRange {
                quantity: "FSR",
                index: fsr,
                lo: 0,
                hi: self.num_fsrs,
            });
        }
        Ok(())
    }

    fn check_group(&self, group: usize) -> SolverResult<()> {
        if group == 0 || group > self.num_groups {
            return Err(SolverError::OutOfRange {
                quantity: "energy group",
                index: group,
                lo: 1,
                hi: self.num_groups + 1,
            });
        }
        Ok(())
    }

    fn initialize_polar_quadrature(&mut self) -> SolverResult<()> {
        let Some(track_source) = self.track_source.as_deref() else {
            return Err(no_track_source());
        };
        let num_polar = self.quadrature.num_polar();
        self.polar_times_groups = self.num_groups * num_polar;

        let mut weights = Array2::zeros((self.num_azim, num_polar));
        for (azim, &azim_weight) in track_source.azim_weights().iter().enumerate() {
            for p in 0..num_polar {
                weights[[azim, p]] = azim_weight * self.quadrature.multiple(p) * FOUR_PI;
            }
        }
        self.polar_weights = weights;
        Ok(())
    }

    /// Reconcile the optical-length bound against the tracks, have the
    /// generator split over-long segments, and (re)build the table.
    fn initialize_exp_evaluator(&mut self) -> SolverResult<()> {
        self.exp_evaluator.set_polar_quadrature(&self.quadrature);
        if self.exp_evaluator.is_using_interpolation() {
            let Some(track_source) = self.track_source.as_deref_mut() else {
                return Err(no_track_source());
            };
            let measured = track_source.max_optical_length();
            let bound = measured.min(self.options.max_optical_length);
            track_source.split_segments(bound);
            self.exp_evaluator.set_max_optical_length(bound)?;
        }
        self.exp_evaluator.initialize()
    }

    fn initialize_fsrs(&mut self) -> SolverResult<()> {
        let Some(track_source) = self.track_source.as_deref() else {
            return Err(no_track_source());
        };
        log::debug!("Initializing flat source regions...");
        let volumes = track_source.fsr_volumes();
        if let Some(fsr) = volumes.iter().position(|&v| v <= 0.0) {
            return Err(SolverError::Configuration(format!(
                "FSR {fsr} is not crossed by any track segment"
            )));
        }

        let geometry = track_source.geometry();
        self.num_fissionable_fsrs = (0..self.num_fsrs)
            .filter(|&fsr| geometry.fsr_material(fsr).is_fissionable())
            .count();
        self.fsr_volumes = volumes;
        Ok(())
    }

    fn initialize_flux_arrays(&mut self) {
        let Some(track_source) = self.track_source.as_deref() else {
            return;
        };
        let num_tracks = track_source.total_num_tracks();
        self.scalar_flux = Array2::zeros((self.num_fsrs, self.num_groups));
        self.old_scalar_flux = Array2::zeros((self.num_fsrs, self.num_groups));
        self.boundary_flux = Array3::zeros((num_tracks, 2, self.polar_times_groups));
    }

    fn initialize_source_arrays(&mut self) {
        self.reduced_sources = Array2::zeros((self.num_fsrs, self.num_groups));
        let mut fixed = Array2::zeros((self.num_fsrs, self.num_groups));
        for (&(fsr, group), &value) in &self.fixed_source_map {
            if fsr < self.num_fsrs && group < self.num_groups {
                fixed[[fsr, group]] = value;
            } else {
                log::warn!(
                    "dropping fixed source for FSR {fsr}, group {}: outside current dimensions",
                    group + 1
                );
            }
        }
        self.fixed_sources = fixed;
    }

    fn zero_track_fluxes(&mut self) {
        self.boundary_flux.fill(0.0);
    }

    fn store_fsr_fluxes(&mut self) {
        self.old_scalar_flux.assign(&self.scalar_flux);
    }

    /// Scale scalar and boundary fluxes so the volume-integrated fission
    /// source is exactly one.
    fn normalize_fluxes(&mut self) -> SolverResult<()> {
        let Some(track_source) = self.track_source.as_deref() else {
            return Err(no_track_source());
        };
        let total = source::total_fission_source(
            track_source.geometry(),
            self.scalar_flux.view(),
            &self.fsr_volumes,
        );
        if total <= FLUX_EPSILON {
            return Err(SolverError::Configuration(
                "eigenvalue problem has no fission source: geometry carries no fissionable material"
                    .into(),
            ));
        }
        let norm = 1.0 / total;
        self.scalar_flux.mapv_inplace(|v| v * norm);
        self.boundary_flux.mapv_inplace(|v| v * norm);
        Ok(())
    }

    fn compute_fsr_sources(&mut self) -> SolverResult<()> {
        let Some(track_source) = self.track_source.as_deref() else {
            return Err(no_track_source());
        };
        source::compute_reduced_sources(
            track_source.geometry(),
            self.scalar_flux.view(),
            self.fixed_sources.view(),
            self.k_eff,
            self.reduced_sources.view_mut(),
        );
        Ok(())
    }

    fn do_sweep(&mut self) -> SolverResult<()> {
        let Some(track_source) = self.track_source.as_deref() else {
            return Err(no_track_source());
        };
        let geometry = track_source.geometry();
        let ctx = SweepContext {
            tracks: track_source.tracks(),
            materials: geometry.materials(),
            reduced_sources: self.reduced_sources.view(),
            exp: &self.exp_evaluator,
            polar_weights: self.polar_weights.view(),
            num_fsrs: self.num_fsrs,
            num_groups: self.num_groups,
            num_polar: self.quadrature.num_polar(),
        };
        self.leakage = self
            .sweep
            .sweep(&ctx, &mut self.scalar_flux, &mut self.boundary_flux);
        Ok(())
    }

    /// Fold the track tallies and the self-scattering source into the
    /// scalar flux: `phi = 4 pi q_reduced + tally / (2 sigma_t V)`.
    fn add_source_to_scalar_flux(&mut self) -> SolverResult<()> {
        let Some(track_source) = self.track_source.as_deref() else {
            return Err(no_track_source());
        };
        let geometry = track_source.geometry();
        for fsr in 0..self.num_fsrs {
            let sigma_t = &geometry.fsr_material(fsr).sigma_t;
            let volume = self.fsr_volumes[fsr];
            for g in 0..self.num_groups {
                let tally = 0.5 * self.scalar_flux[[fsr, g]];
                self.scalar_flux[[fsr, g]] =
                    FOUR_PI * self.reduced_sources[[fsr, g]] + tally / (sigma_t[g] * volume);
            }
        }
        Ok(())
    }

    /// New-to-old fission-source ratio; the pre-sweep integral was
    /// normalized to one, so the ratio is the new integral itself.
    fn update_keff_from_fission(&mut self) -> SolverResult<()> {
        let Some(track_source) = self.track_source.as_deref() else {
            return Err(no_track_source());
        };
        let new_fission = source::total_fission_source(
            track_source.geometry(),
            self.scalar_flux.view(),
            &self.fsr_volumes,
        );
        self.k_eff *= new_fission;
        Ok(())
    }

    fn prepare_cmfd(&mut self) -> SolverResult<()> {
        if let Some(cmfd) = self.cmfd.as_mut() {
            if cmfd.is_flux_update_on() {
                let Some(track_source) = self.track_source.as_deref() else {
                    return Err(no_track_source());
                };
                let geometry = track_source.geometry();
                cmfd.prepare(&CmfdProblemView {
                    fsr_volumes: &self.fsr_volumes,
                    fsr_materials: geometry.fsr_material_ids(),
                    materials: geometry.materials(),
                    polar_multiples: self.quadrature.multiples(),
                    num_groups: self.num_groups,
                })?;
            }
        }
        Ok(())
    }

    /// RMS of `(new - old) / new` over tallied entries; entries with `new`
    /// below epsilon are excluded to avoid division blow-up.
    fn compute_residual(&self, residual_type: ResidualType) -> SolverResult<f64> {
        let Some(track_source) = self.track_source.as_deref() else {
            return Err(no_track_source());
        };
        let geometry = track_source.geometry();

        let rms = |pairs: &mut dyn Iterator<Item = (f64, f64)>, norm: Option<usize>| {
            let mut sum = 0.0;
            let mut count = 0usize;
            for (new, old) in pairs {
                if new > FLUX_EPSILON {
                    let ratio = (new - old) / new;
                    sum += ratio * ratio;
                    count += 1;
                }
            }
            (sum / norm.unwrap_or(count).max(1) as f64).sqrt()
        };

        let residual = match residual_type {
            ResidualType::ScalarFlux => rms(
                &mut self
                    .scalar_flux
                    .iter()
                    .zip(self.old_scalar_flux.iter())
                    .map(|(&n, &o)| (n, o)),
                None,
            ),
            ResidualType::TotalSource => {
                let new = source::total_source_by_fsr(
                    geometry,
                    self.scalar_flux.view(),
                    self.fixed_sources.view(),
                    self.k_eff,
                );
                let old = source::total_source_by_fsr(
                    geometry,
                    self.old_scalar_flux.view(),
                    self.fixed_sources.view(),
                    self.k_eff,
                );
                rms(&mut new.iter().zip(old.iter()).map(|(&n, &o)| (n, o)), None)
            }
            ResidualType::FissionSource => {
                let new = source::fission_source_by_fsr(geometry, self.scalar_flux.view());
                let old = source::fission_source_by_fsr(geometry, self.old_scalar_flux.view());
                rms(
                    &mut new.iter().zip(old.iter()).map(|(&n, &o)| (n, o)),
                    Some(self.num_fissionable_fsrs),
                )
            }
        };
        Ok(residual)
    }

    fn finish_solve(&mut self, converged: bool, residual: f64) -> SolveReport {
        self.timer.stop();
        self.timer.record_split("Total time");
        SolveReport {
            converged,
            iterations: self.num_iterations,
            residual,
            k_eff: self.k_eff,
            solve_time_s: self.timer.split("Total time"),
        }
    }
}

fn no_track_source() -> SolverError {
    SolverError::Configuration("no track source attached to the solver".into())
}
