// ─────────────────────────────────────────────────────────────────────
// SCPN Neutron MOC — Track Registry
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Characteristic tracks and the store binding them to a geometry.
//!
//! Ray tracing lives in an external generator; `TrackStore` is the contract
//! it fills: a flat track array ordered by azimuthal index, per-azimuth
//! weights and the lateral track spacing. The solver borrows the store for
//! the duration of a solve and asks it to split over-long segments before an
//! exponential table is built.

use moc_types::error::{SolverError, SolverResult};

use crate::geometry::Geometry;

/// Boundary policy at a track end, recorded at geometry-build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryType {
    Vacuum,
    Reflective,
    Periodic,
}

/// Portion of a track crossing a single flat source region.
#[derive(Debug, Clone)]
pub struct Segment {
    pub fsr: usize,
    pub material: usize,
    /// Physical length in cm.
    pub length: f64,
}

/// Where the angular flux leaving one end of a track goes.
#[derive(Debug, Clone, Copy)]
pub struct TrackLink {
    /// Receiving track index.
    pub track: usize,
    /// Whether the flux enters the receiving track travelling forward.
    pub to_forward: bool,
    pub boundary: BoundaryType,
}

#[derive(Debug, Clone)]
pub struct Track {
    pub azim_index: usize,
    pub segments: Vec<Segment>,
    /// Connectivity for flux leaving the forward end.
    pub forward: TrackLink,
    /// Connectivity for flux leaving the backward end.
    pub backward: TrackLink,
}

#[derive(Debug)]
pub struct TrackStore {
    geometry: Geometry,
    num_azim: usize,
    track_spacing: f64,
    azim_weights: Vec<f64>,
    tracks: Vec<Track>,
}

impl TrackStore {
    pub fn new(
        geometry: Geometry,
        num_azim: usize,
        track_spacing: f64,
        azim_weights: Vec<f64>,
    ) -> SolverResult<Self> {
        if num_azim == 0 {
            return Err(SolverError::InvalidArgument(
                "track store requires at least one azimuthal angle".into(),
            ));
        }
        if track_spacing <= 0.0 {
            return Err(SolverError::InvalidArgument(format!(
                "track spacing {track_spacing} is not positive"
            )));
        }
        if azim_weights.len() != num_azim {
            return Err(SolverError::InvalidArgument(format!(
                "{} azimuthal weights for {num_azim} azimuthal angles",
                azim_weights.len()
            )));
        }
        if azim_weights.iter().any(|&w| w <= 0.0) {
            return Err(SolverError::InvalidArgument(
                "azimuthal weights must be positive".into(),
            ));
        }
        Ok(TrackStore {
            geometry,
            num_azim,
            track_spacing,
            azim_weights,
            tracks: Vec::new(),
        })
    }

    /// Append a generated, segmented track. Tracks must arrive in
    /// azimuthal-index-major order so the flat array is deterministic.
    pub fn push_track(&mut self, track: Track) -> SolverResult<()> {
        if track.azim_index >= self.num_azim {
            return Err(SolverError::OutOfRange {
                quantity: "azimuthal angle",
                index: track.azim_index,
                lo: 0,
                hi: self.num_azim,
            });
        }
        if let Some(last) = self.tracks.last() {
            if track.azim_index < last.azim_index {
                return Err(SolverError::InvalidArgument(
                    "tracks must be pushed in azimuthal-index order".into(),
                ));
            }
        }
        if track.segments.is_empty() {
            return Err(SolverError::InvalidArgument(
                "a generated track must carry at least one segment".into(),
            ));
        }
        for segment in &track.segments {
            if segment.fsr >= self.geometry.num_fsrs() {
                return Err(SolverError::OutOfRange {
                    quantity: "FSR",
                    index: segment.fsr,
                    lo: 0,
                    hi: self.geometry.num_fsrs(),
                });
            }
            if segment.material >= self.geometry.num_materials() {
                return Err(SolverError::OutOfRange {
                    quantity: "material",
                    index: segment.material,
                    lo: 0,
                    hi: self.geometry.num_materials(),
                });
            }
            if segment.length <= 0.0 {
                return Err(SolverError::InvalidArgument(format!(
                    "segment length {} is not positive",
                    segment.length
                )));
            }
        }
        self.tracks.push(track);
        Ok(())
    }

    /// Whether ray tracing has produced any tracks yet.
    pub fn contains_tracks(&self) -> bool {
        !self.tracks.is_empty()
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn num_azim(&self) -> usize {
        self.num_azim
    }

    pub fn track_spacing(&self) -> f64 {
        self.track_spacing
    }

    pub fn azim_weights(&self) -> &[f64] {
        &self.azim_weights
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn total_num_tracks(&self) -> usize {
        self.tracks.len()
    }

    pub fn total_num_segments(&self) -> usize {
        self.tracks.iter().map(|t| t.segments.len()).sum()
    }

    /// Largest optical length of any segment, over all energy groups.
    pub fn max_optical_length(&self) -> f64 {
        let mut max_tau = 0.0f64;
        for track in &self.tracks {
            for segment in &track.segments {
                let material = self.geometry.material(segment.material);
                for &sigma_t in &material.sigma_t {
                    max_tau = max_tau.max(sigma_t * segment.length);
                }
            }
        }
        max_tau
    }

    /// Split any segment whose optical length exceeds `max_tau` into equal
    /// sub-segments of the same FSR and material.
    pub fn split_segments(&mut self, max_tau: f64) {
        for track in &mut self.tracks {
            let needs_split = track.segments.iter().any(|s| {
                let material = self.geometry.material(s.material);
                material.sigma_t.iter().any(|&xs| xs * s.length > max_tau)
            });
            if !needs_split {
                continue;
            }
            let mut split = Vec::with_capacity(track.segments.len());
            for segment in track.segments.drain(..) {
                let material = self.geometry.material(segment.material);
                let tau = material
                    .sigma_t
                    .iter()
                    .fold(0.0f64, |acc, &xs| acc.max(xs * segment.length));
                let pieces = (tau / max_tau).ceil().max(1.0) as usize;
                let length = segment.length / pieces as f64;
                for _ in 0..pieces {
                    split.push(Segment {
                        fsr: segment.fsr,
                        material: segment.material,
                        length,
                    });
                }
            }
            track.segments = split;
        }
    }

    /// FSR volumes from cumulative track-segment length:
    /// `sum(length * azim_weight * track_spacing)` per region.
    pub fn fsr_volumes(&self) -> Vec<f64> {
        let mut volumes = vec![0.0; self.geometry.num_fsrs()];
        for track in &self.tracks {
            let weight = self.azim_weights[track.azim_index] * self.track_spacing;
            for segment in &track.segments {
                volumes[segment.fsr] += segment.length * weight;
            }
        }
        volumes
    }
}
