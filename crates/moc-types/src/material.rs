// ─────────────────────────────────────────────────────────────────────
// SCPN Neutron MOC — Material
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Multigroup macroscopic cross-section data.
//!
//! Materials are produced by an external data layer and only *borrowed* by
//! the solver; the solver never mutates them.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::{SolverError, SolverResult};

/// Macroscopic cross sections for one material, all in 1/cm.
///
/// `sigma_s[from][to]` is the group-to-group scattering matrix.
#[derive(Debug, Clone)]
pub struct Material {
    pub id: usize,
    pub name: String,
    pub sigma_t: Vec<f64>,
    pub sigma_a: Vec<f64>,
    pub nu_sigma_f: Vec<f64>,
    pub chi: Vec<f64>,
    pub sigma_s: Vec<Vec<f64>>,
    fissionable: bool,
}

/// On-disk cross-section record: a JSON object keyed by material name.
#[derive(Debug, Deserialize)]
struct MaterialRecord {
    sigma_t: Vec<f64>,
    sigma_a: Vec<f64>,
    nu_sigma_f: Vec<f64>,
    chi: Vec<f64>,
    sigma_s: Vec<Vec<f64>>,
}

impl Material {
    /// Build a material, checking that every vector agrees on the group count
    /// and that the total cross section is strictly positive (the transport
    /// update divides by it).
    pub fn new(
        id: usize,
        name: impl Into<String>,
        sigma_t: Vec<f64>,
        sigma_a: Vec<f64>,
        nu_sigma_f: Vec<f64>,
        chi: Vec<f64>,
        sigma_s: Vec<Vec<f64>>,
    ) -> SolverResult<Self> {
        let name = name.into();
        let num_groups = sigma_t.len();
        if num_groups == 0 {
            return Err(SolverError::InvalidArgument(format!(
                "material '{name}' has no energy groups"
            )));
        }
        for (label, len) in [
            ("sigma_a", sigma_a.len()),
            ("nu_sigma_f", nu_sigma_f.len()),
            ("chi", chi.len()),
            ("sigma_s rows", sigma_s.len()),
        ] {
            if len != num_groups {
                return Err(SolverError::InvalidArgument(format!(
                    "material '{name}': {label} has {len} entries, expected {num_groups}"
                )));
            }
        }
        if sigma_s.iter().any(|row| row.len() != num_groups) {
            return Err(SolverError::InvalidArgument(format!(
                "material '{name}': sigma_s is not a {num_groups}x{num_groups} matrix"
            )));
        }
        if sigma_t.iter().any(|&xs| xs <= 0.0) {
            return Err(SolverError::InvalidArgument(format!(
                "material '{name}': sigma_t must be positive in every group"
            )));
        }
        let fissionable = nu_sigma_f.iter().any(|&xs| xs > 0.0);
        Ok(Material {
            id,
            name,
            sigma_t,
            sigma_a,
            nu_sigma_f,
            chi,
            sigma_s,
            fissionable,
        })
    }

    pub fn num_groups(&self) -> usize {
        self.sigma_t.len()
    }

    pub fn is_fissionable(&self) -> bool {
        self.fissionable
    }

    /// Scattering cross section from group `from` into group `to` (0-based).
    pub fn sigma_s(&self, from: usize, to: usize) -> f64 {
        self.sigma_s[from][to]
    }
}

/// Load a set of materials from a JSON file keyed by material name.
///
/// Ids are assigned in name order so a data file always materializes the
/// same way.
pub fn load_materials(path: &str) -> SolverResult<Vec<Material>> {
    let contents = std::fs::read_to_string(path)?;
    let records: BTreeMap<String, MaterialRecord> = serde_json::from_str(&contents)?;
    records
        .into_iter()
        .enumerate()
        .map(|(id, (name, r))| {
            Material::new(
                id,
                name,
                r.sigma_t,
                r.sigma_a,
                r.nu_sigma_f,
                r.chi,
                r.sigma_s,
            )
        })
        .collect()
}
