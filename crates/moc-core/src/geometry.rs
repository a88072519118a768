// ─────────────────────────────────────────────────────────────────────
// SCPN Neutron MOC — Geometry View
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Read-only registry view of the spatial model.
//!
//! Geometry construction (CSG, point location, region discovery) happens in
//! an external collaborator; this module holds the *result* the solver needs:
//! materials, cells, and the dense FSR-to-material / FSR-to-cell maps. The
//! solver only ever borrows a `Geometry`.

use std::collections::HashSet;

use moc_types::error::{SolverError, SolverResult};
use moc_types::material::Material;

/// What a cell is filled with: a material, or a list of child cells.
#[derive(Debug, Clone)]
pub enum CellFill {
    Material(usize),
    /// Container cell: ids of the cells nested inside it.
    Container(Vec<usize>),
}

#[derive(Debug, Clone)]
pub struct Cell {
    pub id: usize,
    pub name: String,
    pub fill: CellFill,
}

#[derive(Debug)]
pub struct Geometry {
    num_groups: usize,
    materials: Vec<Material>,
    cells: Vec<Cell>,
    fsr_to_material: Vec<usize>,
    fsr_to_cell: Vec<usize>,
}

impl Geometry {
    pub fn new(
        num_groups: usize,
        materials: Vec<Material>,
        cells: Vec<Cell>,
        fsr_to_material: Vec<usize>,
        fsr_to_cell: Vec<usize>,
    ) -> SolverResult<Self> {
        if num_groups == 0 {
            return Err(SolverError::InvalidArgument(
                "geometry must carry at least one energy group".into(),
            ));
        }
        if materials.is_empty() {
            return Err(SolverError::InvalidArgument(
                "geometry must carry at least one material".into(),
            ));
        }
        for m in &materials {
            if m.num_groups() != num_groups {
                return Err(SolverError::InvalidArgument(format!(
                    "material '{}' has {} groups, geometry has {num_groups}",
                    m.name,
                    m.num_groups()
                )));
            }
        }
        if fsr_to_material.len() != fsr_to_cell.len() {
            return Err(SolverError::InvalidArgument(format!(
                "FSR maps disagree: {} material entries vs {} cell entries",
                fsr_to_material.len(),
                fsr_to_cell.len()
            )));
        }
        if let Some(&bad) = fsr_to_material.iter().find(|&&m| m >= materials.len()) {
            return Err(SolverError::OutOfRange {
                quantity: "material",
                index: bad,
                lo: 0,
                hi: materials.len(),
            });
        }
        if let Some(&bad) = fsr_to_cell.iter().find(|&&c| c >= cells.len()) {
            return Err(SolverError::OutOfRange {
                quantity: "cell",
                index: bad,
                lo: 0,
                hi: cells.len(),
            });
        }
        for cell in &cells {
            match &cell.fill {
                CellFill::Material(m) if *m >= materials.len() => {
                    return Err(SolverError::OutOfRange {
                        quantity: "material",
                        index: *m,
                        lo: 0,
                        hi: materials.len(),
                    });
                }
                CellFill::Container(children) => {
                    if let Some(&bad) = children.iter().find(|&&c| c >= cells.len()) {
                        return Err(SolverError::OutOfRange {
                            quantity: "cell",
                            index: bad,
                            lo: 0,
                            hi: cells.len(),
                        });
                    }
                }
                _ => {}
            }
        }
        Ok(Geometry {
            num_groups,
            materials,
            cells,
            fsr_to_material,
            fsr_to_cell,
        })
    }

    pub fn num_fsrs(&self) -> usize {
        self.fsr_to_material.len()
    }

    pub fn num_groups(&self) -> usize {
        self.num_groups
    }

    pub fn num_materials(&self) -> usize {
        self.materials.len()
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn material(&self, id: usize) -> &Material {
        &self.materials[id]
    }

    pub fn fsr_material_id(&self, fsr: usize) -> usize {
        self.fsr_to_material[fsr]
    }

    /// Dense FSR-to-material map, indexed by FSR id.
    pub fn fsr_material_ids(&self) -> &[usize] {
        &self.fsr_to_material
    }

    pub fn fsr_material(&self, fsr: usize) -> &Material {
        &self.materials[self.fsr_to_material[fsr]]
    }

    pub fn fsr_cell_id(&self, fsr: usize) -> usize {
        self.fsr_to_cell[fsr]
    }

    pub fn cell(&self, id: usize) -> SolverResult<&Cell> {
        self.cells.get(id).ok_or(SolverError::OutOfRange {
            quantity: "cell",
            index: id,
            lo: 0,
            hi: self.cells.len(),
        })
    }

    /// Ids of all material-filled cells reachable from `cell_id`, expanding
    /// nested containers. A material cell returns itself.
    pub fn material_cell_descendants(&self, cell_id: usize) -> SolverResult<Vec<usize>> {
        self.cell(cell_id)?;
        let mut leaves = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![cell_id];
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            match &self.cells[id].fill {
                CellFill::Material(_) => leaves.push(id),
                CellFill::Container(children) => stack.extend(children.iter().copied()),
            }
        }
        Ok(leaves)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn material(id: usize) -> Material {
        Material::new(
            id,
            format!("m{id}"),
            vec![1.0],
            vec![0.5],
            vec![0.0],
            vec![0.0],
            vec![vec![0.5]],
        )
        .unwrap()
    }

    fn nested_geometry() -> Geometry {
        // Cell 0 and 1 are material leaves; cell 2 contains both; cell 3
        // contains cell 2 (two levels of nesting).
        let cells = vec![
            Cell {
                id: 0,
                name: "fuel".into(),
                fill: CellFill::Material(0),
            },
            Cell {
                id: 1,
                name: "mod".into(),
                fill: CellFill::Material(1),
            },
            Cell {
                id: 2,
                name: "pin".into(),
                fill: CellFill::Container(vec![0, 1]),
            },
            Cell {
                id: 3,
                name: "lattice".into(),
                fill: CellFill::Container(vec![2]),
            },
        ];
        Geometry::new(
            1,
            vec![material(0), material(1)],
            cells,
            vec![0, 1, 0, 1],
            vec![0, 1, 0, 1],
        )
        .unwrap()
    }

    #[test]
    fn test_dimensions() {
        let g = nested_geometry();
        assert_eq!(g.num_fsrs(), 4);
        assert_eq!(g.num_groups(), 1);
        assert_eq!(g.num_materials(), 2);
    }

    #[test]
    fn test_fsr_material_lookup() {
        let g = nested_geometry();
        assert_eq!(g.fsr_material(0).id, 0);
        assert_eq!(g.fsr_material(3).id, 1);
    }

    #[test]
    fn test_descendants_of_material_cell_is_itself() {
        let g = nested_geometry();
        assert_eq!(g.material_cell_descendants(0).unwrap(), vec![0]);
    }

    #[test]
    fn test_descendants_expand_nested_containers() {
        let g = nested_geometry();
        let mut leaves = g.material_cell_descendants(3).unwrap();
        leaves.sort_unstable();
        assert_eq!(leaves, vec![0, 1]);
    }

    #[test]
    fn test_descendants_unknown_cell() {
        let g = nested_geometry();
        assert!(matches!(
            g.material_cell_descendants(9),
            Err(SolverError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_rejects_group_mismatch() {
        let two_group = Material::new(
            0,
            "two",
            vec![1.0, 1.0],
            vec![0.5, 0.5],
            vec![0.0, 0.0],
            vec![0.0, 0.0],
            vec![vec![0.0, 0.0], vec![0.0, 0.0]],
        )
        .unwrap();
        let cells = vec![Cell {
            id: 0,
            name: "c".into(),
            fill: CellFill::Material(0),
        }];
        assert!(Geometry::new(1, vec![two_group], cells, vec![0], vec![0]).is_err());
    }

    #[test]
    fn test_rejects_dangling_fsr_map() {
        let cells = vec![Cell {
            id: 0,
            name: "c".into(),
            fill: CellFill::Material(0),
        }];
        assert!(Geometry::new(1, vec![material(0)], cells, vec![1], vec![0]).is_err());
    }
}
