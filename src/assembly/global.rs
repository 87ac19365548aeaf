//! Global matrix assembly by scatter-add over element DOF maps

use std::collections::BTreeMap;

use nalgebra_sparse::CscMatrix;
use serde::{Deserialize, Serialize};

use super::dof::DofManager;
use super::elements::{prepare_elements, ElementMatrices, SkippedElement};
use crate::analysis::MassFormulation;
use crate::error::{FEAError, FEAResult};
use crate::math::SparseMatrixBuilder;
use crate::model::FEModel;

/// What went into an assembly pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssemblyReport {
    pub assembled: usize,
    pub skipped: Vec<SkippedElement>,
}

/// Assembles global stiffness, mass and geometric stiffness matrices.
///
/// Element matrices are built once at construction and reused for every
/// matrix the drivers request.
#[derive(Debug, Clone)]
pub struct GlobalAssembler {
    size: usize,
    elements: Vec<ElementMatrices>,
    skipped: Vec<SkippedElement>,
    springs: BTreeMap<usize, f64>,
    /// (first DOF of node, lumped mass)
    nodal_masses: Vec<(usize, f64)>,
}

impl GlobalAssembler {
    /// Prepare element matrices for a finalized DOF manager.
    ///
    /// Fails with [`FEAError::ModelIntegrity`] when no element survives.
    pub fn new(model: &FEModel, dofs: &DofManager) -> FEAResult<Self> {
        dofs.free_dofs()?;
        let (elements, skipped) = prepare_elements(model, dofs);
        if elements.is_empty() {
            return Err(FEAError::integrity(
                "*",
                format!(
                    "no elements could be assembled ({} skipped)",
                    skipped.len()
                ),
            ));
        }

        let mut nodal_masses = Vec::new();
        for node in &model.nodes {
            if let Some(mass) = node.mass.filter(|m| *m > 0.0) {
                let first = dofs.node_dofs(&node.id)?[0];
                nodal_masses.push((first, mass));
            }
        }

        log::debug!(
            "Prepared {} element matrices ({} skipped), {} DOFs",
            elements.len(),
            skipped.len(),
            dofs.num_dofs()
        );

        Ok(Self {
            size: dofs.num_dofs(),
            elements,
            skipped,
            springs: dofs.springs().clone(),
            nodal_masses,
        })
    }

    /// Matrix dimension (6 × node count)
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn elements(&self) -> &[ElementMatrices] {
        &self.elements
    }

    pub fn skipped(&self) -> &[SkippedElement] {
        &self.skipped
    }

    pub fn report(&self) -> AssemblyReport {
        AssemblyReport {
            assembled: self.elements.len(),
            skipped: self.skipped.clone(),
        }
    }

    pub fn springs(&self) -> &BTreeMap<usize, f64> {
        &self.springs
    }

    /// Element stiffness only (no support springs)
    pub fn stiffness(&self) -> CscMatrix<f64> {
        let mut builder = SparseMatrixBuilder::new(self.size);
        for em in &self.elements {
            builder.add_element_matrix(&em.dofs, &em.k_global);
        }
        builder.to_csc()
    }

    /// Element stiffness plus support springs on the diagonal
    pub fn stiffness_with_springs(&self) -> CscMatrix<f64> {
        let mut builder = SparseMatrixBuilder::new(self.size);
        for em in &self.elements {
            builder.add_element_matrix(&em.dofs, &em.k_global);
        }
        for (&dof, &k) in &self.springs {
            builder.add(dof, dof, k);
        }
        builder.to_csc()
    }

    /// Mass matrix from element mass plus lumped nodal masses
    pub fn mass(&self, formulation: MassFormulation) -> FEAResult<CscMatrix<f64>> {
        let mut builder = SparseMatrixBuilder::new(self.size);
        for em in &self.elements {
            builder.add_element_matrix(&em.dofs, &em.mass_global(formulation)?);
        }
        for &(first, mass) in &self.nodal_masses {
            for k in 0..3 {
                builder.add(first + k, first + k, mass);
            }
        }
        Ok(builder.to_csc())
    }

    /// Geometric stiffness for per-element axial forces (aligned with [`Self::elements`])
    pub fn geometric_stiffness(&self, axial: &[f64]) -> FEAResult<CscMatrix<f64>> {
        let mut builder = SparseMatrixBuilder::new(self.size);
        for (em, &n) in self.elements.iter().zip(axial) {
            builder.add_element_matrix(&em.dofs, &em.geometric_global(n)?);
        }
        Ok(builder.to_csc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{Element, Material, Node, Section};
    use crate::math::sparse::{max_asymmetry, to_dense};
    use approx::assert_relative_eq;

    fn portal() -> (FEModel, DofManager) {
        let mut model = FEModel::new();
        model.add_material("Steel", Material::steel()).unwrap();
        model.add_section("S", Section::rectangular(0.2, 0.3)).unwrap();
        model.add_node("A", Node::new(0.0, 0.0, 0.0)).unwrap();
        model.add_node("B", Node::new(0.0, 0.0, 3.0)).unwrap();
        model.add_node("C", Node::new(4.0, 0.0, 3.0).with_mass(100.0)).unwrap();
        model.add_node("D", Node::new(4.0, 0.0, 0.0)).unwrap();
        model.add_element("C1", Element::column("A", "B", "Steel", "S")).unwrap();
        model.add_element("B1", Element::beam("B", "C", "Steel", "S").with_rotation(0.2)).unwrap();
        model.add_element("C2", Element::column("D", "C", "Steel", "S")).unwrap();
        model.add_element("X1", Element::brace("A", "C", "Steel", "S")).unwrap();
        let mut dofs = DofManager::new();
        for node in &model.nodes {
            dofs.assign(&node.id).unwrap();
        }
        dofs.add_spring("D", 0, 1e6).unwrap();
        dofs.finalize().unwrap();
        (model, dofs)
    }

    #[test]
    fn test_assembled_matrices_are_symmetric() {
        let (model, dofs) = portal();
        let assembler = GlobalAssembler::new(&model, &dofs).unwrap();
        assert_eq!(assembler.report().assembled, 4);

        let k = assembler.stiffness();
        let scale = to_dense(&k).amax();
        assert!(max_asymmetry(&k) <= 1e-12 * scale);

        let m = assembler.mass(MassFormulation::Consistent).unwrap();
        let m_scale = to_dense(&m).amax();
        assert!(max_asymmetry(&m) <= 1e-12 * m_scale);
    }

    #[test]
    fn test_scatter_add_accumulates_shared_dofs() {
        let (model, dofs) = portal();
        let assembler = GlobalAssembler::new(&model, &dofs).unwrap();
        let k = to_dense(&assembler.stiffness());
        // Node B (DOFs 6..12) is shared by C1 and B1
        let dof = 6;
        let expected: f64 = assembler
            .elements()
            .iter()
            .flat_map(|em| {
                em.dofs
                    .iter()
                    .enumerate()
                    .filter(|&(_, &d)| d == dof)
                    .map(move |(local, _)| em.k_global[(local, local)])
            })
            .sum();
        assert_relative_eq!(k[(dof, dof)], expected, max_relative = 1e-12);
    }

    #[test]
    fn test_springs_and_nodal_mass() {
        let (model, dofs) = portal();
        let assembler = GlobalAssembler::new(&model, &dofs).unwrap();
        let k = to_dense(&assembler.stiffness());
        let ks = to_dense(&assembler.stiffness_with_springs());
        assert_relative_eq!(ks[(18, 18)] - k[(18, 18)], 1e6, max_relative = 1e-9);

        let lumped = to_dense(&assembler.mass(MassFormulation::Lumped).unwrap());
        let consistent = to_dense(&assembler.mass(MassFormulation::Consistent).unwrap());
        // Total translational mass in X is the same for both formulations
        let total_x = |m: &crate::math::Mat| {
            let mut sum = 0.0;
            for i in (0..24).step_by(6) {
                for j in (0..24).step_by(6) {
                    sum += m[(i, j)];
                }
            }
            sum
        };
        assert_relative_eq!(total_x(&lumped), total_x(&consistent), max_relative = 1e-9);
        assert!(total_x(&lumped) > 100.0);
    }

    #[test]
    fn test_no_elements_is_an_integrity_error() {
        let mut model = FEModel::new();
        model.add_node("A", Node::new(0.0, 0.0, 0.0)).unwrap();
        let mut dofs = DofManager::new();
        dofs.assign("A").unwrap();
        dofs.finalize().unwrap();
        let err = GlobalAssembler::new(&model, &dofs).unwrap_err();
        assert!(matches!(err, FEAError::ModelIntegrity { .. }));
    }
}
