//! Per-element matrix preparation
//!
//! Each active element is turned into an [`ElementMatrices`] record holding
//! its properties, local triad, DOF map and stiffness in local and global
//! axes. Building is read-only per element, so it runs in parallel when the
//! `parallel` feature is enabled; the output keeps model order.

use std::collections::HashMap;

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::dof::DofManager;
use crate::analysis::MassFormulation;
use crate::elements::{Element, ElementKind, Node};
use crate::error::{FEAError, FEAResult};
use crate::math::geometry::LocalAxes;
use crate::math::{self, Mat12, MemberProperties, Vec12};
use crate::model::FEModel;

/// An element left out of assembly, with the reason
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedElement {
    pub element: String,
    pub reason: String,
}

/// Cached matrices and DOF map of one assembled element
#[derive(Debug, Clone)]
pub struct ElementMatrices {
    pub id: String,
    pub kind: ElementKind,
    pub props: MemberProperties,
    pub axes: LocalAxes,
    /// Maps nodal DOFs (in node axes) to element-local DOFs
    pub transform: Mat12,
    /// Global DOF indices `[i-node DOFs, j-node DOFs]`
    pub dofs: [usize; 12],
    pub k_local: Mat12,
    pub k_global: Mat12,
}

impl ElementMatrices {
    /// Build the record for one element.
    ///
    /// Fails with [`FEAError::ModelIntegrity`] for unresolved references or
    /// invalid properties and [`FEAError::DegenerateGeometry`] for zero length.
    pub fn build(
        element: &Element,
        nodes: &HashMap<&str, &Node>,
        model: &FEModel,
        dofs: &DofManager,
    ) -> FEAResult<Self> {
        let id = element.id.as_str();
        let i_node = nodes
            .get(element.i_node.as_str())
            .ok_or_else(|| FEAError::integrity(id, format!("start node '{}' not found", element.i_node)))?;
        let j_node = nodes
            .get(element.j_node.as_str())
            .ok_or_else(|| FEAError::integrity(id, format!("end node '{}' not found", element.j_node)))?;
        let material = model
            .materials
            .get(&element.material)
            .ok_or_else(|| FEAError::integrity(id, format!("material '{}' not found", element.material)))?;
        let section = model
            .sections
            .get(&element.section)
            .ok_or_else(|| FEAError::integrity(id, format!("section '{}' not found", element.section)))?;
        material
            .validate()
            .map_err(|msg| FEAError::integrity(id, format!("material '{}': {}", element.material, msg)))?;
        section
            .validate()
            .map_err(|msg| FEAError::integrity(id, format!("section '{}': {}", element.section, msg)))?;

        let (ci, cj) = (i_node.coords(), j_node.coords());
        let length = math::element_length(&ci, &cj);
        let axes = LocalAxes::from_nodes(&ci, &cj, element.rotation).ok_or_else(|| {
            FEAError::DegenerateGeometry {
                element: id.to_string(),
                length,
            }
        })?;

        let props = MemberProperties {
            e: material.e,
            g: material.shear_modulus(),
            rho: material.rho,
            a: section.a,
            iy: section.iy,
            iz: section.iz,
            j: section.torsion_constant(),
            length,
        };

        let node_rotation = math::node_rotation_matrix(
            i_node.rotation().as_ref(),
            j_node.rotation().as_ref(),
        );
        let transform = math::transformation_matrix(&axes.rotation_matrix()) * node_rotation;

        let (k_local, k_global) = if element.kind.has_bending() {
            let k_local = math::beam_local_stiffness(&props).map_err(|e| e.for_element(id))?;
            let k_global = transform.transpose() * k_local * transform;
            (k_local, k_global)
        } else {
            let k_local = math::truss_local_stiffness(&props).map_err(|e| e.for_element(id))?;
            let k_cosines =
                math::truss_stiffness(&axes.direction_cosines(), &props).map_err(|e| e.for_element(id))?;
            (k_local, node_rotation.transpose() * k_cosines * node_rotation)
        };

        let dofs = dofs.element_dofs(&element.i_node, &element.j_node)?;

        Ok(Self {
            id: id.to_string(),
            kind: element.kind,
            props,
            axes,
            transform,
            dofs,
            k_local,
            k_global,
        })
    }

    pub fn length(&self) -> f64 {
        self.props.length
    }

    /// Rotate a local matrix to nodal axes: `Tᵀ m T`
    pub fn to_global(&self, local: &Mat12) -> Mat12 {
        self.transform.transpose() * local * self.transform
    }

    /// Element mass matrix in nodal axes
    pub fn mass_global(&self, formulation: MassFormulation) -> FEAResult<Mat12> {
        let local = match (formulation, self.kind.has_bending()) {
            (MassFormulation::Consistent, true) => math::beam_consistent_mass(&self.props),
            (MassFormulation::Lumped, true) => math::beam_lumped_mass(&self.props),
            (MassFormulation::Consistent, false) => math::truss_consistent_mass(&self.props),
            (MassFormulation::Lumped, false) => math::truss_lumped_mass(&self.props),
        }
        .map_err(|e| e.for_element(&self.id))?;
        Ok(self.to_global(&local))
    }

    /// Geometric stiffness in nodal axes for an axial force (tension positive)
    pub fn geometric_global(&self, axial: f64) -> FEAResult<Mat12> {
        let local = if self.kind.has_bending() {
            math::beam_geometric_stiffness(axial, self.length())
        } else {
            math::truss_geometric_stiffness(axial, self.length())
        }
        .map_err(|e| e.for_element(&self.id))?;
        Ok(self.to_global(&local))
    }

    /// Element slice of a full displacement vector, in nodal axes
    pub fn gather(&self, u: &math::Vec) -> Vec12 {
        Vec12::from_fn(|k, _| u[self.dofs[k]])
    }

    /// Element displacements in local axes
    pub fn local_displacements(&self, u: &math::Vec) -> Vec12 {
        self.transform * self.gather(u)
    }

    /// Local end forces `k_local · u_local − q_local`
    pub fn local_forces(&self, u: &math::Vec, q_local: Option<&Vec12>) -> Vec12 {
        let f = self.k_local * self.local_displacements(u);
        match q_local {
            Some(q) => f - q,
            None => f,
        }
    }

    /// Mean of the end axial forces (tension positive)
    pub fn axial_force(&self, u: &math::Vec, q_local: Option<&Vec12>) -> f64 {
        let f = self.local_forces(u, q_local);
        0.5 * (f[6] - f[0])
    }

    /// Rotate a local nodal load vector to nodal axes
    pub fn load_to_global(&self, q_local: &Vec12) -> Vec12 {
        self.transform.transpose() * q_local
    }
}

/// Build matrices for every active element in model order.
///
/// Inactive and malformed elements are skipped and reported, never fatal here.
pub fn prepare_elements(
    model: &FEModel,
    dofs: &DofManager,
) -> (Vec<ElementMatrices>, Vec<SkippedElement>) {
    let nodes = model.node_lookup();

    let build = |element: &Element| -> Result<ElementMatrices, SkippedElement> {
        if !element.active {
            return Err(SkippedElement {
                element: element.id.clone(),
                reason: "element is inactive".to_string(),
            });
        }
        ElementMatrices::build(element, &nodes, model, dofs).map_err(|err| SkippedElement {
            element: element.id.clone(),
            reason: err.to_string(),
        })
    };

    #[cfg(feature = "parallel")]
    let built: Vec<_> = model.elements.par_iter().map(build).collect();
    #[cfg(not(feature = "parallel"))]
    let built: Vec<_> = model.elements.iter().map(build).collect();

    let mut assembled = Vec::with_capacity(built.len());
    let mut skipped = Vec::new();
    for outcome in built {
        match outcome {
            Ok(matrices) => assembled.push(matrices),
            Err(skip) => {
                log::warn!("Skipping element '{}': {}", skip.element, skip.reason);
                skipped.push(skip);
            }
        }
    }
    (assembled, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{Element, Material, Node, Section};
    use approx::assert_relative_eq;

    fn model() -> FEModel {
        let mut model = FEModel::new();
        model.add_material("Steel", Material::steel()).unwrap();
        model.add_section("S", Section::new(0.01, 2e-4, 1e-4, 5e-5)).unwrap();
        model.add_node("A", Node::new(0.0, 0.0, 0.0)).unwrap();
        model.add_node("B", Node::new(3.0, 4.0, 0.0)).unwrap();
        model.add_node("C", Node::new(3.0, 4.0, 0.0)).unwrap();
        model
    }

    fn dofs_for(model: &FEModel) -> DofManager {
        let mut dofs = DofManager::new();
        for node in &model.nodes {
            dofs.assign(&node.id).unwrap();
        }
        dofs.finalize().unwrap();
        dofs
    }

    #[test]
    fn test_global_stiffness_is_symmetric() {
        let mut model = model();
        model.add_element("E1", Element::beam("A", "B", "Steel", "S").with_rotation(0.4)).unwrap();
        let dofs = dofs_for(&model);
        let (elements, skipped) = prepare_elements(&model, &dofs);
        assert!(skipped.is_empty());
        let k = &elements[0].k_global;
        for i in 0..12 {
            for j in 0..12 {
                assert_relative_eq!(k[(i, j)], k[(j, i)], epsilon = 1e-3, max_relative = 1e-10);
            }
        }
        assert_relative_eq!(elements[0].length(), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_truss_matches_transformed_local_matrix() {
        let mut model = model();
        model.add_element("T1", Element::truss("A", "B", "Steel", "S")).unwrap();
        let dofs = dofs_for(&model);
        let (elements, _) = prepare_elements(&model, &dofs);
        let em = &elements[0];
        let rotated = em.to_global(&em.k_local);
        for i in 0..12 {
            for j in 0..12 {
                assert_relative_eq!(em.k_global[(i, j)], rotated[(i, j)], epsilon = 1e-3);
            }
        }
    }

    #[test]
    fn test_malformed_elements_are_skipped() {
        let mut model = model();
        model.add_element("E1", Element::beam("A", "B", "Steel", "S")).unwrap();
        model.add_element("Zero", Element::beam("B", "C", "Steel", "S")).unwrap();
        model.add_element("Off", Element::beam("A", "C", "Steel", "S").with_active(false)).unwrap();
        model.elements.push(Element {
            id: "Ghost".to_string(),
            ..Element::beam("A", "Z", "Steel", "S")
        });
        let dofs = dofs_for(&model);
        let (elements, skipped) = prepare_elements(&model, &dofs);
        assert_eq!(elements.len(), 1);
        let names: Vec<_> = skipped.iter().map(|s| s.element.as_str()).collect();
        assert_eq!(names, vec!["Zero", "Off", "Ghost"]);
        assert!(skipped[0].reason.contains("degenerate"));
    }

    #[test]
    fn test_axial_force_from_stretch() {
        let mut model = model();
        model.add_element("E1", Element::beam("A", "B", "Steel", "S")).unwrap();
        let dofs = dofs_for(&model);
        let (elements, _) = prepare_elements(&model, &dofs);
        let em = &elements[0];
        // Stretch B along the member axis by 1 mm
        let mut u = math::Vec::zeros(18);
        u[6] = 0.6e-3;
        u[7] = 0.8e-3;
        let expected = 200e9 * 0.01 / 5.0 * 1e-3;
        assert_relative_eq!(em.axial_force(&u, None), expected, max_relative = 1e-10);

        // Axial end loads of 300 at i and 100 at j, both along +x
        let mut q = Vec12::zeros();
        q[0] = 300.0;
        q[6] = 100.0;
        assert_relative_eq!(em.axial_force(&u, Some(&q)), expected + 100.0, max_relative = 1e-10);
    }
}
