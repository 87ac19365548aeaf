//! Global load vector assembly
//!
//! Nodal loads land directly on their node's DOFs. Element loads are turned
//! into statically equivalent end forces in element axes, kept per element
//! for force recovery, and rotated into the global vector.

use std::collections::{BTreeMap, HashMap};

use super::dof::DofManager;
use super::elements::ElementMatrices;
use crate::loads::{DistributedLoad, LoadDirection, GRAVITY};
use crate::math::{self, LoadShares, Vec12};
use crate::model::FEModel;

/// Assembled loads for one set of case factors
#[derive(Debug, Clone)]
pub struct LoadVector {
    /// Global force vector (6 × node count)
    pub forces: math::Vec,
    /// Equivalent end forces per element in local axes, aligned with the assembler's elements
    pub element_loads: Vec<Vec12>,
    /// Diagnostics for loads that could not be applied
    pub dropped: Vec<String>,
}

impl LoadVector {
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            forces: &self.forces * factor,
            element_loads: self.element_loads.iter().map(|q| q * factor).collect(),
            dropped: self.dropped.clone(),
        }
    }
}

/// Converts the model's loads into a global force vector
pub struct LoadAssembler<'a> {
    model: &'a FEModel,
    dofs: &'a DofManager,
    elements: &'a [ElementMatrices],
    index: HashMap<&'a str, usize>,
    shares: LoadShares,
}

impl<'a> LoadAssembler<'a> {
    pub fn new(model: &'a FEModel, dofs: &'a DofManager, elements: &'a [ElementMatrices]) -> Self {
        let index = elements
            .iter()
            .enumerate()
            .map(|(k, em)| (em.id.as_str(), k))
            .collect();
        Self {
            model,
            dofs,
            elements,
            index,
            shares: LoadShares::default(),
        }
    }

    /// Select how transverse member loads are split between end shears
    pub fn with_shares(mut self, shares: LoadShares) -> Self {
        self.shares = shares;
        self
    }

    /// Assemble the loads of every case in `factors`, each scaled by its factor.
    ///
    /// Loads that reference a missing node or an element that did not
    /// assemble are dropped with a warning.
    pub fn assemble(&self, factors: &BTreeMap<String, f64>) -> LoadVector {
        let mut out = LoadVector {
            forces: math::Vec::zeros(self.dofs.num_dofs()),
            element_loads: vec![Vec12::zeros(); self.elements.len()],
            dropped: Vec::new(),
        };
        let factor_of = |case: &str| factors.get(case).copied().filter(|f| *f != 0.0);

        for (node, loads) in &self.model.node_loads {
            for load in loads {
                let Some(factor) = factor_of(&load.case) else {
                    continue;
                };
                match self.dofs.node_dofs(node) {
                    Ok(dofs) => {
                        for (dof, value) in dofs.iter().zip(load.as_array()) {
                            out.forces[*dof] += factor * value;
                        }
                    }
                    Err(_) => drop_load(&mut out, format!("node load on unknown node '{}'", node)),
                }
            }
        }

        for (case, &factor) in factors {
            let sw = self
                .model
                .load_cases
                .get(case)
                .map(|c| c.self_weight_factor())
                .unwrap_or(0.0);
            if sw == 0.0 || factor == 0.0 {
                continue;
            }
            for k in 0..self.elements.len() {
                let em = &self.elements[k];
                let w = -em.props.mass_per_length() * GRAVITY * sw * factor;
                self.apply_line_load(&mut out, k, w, w, 0.0, 1.0, LoadDirection::FZ);
            }
        }

        for (element, loads) in &self.model.point_loads {
            for load in loads {
                let Some(factor) = factor_of(&load.case) else {
                    continue;
                };
                let Some(k) = self.target(&mut out, element, "point") else {
                    continue;
                };
                if !load.is_valid() {
                    drop_load(
                        &mut out,
                        format!("point load on '{}' has position {} outside 0..1", element, load.position),
                    );
                    continue;
                }
                self.apply_point_load(&mut out, k, factor * load.magnitude, load.position, load.direction);
            }
        }

        for (element, loads) in &self.model.distributed_loads {
            for load in loads {
                if let Some(factor) = factor_of(&load.case) {
                    self.apply_distributed(&mut out, element, load, factor);
                }
            }
        }

        for (element, loads) in &self.model.area_loads {
            for load in loads {
                if let Some(factor) = factor_of(&load.case) {
                    self.apply_distributed(&mut out, element, &load.to_line_load(), factor);
                }
            }
        }

        out
    }

    fn target(&self, out: &mut LoadVector, element: &str, what: &str) -> Option<usize> {
        let found = self.index.get(element).copied();
        if found.is_none() {
            let reason = if self.model.elements.iter().any(|e| e.id == element) {
                "was not assembled"
            } else {
                "does not exist"
            };
            drop_load(out, format!("{} load on element '{}': element {}", what, element, reason));
        }
        found
    }

    fn apply_distributed(&self, out: &mut LoadVector, element: &str, load: &DistributedLoad, factor: f64) {
        let Some(k) = self.target(out, element, "distributed") else {
            return;
        };
        if !load.is_valid() {
            drop_load(
                out,
                format!(
                    "distributed load on '{}' has invalid range {}..{}",
                    element, load.start, load.end
                ),
            );
            return;
        }
        self.apply_line_load(
            out,
            k,
            factor * load.w1,
            factor * load.w2,
            load.start,
            load.end,
            load.direction,
        );
    }

    /// Split a force along `direction` into local components (axis, magnitude)
    fn local_components(&self, em: &ElementMatrices, direction: LoadDirection) -> Vec<(usize, f64)> {
        if let Some(axis) = direction.local_axis() {
            return vec![(axis, 1.0)];
        }
        let Some(global) = direction.global_vector() else {
            return Vec::new();
        };
        let local = em.axes.to_local(&global);
        (0..3)
            .filter(|&axis| local[axis].abs() > 1e-14)
            .map(|axis| (axis, local[axis]))
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_line_load(
        &self,
        out: &mut LoadVector,
        k: usize,
        w1: f64,
        w2: f64,
        t1: f64,
        t2: f64,
        direction: LoadDirection,
    ) {
        let em = &self.elements[k];
        let bending = em.kind.has_bending();
        let mut q = Vec12::zeros();
        for (axis, scale) in self.local_components(em, direction) {
            q += math::line_load_shares(
                w1 * scale,
                w2 * scale,
                t1,
                t2,
                em.length(),
                axis,
                bending,
                self.shares,
            );
        }
        self.scatter(out, k, q);
    }

    fn apply_point_load(&self, out: &mut LoadVector, k: usize, force: f64, t: f64, direction: LoadDirection) {
        let em = &self.elements[k];
        let bending = em.kind.has_bending();
        let mut q = Vec12::zeros();
        for (axis, scale) in self.local_components(em, direction) {
            q += math::point_load_shares(force * scale, t, em.length(), axis, bending, self.shares);
        }
        self.scatter(out, k, q);
    }

    fn scatter(&self, out: &mut LoadVector, k: usize, q_local: Vec12) {
        let em = &self.elements[k];
        let q_global = em.load_to_global(&q_local);
        for (local, &dof) in em.dofs.iter().enumerate() {
            out.forces[dof] += q_global[local];
        }
        out.element_loads[k] += q_local;
    }
}

fn drop_load(out: &mut LoadVector, message: String) {
    log::warn!("Dropping {}", message);
    out.dropped.push(message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::GlobalAssembler;
    use crate::elements::{Element, Material, Node, Section};
    use crate::loads::{AreaLoad, LoadCase, NodeLoad, PointLoad};
    use approx::assert_relative_eq;

    fn beam_model() -> FEModel {
        let mut model = FEModel::new();
        model.add_material("Steel", Material::steel()).unwrap();
        model.add_section("S", Section::new(0.01, 2e-4, 1e-4, 5e-5)).unwrap();
        model.add_node("A", Node::new(0.0, 0.0, 0.0)).unwrap();
        model.add_node("B", Node::new(6.0, 0.0, 0.0)).unwrap();
        model.add_element("E1", Element::beam("A", "B", "Steel", "S")).unwrap();
        model
    }

    fn assemble(model: &FEModel, case: &str) -> LoadVector {
        assemble_with(model, case, LoadShares::Linear)
    }

    fn assemble_with(model: &FEModel, case: &str, shares: LoadShares) -> LoadVector {
        let mut dofs = DofManager::new();
        for node in &model.nodes {
            dofs.assign(&node.id).unwrap();
        }
        dofs.finalize().unwrap();
        let assembler = GlobalAssembler::new(model, &dofs).unwrap();
        let factors = BTreeMap::from([(case.to_string(), 1.0)]);
        LoadAssembler::new(model, &dofs, assembler.elements())
            .with_shares(shares)
            .assemble(&factors)
    }

    #[test]
    fn test_uniform_load_end_shares() {
        let mut model = beam_model();
        model
            .add_distributed_load("E1", DistributedLoad::uniform_downward(1_000.0, "Dead"))
            .unwrap();
        let loads = assemble(&model, "Dead");
        let (w, l) = (-1_000.0, 6.0);
        assert_relative_eq!(loads.forces[2], w * l / 2.0, max_relative = 1e-12);
        assert_relative_eq!(loads.forces[8], w * l / 2.0, max_relative = 1e-12);
        // Fixed-end moments about global Y for a load along −Z
        assert_relative_eq!(loads.forces[4].abs(), w.abs() * l * l / 12.0, max_relative = 1e-12);
        assert_relative_eq!(loads.forces[4], -loads.forces[10], max_relative = 1e-12);
    }

    #[test]
    fn test_point_load_and_node_load() {
        let mut model = beam_model();
        model
            .add_point_load("E1", PointLoad::new(-600.0, 0.25, LoadDirection::Fy, "Live"))
            .unwrap();
        model.add_node_load("B", NodeLoad::fx(50.0, "Live")).unwrap();
        model.add_node_load("B", NodeLoad::fx(1e9, "Other")).unwrap();
        let loads = assemble(&model, "Live");
        assert_relative_eq!(loads.forces[1], -450.0, max_relative = 1e-12);
        assert_relative_eq!(loads.forces[7], -150.0, max_relative = 1e-12);
        assert_relative_eq!(loads.forces[6], 50.0, max_relative = 1e-12);
        assert_relative_eq!(loads.element_loads[0][1], -450.0, max_relative = 1e-12);
    }

    #[test]
    fn test_consistent_shares_move_shear_to_near_end() {
        let mut model = beam_model();
        model
            .add_point_load("E1", PointLoad::new(-600.0, 0.25, LoadDirection::Fy, "Live"))
            .unwrap();
        let linear = assemble(&model, "Live");
        let consistent = assemble_with(&model, "Live", LoadShares::Consistent);
        assert_relative_eq!(consistent.forces[1], -506.25, max_relative = 1e-12);
        assert_relative_eq!(consistent.forces[7], -93.75, max_relative = 1e-12);
        assert_relative_eq!(consistent.element_loads[0][1], -506.25, max_relative = 1e-12);
        // End moments do not depend on the shear split
        assert_relative_eq!(consistent.forces[5], linear.forces[5], max_relative = 1e-12);
        assert_relative_eq!(consistent.forces[11], linear.forces[11], max_relative = 1e-12);
    }

    #[test]
    fn test_self_weight_and_area_load_totals() {
        let mut model = beam_model();
        model.add_load_case(LoadCase::new("Dead").with_self_weight(1.0)).unwrap();
        model
            .add_area_load("E1", AreaLoad::new(-2_000.0, 1.5, LoadDirection::FZ, "Dead"))
            .unwrap();
        let loads = assemble(&model, "Dead");
        let weight = 7850.0 * 0.01 * GRAVITY * 6.0;
        let area = 2_000.0 * 1.5 * 6.0;
        assert_relative_eq!(loads.forces[2] + loads.forces[8], -(weight + area), max_relative = 1e-12);
    }

    #[test]
    fn test_loads_on_missing_targets_are_dropped() {
        let mut model = beam_model();
        model.point_loads.insert(
            "Ghost".to_string(),
            vec![PointLoad::downward(10.0, 0.5, "Dead")],
        );
        model
            .node_loads
            .insert("Nowhere".to_string(), vec![NodeLoad::fz(-1.0, "Dead")]);
        let loads = assemble(&model, "Dead");
        assert_eq!(loads.dropped.len(), 2);
        assert_eq!(loads.forces.amax(), 0.0);
    }
}
