//! Per-run solver state shared by the analysis drivers
//!
//! A [`SolverContext`] owns the DOF numbering and the assembled stiffness of
//! one analysis invocation. Nothing here is cached across runs.

use std::collections::BTreeMap;

use nalgebra_sparse::CscMatrix;

use super::Direction;
use crate::assembly::{DofManager, GlobalAssembler, LoadAssembler, LoadVector};
use crate::error::{FEAError, FEAResult};
use crate::math::sparse::{self, diagonal, spmv};
use crate::math::{self, FactorError, LoadShares, Mat3, SpdFactor, Vec12, Vec3};
use crate::model::FEModel;
use crate::results::{ElementForces, NodeDisplacement, Reactions};

/// Stiffness diagonals at or below this fraction of the largest are treated as zero
const INERT_TOLERANCE: f64 = 1e-12;

/// Subset of DOFs entering a reduced system, in ascending global order
#[derive(Debug, Clone)]
pub struct Partition {
    active: Vec<usize>,
    position: Vec<Option<usize>>,
    inert: Vec<usize>,
}

impl Partition {
    fn new(size: usize, active: Vec<usize>, inert: Vec<usize>) -> Self {
        let mut position = vec![None; size];
        for (k, &dof) in active.iter().enumerate() {
            position[dof] = Some(k);
        }
        Self {
            active,
            position,
            inert,
        }
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Global DOF of each reduced index
    pub fn active(&self) -> &[usize] {
        &self.active
    }

    /// Free DOFs left out because nothing stiffens them
    pub fn inert(&self) -> &[usize] {
        &self.inert
    }

    /// Reduced index of a global DOF
    pub fn position(&self, dof: usize) -> Option<usize> {
        self.position.get(dof).copied().flatten()
    }

    pub fn restrict_matrix(&self, a: &CscMatrix<f64>) -> CscMatrix<f64> {
        sparse::restrict(a, &self.position, self.len())
    }

    pub fn restrict_vector(&self, v: &math::Vec) -> math::Vec {
        math::Vec::from_fn(self.len(), |k, _| v[self.active[k]])
    }

    /// Full-size vector with zeros outside the partition
    pub fn expand(&self, x: &math::Vec) -> math::Vec {
        let mut full = math::Vec::zeros(self.position.len());
        self.scatter(x, &mut full);
        full
    }

    /// Write reduced values into their global slots
    pub fn scatter(&self, x: &math::Vec, full: &mut math::Vec) {
        for (k, &dof) in self.active.iter().enumerate() {
            full[dof] = x[k];
        }
    }
}

/// DOF numbering, assembled element data and stiffness for one analysis run
pub struct SolverContext<'a> {
    model: &'a FEModel,
    case: String,
    dofs: DofManager,
    assembler: GlobalAssembler,
    /// Node rotations by node position
    node_axes: Vec<Option<Mat3>>,
    stiffness: CscMatrix<f64>,
    total_stiffness: CscMatrix<f64>,
}

impl<'a> SolverContext<'a> {
    /// Number the DOFs, apply supports and assemble the stiffness
    pub fn new(model: &'a FEModel, case: &str) -> FEAResult<Self> {
        let mut dofs = DofManager::for_case(case);
        for node in &model.nodes {
            dofs.assign(&node.id)?;
        }
        for (node, supports) in &model.supports {
            for support in supports {
                dofs.constrain(node, &support.restraint_vector())?;
                for (dof, value) in support.enforced.iter().enumerate() {
                    if let Some(value) = value {
                        dofs.prescribe(node, dof, *value)?;
                    }
                }
                for (dof, &k) in support.springs.iter().enumerate() {
                    if k != 0.0 {
                        dofs.add_spring(node, dof, k)?;
                    }
                }
            }
        }
        dofs.finalize()?;

        let assembler = GlobalAssembler::new(model, &dofs)?;
        let stiffness = assembler.stiffness();
        let total_stiffness = assembler.stiffness_with_springs();
        let node_axes = model.nodes.iter().map(|n| n.rotation()).collect();

        log::debug!(
            "Case '{}': {} nodes, {} free of {} DOFs, {} elements",
            case,
            model.nodes.len(),
            dofs.free_dofs()?.len(),
            dofs.num_dofs(),
            assembler.elements().len()
        );

        Ok(Self {
            model,
            case: case.to_string(),
            dofs,
            assembler,
            node_axes,
            stiffness,
            total_stiffness,
        })
    }

    pub fn model(&self) -> &FEModel {
        self.model
    }

    pub fn case(&self) -> &str {
        &self.case
    }

    pub fn dofs(&self) -> &DofManager {
        &self.dofs
    }

    pub fn assembler(&self) -> &GlobalAssembler {
        &self.assembler
    }

    /// Number of global DOFs
    pub fn size(&self) -> usize {
        self.dofs.num_dofs()
    }

    /// Element stiffness without support springs
    pub fn stiffness(&self) -> &CscMatrix<f64> {
        &self.stiffness
    }

    /// Element stiffness plus support springs
    pub fn total_stiffness(&self) -> &CscMatrix<f64> {
        &self.total_stiffness
    }

    /// Assemble the loads of a load case or combination with linear member-load shares
    pub fn case_loads(&self, name: &str) -> FEAResult<LoadVector> {
        self.case_loads_with(name, LoadShares::default())
    }

    /// Assemble the loads of a load case or combination
    pub fn case_loads_with(&self, name: &str, shares: LoadShares) -> FEAResult<LoadVector> {
        let factors = self.model.resolve_combination(name)?;
        let loads = LoadAssembler::new(self.model, &self.dofs, self.assembler.elements())
            .with_shares(shares)
            .assemble(&factors);
        if !loads.dropped.is_empty() {
            log::warn!("Case '{}': {} load(s) dropped", name, loads.dropped.len());
        }
        Ok(loads)
    }

    /// Full vector holding the prescribed support displacements
    pub fn prescribed_vector(&self) -> math::Vec {
        let mut u = math::Vec::zeros(self.size());
        for (&dof, &value) in self.dofs.prescribed() {
            u[dof] = value;
        }
        u
    }

    fn split_inert(&self) -> FEAResult<(Vec<usize>, Vec<usize>)> {
        let diag = diagonal(&self.total_stiffness);
        let scale = diag.amax();
        let (active, inert) = self
            .dofs
            .free_dofs()?
            .iter()
            .copied()
            .partition(|&dof| diag[dof].abs() > INERT_TOLERANCE * scale);
        Ok((active, inert))
    }

    /// Free DOFs with stiffness. A load on a DOF without stiffness is singular.
    pub fn static_partition(&self, forces: &math::Vec) -> FEAResult<Partition> {
        let (active, inert) = self.split_inert()?;
        if let Some(&dof) = inert.iter().find(|&&dof| forces[dof] != 0.0) {
            return Err(FEAError::singular(
                &self.case,
                format!("load on {}, which has no stiffness", self.dofs.describe(dof)),
            ));
        }
        if !inert.is_empty() {
            log::debug!("Case '{}': {} inert DOFs removed", self.case, inert.len());
        }
        Ok(Partition::new(self.size(), active, inert))
    }

    /// Free DOFs with stiffness for a dynamic solve. Mass on an inert DOF is ignored.
    pub fn dynamic_partition(&self, mass: &CscMatrix<f64>) -> FEAResult<Partition> {
        let (active, inert) = self.split_inert()?;
        let m_diag = diagonal(mass);
        for &dof in &inert {
            if m_diag[dof] > 0.0 {
                log::warn!(
                    "Case '{}': mass on {} is ignored because it has no stiffness",
                    self.case,
                    self.dofs.describe(dof)
                );
            }
        }
        Ok(Partition::new(self.size(), active, inert))
    }

    /// Sparse Cholesky of a reduced stiffness, naming the DOF when it fails
    pub fn factor(&self, k_ff: &CscMatrix<f64>, part: &Partition) -> FEAResult<SpdFactor> {
        SpdFactor::new(k_ff).map_err(|err| match err {
            FactorError::NotPositiveDefinite => FEAError::singular(
                &self.case,
                "stiffness matrix is not positive definite (insufficient restraints or a mechanism)",
            ),
            FactorError::PivotDecay { index, ratio } => FEAError::singular(
                &self.case,
                format!(
                    "stiffness vanishes at {} (pivot ratio {:.1e}); the structure is unstable there",
                    self.dofs.describe(part.active[index]),
                    ratio
                ),
            ),
        })
    }

    /// Solve `K u = F` with supports and prescribed displacements applied
    pub fn solve_static(&self, forces: &math::Vec) -> FEAResult<math::Vec> {
        let part = self.static_partition(forces)?;
        let mut u = self.prescribed_vector();
        if part.is_empty() {
            return Ok(u);
        }

        let rhs_full = forces - spmv(&self.total_stiffness, &u);
        let k_ff = part.restrict_matrix(&self.total_stiffness);
        let factor = self.factor(&k_ff, &part)?;
        let u_f = factor.solve(&part.restrict_vector(&rhs_full));
        if !math::all_finite(&u_f) {
            return Err(FEAError::singular(&self.case, "solution contains non-finite values"));
        }
        part.scatter(&u_f, &mut u);
        Ok(u)
    }

    /// Solve a reduced tangent system that may be indefinite.
    ///
    /// Sparse Cholesky first, dense LU when the matrix is not positive definite.
    pub fn solve_tangent(
        &self,
        k_t: &CscMatrix<f64>,
        part: &Partition,
        rhs: &math::Vec,
    ) -> FEAResult<math::Vec> {
        let solution = match SpdFactor::new(k_t) {
            Ok(factor) => Some(factor.solve(rhs)),
            Err(_) => {
                log::debug!("Case '{}': tangent not positive definite, using LU", self.case);
                math::solve_linear_system(&sparse::to_dense(k_t), rhs)
            }
        };
        match solution {
            Some(x) if math::all_finite(&x) => Ok(x),
            _ => Err(FEAError::singular(
                &self.case,
                format!("tangent stiffness is singular ({} DOFs)", part.len()),
            )),
        }
    }

    /// Split a full vector into 6-component node entries
    pub fn node_field(&self, u: &math::Vec) -> BTreeMap<String, [f64; 6]> {
        self.dofs
            .nodes()
            .iter()
            .enumerate()
            .map(|(k, node)| (node.clone(), std::array::from_fn(|d| u[6 * k + d])))
            .collect()
    }

    pub fn displacements(&self, u: &math::Vec) -> BTreeMap<String, NodeDisplacement> {
        self.node_field(u)
            .into_iter()
            .map(|(node, values)| (node, NodeDisplacement::from_array(values)))
            .collect()
    }

    /// Local end forces of every assembled element.
    ///
    /// `element_loads` holds the equivalent nodal loads of each element, which
    /// are subtracted to give the fixed-end corrected forces.
    pub fn element_forces(
        &self,
        u: &math::Vec,
        element_loads: Option<&[Vec12]>,
    ) -> BTreeMap<String, ElementForces> {
        self.assembler
            .elements()
            .iter()
            .enumerate()
            .map(|(k, em)| {
                let q = element_loads.and_then(|loads| loads.get(k));
                let f = em.local_forces(u, q);
                let local: [f64; 12] = std::array::from_fn(|i| f[i]);
                (em.id.clone(), ElementForces::from_local(em.kind, local))
            })
            .collect()
    }

    /// Mean axial force of every assembled element (tension positive)
    pub fn axial_forces(&self, u: &math::Vec, element_loads: Option<&[Vec12]>) -> Vec<f64> {
        self.assembler
            .elements()
            .iter()
            .enumerate()
            .map(|(k, em)| em.axial_force(u, element_loads.and_then(|loads| loads.get(k))))
            .collect()
    }

    /// Support reactions `K·u − F` at restrained and spring DOFs, per node
    pub fn reactions(&self, u: &math::Vec, forces: &math::Vec) -> BTreeMap<String, Reactions> {
        let residual = spmv(&self.stiffness, u) - forces;
        let springs = self.dofs.springs();
        let mut reactions = BTreeMap::new();
        for (k, node) in self.dofs.nodes().iter().enumerate() {
            let supported: Vec<usize> = (6 * k..6 * k + 6)
                .filter(|dof| self.dofs.is_constrained(*dof) || springs.contains_key(dof))
                .collect();
            if supported.is_empty() {
                continue;
            }
            let mut values = [0.0; 6];
            for dof in supported {
                values[dof - 6 * k] = residual[dof];
            }
            reactions.insert(node.clone(), Reactions::from_array(values));
        }
        reactions
    }

    /// Translation of a node-level 3-vector from node axes to global axes
    pub fn to_global(&self, node_position: usize, local: Vec3) -> Vec3 {
        match self.node_axes.get(node_position).copied().flatten() {
            Some(r) => r.transpose() * local,
            None => local,
        }
    }

    /// Reduced influence vector: displacement of each active DOF under a
    /// unit rigid translation of the ground along `direction`
    pub fn influence_vector(&self, direction: Direction, part: &Partition) -> math::Vec {
        let d = direction.index();
        math::Vec::from_fn(part.len(), |k, _| {
            let dof = part.active[k];
            let (node, local) = (dof / 6, dof % 6);
            if local >= 3 {
                return 0.0;
            }
            match self.node_axes.get(node).copied().flatten() {
                Some(r) => r[(local, d)],
                None => {
                    if local == d {
                        1.0
                    } else {
                        0.0
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{Element, Material, Node, Section, Support};
    use crate::loads::NodeLoad;
    use approx::assert_relative_eq;

    fn truss_pair() -> FEModel {
        let mut model = FEModel::new();
        model.add_material("Steel", Material::steel()).unwrap();
        model.add_section("Rod", Section::new(1e-3, 1e-6, 1e-6, 2e-6)).unwrap();
        model.add_node("A", Node::new(0.0, 0.0, 0.0)).unwrap();
        model.add_node("B", Node::new(2.0, 0.0, 0.0)).unwrap();
        model.add_element("T1", Element::truss("A", "B", "Steel", "Rod")).unwrap();
        model.add_support("A", Support::fixed()).unwrap();
        model
            .add_support("B", Support::with_restraints(false, true, true, false, false, false))
            .unwrap();
        model
    }

    #[test]
    fn test_truss_rotations_are_inert() {
        let mut model = truss_pair();
        model.add_node_load("B", NodeLoad::fx(1_000.0, "Pull")).unwrap();
        let ctx = SolverContext::new(&model, "Pull").unwrap();
        let loads = ctx.case_loads("Pull").unwrap();
        let part = ctx.static_partition(&loads.forces).unwrap();
        assert_eq!(part.active(), &[6]);
        assert_eq!(part.inert().len(), 3);

        let u = ctx.solve_static(&loads.forces).unwrap();
        assert_relative_eq!(u[6], 1_000.0 * 2.0 / (200e9 * 1e-3), max_relative = 1e-10);
    }

    #[test]
    fn test_load_on_inert_dof_is_singular() {
        let mut model = truss_pair();
        model
            .add_node_load("B", NodeLoad::moment(0.0, 0.0, 5.0, "Twist"))
            .unwrap();
        let ctx = SolverContext::new(&model, "Twist").unwrap();
        let loads = ctx.case_loads("Twist").unwrap();
        let err = ctx.solve_static(&loads.forces).unwrap_err();
        match err {
            FEAError::SingularSystem { case, detail } => {
                assert_eq!(case, "Twist");
                assert!(detail.contains("node 'B' RZ"), "{}", detail);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_unknown_support_node() {
        let mut model = truss_pair();
        model.supports.insert("Z".to_string(), vec![Support::pinned()]);
        assert!(matches!(
            SolverContext::new(&model, "Pull"),
            Err(FEAError::UnknownNode(node)) if node == "Z"
        ));
    }

    #[test]
    fn test_influence_vector_follows_node_axes() {
        let mut model = truss_pair();
        model.nodes[1] = Node {
            id: "B".to_string(),
            ..Node::new(2.0, 0.0, 0.0).with_local_axes([0.0, 1.0, 0.0], [-1.0, 0.0, 0.0])
        };
        let ctx = SolverContext::new(&model, "Pull").unwrap();
        let part = Partition::new(12, (6..12).collect(), vec![]);
        let r = ctx.influence_vector(Direction::X, &part);
        // Node x axis is global Y, node y axis is global −X
        assert_relative_eq!(r[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(r[1], -1.0, epsilon = 1e-12);
    }
}
