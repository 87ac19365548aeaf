//! Degree-of-freedom bookkeeping for one analysis run

use std::collections::{BTreeMap, HashMap};

use crate::elements::DOF_LABELS;
use crate::error::{FEAError, FEAResult};

/// Maps node ids to contiguous global DOF blocks and tracks constraints.
///
/// Lifecycle: `assign` every node, register constraints, then `finalize`
/// exactly once before any query of free DOFs or element DOF maps.
#[derive(Debug, Clone, Default)]
pub struct DofManager {
    case: String,
    node_index: HashMap<String, usize>,
    node_order: Vec<String>,
    constrained: Vec<bool>,
    prescribed: BTreeMap<usize, f64>,
    springs: BTreeMap<usize, f64>,
    free: Option<Vec<usize>>,
    locked: bool,
}

impl DofManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Label configuration errors with an analysis case name
    pub fn for_case(case: &str) -> Self {
        Self {
            case: case.to_string(),
            ..Self::default()
        }
    }

    /// Append six sequential global DOF indices for a node
    pub fn assign(&mut self, node: &str) -> FEAResult<[usize; 6]> {
        if self.locked {
            return Err(FEAError::config(
                &self.case,
                format!("node '{}' assigned after constraints were registered", node),
            ));
        }
        if self.node_index.contains_key(node) {
            return Err(FEAError::config(
                &self.case,
                format!("node '{}' assigned twice", node),
            ));
        }
        let index = self.node_order.len();
        self.node_index.insert(node.to_string(), index);
        self.node_order.push(node.to_string());
        self.constrained.extend([false; 6]);
        Ok(std::array::from_fn(|k| 6 * index + k))
    }

    /// Global DOF indices of a node
    pub fn node_dofs(&self, node: &str) -> FEAResult<[usize; 6]> {
        let index = self
            .node_index
            .get(node)
            .ok_or_else(|| FEAError::UnknownNode(node.to_string()))?;
        Ok(std::array::from_fn(|k| 6 * index + k))
    }

    fn check_open(&self) -> FEAResult<()> {
        if self.free.is_some() {
            return Err(FEAError::config(
                &self.case,
                "constraint registered after finalize",
            ));
        }
        Ok(())
    }

    /// Mark the restrained subset of a node's DOFs as constrained.
    /// Repeated calls are unioned; a constrained DOF never becomes free again.
    pub fn constrain(&mut self, node: &str, restraints: &[bool; 6]) -> FEAResult<()> {
        self.check_open()?;
        let dofs = self.node_dofs(node)?;
        self.locked = true;
        for (dof, &restrained) in dofs.iter().zip(restraints) {
            if restrained {
                self.constrained[*dof] = true;
            }
        }
        Ok(())
    }

    /// Constrain one DOF of a node to a prescribed value (last value wins)
    pub fn prescribe(&mut self, node: &str, local_dof: usize, value: f64) -> FEAResult<()> {
        self.check_open()?;
        let dofs = self.node_dofs(node)?;
        let Some(&dof) = dofs.get(local_dof) else {
            return Err(FEAError::config(&self.case, format!("DOF index {} out of range", local_dof)));
        };
        self.locked = true;
        self.constrained[dof] = true;
        self.prescribed.insert(dof, value);
        Ok(())
    }

    /// Add a grounded spring on one DOF of a node (springs accumulate)
    pub fn add_spring(&mut self, node: &str, local_dof: usize, stiffness: f64) -> FEAResult<()> {
        self.check_open()?;
        let dofs = self.node_dofs(node)?;
        let Some(&dof) = dofs.get(local_dof) else {
            return Err(FEAError::config(&self.case, format!("DOF index {} out of range", local_dof)));
        };
        self.locked = true;
        *self.springs.entry(dof).or_insert(0.0) += stiffness;
        Ok(())
    }

    /// Compute the ordered free-DOF list. Must be called exactly once.
    pub fn finalize(&mut self) -> FEAResult<()> {
        if self.free.is_some() {
            return Err(FEAError::config(&self.case, "DOF manager finalized twice"));
        }
        let free = (0..self.constrained.len())
            .filter(|&dof| !self.constrained[dof])
            .collect();
        self.free = Some(free);
        self.locked = true;
        Ok(())
    }

    pub fn is_finalized(&self) -> bool {
        self.free.is_some()
    }

    /// Ordered free DOF indices
    pub fn free_dofs(&self) -> FEAResult<&[usize]> {
        self.free
            .as_deref()
            .ok_or_else(|| FEAError::config(&self.case, "DOF manager used before finalize"))
    }

    /// Ordered constrained DOF indices
    pub fn constrained_dofs(&self) -> Vec<usize> {
        (0..self.constrained.len())
            .filter(|&dof| self.constrained[dof])
            .collect()
    }

    pub fn is_constrained(&self, dof: usize) -> bool {
        self.constrained.get(dof).copied().unwrap_or(false)
    }

    /// Prescribed displacement values by global DOF
    pub fn prescribed(&self) -> &BTreeMap<usize, f64> {
        &self.prescribed
    }

    /// Spring stiffness by global DOF
    pub fn springs(&self) -> &BTreeMap<usize, f64> {
        &self.springs
    }

    /// 12-entry DOF map of an element from its end nodes
    pub fn element_dofs(&self, i_node: &str, j_node: &str) -> FEAResult<[usize; 12]> {
        self.free_dofs()?;
        let i = self.node_dofs(i_node)?;
        let j = self.node_dofs(j_node)?;
        Ok(std::array::from_fn(|k| if k < 6 { i[k] } else { j[k - 6] }))
    }

    /// Total number of DOFs (6 × nodes)
    pub fn num_dofs(&self) -> usize {
        self.constrained.len()
    }

    /// Node ids in assignment order
    pub fn nodes(&self) -> &[String] {
        &self.node_order
    }

    /// Node id and local DOF index owning a global DOF
    pub fn owner(&self, dof: usize) -> Option<(&str, usize)> {
        self.node_order
            .get(dof / 6)
            .map(|node| (node.as_str(), dof % 6))
    }

    /// Human-readable name of a global DOF, e.g. `node 'N3' DZ`
    pub fn describe(&self, dof: usize) -> String {
        match self.owner(dof) {
            Some((node, local)) => format!("node '{}' {}", node, DOF_LABELS[local]),
            None => format!("DOF {}", dof),
        }
    }
}
