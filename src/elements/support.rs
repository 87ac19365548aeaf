//! Support conditions (boundary conditions) at nodes

use serde::{Deserialize, Serialize};

/// Restraints, springs and prescribed displacements at a node.
///
/// Indices follow the nodal DOF order `[DX, DY, DZ, RX, RY, RZ]`, in the
/// node's local axes when it has them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Support {
    /// Restrained DOFs
    #[serde(default)]
    pub restraints: [bool; 6],
    /// Spring stiffness per DOF (0 = none)
    #[serde(default)]
    pub springs: [f64; 6],
    /// Prescribed displacement per DOF; a value implies a restraint
    #[serde(default)]
    pub enforced: [Option<f64>; 6],
}

impl Support {
    /// Create a new support with no restraints
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fully fixed support (all DOFs restrained)
    pub fn fixed() -> Self {
        Self::with_restraints(true, true, true, true, true, true)
    }

    /// Create a pinned support (translations restrained, rotations free)
    pub fn pinned() -> Self {
        Self::with_restraints(true, true, true, false, false, false)
    }

    /// Create a roller support (Z translation restrained only)
    pub fn roller_z() -> Self {
        Self::with_restraints(false, false, true, false, false, false)
    }

    /// Create a support with specific restraints
    pub fn with_restraints(dx: bool, dy: bool, dz: bool, rx: bool, ry: bool, rz: bool) -> Self {
        Self {
            restraints: [dx, dy, dz, rx, ry, rz],
            ..Default::default()
        }
    }

    /// Add a spring on one DOF
    pub fn with_spring(mut self, dof: usize, stiffness: f64) -> Self {
        if dof < 6 {
            self.springs[dof] = stiffness;
        }
        self
    }

    /// Prescribe a displacement on one DOF (restrains it)
    pub fn with_enforced(mut self, dof: usize, value: f64) -> Self {
        if dof < 6 {
            self.enforced[dof] = Some(value);
            self.restraints[dof] = true;
        }
        self
    }

    /// Whether a DOF is restrained, explicitly or by a prescribed value
    pub fn is_restrained(&self, dof: usize) -> bool {
        dof < 6 && (self.restraints[dof] || self.enforced[dof].is_some())
    }

    /// Effective restraint vector
    pub fn restraint_vector(&self) -> [bool; 6] {
        std::array::from_fn(|dof| self.is_restrained(dof))
    }

    /// Get list of restrained DOF indices (0-5)
    pub fn restrained_dofs(&self) -> Vec<usize> {
        (0..6).filter(|&dof| self.is_restrained(dof)).collect()
    }

    /// Check if any DOF is restrained or sprung
    pub fn is_supported(&self) -> bool {
        (0..6).any(|dof| self.is_restrained(dof) || self.springs[dof] != 0.0)
    }
}
