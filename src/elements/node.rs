//! Node - a point in 3D space carrying six degrees of freedom

use serde::{Deserialize, Serialize};

use crate::math::geometry::orthonormal_axes;
use crate::math::Mat3;

/// Names of the six nodal DOFs in local order
pub const DOF_LABELS: [&str; 6] = ["DX", "DY", "DZ", "RX", "RY", "RZ"];

/// A 3D node in the finite element model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Node identifier, assigned by [`crate::FEModel::add_node`] when empty
    #[serde(default)]
    pub id: String,
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
    /// Z coordinate
    pub z: f64,
    /// Lumped translational mass added to the mass matrix
    #[serde(default)]
    pub mass: Option<f64>,
    /// Nodal coordinate system, rows = local x/y/z in global components.
    /// DOFs, supports, nodal loads and results at this node use these axes.
    #[serde(default)]
    pub local_axes: Option<[[f64; 3]; 3]>,
}

impl Node {
    /// Create a new node at the given coordinates
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            id: String::new(),
            x,
            y,
            z,
            mass: None,
            local_axes: None,
        }
    }

    /// Attach a lumped mass
    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = Some(mass);
        self
    }

    /// Attach a nodal coordinate system given by its x and y directions
    pub fn with_local_axes(mut self, x_axis: [f64; 3], y_axis: [f64; 3]) -> Self {
        self.local_axes = Some([x_axis, y_axis, [0.0; 3]]);
        self
    }

    /// Get the coordinates as an array
    pub fn coords(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Calculate distance to another node
    pub fn distance_to(&self, other: &Node) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dz = other.z - self.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Orthonormalized nodal rotation (rows = local axes), if the node has one
    pub fn rotation(&self) -> Option<Mat3> {
        self.local_axes.as_ref().and_then(orthonormal_axes)
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_creation() {
        let node = Node::new(1.0, 2.0, 3.0).with_mass(50.0);
        assert_eq!(node.coords(), [1.0, 2.0, 3.0]);
        assert_eq!(node.mass, Some(50.0));
        assert!(node.rotation().is_none());
    }

    #[test]
    fn test_node_distance() {
        let n1 = Node::new(0.0, 0.0, 0.0);
        let n2 = Node::new(3.0, 4.0, 0.0);
        assert!((n1.distance_to(&n2) - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_local_axes_completed_from_x_and_y() {
        let node = Node::new(0.0, 0.0, 0.0).with_local_axes([0.0, 1.0, 0.0], [-1.0, 0.0, 0.0]);
        let r = node.rotation().unwrap();
        // z = x × y = (0,1,0) × (-1,0,0) = (0,0,1)
        assert!((r[(2, 2)] - 1.0).abs() < 1e-12);
    }
}
