//! Point loads on elements

use serde::{Deserialize, Serialize};

use crate::math::Vec3;

/// Direction of an element load
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LoadDirection {
    /// Force in the element's local x direction (axial)
    Fx,
    /// Force in the element's local y direction
    Fy,
    /// Force in the element's local z direction
    Fz,
    /// Force in global X direction
    FX,
    /// Force in global Y direction
    FY,
    /// Force in global Z direction
    FZ,
}

impl LoadDirection {
    /// Local axis index (0 = x, 1 = y, 2 = z) for local directions
    pub fn local_axis(self) -> Option<usize> {
        match self {
            LoadDirection::Fx => Some(0),
            LoadDirection::Fy => Some(1),
            LoadDirection::Fz => Some(2),
            LoadDirection::FX | LoadDirection::FY | LoadDirection::FZ => None,
        }
    }

    /// Unit vector for global directions
    pub fn global_vector(self) -> Option<Vec3> {
        match self {
            LoadDirection::FX => Some(Vec3::x()),
            LoadDirection::FY => Some(Vec3::y()),
            LoadDirection::FZ => Some(Vec3::z()),
            LoadDirection::Fx | LoadDirection::Fy | LoadDirection::Fz => None,
        }
    }

    /// Check if this is a local coordinate direction
    pub fn is_local(self) -> bool {
        self.local_axis().is_some()
    }
}

/// A concentrated force on an element
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointLoad {
    /// Load magnitude
    pub magnitude: f64,
    /// Relative position along the element, 0 at the i-node and 1 at the j-node
    pub position: f64,
    /// Load direction
    pub direction: LoadDirection,
    /// Load case
    pub case: String,
}

impl PointLoad {
    /// Create a new point load
    pub fn new(magnitude: f64, position: f64, direction: LoadDirection, case: &str) -> Self {
        Self {
            magnitude,
            position,
            direction,
            case: case.to_string(),
        }
    }

    /// Create a downward (negative global Z) point load
    pub fn downward(magnitude: f64, position: f64, case: &str) -> Self {
        Self::new(-magnitude.abs(), position, LoadDirection::FZ, case)
    }

    /// Create an axial load (in local x direction)
    pub fn axial(magnitude: f64, position: f64, case: &str) -> Self {
        Self::new(magnitude, position, LoadDirection::Fx, case)
    }

    /// Scale the load by a factor
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            magnitude: self.magnitude * factor,
            ..self.clone()
        }
    }

    /// Whether the position lies on the element
    pub fn is_valid(&self) -> bool {
        self.magnitude.is_finite() && (0.0..=1.0).contains(&self.position)
    }
}
