//! Section properties for frame elements

use serde::{Deserialize, Serialize};

/// Cross-section properties for frame elements
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    /// Cross-sectional area in m²
    pub a: f64,
    /// Moment of inertia about local y-axis in m⁴ (strong axis for wide flange)
    pub iy: f64,
    /// Moment of inertia about local z-axis in m⁴ (weak axis for wide flange)
    pub iz: f64,
    /// Torsional constant in m⁴ (falls back to Iy + Iz when not positive)
    #[serde(default)]
    pub j: f64,
}

impl Section {
    /// Create a new section with basic properties
    pub fn new(a: f64, iy: f64, iz: f64, j: f64) -> Self {
        Self { a, iy, iz, j }
    }

    /// Create a rectangular section
    pub fn rectangular(width: f64, depth: f64) -> Self {
        let a = width * depth;
        let iy = width * depth.powi(3) / 12.0;
        let iz = depth * width.powi(3) / 12.0;

        // Torsional constant for rectangle (approximate)
        let (a_dim, b_dim) = if width > depth { (width, depth) } else { (depth, width) };
        let j = a_dim * b_dim.powi(3) / 3.0 * (1.0 - 0.63 * b_dim / a_dim);

        Self { a, iy, iz, j }
    }

    /// Create a circular section
    pub fn circular(diameter: f64) -> Self {
        let r = diameter / 2.0;
        let a = std::f64::consts::PI * r.powi(2);
        let i = std::f64::consts::PI * r.powi(4) / 4.0;
        let j = std::f64::consts::PI * r.powi(4) / 2.0;

        Self { a, iy: i, iz: i, j }
    }

    /// Get the polar moment of inertia
    pub fn ip(&self) -> f64 {
        self.iy + self.iz
    }

    /// Torsional constant used by the stiffness matrix
    pub fn torsion_constant(&self) -> f64 {
        if self.j > 0.0 {
            self.j
        } else {
            self.ip()
        }
    }

    /// Check the invariants required before the section enters a solve
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [("area", self.a), ("Iy", self.iy), ("Iz", self.iz)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(format!("{} must be positive (got {})", name, value));
            }
        }
        Ok(())
    }
}

impl Default for Section {
    fn default() -> Self {
        // Default to a 200mm x 200mm rectangular section
        Self::rectangular(0.2, 0.2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rectangular_section() {
        let section = Section::rectangular(0.3, 0.5);
        let expected_a = 0.3 * 0.5;
        let expected_iy = 0.3 * 0.5_f64.powi(3) / 12.0;

        assert!((section.a - expected_a).abs() < 1e-10);
        assert!((section.iy - expected_iy).abs() < 1e-10);
    }

    #[test]
    fn test_circular_section() {
        let section = Section::circular(0.5);
        let r: f64 = 0.25;
        let expected_a = std::f64::consts::PI * r.powi(2);

        assert!((section.a - expected_a).abs() < 1e-10);
        assert!((section.iy - section.iz).abs() < 1e-10); // Should be equal for circle
    }

    #[test]
    fn test_torsion_fallback_and_validation() {
        let section = Section::new(0.01, 2e-5, 1e-5, 0.0);
        assert!((section.torsion_constant() - 3e-5).abs() < 1e-15);
        assert!(section.validate().is_ok());
        assert!(Section::new(0.0, 2e-5, 1e-5, 0.0).validate().is_err());
    }
}
