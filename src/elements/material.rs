//! Material properties

use serde::{Deserialize, Serialize};

/// Linear elastic isotropic material
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    /// Modulus of elasticity (Young's modulus) in Pa
    pub e: f64,
    /// Shear modulus in Pa, derived from `e` and `nu` when absent
    #[serde(default)]
    pub g: Option<f64>,
    /// Poisson's ratio
    pub nu: f64,
    /// Density in kg/m³
    pub rho: f64,
}

impl Material {
    /// Create a new material with an explicit shear modulus
    pub fn new(e: f64, g: f64, nu: f64, rho: f64) -> Self {
        Self {
            e,
            g: Some(g),
            nu,
            rho,
        }
    }

    /// Create a new isotropic material from E and nu
    /// G is calculated as E / (2 * (1 + nu))
    pub fn isotropic(e: f64, nu: f64, rho: f64) -> Self {
        Self { e, g: None, nu, rho }
    }

    /// Create a standard structural steel
    pub fn steel() -> Self {
        Self::new(200e9, 77e9, 0.3, 7850.0)
    }

    /// Shear modulus used by the stiffness matrices
    pub fn shear_modulus(&self) -> f64 {
        match self.g {
            Some(g) if g > 0.0 => g,
            _ => self.e / (2.0 * (1.0 + self.nu)),
        }
    }

    /// Check the invariants required before the material enters a solve
    pub fn validate(&self) -> Result<(), String> {
        if !(self.e.is_finite() && self.e > 0.0) {
            return Err(format!("elastic modulus must be positive (got {})", self.e));
        }
        if !(self.rho.is_finite() && self.rho > 0.0) {
            return Err(format!("density must be positive (got {})", self.rho));
        }
        if self.nu <= -1.0 || self.nu >= 0.5 {
            return Err(format!("poisson ratio {} is outside (-1, 0.5)", self.nu));
        }
        Ok(())
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::steel()
    }
}
