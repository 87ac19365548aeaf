//! Load cases

use serde::{Deserialize, Serialize};

/// Standard gravity (m/s²) used for self-weight
pub const GRAVITY: f64 = 9.80665;

/// A load case groups related loads under a common name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadCase {
    /// Name of the load case
    pub name: String,
    /// Description of the load case
    #[serde(default)]
    pub description: Option<String>,
    /// Self-weight multiplier; ρ·A·g per unit length acts in global −Z
    #[serde(default)]
    pub self_weight: Option<f64>,
}

impl LoadCase {
    /// Create a new load case
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            self_weight: None,
        }
    }

    /// Attach a description
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Include element self-weight scaled by `factor`
    pub fn with_self_weight(mut self, factor: f64) -> Self {
        self.self_weight = Some(factor);
        self
    }

    /// Dead load case including self-weight
    pub fn dead() -> Self {
        Self::new("Dead")
            .with_description("Dead loads (self-weight and permanent loads)")
            .with_self_weight(1.0)
    }

    /// Self-weight factor (0 when not requested)
    pub fn self_weight_factor(&self) -> f64 {
        self.self_weight.unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_weight_factor() {
        assert_eq!(LoadCase::new("Live").self_weight_factor(), 0.0);
        assert_eq!(LoadCase::dead().self_weight_factor(), 1.0);
    }
}
