//! Distributed loads on elements

use serde::{Deserialize, Serialize};
use super::point_load::LoadDirection;

/// A linearly varying line load on an element
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributedLoad {
    /// Intensity at the start of the loaded range (force per length)
    pub w1: f64,
    /// Intensity at the end of the loaded range
    pub w2: f64,
    /// Relative start position (0..1)
    #[serde(default)]
    pub start: f64,
    /// Relative end position (0..1)
    #[serde(default = "full_length")]
    pub end: f64,
    /// Load direction
    pub direction: LoadDirection,
    /// Load case
    pub case: String,
}

fn full_length() -> f64 {
    1.0
}

impl DistributedLoad {
    /// Create a new distributed load over a relative range
    pub fn new(w1: f64, w2: f64, start: f64, end: f64, direction: LoadDirection, case: &str) -> Self {
        Self {
            w1,
            w2,
            start,
            end,
            direction,
            case: case.to_string(),
        }
    }

    /// Create a uniform distributed load over the full element length
    pub fn uniform(w: f64, direction: LoadDirection, case: &str) -> Self {
        Self::new(w, w, 0.0, 1.0, direction, case)
    }

    /// Create a uniform downward load (negative global Z)
    pub fn uniform_downward(w: f64, case: &str) -> Self {
        Self::uniform(-w.abs(), LoadDirection::FZ, case)
    }

    /// Create a triangular load (zero at start, max at end) over the full length
    pub fn triangular(w_max: f64, direction: LoadDirection, case: &str) -> Self {
        Self::new(0.0, w_max, 0.0, 1.0, direction, case)
    }

    /// Check if the load is uniform (constant magnitude)
    pub fn is_uniform(&self) -> bool {
        (self.w1 - self.w2).abs() < 1e-10
    }

    /// Scale the load by a factor
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            w1: self.w1 * factor,
            w2: self.w2 * factor,
            ..self.clone()
        }
    }

    /// Total force on an element of the given length
    pub fn total_force(&self, length: f64) -> f64 {
        (self.w1 + self.w2) / 2.0 * (self.end - self.start) * length
    }

    /// Whether the range is ordered and lies on the element
    pub fn is_valid(&self) -> bool {
        self.w1.is_finite()
            && self.w2.is_finite()
            && 0.0 <= self.start
            && self.start < self.end
            && self.end <= 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_force() {
        let load = DistributedLoad::new(2.0, 4.0, 0.0, 0.5, LoadDirection::Fy, "Live");
        assert!((load.total_force(10.0) - 15.0).abs() < 1e-12);
        assert!(!load.is_uniform());
    }

    #[test]
    fn test_range_defaults_to_full_length() {
        let json = r#"{"w1":-5.0,"w2":-5.0,"direction":"FZ","case":"Dead"}"#;
        let load: DistributedLoad = serde_json::from_str(json).unwrap();
        assert_eq!((load.start, load.end), (0.0, 1.0));
        assert!(load.is_valid());
        assert!(!DistributedLoad::new(1.0, 1.0, 0.6, 0.4, LoadDirection::Fy, "L").is_valid());
    }
}
