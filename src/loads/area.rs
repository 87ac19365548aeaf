//! Area (pressure) loads distributed onto supporting elements

use serde::{Deserialize, Serialize};

use super::distributed::DistributedLoad;
use super::point_load::LoadDirection;

/// A surface pressure carried by an element over a tributary width
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AreaLoad {
    /// Pressure (force per area)
    pub pressure: f64,
    /// Width of surface tributary to the element
    pub tributary_width: f64,
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

impl AreaLoad {
    /// Create a pressure load over the full element length
    pub fn new(pressure: f64, tributary_width: f64, direction: LoadDirection, case: &str) -> Self {
        Self {
            pressure,
            tributary_width,
            start: 0.0,
            end: 1.0,
            direction,
            case: case.to_string(),
        }
    }

    /// Limit the load to a relative range of the element
    pub fn over(mut self, start: f64, end: f64) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    /// Equivalent uniform line load (pressure × tributary width)
    pub fn to_line_load(&self) -> DistributedLoad {
        let w = self.pressure * self.tributary_width;
        DistributedLoad::new(w, w, self.start, self.end, self.direction, &self.case)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_load_conversion() {
        let area = AreaLoad::new(-2_000.0, 3.0, LoadDirection::FZ, "Live").over(0.0, 0.5);
        let line = area.to_line_load();
        assert_eq!(line.w1, -6_000.0);
        assert_eq!(line.end, 0.5);
        assert!((line.total_force(8.0) + 24_000.0).abs() < 1e-9);
    }
}
