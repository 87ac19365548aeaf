//! Analysis types, options and the analysis drivers

pub mod buckling;
pub mod context;
pub mod linear;
pub mod modal;
pub mod nonlinear;
pub mod spectrum;
pub mod time_history;

use serde::{Deserialize, Serialize};

use crate::error::{FEAError, FEAResult};
use crate::math::LoadShares;

pub use buckling::BucklingDriver;
pub use context::{Partition, SolverContext};
pub use linear::{equilibrium_residual, LinearStaticDriver, StaticSolution};
pub use modal::{ModalDriver, ModalSolution};
pub use nonlinear::NonlinearDriver;
pub use spectrum::{combine_modal, cqc_coefficient, ResponseSpectrumDriver};
pub use time_history::{rayleigh_coefficients, TimeHistoryDriver};

/// Type of structural analysis to perform
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisType {
    /// First-order linear static analysis
    #[default]
    Linear,
    /// Natural frequencies and mode shapes
    Modal,
    /// Modal response-spectrum analysis
    ResponseSpectrum,
    /// Ground-motion time history
    TimeHistory,
    /// Linear (eigenvalue) buckling
    Buckling,
    /// Geometrically nonlinear static analysis
    Nonlinear,
}

/// Element mass matrix formulation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MassFormulation {
    #[default]
    Consistent,
    Lumped,
}

/// Modal combination rule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModalCombination {
    #[default]
    Srss,
    Cqc,
}

/// Global excitation direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    X,
    Y,
    Z,
}

impl Direction {
    pub fn index(self) -> usize {
        match self {
            Direction::X => 0,
            Direction::Y => 1,
            Direction::Z => 2,
        }
    }

    pub const ALL: [Direction; 3] = [Direction::X, Direction::Y, Direction::Z];
}

/// Time integration method
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeIntegration {
    /// Average-acceleration Newmark on the full free-DOF system
    #[default]
    Newmark,
    /// Newmark on each decoupled modal equation, then superposition
    ModalSuperposition,
}

/// Nonlinear convergence measure
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvergenceNorm {
    /// ‖r‖ / max(‖λF‖, ‖F_int‖)
    #[default]
    RelativeForce,
    /// ‖r‖ / ‖u‖, or ‖r‖ while u ≈ 0
    ResidualPerDisplacement,
}

/// Nonlinear solution strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NonlinearMethod {
    /// Fixed load increments λ = s/N
    #[default]
    NewtonRaphson,
    /// Load factor governed by a constant arc-length constraint
    ArcLength,
}

/// Arc-length control parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArcLengthOptions {
    /// Initial arc length; derived from a first `1/load_steps` increment when absent
    #[serde(default)]
    pub initial_arc_length: Option<f64>,
    /// Tracing stops once the load factor reaches this value
    pub max_load_factor: f64,
}

impl Default for ArcLengthOptions {
    fn default() -> Self {
        Self {
            initial_arc_length: None,
            max_load_factor: 1.0,
        }
    }
}

/// Design spectrum as (period, spectral acceleration) pairs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpectrumTable {
    pub points: Vec<(f64, f64)>,
}

impl SpectrumTable {
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        Self { points }
    }

    /// Periods must be finite and strictly increasing
    pub fn validate(&self, case: &str) -> FEAResult<()> {
        if self.points.is_empty() {
            return Err(FEAError::config(case, "response spectrum table is empty"));
        }
        if self.points.iter().any(|(t, a)| !t.is_finite() || !a.is_finite()) {
            return Err(FEAError::config(case, "response spectrum contains non-finite values"));
        }
        if self.points.windows(2).any(|w| w[1].0 <= w[0].0) {
            return Err(FEAError::config(
                case,
                "response spectrum periods must be strictly increasing",
            ));
        }
        Ok(())
    }

    /// Linear interpolation of Sa(T), clamped at the table ends
    pub fn sa(&self, period: f64) -> f64 {
        let Some(&(t_first, a_first)) = self.points.first() else {
            return 0.0;
        };
        if period <= t_first {
            return a_first;
        }
        for w in self.points.windows(2) {
            let (t0, a0) = w[0];
            let (t1, a1) = w[1];
            if period <= t1 {
                return a0 + (a1 - a0) * (period - t0) / (t1 - t0);
            }
        }
        self.points.last().map(|&(_, a)| a).unwrap_or(0.0)
    }
}

/// Ground acceleration sampled at a uniform time step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroundMotion {
    pub dt: f64,
    pub accelerations: Vec<f64>,
}

impl GroundMotion {
    pub fn new(dt: f64, accelerations: Vec<f64>) -> Self {
        Self { dt, accelerations }
    }

    /// Build from (time, acceleration) samples, which must be uniformly spaced
    pub fn from_samples(samples: &[(f64, f64)]) -> FEAResult<Self> {
        if samples.len() < 2 {
            return Err(FEAError::InvalidInput(
                "ground motion needs at least two samples".to_string(),
            ));
        }
        let dt = samples[1].0 - samples[0].0;
        if !(dt > 0.0) {
            return Err(FEAError::InvalidInput(format!(
                "ground motion time step must be positive (got {})",
                dt
            )));
        }
        for (k, w) in samples.windows(2).enumerate() {
            let step = w[1].0 - w[0].0;
            if (step - dt).abs() > 1e-6 * dt {
                return Err(FEAError::InvalidInput(format!(
                    "ground motion is not uniformly sampled at sample {}",
                    k + 1
                )));
            }
        }
        Ok(Self::new(dt, samples.iter().map(|&(_, a)| a).collect()))
    }

    pub fn duration(&self) -> f64 {
        self.dt * self.accelerations.len().saturating_sub(1) as f64
    }

    pub fn validate(&self, case: &str) -> FEAResult<()> {
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(FEAError::config(case, format!("time step must be positive (got {})", self.dt)));
        }
        if self.accelerations.len() < 2 {
            return Err(FEAError::config(case, "ground motion needs at least two samples"));
        }
        if self.accelerations.iter().any(|a| !a.is_finite()) {
            return Err(FEAError::config(case, "ground motion contains non-finite values"));
        }
        Ok(())
    }
}

/// Options for structural analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    /// Type of analysis
    pub analysis_type: AnalysisType,
    /// Load case or combination for static, buckling and nonlinear runs
    pub load_case: String,
    /// End-shear split for transverse member loads
    pub load_shares: LoadShares,
    /// Number of modes to calculate
    pub num_modes: usize,
    pub mass_formulation: MassFormulation,
    /// Eigenvalues below this are treated as rigid-body modes
    pub rigid_body_tolerance: f64,
    /// Largest free-DOF count solved with the dense eigensolver
    pub dense_eigen_limit: usize,
    pub eigen_tolerance: f64,
    pub max_eigen_iterations: usize,
    /// Modal damping ratio
    pub damping_ratio: f64,
    /// Excitation direction for spectrum and time-history runs
    pub direction: Direction,
    pub combination: ModalCombination,
    pub spectrum: SpectrumTable,
    pub ground_motion: GroundMotion,
    pub integration: TimeIntegration,
    /// 1-based target modes for Rayleigh damping
    pub rayleigh_modes: (usize, usize),
    /// Load steps for nonlinear analysis
    pub load_steps: usize,
    /// Maximum iterations per nonlinear step
    pub max_iterations: usize,
    /// Convergence tolerance
    pub tolerance: f64,
    /// Residual measure tested against `tolerance`. The default `RelativeForce`
    /// is unit-free and stays meaningful at the first increment where u = 0;
    /// `ResidualPerDisplacement` selects the literal ‖r‖ / ‖u‖ ratio.
    pub convergence_norm: ConvergenceNorm,
    pub nonlinear_method: NonlinearMethod,
    pub arc_length: ArcLengthOptions,
    /// Include geometric stiffness in the nonlinear tangent
    pub include_geometric_stiffness: bool,
    /// Check static equilibrium after a linear solve
    pub check_statics: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            analysis_type: AnalysisType::Linear,
            load_case: "Case 1".to_string(),
            load_shares: LoadShares::Linear,
            num_modes: 12,
            mass_formulation: MassFormulation::Consistent,
            rigid_body_tolerance: 1e-6,
            dense_eigen_limit: 600,
            eigen_tolerance: 1e-10,
            max_eigen_iterations: 200,
            damping_ratio: 0.05,
            direction: Direction::X,
            combination: ModalCombination::Srss,
            spectrum: SpectrumTable::default(),
            ground_motion: GroundMotion::default(),
            integration: TimeIntegration::Newmark,
            rayleigh_modes: (1, 2),
            load_steps: 10,
            max_iterations: 30,
            tolerance: 1e-6,
            convergence_norm: ConvergenceNorm::RelativeForce,
            nonlinear_method: NonlinearMethod::NewtonRaphson,
            arc_length: ArcLengthOptions::default(),
            include_geometric_stiffness: true,
            check_statics: false,
        }
    }
}

impl AnalysisOptions {
    /// Create options for linear analysis
    pub fn linear(load_case: &str) -> Self {
        Self {
            load_case: load_case.to_string(),
            ..Self::default()
        }
    }

    /// Create options for modal analysis
    pub fn modal(num_modes: usize) -> Self {
        Self {
            analysis_type: AnalysisType::Modal,
            num_modes,
            ..Self::default()
        }
    }

    /// Create options for response-spectrum analysis
    pub fn response_spectrum(num_modes: usize, spectrum: SpectrumTable, direction: Direction) -> Self {
        Self {
            analysis_type: AnalysisType::ResponseSpectrum,
            num_modes,
            spectrum,
            direction,
            ..Self::default()
        }
    }

    /// Create options for time-history analysis
    pub fn time_history(num_modes: usize, ground_motion: GroundMotion, direction: Direction) -> Self {
        Self {
            analysis_type: AnalysisType::TimeHistory,
            num_modes,
            ground_motion,
            direction,
            ..Self::default()
        }
    }

    /// Create options for buckling analysis of a reference case
    pub fn buckling(load_case: &str, num_modes: usize) -> Self {
        Self {
            analysis_type: AnalysisType::Buckling,
            load_case: load_case.to_string(),
            num_modes,
            ..Self::default()
        }
    }

    /// Create options for nonlinear analysis of a reference case
    pub fn nonlinear(load_case: &str, load_steps: usize) -> Self {
        Self {
            analysis_type: AnalysisType::Nonlinear,
            load_case: load_case.to_string(),
            load_steps,
            ..Self::default()
        }
    }

    /// Set maximum iterations
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iterations = max_iter;
        self
    }

    /// Set convergence tolerance
    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    pub fn with_modes(mut self, num_modes: usize) -> Self {
        self.num_modes = num_modes;
        self
    }

    pub fn with_damping(mut self, damping_ratio: f64) -> Self {
        self.damping_ratio = damping_ratio;
        self
    }

    pub fn with_combination(mut self, combination: ModalCombination) -> Self {
        self.combination = combination;
        self
    }

    pub fn with_mass(mut self, formulation: MassFormulation) -> Self {
        self.mass_formulation = formulation;
        self
    }

    pub fn with_integration(mut self, integration: TimeIntegration) -> Self {
        self.integration = integration;
        self
    }

    pub fn with_method(mut self, method: NonlinearMethod) -> Self {
        self.nonlinear_method = method;
        self
    }

    pub fn with_norm(mut self, norm: ConvergenceNorm) -> Self {
        self.convergence_norm = norm;
        self
    }

    pub fn with_load_shares(mut self, shares: LoadShares) -> Self {
        self.load_shares = shares;
        self
    }

    pub fn with_geometric_stiffness(mut self, include: bool) -> Self {
        self.include_geometric_stiffness = include;
        self
    }

    pub fn with_statics_check(mut self) -> Self {
        self.check_statics = true;
        self
    }

    /// Case label used in diagnostics and errors
    pub fn case_label(&self) -> String {
        match self.analysis_type {
            AnalysisType::Linear | AnalysisType::Buckling | AnalysisType::Nonlinear => {
                self.load_case.clone()
            }
            AnalysisType::Modal => "modal".to_string(),
            AnalysisType::ResponseSpectrum => "response spectrum".to_string(),
            AnalysisType::TimeHistory => "time history".to_string(),
        }
    }

    /// Checks shared by the eigen-based drivers
    pub(crate) fn validate_modes(&self, case: &str) -> FEAResult<()> {
        if self.num_modes == 0 {
            return Err(FEAError::config(case, "num_modes must be at least 1"));
        }
        if !(self.damping_ratio.is_finite() && self.damping_ratio >= 0.0) {
            return Err(FEAError::config(
                case,
                format!("damping ratio must be non-negative (got {})", self.damping_ratio),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spectrum_interpolation_is_clamped() {
        let table = SpectrumTable::new(vec![(0.1, 2.0), (0.5, 4.0), (1.0, 1.0)]);
        table.validate("rs").unwrap();
        assert_eq!(table.sa(0.0), 2.0);
        assert!((table.sa(0.3) - 3.0).abs() < 1e-12);
        assert!((table.sa(0.75) - 2.5).abs() < 1e-12);
        assert_eq!(table.sa(5.0), 1.0);
    }

    #[test]
    fn test_unsorted_spectrum_rejected() {
        let table = SpectrumTable::new(vec![(0.5, 2.0), (0.5, 3.0)]);
        assert!(matches!(table.validate("rs"), Err(FEAError::Configuration { .. })));
        assert!(SpectrumTable::default().validate("rs").is_err());
    }

    #[test]
    fn test_ground_motion_from_samples() {
        let motion = GroundMotion::from_samples(&[(0.0, 0.0), (0.01, 1.0), (0.02, 0.5)]).unwrap();
        assert!((motion.dt - 0.01).abs() < 1e-15);
        assert!((motion.duration() - 0.02).abs() < 1e-12);
        assert!(GroundMotion::from_samples(&[(0.0, 0.0), (0.01, 1.0), (0.03, 0.5)]).is_err());
    }

    #[test]
    fn test_options_json_defaults() {
        let options: AnalysisOptions =
            serde_json::from_str(r#"{"analysis_type":"Modal","num_modes":4}"#).unwrap();
        assert_eq!(options.analysis_type, AnalysisType::Modal);
        assert_eq!(options.num_modes, 4);
        assert_eq!(options.load_steps, 10);
        assert_eq!(options.case_label(), "modal");
        assert_eq!(options.load_shares, LoadShares::Linear);
    }

    #[test]
    fn test_nonlinear_defaults_to_relative_force_norm() {
        let options = AnalysisOptions::nonlinear("Dead", 5);
        assert_eq!(options.convergence_norm, ConvergenceNorm::RelativeForce);
        let literal: AnalysisOptions =
            serde_json::from_str(r#"{"convergence_norm":"ResidualPerDisplacement"}"#).unwrap();
        assert_eq!(literal.convergence_norm, ConvergenceNorm::ResidualPerDisplacement);
    }
}
