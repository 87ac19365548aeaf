//! Result types for frame analysis

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::analysis::{Direction, ModalCombination, NonlinearMethod, TimeIntegration};
use crate::assembly::SkippedElement;
use crate::elements::ElementKind;
use crate::error::{FEAError, FEAResult};

/// Displacement results at a node
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeDisplacement {
    /// Displacement in X direction
    pub dx: f64,
    /// Displacement in Y direction
    pub dy: f64,
    /// Displacement in Z direction
    pub dz: f64,
    /// Rotation about X axis
    pub rx: f64,
    /// Rotation about Y axis
    pub ry: f64,
    /// Rotation about Z axis
    pub rz: f64,
}

impl NodeDisplacement {
    /// Create from array [DX, DY, DZ, RX, RY, RZ]
    pub fn from_array(arr: [f64; 6]) -> Self {
        let [dx, dy, dz, rx, ry, rz] = arr;
        Self { dx, dy, dz, rx, ry, rz }
    }

    pub fn as_array(&self) -> [f64; 6] {
        [self.dx, self.dy, self.dz, self.rx, self.ry, self.rz]
    }

    /// Get translation magnitude
    pub fn translation_magnitude(&self) -> f64 {
        (self.dx.powi(2) + self.dy.powi(2) + self.dz.powi(2)).sqrt()
    }

    /// Get rotation magnitude
    pub fn rotation_magnitude(&self) -> f64 {
        (self.rx.powi(2) + self.ry.powi(2) + self.rz.powi(2)).sqrt()
    }
}

/// Reaction forces at a supported node
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Reactions {
    /// Reaction force in X direction
    pub fx: f64,
    /// Reaction force in Y direction
    pub fy: f64,
    /// Reaction force in Z direction
    pub fz: f64,
    /// Reaction moment about X axis
    pub mx: f64,
    /// Reaction moment about Y axis
    pub my: f64,
    /// Reaction moment about Z axis
    pub mz: f64,
}

impl Reactions {
    /// Create from array [FX, FY, FZ, MX, MY, MZ]
    pub fn from_array(arr: [f64; 6]) -> Self {
        let [fx, fy, fz, mx, my, mz] = arr;
        Self { fx, fy, fz, mx, my, mz }
    }

    pub fn as_array(&self) -> [f64; 6] {
        [self.fx, self.fy, self.fz, self.mx, self.my, self.mz]
    }

    /// Get total force magnitude
    pub fn force_magnitude(&self) -> f64 {
        (self.fx.powi(2) + self.fy.powi(2) + self.fz.powi(2)).sqrt()
    }

    /// Get total moment magnitude
    pub fn moment_magnitude(&self) -> f64 {
        (self.mx.powi(2) + self.my.powi(2) + self.mz.powi(2)).sqrt()
    }
}

/// Internal forces at one end of a member (sign convention: tension positive)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MemberForces {
    /// Axial force (positive = tension)
    pub axial: f64,
    /// Shear force in local y direction
    pub shear_y: f64,
    /// Shear force in local z direction
    pub shear_z: f64,
    /// Torsion
    pub torsion: f64,
    /// Bending moment about local y axis
    pub moment_y: f64,
    /// Bending moment about local z axis
    pub moment_z: f64,
}

impl MemberForces {
    /// Create from local force array at i-node
    pub fn from_i_node_forces(forces: &[f64; 12]) -> Self {
        Self {
            axial: -forces[0],
            shear_y: forces[1],
            shear_z: forces[2],
            torsion: -forces[3],
            moment_y: forces[4],
            moment_z: forces[5],
        }
    }

    /// Create from local force array at j-node
    pub fn from_j_node_forces(forces: &[f64; 12]) -> Self {
        Self {
            axial: forces[6],
            shear_y: -forces[7],
            shear_z: -forces[8],
            torsion: forces[9],
            moment_y: forces[10],
            moment_z: forces[11],
        }
    }
}

/// End forces of one element in its local axes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementForces {
    pub kind: ElementKind,
    /// Local end force vector `[Fx_i, Fy_i, Fz_i, Mx_i, My_i, Mz_i, Fx_j, ..., Mz_j]`
    pub local: [f64; 12],
    pub i_end: MemberForces,
    pub j_end: MemberForces,
    /// Mean axial force (positive = tension)
    pub axial: f64,
}

impl ElementForces {
    pub fn from_local(kind: ElementKind, local: [f64; 12]) -> Self {
        Self {
            kind,
            local,
            i_end: MemberForces::from_i_node_forces(&local),
            j_end: MemberForces::from_j_node_forces(&local),
            axial: 0.5 * (local[6] - local[0]),
        }
    }

    /// Largest end bending moment magnitude
    pub fn max_moment(&self) -> f64 {
        [4, 5, 10, 11]
            .iter()
            .map(|&k| self.local[k].abs())
            .fold(0.0, f64::max)
    }
}

/// Summary of a static solution
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisSummary {
    /// Maximum translation magnitude
    pub max_displacement: f64,
    /// Node with maximum displacement
    pub max_disp_node: String,
    /// Maximum reaction force magnitude
    pub max_reaction: f64,
    /// Node with maximum reaction
    pub max_reaction_node: String,
    /// Maximum element axial force magnitude
    pub max_axial: f64,
    /// Element with maximum axial force
    pub max_axial_element: String,
    /// Maximum element end moment
    pub max_moment: f64,
    /// Element with maximum moment
    pub max_moment_element: String,
    /// Total number of nodes
    pub num_nodes: usize,
    /// Number of elements that entered the solve
    pub num_elements: usize,
    /// Total DOFs
    pub total_dofs: usize,
    /// Free DOFs (unknowns)
    pub free_dofs: usize,
}

impl AnalysisSummary {
    /// Scan the displacement, reaction and element-force fields
    pub fn from_fields(
        displacements: &BTreeMap<String, NodeDisplacement>,
        reactions: &BTreeMap<String, Reactions>,
        element_forces: &BTreeMap<String, ElementForces>,
    ) -> Self {
        let mut summary = Self {
            num_nodes: displacements.len(),
            num_elements: element_forces.len(),
            total_dofs: 6 * displacements.len(),
            ..Default::default()
        };
        for (name, disp) in displacements {
            let mag = disp.translation_magnitude();
            if mag > summary.max_displacement {
                summary.max_displacement = mag;
                summary.max_disp_node = name.clone();
            }
        }
        for (name, rxn) in reactions {
            let mag = rxn.force_magnitude();
            if mag > summary.max_reaction {
                summary.max_reaction = mag;
                summary.max_reaction_node = name.clone();
            }
        }
        for (name, forces) in element_forces {
            if forces.axial.abs() > summary.max_axial {
                summary.max_axial = forces.axial.abs();
                summary.max_axial_element = name.clone();
            }
            let moment = forces.max_moment();
            if moment > summary.max_moment {
                summary.max_moment = moment;
                summary.max_moment_element = name.clone();
            }
        }
        summary
    }
}

/// Linear static solution for one load case or combination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearStaticResults {
    pub case: String,
    pub displacements: BTreeMap<String, NodeDisplacement>,
    /// Reactions at restrained and spring-supported nodes
    pub reactions: BTreeMap<String, Reactions>,
    pub element_forces: BTreeMap<String, ElementForces>,
    /// Elements left out of assembly
    pub skipped_elements: Vec<SkippedElement>,
    /// Loads dropped because their target is missing or unusable
    pub dropped_loads: Vec<String>,
    pub summary: AnalysisSummary,
}

impl LinearStaticResults {
    pub fn displacement(&self, node: &str) -> FEAResult<NodeDisplacement> {
        self.displacements
            .get(node)
            .copied()
            .ok_or_else(|| FEAError::NodeNotFound(node.to_string()))
    }

    pub fn reaction(&self, node: &str) -> FEAResult<Reactions> {
        self.reactions
            .get(node)
            .copied()
            .ok_or_else(|| FEAError::NodeNotFound(node.to_string()))
    }

    pub fn forces(&self, element: &str) -> FEAResult<&ElementForces> {
        self.element_forces
            .get(element)
            .ok_or_else(|| FEAError::ElementNotFound(element.to_string()))
    }
}

/// One vibration mode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeResult {
    /// 1-based mode number in ascending frequency order
    pub mode: usize,
    /// Eigenvalue ω²
    pub eigenvalue: f64,
    /// Angular frequency (rad/s)
    pub angular_frequency: f64,
    /// Frequency (Hz)
    pub frequency: f64,
    /// Period (s)
    pub period: f64,
    /// Participation factor per global direction X/Y/Z
    pub participation: [f64; 3],
    /// Effective modal mass per direction
    pub effective_mass: [f64; 3],
    /// Effective mass over total mass per direction
    pub mass_ratio: [f64; 3],
    /// Cumulative mass ratio up to and including this mode
    pub cumulative_ratio: [f64; 3],
    /// Mass-normalised mode shape per node
    pub shape: BTreeMap<String, [f64; 6]>,
}

/// Modal analysis output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModalResults {
    pub modes: Vec<ModeResult>,
    /// Total participating mass per direction
    pub total_mass: [f64; 3],
    /// Number of modes needed to reach 90 % mass participation per direction
    pub modes_for_90_percent: [Option<usize>; 3],
    /// Number of rigid-body eigenvalues discarded
    pub rigid_body_modes: usize,
}

impl ModalResults {
    pub fn frequencies(&self) -> Vec<f64> {
        self.modes.iter().map(|m| m.frequency).collect()
    }

    pub fn periods(&self) -> Vec<f64> {
        self.modes.iter().map(|m| m.period).collect()
    }
}

/// Per-mode response-spectrum values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectrumModeResult {
    pub mode: usize,
    pub period: f64,
    /// Interpolated spectral acceleration
    pub sa: f64,
    pub participation: f64,
    pub effective_mass: f64,
    /// Modal displacement Γ·Sa·T²/(4π²)
    pub displacement: f64,
    /// Modal base shear Sa·M_eff
    pub base_shear: f64,
}

/// Response-spectrum analysis output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectrumResults {
    pub direction: Direction,
    pub combination: ModalCombination,
    pub damping_ratio: f64,
    pub modes: Vec<SpectrumModeResult>,
    /// Combined base shear
    pub base_shear: f64,
    /// Combined modal displacement
    pub displacement: f64,
    /// Combined peak displacement per node and DOF
    pub peak_displacements: BTreeMap<String, NodeDisplacement>,
}

/// Time-history analysis output. Vectors are indexed by global DOF
/// (`6 × node position + local DOF`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeHistoryResults {
    pub method: TimeIntegration,
    pub direction: Direction,
    /// Rayleigh coefficients (a0, a1)
    pub rayleigh: (f64, f64),
    pub time: Vec<f64>,
    pub displacement: Vec<Vec<f64>>,
    pub velocity: Vec<Vec<f64>>,
    pub acceleration: Vec<Vec<f64>>,
    /// Total inertial force in the excitation direction
    pub base_shear: Vec<f64>,
    /// Node ids in DOF order
    pub nodes: Vec<String>,
    pub peak_displacement: f64,
    pub peak_base_shear: f64,
}

impl TimeHistoryResults {
    /// Displacement history of one node DOF
    pub fn node_history(&self, node: &str, local_dof: usize) -> Option<Vec<f64>> {
        let index = self.nodes.iter().position(|n| n == node)?;
        let dof = 6 * index + local_dof;
        if local_dof >= 6 {
            return None;
        }
        Some(self.displacement.iter().map(|u| u[dof]).collect())
    }
}

/// Dominant deformation of a buckling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BucklingClass {
    Lateral,
    Torsional,
    Combined,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucklingMode {
    pub mode: usize,
    /// Critical load multiplier on the reference loads
    pub factor: f64,
    pub classification: BucklingClass,
    /// Mode shape normalised to unit maximum component
    pub shape: BTreeMap<String, [f64; 6]>,
}

/// Linear buckling output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucklingResults {
    pub case: String,
    /// Modes sorted by ascending positive factor
    pub modes: Vec<BucklingMode>,
    pub critical_factor: f64,
    /// Critical factor times the largest reference compression
    pub critical_load: f64,
    pub safety_factor: f64,
    /// Reference axial force per element (positive = tension)
    pub axial_forces: BTreeMap<String, f64>,
}

/// Outcome of one nonlinear load step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepState {
    Converged,
    Diverged,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonlinearStep {
    pub step: usize,
    pub load_factor: f64,
    pub state: StepState,
    /// Newton corrections applied in this step
    pub iterations: usize,
    pub residual_norm: f64,
    pub displacement_norm: f64,
    pub max_displacement: f64,
}

/// Nonlinear static output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonlinearResults {
    pub case: String,
    pub method: NonlinearMethod,
    pub steps: Vec<NonlinearStep>,
    /// False when any step diverged
    pub reliable: bool,
    pub final_load_factor: f64,
    pub displacements: BTreeMap<String, NodeDisplacement>,
    pub element_forces: BTreeMap<String, ElementForces>,
}

impl NonlinearResults {
    /// Turn an unreliable result into [`FEAError::ConvergenceFailed`]
    pub fn ensure_reliable(&self) -> FEAResult<()> {
        match self.steps.iter().find(|s| s.state == StepState::Diverged) {
            Some(step) => Err(FEAError::ConvergenceFailed {
                case: self.case.clone(),
                step: step.step,
                iterations: step.iterations,
            }),
            None => Ok(()),
        }
    }

    pub fn displacement(&self, node: &str) -> FEAResult<NodeDisplacement> {
        self.displacements
            .get(node)
            .copied()
            .ok_or_else(|| FEAError::NodeNotFound(node.to_string()))
    }
}

/// Output of any analysis driver
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "results")]
pub enum AnalysisResult {
    LinearStatic(LinearStaticResults),
    Modal(ModalResults),
    ResponseSpectrum(SpectrumResults),
    TimeHistory(TimeHistoryResults),
    Buckling(BucklingResults),
    Nonlinear(NonlinearResults),
}

impl AnalysisResult {
    pub fn as_linear(&self) -> Option<&LinearStaticResults> {
        match self {
            AnalysisResult::LinearStatic(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_modal(&self) -> Option<&ModalResults> {
        match self {
            AnalysisResult::Modal(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_spectrum(&self) -> Option<&SpectrumResults> {
        match self {
            AnalysisResult::ResponseSpectrum(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_time_history(&self) -> Option<&TimeHistoryResults> {
        match self {
            AnalysisResult::TimeHistory(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_buckling(&self) -> Option<&BucklingResults> {
        match self {
            AnalysisResult::Buckling(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_nonlinear(&self) -> Option<&NonlinearResults> {
        match self {
            AnalysisResult::Nonlinear(r) => Some(r),
            _ => None,
        }
    }
}
