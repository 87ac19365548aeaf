//! Frame Solver - finite element analysis of 3D skeletal structures
//!
//! Models are built from nodes, beam and truss elements, materials, sections,
//! supports and loads. Every analysis numbers the degrees of freedom afresh,
//! assembles sparse global matrices and hands them to one of the drivers:
//! - Linear static analysis with prescribed support displacements and springs
//! - Modal analysis (natural frequencies, mode shapes, mass participation)
//! - Response spectrum analysis with SRSS or CQC combination
//! - Ground-motion time history (direct Newmark or modal superposition)
//! - Linear buckling
//! - Geometrically nonlinear (P-Delta) analysis by Newton-Raphson or arc length
//!
//! ## Example
//! ```rust
//! use frame_solver::prelude::*;
//!
//! let mut model = FEModel::new();
//! model.add_material("Steel", Material::steel()).unwrap();
//! model.add_section("S", Section::rectangular(0.2, 0.4)).unwrap();
//! model.add_node("N1", Node::new(0.0, 0.0, 0.0)).unwrap();
//! model.add_node("N2", Node::new(5.0, 0.0, 0.0)).unwrap();
//! model.add_element("E1", Element::beam("N1", "N2", "Steel", "S")).unwrap();
//! model.add_support("N1", Support::fixed()).unwrap();
//! model.add_node_load("N2", NodeLoad::fz(-10_000.0, "Dead")).unwrap();
//!
//! let results = model.analyze_linear("Dead").unwrap();
//! let tip = results.displacement("N2").unwrap();
//! assert!(tip.dz < 0.0);
//! ```

pub mod analysis;
pub mod assembly;
pub mod elements;
pub mod error;
pub mod loads;
pub mod math;
pub mod model;
pub mod results;

pub use model::FEModel;

// Re-export common types
pub mod prelude {
    pub use crate::analysis::{
        AnalysisOptions, AnalysisType, ConvergenceNorm, Direction, GroundMotion, MassFormulation,
        ModalCombination, NonlinearMethod, SpectrumTable, TimeIntegration,
    };
    pub use crate::elements::{Element, ElementKind, Material, Node, Section, Support};
    pub use crate::error::{FEAError, FEAResult};
    pub use crate::loads::{
        AreaLoad, DistributedLoad, LoadCase, LoadCombination, LoadDirection, NodeLoad, PointLoad,
    };
    pub use crate::math::LoadShares;
    pub use crate::model::FEModel;
    pub use crate::results::{
        AnalysisResult, BucklingResults, ElementForces, LinearStaticResults, ModalResults,
        NodeDisplacement, NonlinearResults, Reactions, SpectrumResults, TimeHistoryResults,
    };
}
