//! Error types for the frame solver

use thiserror::Error;

/// Main error type for solver operations
#[derive(Error, Debug)]
pub enum FEAError {
    #[error("Node '{0}' not found in model")]
    NodeNotFound(String),

    #[error("Element '{0}' not found in model")]
    ElementNotFound(String),

    #[error("Material '{0}' not found in model")]
    MaterialNotFound(String),

    #[error("Section '{0}' not found in model")]
    SectionNotFound(String),

    #[error("Load case '{0}' not found in model")]
    LoadCaseNotFound(String),

    #[error("Duplicate name '{0}' already exists")]
    DuplicateName(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Bad analysis parameters or misuse of the DOF bookkeeping
    #[error("Configuration error in case '{case}': {message}")]
    Configuration { case: String, message: String },

    /// A node referenced by a boundary condition was never assigned DOFs
    #[error("Unknown node '{0}': no degrees of freedom were assigned to it")]
    UnknownNode(String),

    /// Element references something missing or carries invalid properties
    #[error("Element '{element}' is malformed: {message}")]
    ModelIntegrity { element: String, message: String },

    #[error("Element '{element}' has degenerate geometry (length {length:e})")]
    DegenerateGeometry { element: String, length: f64 },

    #[error("Singular system in case '{case}': {detail}")]
    SingularSystem { case: String, detail: String },

    #[error("Case '{case}' failed to converge at step {step} after {iterations} iterations")]
    ConvergenceFailed {
        case: String,
        step: usize,
        iterations: usize,
    },

    #[error("No positive critical load factor found for case '{case}'")]
    NoCriticalLoadFound { case: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FEAError {
    pub(crate) fn config(case: &str, message: impl Into<String>) -> Self {
        Self::Configuration {
            case: case.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn singular(case: &str, detail: impl Into<String>) -> Self {
        Self::SingularSystem {
            case: case.to_string(),
            detail: detail.into(),
        }
    }

    pub(crate) fn integrity(element: &str, message: impl Into<String>) -> Self {
        Self::ModelIntegrity {
            element: element.to_string(),
            message: message.into(),
        }
    }

    /// Whether the error aborts only one analysis case (as opposed to bad model input)
    pub fn is_case_fatal(&self) -> bool {
        matches!(
            self,
            Self::SingularSystem { .. }
                | Self::ConvergenceFailed { .. }
                | Self::NoCriticalLoadFound { .. }
                | Self::Configuration { .. }
        )
    }
}

/// Result type for solver operations
pub type FEAResult<T> = Result<T, FEAError>;
