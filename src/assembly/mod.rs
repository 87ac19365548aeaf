//! Assembly of global matrices and load vectors
//!
//! The [`DofManager`] numbers the nodal DOFs and records boundary conditions,
//! [`GlobalAssembler`] builds the sparse global matrices from cached element
//! matrices, and [`LoadAssembler`] turns model loads into force vectors.

mod dof;
mod elements;
mod global;
mod loads;

pub use dof::DofManager;
pub use elements::{prepare_elements, ElementMatrices, SkippedElement};
pub use global::{AssemblyReport, GlobalAssembler};
pub use loads::{LoadAssembler, LoadVector};
