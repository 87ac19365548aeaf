//! Mathematical utilities for frame analysis

pub mod eigen;
pub mod geometry;
pub mod member;
pub mod sparse;

use nalgebra::{DMatrix, DVector, Matrix3, SMatrix, SVector, Vector3};

pub use eigen::{dense_generalized, subspace_iteration, EigenPairs, SubspaceOptions};
pub use geometry::{element_length, node_rotation_matrix, transformation_matrix, LocalAxes};
pub use member::{
    beam_consistent_mass, beam_geometric_stiffness, beam_local_stiffness, beam_lumped_mass,
    line_load_shares, point_load_shares, truss_consistent_mass, truss_geometric_stiffness,
    truss_local_stiffness, truss_lumped_mass, truss_stiffness, LoadShares, MemberProperties,
};
pub use sparse::{reverse_cuthill_mckee, spmv, FactorError, SparseMatrixBuilder, SpdFactor};

pub type Mat = DMatrix<f64>;
pub type Vec = DVector<f64>;
pub type Mat3 = Matrix3<f64>;
pub type Vec3 = Vector3<f64>;

/// 12x12 matrix for element stiffness, mass and geometric stiffness
pub type Mat12 = SMatrix<f64, 12, 12>;
/// 12-element vector for element forces/displacements
pub type Vec12 = SVector<f64, 12>;

/// Solve a dense linear system using LU decomposition
pub fn solve_linear_system(a: &Mat, b: &Vec) -> Option<Vec> {
    a.clone().lu().solve(b)
}

/// Whether every entry of a vector is finite
pub fn all_finite(v: &Vec) -> bool {
    v.iter().all(|x| x.is_finite())
}
