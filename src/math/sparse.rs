//! Sparse matrix utilities for assembly and direct solves
//!
//! Frame stiffness matrices are overwhelmingly sparse. Element contributions
//! are accumulated as COO triplets, converted to CSC (duplicates summed), and
//! factorized with a sparse Cholesky after bandwidth-reducing reordering.

use std::collections::VecDeque;

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::factorization::CscCholesky;
use nalgebra_sparse::{CooMatrix, CscMatrix, SparseEntry};

use super::Mat12;

/// Pivots that keep less than this fraction of their original diagonal
/// indicate a mechanism
const PIVOT_DECAY_LIMIT: f64 = 1e-11;

/// Sparse matrix builder using COO format
/// More efficient for incremental assembly
pub struct SparseMatrixBuilder {
    size: usize,
    entries: Vec<(usize, usize, f64)>,
}

impl SparseMatrixBuilder {
    /// Create a new sparse matrix builder
    pub fn new(size: usize) -> Self {
        // ~6 connected nodes x 6 DOFs per row is typical for frames
        let estimated_nnz = size * 36;
        Self {
            size,
            entries: Vec::with_capacity(estimated_nnz),
        }
    }

    /// Matrix dimension
    pub fn size(&self) -> usize {
        self.size
    }

    /// Add a value to the matrix (accumulates if already exists)
    #[inline]
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        if value != 0.0 {
            self.entries.push((row, col, value));
        }
    }

    /// Scatter-add a 12x12 element matrix through its DOF map
    pub fn add_element_matrix(&mut self, dofs: &[usize; 12], k_elem: &Mat12) {
        for (i, &di) in dofs.iter().enumerate() {
            for (j, &dj) in dofs.iter().enumerate() {
                self.add(di, dj, k_elem[(i, j)]);
            }
        }
    }

    /// Add every stored entry of another sparse matrix, scaled
    pub fn add_scaled(&mut self, matrix: &CscMatrix<f64>, scale: f64) {
        for (row, col, &val) in matrix.triplet_iter() {
            self.add(row, col, scale * val);
        }
    }

    /// Convert to CSC format
    pub fn to_csc(&self) -> CscMatrix<f64> {
        let mut coo = CooMatrix::new(self.size, self.size);
        for &(row, col, val) in &self.entries {
            coo.push(row, col, val);
        }
        CscMatrix::from(&coo)
    }

    /// Convert to dense matrix (for comparison/debugging)
    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut mat = DMatrix::zeros(self.size, self.size);
        for &(row, col, val) in &self.entries {
            mat[(row, col)] += val;
        }
        mat
    }

    /// Number of stored triplets (before duplicates are summed)
    pub fn nnz(&self) -> usize {
        self.entries.len()
    }
}

/// Sparse matrix-vector product `y = A x`
pub fn spmv(a: &CscMatrix<f64>, x: &DVector<f64>) -> DVector<f64> {
    let mut y = DVector::zeros(a.nrows());
    let offsets = a.col_offsets();
    let rows = a.row_indices();
    let values = a.values();
    for col in 0..a.ncols() {
        let xc = x[col];
        if xc == 0.0 {
            continue;
        }
        for idx in offsets[col]..offsets[col + 1] {
            y[rows[idx]] += values[idx] * xc;
        }
    }
    y
}

/// Diagonal of a square sparse matrix
pub fn diagonal(a: &CscMatrix<f64>) -> DVector<f64> {
    let mut d = DVector::zeros(a.nrows());
    for (row, col, &val) in a.triplet_iter() {
        if row == col {
            d[row] += val;
        }
    }
    d
}

/// Linear combination `Σ cᵢ·Aᵢ` of equally sized sparse matrices
pub fn combine(terms: &[(f64, &CscMatrix<f64>)]) -> CscMatrix<f64> {
    let size = terms.first().map(|(_, m)| m.nrows()).unwrap_or(0);
    let mut builder = SparseMatrixBuilder::new(size);
    for &(scale, matrix) in terms {
        builder.add_scaled(matrix, scale);
    }
    builder.to_csc()
}

/// Square submatrix on the rows/columns that `position` maps to a local index
pub fn restrict(a: &CscMatrix<f64>, position: &[Option<usize>], size: usize) -> CscMatrix<f64> {
    let mut builder = SparseMatrixBuilder::new(size);
    for (row, col, &val) in a.triplet_iter() {
        if let (Some(r), Some(c)) = (position[row], position[col]) {
            builder.add(r, c, val);
        }
    }
    builder.to_csc()
}

/// Dense copy of a sparse matrix
pub fn to_dense(a: &CscMatrix<f64>) -> DMatrix<f64> {
    let mut mat = DMatrix::zeros(a.nrows(), a.ncols());
    for (row, col, &val) in a.triplet_iter() {
        mat[(row, col)] += val;
    }
    mat
}

/// Largest absolute asymmetry `|A_ij - A_ji|` over stored entries
pub fn max_asymmetry(a: &CscMatrix<f64>) -> f64 {
    let mut worst: f64 = 0.0;
    for (row, col, &val) in a.triplet_iter() {
        let mirror = match a.get_entry(col, row) {
            Some(SparseEntry::NonZero(v)) => *v,
            _ => 0.0,
        };
        worst = worst.max((val - mirror).abs());
    }
    worst
}

/// Bandwidth reduction using Reverse Cuthill-McKee algorithm
///
/// Returns `perm` with `perm[new_index] = old_index`
pub fn reverse_cuthill_mckee(a: &CscMatrix<f64>) -> Vec<usize> {
    let n = a.nrows();
    if n == 0 {
        return vec![];
    }

    let mut adj: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (row, col, &val) in a.triplet_iter() {
        if val != 0.0 && row != col {
            adj[row].push(col);
        }
    }

    let degrees: Vec<usize> = adj.iter().map(|v| v.len()).collect();
    for neighbors in &mut adj {
        neighbors.sort_by_key(|&i| (degrees[i], i));
        neighbors.dedup();
    }

    let mut visited = vec![false; n];
    let mut result = Vec::with_capacity(n);
    let mut queue = VecDeque::new();

    while result.len() < n {
        // Each component starts from its lowest-degree unvisited vertex
        let Some(start) = (0..n).filter(|&i| !visited[i]).min_by_key(|&i| (degrees[i], i)) else {
            break;
        };
        queue.push_back(start);
        visited[start] = true;

        while let Some(node) = queue.pop_front() {
            result.push(node);
            for &neighbor in &adj[node] {
                if !visited[neighbor] {
                    visited[neighbor] = true;
                    queue.push_back(neighbor);
                }
            }
        }
    }

    result.reverse();
    result
}

/// Create inverse permutation
pub fn inverse_permutation(perm: &[usize]) -> Vec<usize> {
    let mut inv = vec![0; perm.len()];
    for (new_idx, &old_idx) in perm.iter().enumerate() {
        inv[old_idx] = new_idx;
    }
    inv
}

/// Why a symmetric positive definite factorization was refused
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FactorError {
    /// A pivot was zero or negative
    NotPositiveDefinite,
    /// A pivot kept almost none of its diagonal; `index` is the original row
    PivotDecay { index: usize, ratio: f64 },
}

/// Sparse Cholesky factorization of a symmetric positive definite matrix,
/// computed on an RCM-reordered copy and reusable for many right-hand sides
pub struct SpdFactor {
    perm: Vec<usize>,
    cholesky: CscCholesky<f64>,
}

impl SpdFactor {
    /// Factorize `a`
    pub fn new(a: &CscMatrix<f64>) -> Result<Self, FactorError> {
        let n = a.nrows();
        let perm = reverse_cuthill_mckee(a);
        let inv = inverse_permutation(&perm);

        let mut coo = CooMatrix::new(n, n);
        for (row, col, &val) in a.triplet_iter() {
            coo.push(inv[row], inv[col], val);
        }
        let permuted = CscMatrix::from(&coo);

        let cholesky =
            CscCholesky::factor(&permuted).map_err(|_| FactorError::NotPositiveDefinite)?;

        let original_diag = diagonal(&permuted);
        let l = cholesky.l();
        for j in 0..n {
            let l_jj = match l.get_entry(j, j) {
                Some(SparseEntry::NonZero(v)) => *v,
                _ => 0.0,
            };
            let a_jj = original_diag[j];
            if a_jj <= 0.0 || !l_jj.is_finite() {
                return Err(FactorError::NotPositiveDefinite);
            }
            let ratio = l_jj * l_jj / a_jj;
            if ratio < PIVOT_DECAY_LIMIT {
                return Err(FactorError::PivotDecay {
                    index: perm[j],
                    ratio,
                });
            }
        }

        Ok(Self { perm, cholesky })
    }

    /// Dimension of the factored system
    pub fn size(&self) -> usize {
        self.perm.len()
    }

    /// Solve `A x = b`
    pub fn solve(&self, b: &DVector<f64>) -> DVector<f64> {
        let n = self.perm.len();
        let permuted = DMatrix::from_fn(n, 1, |i, _| b[self.perm[i]]);
        let solved = self.cholesky.solve(&permuted);
        let mut x = DVector::zeros(n);
        for (new_idx, &old_idx) in self.perm.iter().enumerate() {
            x[old_idx] = solved[(new_idx, 0)];
        }
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tridiagonal(n: usize) -> CscMatrix<f64> {
        let mut builder = SparseMatrixBuilder::new(n);
        for i in 0..n {
            builder.add(i, i, 4.0);
            if i + 1 < n {
                builder.add(i, i + 1, -1.0);
                builder.add(i + 1, i, -1.0);
            }
        }
        builder.to_csc()
    }

    #[test]
    fn test_sparse_builder_accumulates_duplicates() {
        let mut builder = SparseMatrixBuilder::new(3);
        builder.add(0, 0, 4.0);
        builder.add(0, 0, 1.5);
        builder.add(1, 2, 2.0);
        builder.add(2, 2, 0.0);
        assert_eq!(builder.nnz(), 3);

        let csc = builder.to_csc();
        let dense = to_dense(&csc);
        assert_relative_eq!(dense[(0, 0)], 5.5);
        assert_relative_eq!(dense[(1, 2)], 2.0);
        assert_relative_eq!(builder.to_dense()[(0, 0)], 5.5);
    }

    #[test]
    fn test_spmv_matches_dense() {
        let a = tridiagonal(5);
        let x = DVector::from_fn(5, |i, _| i as f64 + 1.0);
        let y = spmv(&a, &x);
        let expected = to_dense(&a) * &x;
        for i in 0..5 {
            assert_relative_eq!(y[i], expected[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_spd_factor_solve() {
        let a = tridiagonal(6);
        let b = DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let factor = SpdFactor::new(&a).unwrap();
        assert_eq!(factor.size(), 6);
        let x = factor.solve(&b);
        let residual = (spmv(&a, &x) - &b).norm();
        assert!(residual < 1e-10, "residual: {}", residual);
    }

    #[test]
    fn test_singular_matrix_is_refused() {
        // Free-free spring: rigid translation makes it singular
        let mut builder = SparseMatrixBuilder::new(2);
        builder.add(0, 0, 1.0);
        builder.add(0, 1, -1.0);
        builder.add(1, 0, -1.0);
        builder.add(1, 1, 1.0);
        assert!(SpdFactor::new(&builder.to_csc()).is_err());
    }

    #[test]
    fn test_rcm_is_a_permutation() {
        let a = tridiagonal(7);
        let mut perm = reverse_cuthill_mckee(&a);
        let inv = inverse_permutation(&perm);
        for (new_idx, &old_idx) in perm.iter().enumerate() {
            assert_eq!(inv[old_idx], new_idx);
        }
        perm.sort_unstable();
        assert_eq!(perm, (0..7).collect::<Vec<_>>());
    }

    #[test]
    fn test_restrict_and_combine() {
        let a = tridiagonal(4);
        let position = vec![None, Some(0), None, Some(1)];
        let sub = to_dense(&restrict(&a, &position, 2));
        assert_relative_eq!(sub[(0, 0)], 4.0);
        assert_relative_eq!(sub[(0, 1)], 0.0);

        let doubled = combine(&[(1.0, &a), (1.0, &a)]);
        assert_relative_eq!(diagonal(&doubled)[2], 8.0);
        assert_eq!(max_asymmetry(&doubled), 0.0);
    }
}
