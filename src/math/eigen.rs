//! Generalized symmetric eigensolvers `A φ = μ B φ` with `B` positive definite
//!
//! Two paths are provided: a dense Cholesky reduction to standard form for
//! small systems, and a subspace iteration with Rayleigh-Ritz projection that
//! only needs products with `A`/`B` and a factorization of `B`.

use nalgebra::SymmetricEigen;
use nalgebra_sparse::CscMatrix;

use super::sparse::{spmv, SpdFactor};
use super::{Mat, Vec};

/// Eigenvalues with their eigenvectors stored column-wise
#[derive(Debug, Clone)]
pub struct EigenPairs {
    pub values: std::vec::Vec<f64>,
    pub vectors: Mat,
}

impl EigenPairs {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Eigenvector `k` as an owned vector
    pub fn vector(&self, k: usize) -> Vec {
        self.vectors.column(k).into_owned()
    }
}

/// Subspace iteration control
#[derive(Debug, Clone, Copy)]
pub struct SubspaceOptions {
    /// Relative change of the wanted eigenvalues between sweeps
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for SubspaceOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-10,
            max_iterations: 200,
        }
    }
}

/// Solve the full dense problem `A φ = μ B φ`.
///
/// `B = L Lᵀ` reduces it to the standard symmetric problem
/// `L⁻¹ A L⁻ᵀ z = μ z` with `φ = L⁻ᵀ z`. Eigenvalues are returned in
/// ascending order and eigenvectors are `B`-orthonormal.
/// Returns `None` if `B` is not positive definite.
pub fn dense_generalized(a: &Mat, b: &Mat) -> Option<EigenPairs> {
    let n = a.nrows();
    let chol = b.clone().cholesky()?;
    let l = chol.l();

    let y = l.solve_lower_triangular(a)?;
    let c = l.solve_lower_triangular(&y.transpose())?;
    let c = (&c + c.transpose()) * 0.5;

    let eigen = SymmetricEigen::new(c);
    let phi = l.tr_solve_lower_triangular(&eigen.eigenvectors)?;

    let mut order: std::vec::Vec<usize> = (0..n).collect();
    order.sort_by(|&i, &j| eigen.eigenvalues[i].total_cmp(&eigen.eigenvalues[j]));

    let values = order.iter().map(|&i| eigen.eigenvalues[i]).collect();
    let vectors = Mat::from_fn(n, n, |r, c| phi[(r, order[c])]);
    Some(EigenPairs { values, vectors })
}

/// Deterministic pseudo-random vector used to seed or replace subspace columns
fn seeded_vector(n: usize, seed: u64) -> Vec {
    let mut state = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
    Vec::from_fn(n, |_, _| {
        state = state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        ((state >> 11) as f64 / (1u64 << 53) as f64) - 0.5
    })
}

/// Modified Gram-Schmidt in the `B` inner product.
///
/// Columns that collapse are replaced by fresh pseudo-random vectors.
fn b_orthonormalize(x: &mut Mat, b: &CscMatrix<f64>, seed: &mut u64) -> bool {
    let n = x.nrows();
    let mut bx: std::vec::Vec<Vec> = std::vec::Vec::with_capacity(x.ncols());

    for k in 0..x.ncols() {
        let mut attempts = 0;
        loop {
            let mut v = x.column(k).into_owned();
            let original = v.norm();
            for (j, bxj) in bx.iter().enumerate() {
                let proj = bxj.dot(&v);
                v -= x.column(j) * proj;
            }
            let bv = spmv(b, &v);
            let norm2 = v.dot(&bv);
            if norm2 > 0.0 && v.norm() > 1e-10 * original.max(f64::MIN_POSITIVE) {
                let norm = norm2.sqrt();
                x.set_column(k, &(v / norm));
                bx.push(bv / norm);
                break;
            }
            attempts += 1;
            if attempts > 5 {
                return false;
            }
            *seed += 1;
            x.set_column(k, &seeded_vector(n, *seed));
        }
    }
    true
}

/// Find the `count` largest eigenvalues of `A φ = μ B φ` by subspace iteration.
///
/// `b_factor` is a factorization of `B`. The iteration is driven by |μ|, so an
/// indefinite `A` yields the `count` eigenvalues of largest magnitude, ordered
/// by descending magnitude, with `B`-orthonormal eigenvectors. Returns `None`
/// when the iteration does not settle within `options.max_iterations` sweeps.
pub fn subspace_iteration(
    a: &CscMatrix<f64>,
    b: &CscMatrix<f64>,
    b_factor: &SpdFactor,
    count: usize,
    options: &SubspaceOptions,
) -> Option<EigenPairs> {
    let n = a.nrows();
    if count == 0 || n == 0 {
        return Some(EigenPairs {
            values: vec![],
            vectors: Mat::zeros(n, 0),
        });
    }
    let q = (2 * count).max(count + 8).min(n);

    // Starting vectors: diag(A), then unit vectors where |a_ii|/b_ii is largest
    let mut diag_a = Vec::zeros(n);
    let mut diag_b = Vec::zeros(n);
    for (row, col, &val) in a.triplet_iter() {
        if row == col {
            diag_a[row] += val;
        }
    }
    for (row, col, &val) in b.triplet_iter() {
        if row == col {
            diag_b[row] += val;
        }
    }
    let mut ranked: std::vec::Vec<usize> = (0..n).collect();
    let ratio = |i: usize| {
        if diag_b[i] > 0.0 {
            diag_a[i].abs() / diag_b[i]
        } else {
            0.0
        }
    };
    ranked.sort_by(|&i, &j| ratio(j).total_cmp(&ratio(i)).then(i.cmp(&j)));

    let mut seed = 17u64;
    let mut x = Mat::zeros(n, q);
    if diag_a.norm() > 0.0 {
        x.set_column(0, &diag_a.map(f64::abs));
    } else {
        x.set_column(0, &seeded_vector(n, seed));
    }
    for k in 1..q {
        if k == q - 1 && q > 2 {
            seed += 1;
            x.set_column(k, &seeded_vector(n, seed));
        } else {
            x[(ranked[k - 1], k)] = 1.0;
        }
    }

    let mut previous: Option<std::vec::Vec<f64>> = None;
    for iteration in 1..=options.max_iterations {
        // X̄ = B⁻¹ A X
        let mut x_bar = Mat::zeros(n, q);
        for k in 0..q {
            let ax = spmv(a, &x.column(k).into_owned());
            x_bar.set_column(k, &b_factor.solve(&ax));
        }
        if !b_orthonormalize(&mut x_bar, b, &mut seed) {
            return None;
        }

        // Rayleigh-Ritz on the B-orthonormal basis: standard symmetric problem
        let mut ax_bar = Mat::zeros(n, q);
        for k in 0..q {
            ax_bar.set_column(k, &spmv(a, &x_bar.column(k).into_owned()));
        }
        let reduced = x_bar.transpose() * &ax_bar;
        let reduced = (&reduced + reduced.transpose()) * 0.5;
        let eigen = SymmetricEigen::new(reduced);

        let mut order: std::vec::Vec<usize> = (0..q).collect();
        order.sort_by(|&i, &j| {
            eigen.eigenvalues[j]
                .abs()
                .total_cmp(&eigen.eigenvalues[i].abs())
        });
        let values: std::vec::Vec<f64> = order.iter().map(|&i| eigen.eigenvalues[i]).collect();
        let z = Mat::from_fn(q, q, |r, c| eigen.eigenvectors[(r, order[c])]);
        x = &x_bar * z;

        let converged = previous.as_ref().is_some_and(|prev| {
            values
                .iter()
                .zip(prev)
                .take(count)
                .all(|(now, before)| (now - before).abs() <= options.tolerance * now.abs().max(1e-300))
        });
        if converged {
            log::debug!("Subspace iteration converged after {} sweeps", iteration);
            let vectors = x.columns(0, count).into_owned();
            return Some(EigenPairs {
                values: values[..count].to_vec(),
                vectors,
            });
        }
        previous = Some(values);
    }

    log::debug!(
        "Subspace iteration did not converge in {} sweeps",
        options.max_iterations
    );
    None
}
