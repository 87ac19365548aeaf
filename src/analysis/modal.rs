//! Modal analysis: natural frequencies, mode shapes and mass participation
//!
//! The generalized problem `K φ = λ M φ` is solved in its inverted form
//! `M φ = μ (K − σM) φ` with `λ = σ + 1/μ`, so the wanted lowest modes are
//! the dominant ones and only `K − σM` needs to be positive definite. The
//! shift `σ` is zero unless the structure has rigid-body freedom.

use std::f64::consts::PI;

use nalgebra_sparse::CscMatrix;

use super::context::{Partition, SolverContext};
use super::{AnalysisOptions, Direction};
use crate::error::{FEAError, FEAResult};
use crate::math::sparse::{self, combine, diagonal, spmv};
use crate::math::{self, dense_generalized, subspace_iteration, EigenPairs, Mat, SubspaceOptions};
use crate::results::{ModalResults, ModeResult};

/// Mode table plus the reduced matrices and vectors later drivers reuse
#[derive(Debug, Clone)]
pub struct ModalSolution {
    pub partition: Partition,
    pub k_ff: CscMatrix<f64>,
    pub m_ff: CscMatrix<f64>,
    /// Angular frequency of each retained mode
    pub omegas: Vec<f64>,
    /// Mass-normalised mode shapes on the partition, one per column
    pub vectors: Mat,
    pub results: ModalResults,
}

impl ModalSolution {
    pub fn num_modes(&self) -> usize {
        self.omegas.len()
    }

    pub fn mode_vector(&self, k: usize) -> math::Vec {
        self.vectors.column(k).into_owned()
    }
}

pub struct ModalDriver<'c, 'a> {
    ctx: &'c SolverContext<'a>,
    options: &'c AnalysisOptions,
}

impl<'c, 'a> ModalDriver<'c, 'a> {
    pub fn new(ctx: &'c SolverContext<'a>, options: &'c AnalysisOptions) -> Self {
        Self { ctx, options }
    }

    pub fn solve(&self) -> FEAResult<ModalResults> {
        Ok(self.solve_modes()?.results)
    }

    pub fn solve_modes(&self) -> FEAResult<ModalSolution> {
        let case = self.ctx.case();
        self.options.validate_modes(case)?;

        let mass = self.ctx.assembler().mass(self.options.mass_formulation)?;
        let partition = self.ctx.dynamic_partition(&mass)?;
        let n = partition.len();
        if self.options.num_modes + 1 > n {
            return Err(FEAError::config(
                case,
                format!(
                    "{} modes requested but the model has {} free DOFs (at most {} modes)",
                    self.options.num_modes,
                    n,
                    n.saturating_sub(1)
                ),
            ));
        }

        let k_ff = partition.restrict_matrix(self.ctx.total_stiffness());
        let m_ff = partition.restrict_matrix(&mass);
        let m_diag = diagonal(&m_ff);
        if m_diag.amax() <= 0.0 {
            return Err(FEAError::config(case, "model has no mass on its free DOFs"));
        }

        log::info!(
            "Modal analysis: {} modes from {} DOFs ({:?} mass)",
            self.options.num_modes,
            n,
            self.options.mass_formulation
        );

        let (lambdas, vectors) = self.lowest_modes(&k_ff, &m_ff)?;

        // Rigid-body cut-off scaled to the stiffest DOF
        let k_diag = diagonal(&k_ff);
        let stiffest = (0..n)
            .filter(|&i| m_diag[i] > 0.0)
            .map(|i| k_diag[i] / m_diag[i])
            .fold(0.0, f64::max);
        let cutoff = self.options.rigid_body_tolerance.max(1e-10 * stiffest);

        let mut omegas = Vec::new();
        let mut kept = Vec::new();
        let mut rigid_body_modes = 0;
        for (k, &lambda) in lambdas.iter().enumerate() {
            if lambda < cutoff {
                rigid_body_modes += 1;
                continue;
            }
            if kept.len() < self.options.num_modes {
                omegas.push(lambda.sqrt());
                kept.push(k);
            }
        }
        if rigid_body_modes > 0 {
            log::warn!(
                "Modal analysis: {} rigid-body mode(s) discarded (λ < {:.3e})",
                rigid_body_modes,
                cutoff
            );
        }
        if kept.is_empty() {
            return Err(FEAError::config(case, "no elastic modes found"));
        }
        if kept.len() < self.options.num_modes {
            log::warn!(
                "Modal analysis: only {} of {} requested modes found",
                kept.len(),
                self.options.num_modes
            );
        }

        let vectors = Mat::from_fn(n, kept.len(), |r, c| vectors[(r, kept[c])]);
        let results = self.mode_table(&partition, &m_ff, &omegas, &vectors, rigid_body_modes);

        if let Some(first) = results.modes.first() {
            log::info!(
                "Modal analysis: f1 = {:.4} Hz (T1 = {:.4} s), {} modes",
                first.frequency,
                first.period,
                results.modes.len()
            );
        }

        Ok(ModalSolution {
            partition,
            k_ff,
            m_ff,
            omegas,
            vectors,
            results,
        })
    }

    /// Eigenvalues `λ` in ascending order with mass-normalised vectors
    fn lowest_modes(&self, k_ff: &CscMatrix<f64>, m_ff: &CscMatrix<f64>) -> FEAResult<(Vec<f64>, Mat)> {
        let case = self.ctx.case();
        let n = k_ff.nrows();
        let trace_ratio = diagonal(k_ff).sum() / diagonal(m_ff).sum().max(f64::MIN_POSITIVE);

        let mut solved = None;
        for sigma in [0.0, -1e-6 * trace_ratio] {
            let shifted = combine(&[(1.0, k_ff), (-sigma, m_ff)]);
            let pairs = if n <= self.options.dense_eigen_limit {
                dense_generalized(&sparse::to_dense(m_ff), &sparse::to_dense(&shifted)).map(|pairs| {
                    // Dominant μ first
                    let order: Vec<usize> = (0..pairs.len()).rev().collect();
                    EigenPairs {
                        values: order.iter().map(|&k| pairs.values[k]).collect(),
                        vectors: Mat::from_fn(n, n, |r, c| pairs.vectors[(r, order[c])]),
                    }
                })
            } else {
                match math::SpdFactor::new(&shifted) {
                    Ok(factor) => {
                        let count = (self.options.num_modes + 6).min(n);
                        let options = SubspaceOptions {
                            tolerance: self.options.eigen_tolerance,
                            max_iterations: self.options.max_eigen_iterations,
                        };
                        let pairs = subspace_iteration(m_ff, &shifted, &factor, count, &options)
                            .ok_or_else(|| FEAError::ConvergenceFailed {
                                case: case.to_string(),
                                step: 0,
                                iterations: self.options.max_eigen_iterations,
                            })?;
                        Some(pairs)
                    }
                    Err(_) => None,
                }
            };
            if let Some(pairs) = pairs {
                if sigma != 0.0 {
                    log::debug!("Modal analysis: stiffness is singular, shifted by σ = {:.3e}", sigma);
                }
                solved = Some((sigma, pairs));
                break;
            }
        }

        let Some((sigma, pairs)) = solved else {
            return Err(FEAError::singular(
                case,
                "K − σM is not positive definite; the model has unrestrained parts without mass",
            ));
        };

        let mu_scale = pairs.values.iter().fold(0.0_f64, |acc, mu| acc.max(mu.abs()));
        let mut lambdas = Vec::new();
        let mut columns = Vec::new();
        for (k, &mu) in pairs.values.iter().enumerate() {
            // μ ≈ 0 belongs to massless directions (λ → ∞)
            if mu <= 1e-14 * mu_scale {
                continue;
            }
            let mut phi = pairs.vector(k);
            let modal_mass = phi.dot(&spmv(m_ff, &phi));
            if modal_mass <= 0.0 {
                continue;
            }
            phi /= modal_mass.sqrt();
            orient(&mut phi);
            lambdas.push(sigma + 1.0 / mu);
            columns.push(phi);
        }

        let vectors = if columns.is_empty() {
            Mat::zeros(n, 0)
        } else {
            Mat::from_columns(&columns)
        };
        Ok((lambdas, vectors))
    }

    fn mode_table(
        &self,
        partition: &Partition,
        m_ff: &CscMatrix<f64>,
        omegas: &[f64],
        vectors: &Mat,
        rigid_body_modes: usize,
    ) -> ModalResults {
        let mr: Vec<math::Vec> = Direction::ALL
            .iter()
            .map(|&d| spmv(m_ff, &self.ctx.influence_vector(d, partition)))
            .collect();
        let total_mass: [f64; 3] = std::array::from_fn(|d| {
            self.ctx.influence_vector(Direction::ALL[d], partition).dot(&mr[d])
        });

        let mut cumulative = [0.0; 3];
        let mut modes_for_90_percent = [None; 3];
        let mut modes = Vec::with_capacity(omegas.len());
        for (k, &omega) in omegas.iter().enumerate() {
            let phi = vectors.column(k).into_owned();
            let participation: [f64; 3] = std::array::from_fn(|d| phi.dot(&mr[d]));
            let effective_mass: [f64; 3] = std::array::from_fn(|d| participation[d].powi(2));
            let mass_ratio: [f64; 3] = std::array::from_fn(|d| {
                if total_mass[d] > 0.0 {
                    effective_mass[d] / total_mass[d]
                } else {
                    0.0
                }
            });
            for d in 0..3 {
                cumulative[d] += mass_ratio[d];
                if modes_for_90_percent[d].is_none() && cumulative[d] >= 0.9 {
                    modes_for_90_percent[d] = Some(k + 1);
                }
            }

            let frequency = omega / (2.0 * PI);
            modes.push(ModeResult {
                mode: k + 1,
                eigenvalue: omega * omega,
                angular_frequency: omega,
                frequency,
                period: 1.0 / frequency,
                participation,
                effective_mass,
                mass_ratio,
                cumulative_ratio: cumulative,
                shape: self.ctx.node_field(&partition.expand(&phi)),
            });
        }

        ModalResults {
            modes,
            total_mass,
            modes_for_90_percent,
            rigid_body_modes,
        }
    }
}

/// Flip a vector so its largest component is positive
pub(crate) fn orient(phi: &mut math::Vec) {
    let pivot = phi.iter().copied().fold(0.0_f64, |best, x| if x.abs() > best.abs() { x } else { best });
    if pivot < 0.0 {
        phi.neg_mut();
    }
}
