//! Linear (eigenvalue) buckling about a reference load state

use std::collections::BTreeMap;

use nalgebra_sparse::CscMatrix;

use super::context::{Partition, SolverContext};
use super::linear::{LinearStaticDriver, StaticSolution};
use super::modal::orient;
use super::AnalysisOptions;
use crate::error::{FEAError, FEAResult};
use crate::math::sparse::{self, combine, diagonal};
use crate::math::{
    self, dense_generalized, subspace_iteration, EigenPairs, SpdFactor, SubspaceOptions,
};
use crate::results::{BucklingClass, BucklingMode, BucklingResults};

/// Shifted subspace solves spent approaching the lowest positive multiplier
const MAX_SHIFTS: usize = 40;
/// Shifted solves spent collecting further modes once one multiplier is known
const MAX_REFINEMENTS: usize = 3;
/// Share of the known gap below the lowest multiplier that one shift closes
const SHIFT_STEP: f64 = 0.8;

/// Solves `K φ = −λ Kg φ` for the lowest positive load multipliers `λ`
pub struct BucklingDriver<'c, 'a> {
    ctx: &'c SolverContext<'a>,
    options: &'c AnalysisOptions,
}

impl<'c, 'a> BucklingDriver<'c, 'a> {
    pub fn new(ctx: &'c SolverContext<'a>, options: &'c AnalysisOptions) -> Self {
        Self { ctx, options }
    }

    pub fn solve(&self) -> FEAResult<BucklingResults> {
        let case = self.ctx.case();
        if self.options.num_modes == 0 {
            return Err(FEAError::config(case, "num_modes must be at least 1"));
        }

        let StaticSolution { displacements, loads } =
            LinearStaticDriver::new(self.ctx, self.options).solve_displacements()?;
        let axial = self.ctx.axial_forces(&displacements, Some(&loads.element_loads));

        let kg = self.ctx.assembler().geometric_stiffness(&axial)?;
        let part = self.ctx.static_partition(&loads.forces)?;
        let k_ff = part.restrict_matrix(self.ctx.total_stiffness());
        let kg_ff = part.restrict_matrix(&kg);
        if part.is_empty() || diagonal(&kg_ff).amax() == 0.0 {
            log::warn!("Buckling of '{}': reference loads produce no axial force", case);
            return Err(FEAError::NoCriticalLoadFound {
                case: case.to_string(),
            });
        }

        // Without compression −Kg is negative semidefinite and no multiplier is positive
        let max_axial = axial.iter().fold(0.0_f64, |acc, n| acc.max(n.abs()));
        let max_compression = axial.iter().fold(0.0_f64, |acc, &n| acc.max(-n));
        if max_compression <= 1e-12 * max_axial {
            log::warn!("Buckling of '{}': no member is in compression", case);
            return Err(FEAError::NoCriticalLoadFound {
                case: case.to_string(),
            });
        }

        log::info!(
            "Buckling analysis of '{}': {} modes from {} DOFs",
            case,
            self.options.num_modes,
            part.len()
        );

        let pairs = self.reciprocal_pairs(&k_ff, &kg_ff, &part)?;

        // Only μ > 0 gives a positive multiplier; the rest are stabilising directions
        let mu_scale = pairs.values.iter().fold(0.0_f64, |acc, mu| acc.max(mu.abs()));
        let mut candidates: Vec<(f64, math::Vec)> = pairs
            .values
            .iter()
            .enumerate()
            .filter(|&(_, &mu)| mu > 1e-12 * mu_scale)
            .map(|(k, &mu)| (1.0 / mu, pairs.vector(k)))
            .collect();
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0));
        candidates.truncate(self.options.num_modes);

        if candidates.is_empty() {
            return Err(FEAError::NoCriticalLoadFound {
                case: case.to_string(),
            });
        }

        let modes: Vec<BucklingMode> = candidates
            .into_iter()
            .enumerate()
            .map(|(k, (factor, mut phi))| {
                orient(&mut phi);
                let peak = phi.amax();
                if peak > 0.0 {
                    phi /= peak;
                }
                let full = part.expand(&phi);
                BucklingMode {
                    mode: k + 1,
                    factor,
                    classification: classify(&full),
                    shape: self.ctx.node_field(&full),
                }
            })
            .collect();

        let critical_factor = modes[0].factor;

        let axial_forces: BTreeMap<String, f64> = self
            .ctx
            .assembler()
            .elements()
            .iter()
            .zip(&axial)
            .map(|(em, &n)| (em.id.clone(), n))
            .collect();

        log::info!(
            "Buckling of '{}': critical factor {:.4} ({:?}), critical load {:.4e}",
            case,
            critical_factor,
            modes[0].classification,
            critical_factor * max_compression
        );

        Ok(BucklingResults {
            case: case.to_string(),
            modes,
            critical_factor,
            critical_load: critical_factor * max_compression,
            safety_factor: critical_factor,
            axial_forces,
        })
    }

    /// Eigenpairs of `−Kg φ = μ K φ`, largest μ first
    fn reciprocal_pairs(
        &self,
        k_ff: &CscMatrix<f64>,
        kg_ff: &CscMatrix<f64>,
        part: &Partition,
    ) -> FEAResult<EigenPairs> {
        let n = part.len();
        if n > self.options.dense_eigen_limit {
            return self.subspace_pairs(k_ff, kg_ff, part);
        }

        let a = combine(&[(-1.0, kg_ff)]);
        let pairs = dense_generalized(&sparse::to_dense(&a), &sparse::to_dense(k_ff)).ok_or_else(|| {
            FEAError::singular(self.ctx.case(), "stiffness matrix is not positive definite")
        })?;
        let order: Vec<usize> = (0..pairs.len()).rev().collect();
        Ok(EigenPairs {
            values: order.iter().map(|&k| pairs.values[k]).collect(),
            vectors: math::Mat::from_fn(n, n, |r, c| pairs.vectors[(r, order[c])]),
        })
    }

    /// Subspace iteration on `−Kg φ = ν (K + s·Kg) φ`, returned as `μ = 1/λ`.
    ///
    /// The iteration locks onto the largest |ν|, which members in tension can
    /// claim with negative values. A solve with no positive ν still proves that
    /// no multiplier lies below `s + 1/min|ν|`, so the shift `s` climbs towards
    /// the lowest multiplier while `K + s·Kg` stays positive definite. Positive
    /// ν map back through `λ = s + 1/ν`.
    fn subspace_pairs(
        &self,
        k_ff: &CscMatrix<f64>,
        kg_ff: &CscMatrix<f64>,
        part: &Partition,
    ) -> FEAResult<EigenPairs> {
        let case = self.ctx.case();
        let n = part.len();
        let a = combine(&[(-1.0, kg_ff)]);
        let count = self.options.num_modes.min(n);
        let options = SubspaceOptions {
            tolerance: self.options.eigen_tolerance,
            max_iterations: self.options.max_eigen_iterations,
        };

        let mut shift = 0.0_f64;
        let mut stable_shift = 0.0_f64;
        let mut refinements = 0;
        let mut found: Vec<(f64, math::Vec)> = Vec::new();

        for pass in 1..=MAX_SHIFTS {
            let shifted = combine(&[(1.0, k_ff), (shift, kg_ff)]);
            let factor = if shift == 0.0 {
                self.ctx.factor(&shifted, part)?
            } else {
                match SpdFactor::new(&shifted) {
                    Ok(factor) => factor,
                    Err(_) => {
                        log::debug!("Buckling shift {:.4e} passed a multiplier; backing off", shift);
                        shift = 0.5 * (stable_shift + shift);
                        continue;
                    }
                }
            };
            stable_shift = shift;

            let pairs = subspace_iteration(&a, &shifted, &factor, count, &options).ok_or_else(
                || FEAError::ConvergenceFailed {
                    case: case.to_string(),
                    step: 0,
                    iterations: self.options.max_eigen_iterations,
                },
            )?;
            let scale = pairs.values.iter().fold(0.0_f64, |acc, nu| acc.max(nu.abs()));
            let negligible = 1e-12 * scale;
            let positive: Vec<(f64, math::Vec)> = pairs
                .values
                .iter()
                .enumerate()
                .filter(|&(_, &nu)| nu > negligible)
                .map(|(k, &nu)| (shift + 1.0 / nu, pairs.vector(k)))
                .collect();
            log::debug!(
                "Buckling pass {} at shift {:.4e}: {} positive of {} Ritz values",
                pass,
                shift,
                positive.len(),
                pairs.len()
            );
            if positive.len() >= found.len() {
                found = positive;
            }

            if found.len() >= self.options.num_modes || count == n {
                break;
            }
            // Null directions among the Ritz vectors mean every nonzero ν was already seen
            if pairs.values.iter().any(|nu| nu.abs() <= negligible) {
                break;
            }
            match found.iter().map(|(lambda, _)| *lambda).reduce(f64::min) {
                Some(lowest) => {
                    refinements += 1;
                    if refinements > MAX_REFINEMENTS {
                        break;
                    }
                    shift += SHIFT_STEP * (lowest - shift);
                }
                None => {
                    let weakest = pairs
                        .values
                        .iter()
                        .fold(f64::INFINITY, |acc, nu| acc.min(nu.abs()));
                    shift += SHIFT_STEP / weakest;
                }
            }
        }

        if found.len() < self.options.num_modes {
            log::warn!(
                "Buckling of '{}': subspace iteration isolated {} of {} requested modes",
                case,
                found.len(),
                self.options.num_modes
            );
        }
        found.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(EigenPairs {
            values: found.iter().map(|(lambda, _)| 1.0 / lambda).collect(),
            vectors: math::Mat::from_fn(n, found.len(), |r, c| found[c].1[r]),
        })
    }
}

/// Classify a full-size mode shape by its translational and rotational content
pub fn classify(shape: &math::Vec) -> BucklingClass {
    let (mut translation, mut rotation) = (0.0, 0.0);
    for (dof, x) in shape.iter().enumerate() {
        if dof % 6 < 3 {
            translation += x * x;
        } else {
            rotation += x * x;
        }
    }
    let (translation, rotation) = (f64::sqrt(translation), f64::sqrt(rotation));
    if rotation > 2.0 * translation {
        BucklingClass::Torsional
    } else if translation > 2.0 * rotation {
        BucklingClass::Lateral
    } else {
        BucklingClass::Combined
    }
}
