//! Geometrically nonlinear static analysis
//!
//! Equilibrium `λ·F_ref = F_int(u)` is traced with a tangent that combines the
//! elastic stiffness and the geometric stiffness of the current axial forces.
//! Each load step either converges or diverges; a diverged step is recorded
//! and marks the result unreliable without aborting the run.

use nalgebra_sparse::CscMatrix;

use super::context::{Partition, SolverContext};
use super::{AnalysisOptions, ConvergenceNorm, NonlinearMethod};
use crate::error::{FEAError, FEAResult};
use crate::math::sparse::{combine, spmv};
use crate::math::{self, Vec12};
use crate::results::{NonlinearResults, NonlinearStep, StepState};

/// Arc-length retries with a halved arc before a step is declared diverged
const MAX_ARC_HALVINGS: usize = 4;
/// Consecutive load-factor decreases that indicate a limit point
const LIMIT_POINT_STEPS: usize = 3;

/// Reference loading on a fixed partition
struct Problem {
    part: Partition,
    /// Reference external forces (full size)
    f_ref: math::Vec,
    /// Prescribed support displacements at λ = 1 (full size)
    u_c: math::Vec,
    /// Equivalent member loads at λ = 1, local axes per assembled element
    element_loads: Vec<Vec12>,
}

/// Residual evaluation at one state
struct Residual {
    r: math::Vec,
    norm: f64,
    tangent: CscMatrix<f64>,
}

/// Result of iterating one load step
struct StepOutcome {
    converged: bool,
    iterations: usize,
    residual_norm: f64,
}

/// Converged or abandoned arc-length increment
struct ArcOutcome {
    u: math::Vec,
    lambda: f64,
    /// Free-DOF increment over the step
    delta: math::Vec,
    step: StepOutcome,
}

pub struct NonlinearDriver<'c, 'a> {
    ctx: &'c SolverContext<'a>,
    options: &'c AnalysisOptions,
}

impl<'c, 'a> NonlinearDriver<'c, 'a> {
    pub fn new(ctx: &'c SolverContext<'a>, options: &'c AnalysisOptions) -> Self {
        Self { ctx, options }
    }

    pub fn solve(&self) -> FEAResult<NonlinearResults> {
        let case = self.ctx.case();
        self.validate()?;

        let loads = self
            .ctx
            .case_loads_with(&self.options.load_case, self.options.load_shares)?;
        let part = self.ctx.static_partition(&loads.forces)?;
        if !part.is_empty() {
            // An unstable elastic structure is fatal for the case, not a diverged step
            let k_ff = part.restrict_matrix(self.ctx.total_stiffness());
            self.ctx.factor(&k_ff, &part)?;
        }
        let problem = Problem {
            part,
            f_ref: loads.forces.clone(),
            u_c: self.ctx.prescribed_vector(),
            element_loads: loads.element_loads.clone(),
        };

        log::info!(
            "Nonlinear analysis of '{}' ({:?}): {} steps, tolerance {:.1e}, geometric stiffness {}",
            case,
            self.options.nonlinear_method,
            self.options.load_steps,
            self.options.tolerance,
            if self.options.include_geometric_stiffness { "on" } else { "off" }
        );

        let (steps, u, lambda) = match self.options.nonlinear_method {
            NonlinearMethod::NewtonRaphson => self.newton_raphson(&problem)?,
            NonlinearMethod::ArcLength => self.arc_length(&problem)?,
        };

        let reliable = steps.iter().all(|s| s.state == StepState::Converged);
        if !reliable {
            log::warn!("Nonlinear analysis of '{}' is unreliable: some steps diverged", case);
        }

        let element_loads: Vec<Vec12> = loads.element_loads.iter().map(|q| q * lambda).collect();
        log::info!(
            "Nonlinear analysis of '{}' finished at λ = {:.4} after {} steps",
            case,
            lambda,
            steps.len()
        );

        Ok(NonlinearResults {
            case: case.to_string(),
            method: self.options.nonlinear_method,
            steps,
            reliable,
            final_load_factor: lambda,
            displacements: self.ctx.displacements(&u),
            element_forces: self.ctx.element_forces(&u, Some(&element_loads)),
        })
    }

    fn validate(&self) -> FEAResult<()> {
        let case = self.ctx.case();
        if self.options.load_steps == 0 {
            return Err(FEAError::config(case, "load_steps must be at least 1"));
        }
        if self.options.max_iterations == 0 {
            return Err(FEAError::config(case, "max_iterations must be at least 1"));
        }
        if !(self.options.tolerance.is_finite() && self.options.tolerance > 0.0) {
            return Err(FEAError::config(
                case,
                format!("tolerance must be positive (got {})", self.options.tolerance),
            ));
        }
        if self.options.nonlinear_method == NonlinearMethod::ArcLength {
            let arc = &self.options.arc_length;
            if !(arc.max_load_factor.is_finite() && arc.max_load_factor > 0.0) {
                return Err(FEAError::config(case, "max_load_factor must be positive"));
            }
            if arc.initial_arc_length.is_some_and(|s| !(s.is_finite() && s > 0.0)) {
                return Err(FEAError::config(case, "initial arc length must be positive"));
            }
        }
        Ok(())
    }

    /// Fixed load increments `λ = s / N`
    fn newton_raphson(&self, p: &Problem) -> FEAResult<(Vec<NonlinearStep>, math::Vec, f64)> {
        let steps = self.options.load_steps;
        let mut u = math::Vec::zeros(self.ctx.size());
        let mut records = Vec::with_capacity(steps);
        let mut lambda = 0.0;

        for step in 1..=steps {
            lambda = step as f64 / steps as f64;
            let converged_u = u.clone();
            set_prescribed(p, &mut u, lambda);
            let outcome = self.iterate(p, &mut u, lambda)?;

            if !outcome.converged {
                log::warn!(
                    "Step {} (λ = {:.4}) diverged after {} iterations, residual {:.3e}",
                    step,
                    lambda,
                    outcome.iterations,
                    outcome.residual_norm
                );
                if !math::all_finite(&u) {
                    u = converged_u;
                    set_prescribed(p, &mut u, lambda);
                }
            } else {
                log::debug!(
                    "Step {} (λ = {:.4}) converged in {} iterations",
                    step,
                    lambda,
                    outcome.iterations
                );
            }
            records.push(record(step, lambda, &outcome, &u));
        }
        Ok((records, u, lambda))
    }

    /// Newton iterations at a fixed load factor
    fn iterate(&self, p: &Problem, u: &mut math::Vec, lambda: f64) -> FEAResult<StepOutcome> {
        let mut iterations = 0;
        loop {
            let res = self.residual(p, u, lambda)?;
            if res.norm <= self.options.tolerance {
                return Ok(StepOutcome {
                    converged: true,
                    iterations,
                    residual_norm: res.norm,
                });
            }
            if iterations >= self.options.max_iterations || !res.norm.is_finite() {
                return Ok(StepOutcome {
                    converged: false,
                    iterations,
                    residual_norm: res.norm,
                });
            }
            let k_ff = p.part.restrict_matrix(&res.tangent);
            match self.ctx.solve_tangent(&k_ff, &p.part, &res.r) {
                Ok(du) => add_free(&p.part, u, &du),
                Err(err) => {
                    log::debug!("Tangent solve failed: {}", err);
                    return Ok(StepOutcome {
                        converged: false,
                        iterations,
                        residual_norm: res.norm,
                    });
                }
            }
            iterations += 1;
        }
    }

    /// Riks arc-length tracing with a normal-plane corrector
    fn arc_length(&self, p: &Problem) -> FEAResult<(Vec<NonlinearStep>, math::Vec, f64)> {
        let case = self.ctx.case();
        let max_lambda = self.options.arc_length.max_load_factor;
        let reach = 1e-9 * max_lambda.max(1.0);
        let max_steps = self.options.load_steps * 10;

        let mut u = math::Vec::zeros(self.ctx.size());
        let mut lambda = 0.0;

        let initial = self.residual(p, &u, 0.0)?;
        let Some(du_t) = self.tangent_direction(p, &initial.tangent) else {
            return Err(FEAError::singular(case, "initial tangent stiffness is singular"));
        };
        if du_t.norm() == 0.0 {
            return Err(FEAError::config(case, "arc-length tracing needs a nonzero reference load"));
        }
        let mut arc = self
            .options
            .arc_length
            .initial_arc_length
            .unwrap_or(max_lambda / self.options.load_steps as f64 * du_t.norm());

        let mut records = Vec::new();
        let mut previous: Option<math::Vec> = None;
        let mut decreasing = 0;
        let mut step = 0;
        while step < max_steps && lambda < max_lambda - reach {
            step += 1;
            let mut trial = arc;
            let mut halvings = 0;
            let outcome = loop {
                let outcome = self.arc_step(p, &u, lambda, trial, previous.as_ref())?;
                if outcome.step.converged || halvings == MAX_ARC_HALVINGS {
                    break outcome;
                }
                halvings += 1;
                trial *= 0.5;
                log::debug!("Step {}: retrying with arc length {:.3e}", step, trial);
            };

            if !outcome.step.converged {
                log::warn!(
                    "Arc-length step {} diverged at λ = {:.4} after {} halvings",
                    step,
                    outcome.lambda,
                    MAX_ARC_HALVINGS
                );
                records.push(record(step, outcome.lambda, &outcome.step, &u));
                break;
            }

            if outcome.lambda < lambda {
                decreasing += 1;
                if decreasing == LIMIT_POINT_STEPS {
                    log::warn!(
                        "Load factor decreased for {} consecutive steps near λ = {:.4}: limit point passed",
                        LIMIT_POINT_STEPS,
                        lambda
                    );
                }
            } else {
                decreasing = 0;
            }

            u = outcome.u;
            lambda = outcome.lambda;
            arc = trial;
            log::debug!(
                "Arc-length step {} converged at λ = {:.4} in {} iterations",
                step,
                lambda,
                outcome.step.iterations
            );
            records.push(record(step, lambda, &outcome.step, &u));
            previous = Some(outcome.delta);
        }

        if lambda < max_lambda - reach && records.iter().all(|s| s.state == StepState::Converged) {
            log::warn!(
                "Arc-length tracing stopped at λ = {:.4} after {} steps (target {})",
                lambda,
                records.len(),
                max_lambda
            );
        }
        Ok((records, u, lambda))
    }

    /// One predictor-corrector increment of arc length `arc` from `(u, λ)`
    fn arc_step(
        &self,
        p: &Problem,
        u: &math::Vec,
        lambda: f64,
        arc: f64,
        previous: Option<&math::Vec>,
    ) -> FEAResult<ArcOutcome> {
        let max_lambda = self.options.arc_length.max_load_factor;
        let abandoned = |lambda: f64, iterations: usize, residual_norm: f64| ArcOutcome {
            u: u.clone(),
            lambda,
            delta: math::Vec::zeros(p.part.len()),
            step: StepOutcome {
                converged: false,
                iterations,
                residual_norm,
            },
        };

        let start = self.residual(p, u, lambda)?;
        let Some(du_t) = self.tangent_direction(p, &start.tangent) else {
            return Ok(abandoned(lambda, 0, start.norm));
        };
        let tangent_norm = du_t.norm();
        if tangent_norm == 0.0 {
            return Ok(abandoned(lambda, 0, start.norm));
        }

        // Predictor continues along the previous increment
        let sign = match previous {
            Some(prev) if prev.dot(&du_t) < 0.0 => -1.0,
            _ => 1.0,
        };
        let mut d_lambda = sign * arc / tangent_norm;
        let clamped = lambda + d_lambda > max_lambda;
        if clamped {
            d_lambda = max_lambda - lambda;
        }

        let mut delta = &du_t * d_lambda;
        let mut u_new = u.clone();
        add_free(&p.part, &mut u_new, &delta);
        let mut lam = lambda + d_lambda;
        set_prescribed(p, &mut u_new, lam);

        let mut iterations = 0;
        loop {
            let res = self.residual(p, &u_new, lam)?;
            if res.norm <= self.options.tolerance {
                return Ok(ArcOutcome {
                    u: u_new,
                    lambda: lam,
                    delta,
                    step: StepOutcome {
                        converged: true,
                        iterations,
                        residual_norm: res.norm,
                    },
                });
            }
            if iterations >= self.options.max_iterations || !res.norm.is_finite() {
                return Ok(abandoned(lam, iterations, res.norm));
            }

            let k_ff = p.part.restrict_matrix(&res.tangent);
            let Ok(du_r) = self.ctx.solve_tangent(&k_ff, &p.part, &res.r) else {
                return Ok(abandoned(lam, iterations, res.norm));
            };
            let (du, d_lam) = if clamped {
                // Load control at the target factor
                (du_r, 0.0)
            } else {
                let Some(du_t) = self.tangent_direction(p, &res.tangent) else {
                    return Ok(abandoned(lam, iterations, res.norm));
                };
                let denominator = delta.dot(&du_t);
                if denominator.abs() <= f64::MIN_POSITIVE {
                    return Ok(abandoned(lam, iterations, res.norm));
                }
                let d_lam = -delta.dot(&du_r) / denominator;
                (du_r + du_t * d_lam, d_lam)
            };

            delta += &du;
            add_free(&p.part, &mut u_new, &du);
            lam += d_lam;
            set_prescribed(p, &mut u_new, lam);
            iterations += 1;
        }
    }

    /// Free-DOF response to a unit increase of the load factor
    fn tangent_direction(&self, p: &Problem, tangent: &CscMatrix<f64>) -> Option<math::Vec> {
        let load = &p.f_ref - spmv(tangent, &p.u_c);
        let k_ff = p.part.restrict_matrix(tangent);
        self.ctx
            .solve_tangent(&k_ff, &p.part, &p.part.restrict_vector(&load))
            .ok()
    }

    /// Mean axial forces at `(u, λ)`, with the member loads scaled by λ
    fn axial_state(&self, p: &Problem, u: &math::Vec, lambda: f64) -> Vec<f64> {
        let element_loads: Vec<Vec12> = p.element_loads.iter().map(|q| q * lambda).collect();
        self.ctx.axial_forces(u, Some(&element_loads))
    }

    /// Internal force and tangent stiffness at displacement `u`
    fn internal_state(
        &self,
        p: &Problem,
        u: &math::Vec,
        lambda: f64,
    ) -> FEAResult<(math::Vec, CscMatrix<f64>)> {
        let k = self.ctx.total_stiffness();
        if !self.options.include_geometric_stiffness {
            return Ok((spmv(k, u), k.clone()));
        }
        let axial = self.axial_state(p, u, lambda);
        let kg = self.ctx.assembler().geometric_stiffness(&axial)?;
        let f_int = spmv(k, u) + spmv(&kg, u);
        Ok((f_int, combine(&[(1.0, k), (1.0, &kg)])))
    }

    fn residual(&self, p: &Problem, u: &math::Vec, lambda: f64) -> FEAResult<Residual> {
        let (f_int, tangent) = self.internal_state(p, u, lambda)?;
        let external = p.part.restrict_vector(&p.f_ref) * lambda;
        let internal = p.part.restrict_vector(&f_int);
        let r = &external - &internal;
        let norm = match self.options.convergence_norm {
            ConvergenceNorm::RelativeForce => {
                r.norm() / external.norm().max(internal.norm()).max(f64::EPSILON)
            }
            ConvergenceNorm::ResidualPerDisplacement => {
                let u_norm = p.part.restrict_vector(u).norm();
                if u_norm > f64::EPSILON {
                    r.norm() / u_norm
                } else {
                    r.norm()
                }
            }
        };
        Ok(Residual { r, norm, tangent })
    }
}

fn set_prescribed(p: &Problem, u: &mut math::Vec, lambda: f64) {
    for (dof, value) in p.u_c.iter().enumerate() {
        if *value != 0.0 {
            u[dof] = lambda * value;
        }
    }
}

fn add_free(part: &Partition, u: &mut math::Vec, du: &math::Vec) {
    for (k, &dof) in part.active().iter().enumerate() {
        u[dof] += du[k];
    }
}

fn record(step: usize, load_factor: f64, outcome: &StepOutcome, u: &math::Vec) -> NonlinearStep {
    let max_displacement = u
        .as_slice()
        .chunks(6)
        .map(|node| (node[0] * node[0] + node[1] * node[1] + node[2] * node[2]).sqrt())
        .fold(0.0, f64::max);
    NonlinearStep {
        step,
        load_factor,
        state: if outcome.converged {
            StepState::Converged
        } else {
            StepState::Diverged
        },
        iterations: outcome.iterations,
        residual_norm: outcome.residual_norm,
        displacement_norm: u.norm(),
        max_displacement,
    }
}
