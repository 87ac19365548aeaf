//! Ground-motion time history by average-acceleration Newmark integration
//!
//! The full free-DOF system and the decoupled modal equations use the same
//! Newmark constants and the same Rayleigh damping, so both methods give the
//! same response when every participating mode is retained.

use nalgebra_sparse::CscMatrix;

use super::context::SolverContext;
use super::modal::{ModalDriver, ModalSolution};
use super::{AnalysisOptions, TimeIntegration};
use crate::error::{FEAError, FEAResult};
use crate::math::sparse::{combine, spmv};
use crate::math::{self, SpdFactor};
use crate::results::TimeHistoryResults;

/// Average acceleration
const BETA: f64 = 0.25;
const GAMMA: f64 = 0.5;

/// Integration constants of the Newmark family for step `dt`
#[derive(Debug, Clone, Copy)]
struct Newmark {
    c0: f64,
    c1: f64,
    c2: f64,
    c3: f64,
    c4: f64,
    c5: f64,
    c6: f64,
    c7: f64,
}

impl Newmark {
    fn new(dt: f64) -> Self {
        Self {
            c0: 1.0 / (BETA * dt * dt),
            c1: GAMMA / (BETA * dt),
            c2: 1.0 / (BETA * dt),
            c3: 1.0 / (2.0 * BETA) - 1.0,
            c4: GAMMA / BETA - 1.0,
            c5: dt / 2.0 * (GAMMA / BETA - 2.0),
            c6: dt * (1.0 - GAMMA),
            c7: GAMMA * dt,
        }
    }
}

/// Rayleigh coefficients `(a0, a1)` of `C = a0·M + a1·K` matching `damping`
/// at the two 1-based target modes. Targets beyond the available modes are
/// clamped, so a single mode gives `ω1 = ω2`.
pub fn rayleigh_coefficients(omegas: &[f64], targets: (usize, usize), damping: f64) -> (f64, f64) {
    if omegas.is_empty() {
        return (0.0, 0.0);
    }
    let pick = |mode: usize| omegas[mode.clamp(1, omegas.len()) - 1];
    let (w1, w2) = (pick(targets.0), pick(targets.1));
    if w1 + w2 <= 0.0 {
        return (0.0, 0.0);
    }
    (
        2.0 * damping * w1 * w2 / (w1 + w2),
        2.0 * damping / (w1 + w2),
    )
}

/// Displacement, velocity and acceleration histories on the partition
struct Histories {
    u: Vec<math::Vec>,
    v: Vec<math::Vec>,
    a: Vec<math::Vec>,
}

pub struct TimeHistoryDriver<'c, 'a> {
    ctx: &'c SolverContext<'a>,
    options: &'c AnalysisOptions,
}

impl<'c, 'a> TimeHistoryDriver<'c, 'a> {
    pub fn new(ctx: &'c SolverContext<'a>, options: &'c AnalysisOptions) -> Self {
        Self { ctx, options }
    }

    pub fn solve(&self) -> FEAResult<TimeHistoryResults> {
        let case = self.ctx.case();
        self.options.validate_modes(case)?;
        self.options.ground_motion.validate(case)?;

        let modal = ModalDriver::new(self.ctx, self.options).solve_modes()?;
        let (a0, a1) = rayleigh_coefficients(
            &modal.omegas,
            self.options.rayleigh_modes,
            self.options.damping_ratio,
        );
        let r = self.ctx.influence_vector(self.options.direction, &modal.partition);
        let motion = &self.options.ground_motion;

        log::info!(
            "Time history ({:?}, {:?}): {} steps of {} s, Rayleigh a0 = {:.4e}, a1 = {:.4e}",
            self.options.integration,
            self.options.direction,
            motion.accelerations.len(),
            motion.dt,
            a0,
            a1
        );

        let histories = match self.options.integration {
            TimeIntegration::Newmark => self.integrate_direct(&modal, &r, a0, a1)?,
            TimeIntegration::ModalSuperposition => self.integrate_modal(&modal, &r, a0, a1),
        };

        // Total inertial force along the excitation direction
        let mr = spmv(&modal.m_ff, &r);
        let rmr = r.dot(&mr);
        let base_shear: Vec<f64> = histories
            .a
            .iter()
            .zip(&motion.accelerations)
            .map(|(a, &ag)| mr.dot(a) + rmr * ag)
            .collect();

        let expand = |series: &[math::Vec]| -> Vec<Vec<f64>> {
            series
                .iter()
                .map(|x| modal.partition.expand(x).iter().copied().collect())
                .collect()
        };
        let displacement = expand(&histories.u);
        let peak_displacement = displacement
            .iter()
            .flat_map(|u| u.iter())
            .fold(0.0_f64, |peak, x| peak.max(x.abs()));
        let peak_base_shear = base_shear.iter().fold(0.0_f64, |peak, x| peak.max(x.abs()));

        log::info!(
            "Time history: peak displacement {:.4e}, peak base shear {:.4e}",
            peak_displacement,
            peak_base_shear
        );

        Ok(TimeHistoryResults {
            method: self.options.integration,
            direction: self.options.direction,
            rayleigh: (a0, a1),
            time: (0..motion.accelerations.len())
                .map(|k| k as f64 * motion.dt)
                .collect(),
            displacement,
            velocity: expand(&histories.v),
            acceleration: expand(&histories.a),
            base_shear,
            nodes: self.ctx.dofs().nodes().to_vec(),
            peak_displacement,
            peak_base_shear,
        })
    }

    /// Newmark on the coupled free-DOF equations `M ü + C u̇ + K u = −M r a_g`
    fn integrate_direct(
        &self,
        modal: &ModalSolution,
        r: &math::Vec,
        a0: f64,
        a1: f64,
    ) -> FEAResult<Histories> {
        let motion = &self.options.ground_motion;
        let nm = Newmark::new(motion.dt);
        let (k, m) = (&modal.k_ff, &modal.m_ff);

        let k_eff: CscMatrix<f64> = combine(&[(1.0 + nm.c1 * a1, k), (nm.c0 + nm.c1 * a0, m)]);
        let factor = SpdFactor::new(&k_eff).map_err(|_| {
            FEAError::singular(self.ctx.case(), "effective Newmark stiffness is not positive definite")
        })?;
        let damp = |x: &math::Vec| spmv(m, x) * a0 + spmv(k, x) * a1;
        let mr = spmv(m, r);

        let n = r.len();
        let steps = motion.accelerations.len();
        let mut out = Histories {
            u: Vec::with_capacity(steps),
            v: Vec::with_capacity(steps),
            a: Vec::with_capacity(steps),
        };
        let mut u = math::Vec::zeros(n);
        let mut v = math::Vec::zeros(n);
        let mut a = r * -motion.accelerations[0];
        out.u.push(u.clone());
        out.v.push(v.clone());
        out.a.push(a.clone());

        for (step, &ag) in motion.accelerations.iter().enumerate().skip(1) {
            let inertia = &u * nm.c0 + &v * nm.c2 + &a * nm.c3;
            let damping = &u * nm.c1 + &v * nm.c4 + &a * nm.c5;
            let p = &mr * -ag + spmv(m, &inertia) + damp(&damping);
            let u_next = factor.solve(&p);
            if !math::all_finite(&u_next) {
                return Err(FEAError::singular(
                    self.ctx.case(),
                    format!("non-finite response at step {}", step),
                ));
            }
            let a_next = (&u_next - &u) * nm.c0 - &v * nm.c2 - &a * nm.c3;
            let v_next = &v + &a * nm.c6 + &a_next * nm.c7;
            u = u_next;
            v = v_next;
            a = a_next;
            out.u.push(u.clone());
            out.v.push(v.clone());
            out.a.push(a.clone());
        }
        Ok(out)
    }

    /// Newmark on each modal equation `q̈ + 2ξω q̇ + ω² q = −Γ a_g`, then `u = Σ φ q`
    fn integrate_modal(&self, modal: &ModalSolution, r: &math::Vec, a0: f64, a1: f64) -> Histories {
        let motion = &self.options.ground_motion;
        let nm = Newmark::new(motion.dt);
        let mr = spmv(&modal.m_ff, r);
        let steps = motion.accelerations.len();
        let modes = modal.num_modes();

        // Modal coordinates q, q̇, q̈ per step and mode
        let mut q = vec![vec![0.0; modes]; steps];
        let mut qd = vec![vec![0.0; modes]; steps];
        let mut qdd = vec![vec![0.0; modes]; steps];
        for mode in 0..modes {
            let omega = modal.omegas[mode];
            let gamma = modal.vectors.column(mode).dot(&mr);
            let xi = a0 / (2.0 * omega) + a1 * omega / 2.0;
            let c = 2.0 * xi * omega;
            let k = omega * omega;
            let k_eff = k + nm.c0 + nm.c1 * c;

            let (mut x, mut xd, mut xdd) = (0.0, 0.0, -gamma * motion.accelerations[0]);
            qdd[0][mode] = xdd;
            for step in 1..steps {
                let p = -gamma * motion.accelerations[step]
                    + (nm.c0 * x + nm.c2 * xd + nm.c3 * xdd)
                    + c * (nm.c1 * x + nm.c4 * xd + nm.c5 * xdd);
                let x_next = p / k_eff;
                let xdd_next = nm.c0 * (x_next - x) - nm.c2 * xd - nm.c3 * xdd;
                let xd_next = xd + nm.c6 * xdd + nm.c7 * xdd_next;
                x = x_next;
                xd = xd_next;
                xdd = xdd_next;
                q[step][mode] = x;
                qd[step][mode] = xd;
                qdd[step][mode] = xdd;
            }
        }

        let superpose = |coords: &[Vec<f64>]| -> Vec<math::Vec> {
            coords
                .iter()
                .map(|c| &modal.vectors * math::Vec::from_column_slice(c))
                .collect()
        };
        Histories {
            u: superpose(&q),
            v: superpose(&qd),
            a: superpose(&qdd),
        }
    }
}
