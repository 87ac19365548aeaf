//! Modal response-spectrum analysis with SRSS or CQC combination

use std::f64::consts::PI;

use super::context::SolverContext;
use super::modal::ModalDriver;
use super::{AnalysisOptions, ModalCombination};
use crate::error::FEAResult;
use crate::math;
use crate::results::{NodeDisplacement, SpectrumModeResult, SpectrumResults};

/// Der Kiureghian correlation coefficient for two modes with frequency
/// ratio `r = ωj / ωi` and equal damping `ξ`
pub fn cqc_coefficient(damping: f64, r: f64) -> f64 {
    if (r - 1.0).abs() < 1e-12 {
        return 1.0;
    }
    let xi2 = damping * damping;
    let numerator = 8.0 * xi2 * (1.0 + r) * r.powf(1.5);
    let denominator = (1.0 - r * r).powi(2) + 4.0 * xi2 * r * (1.0 + r).powi(2);
    if denominator <= f64::EPSILON * numerator.abs().max(1.0) {
        1.0
    } else {
        numerator / denominator
    }
}

/// Combine peak modal values of one response quantity
pub fn combine_modal(values: &[f64], omegas: &[f64], damping: f64, rule: ModalCombination) -> f64 {
    match rule {
        ModalCombination::Srss => values.iter().map(|x| x * x).sum::<f64>().sqrt(),
        ModalCombination::Cqc => {
            let mut sum = 0.0;
            for (i, xi) in values.iter().enumerate() {
                for (j, xj) in values.iter().enumerate() {
                    let rho = if i == j {
                        1.0
                    } else {
                        cqc_coefficient(damping, omegas[j] / omegas[i])
                    };
                    sum += rho * xi * xj;
                }
            }
            sum.max(0.0).sqrt()
        }
    }
}

pub struct ResponseSpectrumDriver<'c, 'a> {
    ctx: &'c SolverContext<'a>,
    options: &'c AnalysisOptions,
}

impl<'c, 'a> ResponseSpectrumDriver<'c, 'a> {
    pub fn new(ctx: &'c SolverContext<'a>, options: &'c AnalysisOptions) -> Self {
        Self { ctx, options }
    }

    pub fn solve(&self) -> FEAResult<SpectrumResults> {
        let case = self.ctx.case();
        self.options.spectrum.validate(case)?;
        self.options.validate_modes(case)?;

        let modal = ModalDriver::new(self.ctx, self.options).solve_modes()?;
        let d = self.options.direction.index();
        let damping = self.options.damping_ratio;
        let rule = self.options.combination;

        let mut modes = Vec::with_capacity(modal.num_modes());
        // Peak modal response of every DOF, one vector per mode
        let mut responses = Vec::with_capacity(modal.num_modes());
        for (k, mode) in modal.results.modes.iter().enumerate() {
            let sa = self.options.spectrum.sa(mode.period);
            let gamma = mode.participation[d];
            let omega = modal.omegas[k];
            responses.push(modal.mode_vector(k) * (gamma * sa / (omega * omega)));
            modes.push(SpectrumModeResult {
                mode: mode.mode,
                period: mode.period,
                sa,
                participation: gamma,
                effective_mass: mode.effective_mass[d],
                displacement: gamma * sa * mode.period.powi(2) / (4.0 * PI * PI),
                base_shear: sa * mode.effective_mass[d],
            });
        }

        let base_shear_values: Vec<f64> = modes.iter().map(|m| m.base_shear).collect();
        let displacement_values: Vec<f64> = modes.iter().map(|m| m.displacement).collect();
        let base_shear = combine_modal(&base_shear_values, &modal.omegas, damping, rule);
        let displacement = combine_modal(&displacement_values, &modal.omegas, damping, rule);

        let n = modal.partition.len();
        let peaks = math::Vec::from_fn(n, |dof, _| {
            let values: Vec<f64> = responses.iter().map(|x| x[dof]).collect();
            combine_modal(&values, &modal.omegas, damping, rule)
        });
        let peak_displacements = self
            .ctx
            .node_field(&modal.partition.expand(&peaks))
            .into_iter()
            .map(|(node, values)| (node, NodeDisplacement::from_array(values)))
            .collect();

        log::info!(
            "Response spectrum ({:?}, {:?}): base shear {:.4e}, displacement {:.4e}",
            self.options.direction,
            rule,
            base_shear,
            displacement
        );

        Ok(SpectrumResults {
            direction: self.options.direction,
            combination: rule,
            damping_ratio: damping,
            modes,
            base_shear,
            displacement,
            peak_displacements,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cqc_coefficient_limits() {
        assert_eq!(cqc_coefficient(0.05, 1.0), 1.0);
        assert_eq!(cqc_coefficient(0.0, 1.0), 1.0);
        assert_eq!(cqc_coefficient(0.0, 2.0), 0.0);
        // Symmetric in the frequency ratio
        assert_relative_eq!(
            cqc_coefficient(0.05, 1.2),
            cqc_coefficient(0.05, 1.0 / 1.2),
            max_relative = 1e-12
        );
        // Closely spaced modes are strongly correlated
        assert!(cqc_coefficient(0.05, 1.05) > 0.5);
        assert!(cqc_coefficient(0.05, 3.0) < 0.01);
    }

    #[test]
    fn test_srss_and_cqc() {
        let values = [3.0, -4.0];
        let omegas = [10.0, 40.0];
        assert_relative_eq!(
            combine_modal(&values, &omegas, 0.05, ModalCombination::Srss),
            5.0,
            epsilon = 1e-12
        );
        let cqc = combine_modal(&values, &omegas, 1e-6, ModalCombination::Cqc);
        assert_relative_eq!(cqc, 5.0, max_relative = 1e-9);
    }
}
