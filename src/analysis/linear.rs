//! Linear static analysis

use super::context::SolverContext;
use super::AnalysisOptions;
use crate::assembly::LoadVector;
use crate::error::FEAResult;
use crate::math::{self, Vec3};
use crate::results::{AnalysisSummary, LinearStaticResults, Reactions};

/// Displacements and the loads that produced them
#[derive(Debug, Clone)]
pub struct StaticSolution {
    pub displacements: math::Vec,
    pub loads: LoadVector,
}

/// Solves `K_ff u_f = F_f − K_fc u_c` for one load case or combination
pub struct LinearStaticDriver<'c, 'a> {
    ctx: &'c SolverContext<'a>,
    options: &'c AnalysisOptions,
}

impl<'c, 'a> LinearStaticDriver<'c, 'a> {
    pub fn new(ctx: &'c SolverContext<'a>, options: &'c AnalysisOptions) -> Self {
        Self { ctx, options }
    }

    /// Full displacement vector for the configured load case
    pub fn solve_displacements(&self) -> FEAResult<StaticSolution> {
        let loads = self
            .ctx
            .case_loads_with(&self.options.load_case, self.options.load_shares)?;
        let displacements = self.ctx.solve_static(&loads.forces)?;
        Ok(StaticSolution {
            displacements,
            loads,
        })
    }

    pub fn solve(&self) -> FEAResult<LinearStaticResults> {
        let case = self.options.load_case.as_str();
        log::info!("Linear static analysis of '{}'", case);

        let StaticSolution {
            displacements: u,
            loads,
        } = self.solve_displacements()?;

        let reactions = self.ctx.reactions(&u, &loads.forces);
        let element_forces = self.ctx.element_forces(&u, Some(&loads.element_loads));
        let displacements = self.ctx.displacements(&u);

        if self.options.check_statics {
            let imbalance = equilibrium_residual(self.ctx, &reactions, &loads.forces);
            let applied = applied_force_scale(&loads.forces);
            if imbalance.norm() > 1e-6 * applied.max(1.0) {
                log::warn!(
                    "Statics check for '{}': residual force ({:.3e}, {:.3e}, {:.3e})",
                    case,
                    imbalance.x,
                    imbalance.y,
                    imbalance.z
                );
            } else {
                log::info!("Statics check for '{}' passed", case);
            }
        }

        let mut summary = AnalysisSummary::from_fields(&displacements, &reactions, &element_forces);
        summary.free_dofs = self.ctx.dofs().free_dofs()?.len();
        log::info!(
            "'{}' solved: max displacement {:.4e} at '{}', max reaction {:.4e} at '{}'",
            case,
            summary.max_displacement,
            summary.max_disp_node,
            summary.max_reaction,
            summary.max_reaction_node
        );

        Ok(LinearStaticResults {
            case: case.to_string(),
            displacements,
            reactions,
            element_forces,
            skipped_elements: self.ctx.assembler().skipped().to_vec(),
            dropped_loads: loads.dropped,
            summary,
        })
    }
}

/// Sum of reaction forces plus applied nodal forces in global axes; zero at equilibrium
pub fn equilibrium_residual(
    ctx: &SolverContext<'_>,
    reactions: &std::collections::BTreeMap<String, Reactions>,
    forces: &math::Vec,
) -> Vec3 {
    let mut total = Vec3::zeros();
    for (k, node) in ctx.dofs().nodes().iter().enumerate() {
        let load = Vec3::new(forces[6 * k], forces[6 * k + 1], forces[6 * k + 2]);
        let reaction = reactions
            .get(node)
            .map(|r| Vec3::new(r.fx, r.fy, r.fz))
            .unwrap_or_else(Vec3::zeros);
        total += ctx.to_global(k, load + reaction);
    }
    total
}

fn applied_force_scale(forces: &math::Vec) -> f64 {
    forces
        .iter()
        .enumerate()
        .filter(|(dof, _)| dof % 6 < 3)
        .map(|(_, f)| f.abs())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{Element, Material, Node, Section, Support};
    use crate::loads::{DistributedLoad, LoadDirection, NodeLoad};
    use crate::model::FEModel;
    use approx::assert_relative_eq;

    #[test]
    fn test_fixed_fixed_beam_end_moments() {
        let mut model = FEModel::new();
        model.add_material("Steel", Material::steel()).unwrap();
        model.add_section("S", Section::rectangular(0.2, 0.4)).unwrap();
        model.add_node("A", Node::new(0.0, 0.0, 0.0)).unwrap();
        model.add_node("M", Node::new(3.0, 0.0, 0.0)).unwrap();
        model.add_node("B", Node::new(6.0, 0.0, 0.0)).unwrap();
        model.add_element("E1", Element::beam("A", "M", "Steel", "S")).unwrap();
        model.add_element("E2", Element::beam("M", "B", "Steel", "S")).unwrap();
        model.add_support("A", Support::fixed()).unwrap();
        model.add_support("B", Support::fixed()).unwrap();
        for e in ["E1", "E2"] {
            model
                .add_distributed_load(e, DistributedLoad::uniform(-10_000.0, LoadDirection::Fy, "Live"))
                .unwrap();
        }

        let ctx = SolverContext::new(&model, "Live").unwrap();
        let options = AnalysisOptions::linear("Live").with_statics_check();
        let results = LinearStaticDriver::new(&ctx, &options).solve().unwrap();

        let (w, l) = (10_000.0, 6.0);
        let rxn = results.reaction("A").unwrap();
        assert_relative_eq!(rxn.fy, w * l / 2.0, max_relative = 1e-9);
        assert_relative_eq!(rxn.mz.abs(), w * l * l / 12.0, max_relative = 1e-9);

        // Fixed-end forces are included in the element end moments
        let forces = results.forces("E1").unwrap();
        assert_relative_eq!(forces.local[5].abs(), w * l * l / 12.0, max_relative = 1e-9);

        let loads = ctx.case_loads("Live").unwrap();
        let residual = equilibrium_residual(&ctx, &results.reactions, &loads.forces);
        assert!(residual.norm() < 1e-6);
    }

    #[test]
    fn test_prescribed_settlement() {
        let mut model = FEModel::new();
        model.add_material("Steel", Material::steel()).unwrap();
        model.add_section("S", Section::rectangular(0.2, 0.4)).unwrap();
        model.add_node("A", Node::new(0.0, 0.0, 0.0)).unwrap();
        model.add_node("B", Node::new(5.0, 0.0, 0.0)).unwrap();
        model.add_element("E1", Element::beam("A", "B", "Steel", "S")).unwrap();
        model.add_support("A", Support::fixed()).unwrap();
        model
            .add_support("B", Support::fixed().with_enforced(2, -0.01))
            .unwrap();
        model.add_load_case(crate::loads::LoadCase::new("Settle")).unwrap();

        let ctx = SolverContext::new(&model, "Settle").unwrap();
        let results = LinearStaticDriver::new(&ctx, &AnalysisOptions::linear("Settle"))
            .solve()
            .unwrap();
        assert_relative_eq!(results.displacement("B").unwrap().dz, -0.01, epsilon = 1e-15);

        // Fixed-fixed beam with relative end settlement d: V = 12EI d / L³
        let iy = 0.2 * 0.4_f64.powi(3) / 12.0;
        let expected = 12.0 * 200e9 * iy * 0.01 / 125.0;
        assert_relative_eq!(results.reaction("B").unwrap().fz.abs(), expected, max_relative = 1e-9);
        assert_relative_eq!(
            results.reaction("A").unwrap().fz,
            -results.reaction("B").unwrap().fz,
            max_relative = 1e-9
        );
    }

    #[test]
    fn test_spring_support_reaction() {
        let mut model = FEModel::new();
        model.add_material("Steel", Material::steel()).unwrap();
        model.add_section("S", Section::rectangular(0.2, 0.4)).unwrap();
        model.add_node("A", Node::new(0.0, 0.0, 0.0)).unwrap();
        model.add_node("B", Node::new(4.0, 0.0, 0.0)).unwrap();
        model.add_element("E1", Element::beam("A", "B", "Steel", "S")).unwrap();
        model.add_support("A", Support::fixed()).unwrap();
        model.add_support("B", Support::new().with_spring(2, 1e6)).unwrap();
        model.add_node_load("B", NodeLoad::fz(-1_000.0, "P")).unwrap();

        let results = model.analyze_linear("P").unwrap();
        let spring = results.reaction("B").unwrap();
        let fixed = results.reaction("A").unwrap();
        let dz = results.displacement("B").unwrap().dz;
        assert_relative_eq!(spring.fz, -1e6 * dz, max_relative = 1e-9);
        assert_relative_eq!(spring.fz + fixed.fz, 1_000.0, max_relative = 1e-9);
    }
}
