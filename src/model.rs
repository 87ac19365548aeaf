//! FE Model - snapshot of a 3D frame structure and the analysis entry points

use std::collections::{BTreeMap, HashMap};

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::analysis::{
    AnalysisOptions, AnalysisType, BucklingDriver, LinearStaticDriver, ModalDriver,
    NonlinearDriver, ResponseSpectrumDriver, SolverContext, TimeHistoryDriver,
};
use crate::elements::{Element, Material, Node, Section, Support};
use crate::error::{FEAError, FEAResult};
use crate::loads::{AreaLoad, DistributedLoad, LoadCase, LoadCombination, NodeLoad, PointLoad};
use crate::results::{
    AnalysisResult, BucklingResults, LinearStaticResults, ModalResults, NonlinearResults,
};

/// The 3D frame model.
///
/// Nodes and elements keep insertion order, which fixes the DOF numbering
/// and the assembly order of every analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FEModel {
    /// Nodes in DOF order
    pub nodes: Vec<Node>,
    /// Line elements in assembly order
    pub elements: Vec<Element>,
    pub materials: HashMap<String, Material>,
    pub sections: HashMap<String, Section>,
    /// Support conditions per node; several on one node are unioned
    pub supports: BTreeMap<String, Vec<Support>>,
    /// Node loads keyed by node
    pub node_loads: BTreeMap<String, Vec<NodeLoad>>,
    /// Element point loads keyed by element
    pub point_loads: BTreeMap<String, Vec<PointLoad>>,
    /// Element line loads keyed by element
    pub distributed_loads: BTreeMap<String, Vec<DistributedLoad>>,
    /// Element area loads keyed by element
    pub area_loads: BTreeMap<String, Vec<AreaLoad>>,
    pub load_cases: BTreeMap<String, LoadCase>,
    pub load_combos: BTreeMap<String, LoadCombination>,
}

impl FEModel {
    /// Create a new empty model
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a model from JSON
    pub fn from_json(json: &str) -> FEAResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> FEAResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    // ========================
    // Model Building Methods
    // ========================

    /// Add a node to the model
    pub fn add_node(&mut self, name: &str, mut node: Node) -> FEAResult<()> {
        if self.node(name).is_some() {
            return Err(FEAError::DuplicateName(name.to_string()));
        }
        node.id = name.to_string();
        self.nodes.push(node);
        Ok(())
    }

    /// Add a material to the model
    pub fn add_material(&mut self, name: &str, material: Material) -> FEAResult<()> {
        if self.materials.contains_key(name) {
            return Err(FEAError::DuplicateName(name.to_string()));
        }
        self.materials.insert(name.to_string(), material);
        Ok(())
    }

    /// Add a section to the model
    pub fn add_section(&mut self, name: &str, section: Section) -> FEAResult<()> {
        if self.sections.contains_key(name) {
            return Err(FEAError::DuplicateName(name.to_string()));
        }
        self.sections.insert(name.to_string(), section);
        Ok(())
    }

    /// Add an element to the model.
    ///
    /// References are checked here; geometry is checked at assembly, where a
    /// zero-length element is skipped rather than rejected.
    pub fn add_element(&mut self, name: &str, mut element: Element) -> FEAResult<()> {
        if self.element(name).is_some() {
            return Err(FEAError::DuplicateName(name.to_string()));
        }
        for node in [&element.i_node, &element.j_node] {
            if self.node(node).is_none() {
                return Err(FEAError::NodeNotFound(node.clone()));
            }
        }
        if !self.materials.contains_key(&element.material) {
            return Err(FEAError::MaterialNotFound(element.material.clone()));
        }
        if !self.sections.contains_key(&element.section) {
            return Err(FEAError::SectionNotFound(element.section.clone()));
        }
        element.id = name.to_string();
        self.elements.push(element);
        Ok(())
    }

    /// Add a support condition
    pub fn add_support(&mut self, node_name: &str, support: Support) -> FEAResult<()> {
        if self.node(node_name).is_none() {
            return Err(FEAError::NodeNotFound(node_name.to_string()));
        }
        self.supports
            .entry(node_name.to_string())
            .or_default()
            .push(support);
        Ok(())
    }

    /// Add a node load
    pub fn add_node_load(&mut self, node_name: &str, load: NodeLoad) -> FEAResult<()> {
        if self.node(node_name).is_none() {
            return Err(FEAError::NodeNotFound(node_name.to_string()));
        }
        self.node_loads
            .entry(node_name.to_string())
            .or_default()
            .push(load);
        Ok(())
    }

    /// Add a point load to an element
    pub fn add_point_load(&mut self, element_name: &str, load: PointLoad) -> FEAResult<()> {
        self.require_element(element_name)?;
        self.point_loads
            .entry(element_name.to_string())
            .or_default()
            .push(load);
        Ok(())
    }

    /// Add a distributed load to an element
    pub fn add_distributed_load(&mut self, element_name: &str, load: DistributedLoad) -> FEAResult<()> {
        self.require_element(element_name)?;
        self.distributed_loads
            .entry(element_name.to_string())
            .or_default()
            .push(load);
        Ok(())
    }

    /// Add an area load carried by an element
    pub fn add_area_load(&mut self, element_name: &str, load: AreaLoad) -> FEAResult<()> {
        self.require_element(element_name)?;
        self.area_loads
            .entry(element_name.to_string())
            .or_default()
            .push(load);
        Ok(())
    }

    /// Add a load case definition
    pub fn add_load_case(&mut self, case: LoadCase) -> FEAResult<()> {
        if self.load_cases.contains_key(&case.name) {
            return Err(FEAError::DuplicateName(case.name));
        }
        self.load_cases.insert(case.name.clone(), case);
        Ok(())
    }

    /// Add a load combination
    pub fn add_load_combo(&mut self, combo: LoadCombination) -> FEAResult<()> {
        let name = combo.name.clone();
        if self.load_combos.contains_key(&name) {
            return Err(FEAError::DuplicateName(name));
        }
        self.load_combos.insert(name, combo);
        Ok(())
    }

    fn require_element(&self, name: &str) -> FEAResult<()> {
        match self.element(name) {
            Some(_) => Ok(()),
            None => Err(FEAError::ElementNotFound(name.to_string())),
        }
    }

    // ========================
    // Lookups
    // ========================

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == name)
    }

    pub fn element(&self, name: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.id == name)
    }

    /// Node lookup by id for assembly
    pub fn node_lookup(&self) -> HashMap<&str, &Node> {
        self.nodes.iter().map(|n| (n.id.as_str(), n)).collect()
    }

    /// Get all load case names referenced by definitions or loads
    pub fn load_case_names(&self) -> Vec<String> {
        let mut cases: Vec<String> = self.load_cases.keys().cloned().collect();
        let referenced = self
            .node_loads
            .values()
            .flatten()
            .map(|l| &l.case)
            .chain(self.point_loads.values().flatten().map(|l| &l.case))
            .chain(self.distributed_loads.values().flatten().map(|l| &l.case))
            .chain(self.area_loads.values().flatten().map(|l| &l.case));
        for case in referenced {
            if !cases.contains(case) {
                cases.push(case.clone());
            }
        }
        cases.sort();
        cases
    }

    /// Case factors for a combination, or `{name: 1}` for a plain load case
    pub fn resolve_combination(&self, name: &str) -> FEAResult<BTreeMap<String, f64>> {
        if let Some(combo) = self.load_combos.get(name) {
            return Ok(combo.factors.clone());
        }
        if self.load_case_names().iter().any(|c| c == name) {
            return Ok(BTreeMap::from([(name.to_string(), 1.0)]));
        }
        Err(FEAError::LoadCaseNotFound(name.to_string()))
    }

    // ========================
    // Analysis Methods
    // ========================

    /// Run one analysis. Every call builds its own DOF numbering and matrices.
    pub fn analyze(&self, options: &AnalysisOptions) -> FEAResult<AnalysisResult> {
        let case = options.case_label();
        log::info!("Running {:?} analysis for '{}'", options.analysis_type, case);
        let ctx = SolverContext::new(self, &case)?;
        let result = match options.analysis_type {
            AnalysisType::Linear => {
                AnalysisResult::LinearStatic(LinearStaticDriver::new(&ctx, options).solve()?)
            }
            AnalysisType::Modal => AnalysisResult::Modal(ModalDriver::new(&ctx, options).solve()?),
            AnalysisType::ResponseSpectrum => {
                AnalysisResult::ResponseSpectrum(ResponseSpectrumDriver::new(&ctx, options).solve()?)
            }
            AnalysisType::TimeHistory => {
                AnalysisResult::TimeHistory(TimeHistoryDriver::new(&ctx, options).solve()?)
            }
            AnalysisType::Buckling => {
                AnalysisResult::Buckling(BucklingDriver::new(&ctx, options).solve()?)
            }
            AnalysisType::Nonlinear => {
                AnalysisResult::Nonlinear(NonlinearDriver::new(&ctx, options).solve()?)
            }
        };
        Ok(result)
    }

    /// Run linear static analysis for a load case or combination
    pub fn analyze_linear(&self, load_case: &str) -> FEAResult<LinearStaticResults> {
        let options = AnalysisOptions::linear(load_case);
        let ctx = SolverContext::new(self, load_case)?;
        LinearStaticDriver::new(&ctx, &options).solve()
    }

    /// Run modal analysis for the lowest `num_modes` modes
    pub fn analyze_modal(&self, num_modes: usize) -> FEAResult<ModalResults> {
        let options = AnalysisOptions::modal(num_modes);
        let ctx = SolverContext::new(self, &options.case_label())?;
        ModalDriver::new(&ctx, &options).solve()
    }

    /// Run linear buckling with `load_case` as the reference loads
    pub fn analyze_buckling(&self, load_case: &str, num_modes: usize) -> FEAResult<BucklingResults> {
        let options = AnalysisOptions::buckling(load_case, num_modes);
        let ctx = SolverContext::new(self, load_case)?;
        BucklingDriver::new(&ctx, &options).solve()
    }

    /// Run load-stepped nonlinear analysis of `load_case`
    pub fn analyze_nonlinear(&self, load_case: &str, load_steps: usize) -> FEAResult<NonlinearResults> {
        let options = AnalysisOptions::nonlinear(load_case, load_steps);
        let ctx = SolverContext::new(self, load_case)?;
        NonlinearDriver::new(&ctx, &options).solve()
    }

    /// Run the same analysis for several load cases.
    ///
    /// Cases are independent: each owns its DOF numbering and matrices, and a
    /// failure in one leaves the others untouched.
    pub fn analyze_cases(
        &self,
        cases: &[String],
        options: &AnalysisOptions,
    ) -> Vec<(String, FEAResult<AnalysisResult>)> {
        let run = |case: &String| {
            let options = AnalysisOptions {
                load_case: case.clone(),
                ..options.clone()
            };
            let result = self.analyze(&options);
            if let Err(err) = &result {
                log::warn!("Case '{}' failed: {}", case, err);
            }
            (case.clone(), result)
        };

        #[cfg(feature = "parallel")]
        let results = cases.par_iter().map(run).collect();
        #[cfg(not(feature = "parallel"))]
        let results = cases.iter().map(run).collect();

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cantilever() -> FEModel {
        let mut model = FEModel::new();

        model.add_material("Steel", Material::steel()).unwrap();
        model.add_section("Section1", Section::rectangular(0.3, 0.5)).unwrap();

        // 10 m cantilever along X
        model.add_node("N1", Node::new(0.0, 0.0, 0.0)).unwrap();
        model.add_node("N2", Node::new(10.0, 0.0, 0.0)).unwrap();
        model.add_element("M1", Element::beam("N1", "N2", "Steel", "Section1")).unwrap();
        model.add_support("N1", Support::fixed()).unwrap();

        // 10 kN in -Y at the tip
        model.add_node_load("N2", NodeLoad::fy(-10000.0, "Case 1")).unwrap();
        model
    }

    #[test]
    fn test_simple_cantilever() {
        let model = cantilever();
        let results = model.analyze_linear("Case 1").unwrap();

        let disp = results.displacement("N2").unwrap();
        assert!(disp.dy < 0.0, "Expected negative Y displacement");

        let rxn = results.reaction("N1").unwrap();
        assert_relative_eq!(rxn.fy, 10000.0, epsilon = 1e-6);
        assert_relative_eq!(rxn.mz, 100000.0, max_relative = 1e-9);
    }

    #[test]
    fn test_builder_rejects_bad_references() {
        let mut model = cantilever();
        assert!(matches!(
            model.add_node("N1", Node::new(1.0, 0.0, 0.0)),
            Err(FEAError::DuplicateName(_))
        ));
        assert!(matches!(
            model.add_element("M2", Element::beam("N1", "N9", "Steel", "Section1")),
            Err(FEAError::NodeNotFound(_))
        ));
        assert!(matches!(
            model.add_element("M2", Element::beam("N1", "N2", "Wood", "Section1")),
            Err(FEAError::MaterialNotFound(_))
        ));
        assert!(matches!(
            model.add_point_load("M9", PointLoad::downward(1.0, 0.5, "Case 1")),
            Err(FEAError::ElementNotFound(_))
        ));
    }

    #[test]
    fn test_resolve_combination() {
        let mut model = cantilever();
        model
            .add_load_combo(LoadCombination::new("ULS").with_case("Case 1", 1.5))
            .unwrap();
        assert_eq!(model.resolve_combination("ULS").unwrap()["Case 1"], 1.5);
        assert_eq!(model.resolve_combination("Case 1").unwrap()["Case 1"], 1.0);
        assert!(matches!(
            model.resolve_combination("Wind"),
            Err(FEAError::LoadCaseNotFound(_))
        ));
    }

    #[test]
    fn test_json_round_trip_preserves_order() {
        let model = cantilever();
        let json = model.to_json().unwrap();
        let back = FEModel::from_json(&json).unwrap();
        let ids: Vec<_> = back.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["N1", "N2"]);
        assert_eq!(back.elements[0].id, "M1");
    }

    #[test]
    fn test_analyze_cases_isolates_failures() {
        let mut model = cantilever();
        model.add_node_load("N2", NodeLoad::fz(-5000.0, "Case 2")).unwrap();
        let cases = vec!["Case 1".to_string(), "Missing".to_string(), "Case 2".to_string()];
        let results = model.analyze_cases(&cases, &AnalysisOptions::default());
        assert_eq!(results.len(), 3);
        assert!(results[0].1.is_ok());
        assert!(matches!(results[1].1, Err(FEAError::LoadCaseNotFound(_))));
        let case2 = results[2].1.as_ref().unwrap().as_linear().unwrap();
        assert!(case2.displacement("N2").unwrap().dz < 0.0);
    }
}
