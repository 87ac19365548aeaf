use approx::assert_relative_eq;
use frame_solver::analysis::{equilibrium_residual, SolverContext};
use frame_solver::math::sparse::{max_asymmetry, to_dense};
use frame_solver::prelude::*;

const E: f64 = 200e9;

/// Equal inertias so the bending plane does not depend on the local axes
fn square_tube() -> Section {
    Section::new(4e-3, 2.5e-5, 2.5e-5, 4e-5)
}

fn cantilever(length: f64, segments: usize) -> FEModel {
    let mut model = FEModel::new();
    model.add_material("Steel", Material::steel()).unwrap();
    model.add_section("Tube", square_tube()).unwrap();
    for k in 0..=segments {
        let x = length * k as f64 / segments as f64;
        model.add_node(&format!("N{k}"), Node::new(x, 0.0, 0.0)).unwrap();
    }
    for k in 0..segments {
        model
            .add_element(
                &format!("E{k}"),
                Element::beam(&format!("N{k}"), &format!("N{}", k + 1), "Steel", "Tube"),
            )
            .unwrap();
    }
    model.add_support("N0", Support::fixed()).unwrap();
    model
}

/// Two-storey 3D frame with every load type
fn loaded_frame() -> FEModel {
    let mut model = FEModel::new();
    model.add_material("Steel", Material::steel()).unwrap();
    model.add_section("Col", Section::rectangular(0.3, 0.3)).unwrap();
    model.add_section("Beam", Section::rectangular(0.2, 0.45)).unwrap();

    let corners = [(0.0, 0.0), (5.0, 0.0), (5.0, 4.0), (0.0, 4.0)];
    for level in 0..=2 {
        for (c, (x, y)) in corners.iter().enumerate() {
            model
                .add_node(&format!("L{level}C{c}"), Node::new(*x, *y, 3.0 * level as f64))
                .unwrap();
        }
    }
    for level in 0..2 {
        for c in 0..4 {
            model
                .add_element(
                    &format!("COL{level}{c}"),
                    Element::column(&format!("L{level}C{c}"), &format!("L{}C{c}", level + 1), "Steel", "Col"),
                )
                .unwrap();
        }
    }
    for level in 1..=2 {
        for c in 0..4 {
            model
                .add_element(
                    &format!("B{level}{c}"),
                    Element::beam(&format!("L{level}C{c}"), &format!("L{level}C{}", (c + 1) % 4), "Steel", "Beam"),
                )
                .unwrap();
        }
        model
            .add_element(
                &format!("X{level}"),
                Element::brace(&format!("L{level}C0"), &format!("L{level}C2"), "Steel", "Col"),
            )
            .unwrap();
    }
    for c in 0..4 {
        model.add_support(&format!("L0C{c}"), Support::fixed()).unwrap();
    }

    model.add_load_case(LoadCase::dead()).unwrap();
    model
        .add_distributed_load("B10", DistributedLoad::uniform_downward(12_000.0, "Dead"))
        .unwrap();
    model
        .add_distributed_load("B21", DistributedLoad::triangular(-8_000.0, LoadDirection::FZ, "Dead"))
        .unwrap();
    model
        .add_point_load("B12", PointLoad::downward(25_000.0, 0.3, "Dead"))
        .unwrap();
    model
        .add_area_load("B13", AreaLoad::new(-2_500.0, 1.5, LoadDirection::FZ, "Dead"))
        .unwrap();
    model.add_node_load("L2C1", NodeLoad::fx(15_000.0, "Wind")).unwrap();
    model.add_node_load("L1C1", NodeLoad::force(7_500.0, 3_000.0, 0.0, "Wind")).unwrap();
    model
        .add_load_combo(LoadCombination::new("ULS").with_case("Dead", 1.35).with_case("Wind", 1.5))
        .unwrap();
    model
}

#[test]
fn test_cantilever_tip_deflection_matches_closed_form() {
    let (p, l) = (10_000.0, 4.0);
    let mut model = cantilever(l, 4);
    model.add_node_load("N4", NodeLoad::fz(-p, "Tip")).unwrap();

    let results = model.analyze_linear("Tip").unwrap();
    let tip = results.displacement("N4").unwrap();
    let expected = p * l.powi(3) / (3.0 * E * 2.5e-5);
    assert_relative_eq!(tip.dz, -expected, max_relative = 1e-9);
    assert_relative_eq!(tip.dx, 0.0, epsilon = 1e-12);

    let base = results.reaction("N0").unwrap();
    assert_relative_eq!(base.fz, p, max_relative = 1e-9);
    assert_relative_eq!(base.my.abs(), p * l, max_relative = 1e-9);
}

#[test]
fn test_stiffness_is_symmetric_and_positive_definite() {
    let model = loaded_frame();
    let ctx = SolverContext::new(&model, "Dead").unwrap();
    let k = ctx.stiffness();
    let scale = to_dense(k).amax();
    assert!(max_asymmetry(k) <= 1e-12 * scale);

    let loads = ctx.case_loads("Dead").unwrap();
    let part = ctx.static_partition(&loads.forces).unwrap();
    let k_ff = part.restrict_matrix(ctx.total_stiffness());
    assert!(ctx.factor(&k_ff, &part).is_ok());
    assert!(to_dense(&k_ff).cholesky().is_some());
}

#[test]
fn test_global_equilibrium_for_every_case() {
    let model = loaded_frame();
    for case in ["Dead", "Wind", "ULS"] {
        let ctx = SolverContext::new(&model, case).unwrap();
        let options = AnalysisOptions::linear(case).with_statics_check();
        let results = frame_solver::analysis::LinearStaticDriver::new(&ctx, &options)
            .solve()
            .unwrap();
        let loads = ctx.case_loads(case).unwrap();
        let residual = equilibrium_residual(&ctx, &results.reactions, &loads.forces);
        assert!(residual.norm() < 1e-6, "{case}: residual {residual:?}");
    }

    // Total vertical reaction balances self weight plus the applied loads
    let dead = model.analyze_linear("Dead").unwrap();
    let vertical: f64 = dead.reactions.values().map(|r| r.fz).sum();
    assert!(vertical > 12_000.0 * 5.0 + 25_000.0);
    assert!(dead.dropped_loads.is_empty());
    assert!(dead.skipped_elements.is_empty());
}

#[test]
fn test_combination_is_linear_superposition() {
    let model = loaded_frame();
    let dead = model.analyze_linear("Dead").unwrap();
    let wind = model.analyze_linear("Wind").unwrap();
    let uls = model.analyze_linear("ULS").unwrap();
    for (node, disp) in &uls.displacements {
        let d = dead.displacements[node].as_array();
        let w = wind.displacements[node].as_array();
        for (k, value) in disp.as_array().iter().enumerate() {
            assert_relative_eq!(*value, 1.35 * d[k] + 1.5 * w[k], epsilon = 1e-12, max_relative = 1e-8);
        }
    }
}

#[test]
fn test_broken_element_is_skipped() {
    let mut model = cantilever(3.0, 3);
    model.add_node_load("N3", NodeLoad::fz(-1_000.0, "Tip")).unwrap();
    model.add_node("Lost", Node::new(1.0, 2.0, 0.0)).unwrap();
    model.add_support("Lost", Support::fixed()).unwrap();
    // Bypasses the builder checks, as a deserialized model could
    model.elements.push(Element {
        id: "Ghost".to_string(),
        ..Element::beam("N1", "Lost", "Unobtainium", "Tube")
    });

    let results = model.analyze_linear("Tip").unwrap();
    assert_eq!(results.skipped_elements.len(), 1);
    assert_eq!(results.skipped_elements[0].element, "Ghost");
    assert!(!results.element_forces.contains_key("Ghost"));
    assert_relative_eq!(
        results.displacement("N3").unwrap().dz,
        -1_000.0 * 27.0 / (3.0 * E * 2.5e-5),
        max_relative = 1e-9
    );
}

#[test]
fn test_unsupported_structure_is_singular() {
    let mut model = cantilever(3.0, 2);
    model.supports.clear();
    model.add_node_load("N2", NodeLoad::fz(-1_000.0, "Tip")).unwrap();
    match model.analyze_linear("Tip") {
        Err(FEAError::SingularSystem { case, .. }) => assert_eq!(case, "Tip"),
        other => panic!("expected a singular system, got {other:?}"),
    }
}

#[test]
fn test_unknown_case_is_reported() {
    let model = cantilever(3.0, 1);
    assert!(matches!(
        model.analyze_linear("Snow"),
        Err(FEAError::LoadCaseNotFound(name)) if name == "Snow"
    ));
}

#[test]
fn test_consistent_load_shares_give_exact_fixed_end_reactions() {
    let p = 9_000.0;
    let mut model = FEModel::new();
    model.add_material("Steel", Material::steel()).unwrap();
    model.add_section("Tube", square_tube()).unwrap();
    model.add_node("A", Node::new(0.0, 0.0, 0.0)).unwrap();
    model.add_node("M", Node::new(3.0, 0.0, 0.0)).unwrap();
    model.add_node("B", Node::new(6.0, 0.0, 0.0)).unwrap();
    model.add_element("E1", Element::beam("A", "M", "Steel", "Tube")).unwrap();
    model.add_element("E2", Element::beam("M", "B", "Steel", "Tube")).unwrap();
    model.add_support("A", Support::fixed()).unwrap();
    model.add_support("B", Support::fixed()).unwrap();
    model.add_point_load("E1", PointLoad::downward(p, 0.5, "Live")).unwrap();

    let run = |shares: LoadShares| {
        let options = AnalysisOptions::linear("Live").with_load_shares(shares);
        match model.analyze(&options).unwrap() {
            AnalysisResult::LinearStatic(results) => results,
            other => panic!("unexpected result {other:?}"),
        }
    };

    // a = 1.5, b = 4.5: R_A = P b²(3a + b) / L³
    let consistent = run(LoadShares::Consistent);
    assert_relative_eq!(consistent.reaction("A").unwrap().fz, 0.84375 * p, max_relative = 1e-9);
    assert_relative_eq!(consistent.reaction("B").unwrap().fz, 0.15625 * p, max_relative = 1e-9);

    let linear = run(LoadShares::Linear);
    let total = linear.reaction("A").unwrap().fz + linear.reaction("B").unwrap().fz;
    assert_relative_eq!(total, p, max_relative = 1e-9);
}
