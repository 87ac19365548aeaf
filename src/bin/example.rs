//! Frame Solver Example - Portal Frame
//!
//! Static, modal, response-spectrum, buckling and P-Delta runs on one model.

use frame_solver::prelude::*;

fn portal() -> FEModel {
    let mut model = FEModel::new();

    model
        .add_material("Steel", Material::steel())
        .expect("Failed to add material");

    // W310x39 (approximate properties)
    model
        .add_section("W310", Section::new(4.94e-3, 8.49e-5, 7.2e-6, 1.25e-7))
        .expect("Failed to add section");

    //     N3 -------- N4
    //     |          |
    //     |          |
    //     N1        N2
    //   Fixed     Fixed
    let height = 4.0;
    let span = 6.0;

    model.add_node("N1", Node::new(0.0, 0.0, 0.0)).unwrap();
    model.add_node("N2", Node::new(span, 0.0, 0.0)).unwrap();
    model.add_node("N3", Node::new(0.0, 0.0, height).with_mass(2_000.0)).unwrap();
    model.add_node("N4", Node::new(span, 0.0, height).with_mass(2_000.0)).unwrap();

    model
        .add_element("Col1", Element::column("N1", "N3", "Steel", "W310"))
        .unwrap();
    model
        .add_element("Col2", Element::column("N2", "N4", "Steel", "W310"))
        .unwrap();
    model
        .add_element("Beam", Element::beam("N3", "N4", "Steel", "W310"))
        .unwrap();

    model.add_support("N1", Support::fixed()).unwrap();
    model.add_support("N2", Support::fixed()).unwrap();

    // Dead: self weight plus 20 kN/m on the beam
    model.add_load_case(LoadCase::dead()).unwrap();
    model
        .add_distributed_load("Beam", DistributedLoad::uniform_downward(20_000.0, "Dead"))
        .unwrap();

    // Wind: 10 kN at roof level
    model
        .add_node_load("N3", NodeLoad::fx(10_000.0, "Wind"))
        .unwrap();

    model
        .add_load_combo(LoadCombination::new("1.4D").with_case("Dead", 1.4))
        .unwrap();
    model
        .add_load_combo(
            LoadCombination::new("1.2D + 1.0W")
                .with_case("Dead", 1.2)
                .with_case("Wind", 1.0),
        )
        .unwrap();

    model
}

fn print_static(results: &LinearStaticResults) {
    println!("=== Results for {} ===\n", results.case);

    println!("Node Displacements:");
    for (node, disp) in &results.displacements {
        println!(
            "  {}: DX={:.4}mm, DZ={:.4}mm, RY={:.6}rad",
            node,
            disp.dx * 1000.0,
            disp.dz * 1000.0,
            disp.ry
        );
    }

    println!("\nSupport Reactions:");
    for (node, rxn) in &results.reactions {
        println!(
            "  {}: FX={:.2}kN, FZ={:.2}kN, MY={:.2}kN·m",
            node,
            rxn.fx / 1000.0,
            rxn.fz / 1000.0,
            rxn.my / 1000.0
        );
    }

    println!("\nElement Forces:");
    for (name, forces) in &results.element_forces {
        println!(
            "  {}: P={:.2}kN, Mmax={:.2}kN·m",
            name,
            forces.axial / 1000.0,
            forces.max_moment() / 1000.0
        );
    }

    let summary = &results.summary;
    println!("\nSummary:");
    println!("  Max displacement: {:.4}mm at {}", summary.max_displacement * 1000.0, summary.max_disp_node);
    println!("  Max reaction: {:.2}kN at {}", summary.max_reaction / 1000.0, summary.max_reaction_node);
    println!("  Max axial: {:.2}kN in {}", summary.max_axial / 1000.0, summary.max_axial_element);
    println!("  Max moment: {:.2}kN·m in {}", summary.max_moment / 1000.0, summary.max_moment_element);
    println!();
}

fn main() {
    env_logger::init();
    println!("=== Frame Solver Example: Portal Frame ===\n");

    let model = portal();

    let combos = ["1.4D".to_string(), "1.2D + 1.0W".to_string()];
    for (combo, result) in model.analyze_cases(&combos, &AnalysisOptions::default()) {
        match result {
            Ok(AnalysisResult::LinearStatic(results)) => print_static(&results),
            Ok(_) => println!("{}: unexpected result type", combo),
            Err(e) => println!("{}: analysis failed: {}", combo, e),
        }
    }

    println!("=== Modal Analysis ===\n");
    let modal = model.analyze_modal(4).expect("Modal analysis failed");
    for mode in &modal.modes {
        println!(
            "  Mode {}: f={:.3}Hz, T={:.4}s, mass ratio X={:.1}%",
            mode.mode,
            mode.frequency,
            mode.period,
            mode.mass_ratio[0] * 100.0
        );
    }

    println!("\n=== Response Spectrum (X, CQC) ===\n");
    let spectrum = SpectrumTable::new(vec![(0.0, 4.0), (0.1, 9.8), (0.5, 9.8), (2.0, 2.5), (4.0, 1.2)]);
    let options = AnalysisOptions::response_spectrum(4, spectrum, Direction::X)
        .with_combination(ModalCombination::Cqc);
    match model.analyze(&options) {
        Ok(AnalysisResult::ResponseSpectrum(rs)) => {
            println!("  Base shear: {:.2}kN", rs.base_shear / 1000.0);
            println!("  Roof displacement: {:.4}mm", rs.displacement * 1000.0);
        }
        Ok(_) => println!("  unexpected result type"),
        Err(e) => println!("  failed: {}", e),
    }

    println!("\n=== Buckling (1.4D) ===\n");
    match model.analyze_buckling("1.4D", 3) {
        Ok(buckling) => {
            for mode in &buckling.modes {
                println!("  Mode {}: factor={:.3} ({:?})", mode.mode, mode.factor, mode.classification);
            }
        }
        Err(e) => println!("  failed: {}", e),
    }

    println!("\n=== P-Delta Analysis Comparison ===\n");
    let linear = model.analyze_linear("1.2D + 1.0W").expect("Linear analysis failed");
    let p_delta = model
        .analyze_nonlinear("1.2D + 1.0W", 5)
        .expect("P-Delta analysis failed");
    println!(
        "Lateral displacement at N3: linear {:.4}mm, P-Delta {:.4}mm ({})",
        linear.displacement("N3").map(|d| d.dx * 1000.0).unwrap_or(f64::NAN),
        p_delta.displacement("N3").map(|d| d.dx * 1000.0).unwrap_or(f64::NAN),
        if p_delta.reliable { "converged" } else { "unreliable" }
    );

    println!("\n=== Analysis Complete ===");
}
