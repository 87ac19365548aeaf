use approx::assert_relative_eq;
use frame_solver::analysis::{combine_modal, cqc_coefficient};
use frame_solver::prelude::*;

/// Cantilever column along Z with a roof mass
fn tower() -> FEModel {
    let mut model = FEModel::new();
    model.add_material("Steel", Material::steel()).unwrap();
    model.add_section("Col", Section::rectangular(0.3, 0.5)).unwrap();
    for k in 0..=4 {
        let mass = if k == 4 { 10_000.0 } else { 0.0 };
        model
            .add_node(&format!("N{k}"), Node::new(0.0, 0.0, 3.0 * k as f64).with_mass(mass))
            .unwrap();
    }
    for k in 0..4 {
        model
            .add_element(
                &format!("C{k}"),
                Element::column(&format!("N{k}"), &format!("N{}", k + 1), "Steel", "Col"),
            )
            .unwrap();
    }
    model.add_support("N0", Support::fixed()).unwrap();
    model
}

fn spectrum_options(combination: ModalCombination, damping: f64) -> AnalysisOptions {
    let table = SpectrumTable::new(vec![(0.05, 3.0), (0.4, 8.0), (1.0, 8.0), (3.0, 2.0)]);
    AnalysisOptions::response_spectrum(6, table, Direction::X)
        .with_combination(combination)
        .with_damping(damping)
}

#[test]
fn test_srss_is_invariant_to_mode_order() {
    let values = [12.0, -3.5, 7.25, 0.5];
    let omegas = [3.0, 11.0, 29.0, 60.0];
    let forward = combine_modal(&values, &omegas, 0.05, ModalCombination::Srss);

    let mut reversed_values = values;
    let mut reversed_omegas = omegas;
    reversed_values.reverse();
    reversed_omegas.reverse();
    let backward = combine_modal(&reversed_values, &reversed_omegas, 0.05, ModalCombination::Srss);
    assert_relative_eq!(forward, backward, max_relative = 1e-14);

    // CQC is symmetric in the mode pair as well
    let cqc_forward = combine_modal(&values, &omegas, 0.05, ModalCombination::Cqc);
    let cqc_backward = combine_modal(&reversed_values, &reversed_omegas, 0.05, ModalCombination::Cqc);
    assert_relative_eq!(cqc_forward, cqc_backward, max_relative = 1e-12);
}

#[test]
fn test_cqc_reduces_to_srss_without_damping() {
    let model = tower();
    let srss = model.analyze(&spectrum_options(ModalCombination::Srss, 0.05)).unwrap();
    let cqc = model.analyze(&spectrum_options(ModalCombination::Cqc, 1e-9)).unwrap();
    let (srss, cqc) = (srss.as_spectrum().unwrap(), cqc.as_spectrum().unwrap());
    assert_relative_eq!(srss.base_shear, cqc.base_shear, max_relative = 1e-6);
    assert_relative_eq!(srss.displacement, cqc.displacement, max_relative = 1e-6);
    for (node, peak) in &srss.peak_displacements {
        assert_relative_eq!(peak.dx, cqc.peak_displacements[node].dx, epsilon = 1e-12, max_relative = 1e-6);
    }
    assert!(cqc_coefficient(1e-9, 1.5) < 1e-15);
}

#[test]
fn test_modal_base_shear_and_bounds() {
    let model = tower();
    let result = model.analyze(&spectrum_options(ModalCombination::Srss, 0.05)).unwrap();
    let rs = result.as_spectrum().unwrap();
    let modal = model.analyze_modal(6).unwrap();

    assert_eq!(rs.modes.len(), modal.modes.len());
    for (mode, reference) in rs.modes.iter().zip(&modal.modes) {
        assert_relative_eq!(mode.period, reference.period, max_relative = 1e-12);
        assert_relative_eq!(mode.base_shear, mode.sa * reference.effective_mass[0], max_relative = 1e-12);
        assert!(mode.sa >= 2.0 && mode.sa <= 8.0);
    }

    // SRSS never exceeds the absolute sum and is at least the largest term
    let sum: f64 = rs.modes.iter().map(|m| m.base_shear.abs()).sum();
    let largest = rs.modes.iter().map(|m| m.base_shear.abs()).fold(0.0, f64::max);
    assert!(rs.base_shear <= sum * (1.0 + 1e-12));
    assert!(rs.base_shear >= largest * (1.0 - 1e-12));
    assert!(rs.base_shear <= 8.0 * modal.total_mass[0]);

    // Excitation along X leaves the roof still in Y
    let roof = rs.peak_displacements["N4"];
    assert!(roof.dx > 0.0);
    assert!(roof.dy.abs() <= 1e-9 * roof.dx);
}

#[test]
fn test_invalid_spectrum_is_a_configuration_error() {
    let model = tower();
    let table = SpectrumTable::new(vec![(1.0, 3.0), (0.5, 8.0)]);
    let options = AnalysisOptions::response_spectrum(3, table, Direction::Y);
    assert!(matches!(
        model.analyze(&options),
        Err(FEAError::Configuration { case, .. }) if case == "response spectrum"
    ));
}
