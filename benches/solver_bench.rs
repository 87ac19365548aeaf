//! Benchmarks for the frame solver

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use frame_solver::prelude::*;

fn create_cantilever_model() -> FEModel {
    let mut model = FEModel::new();

    model.add_material("Steel", Material::steel()).unwrap();
    model.add_section("Section", Section::rectangular(0.3, 0.5)).unwrap();

    model.add_node("N1", Node::new(0.0, 0.0, 0.0)).unwrap();
    model.add_node("N2", Node::new(10.0, 0.0, 0.0)).unwrap();

    model.add_element("M1", Element::beam("N1", "N2", "Steel", "Section")).unwrap();
    model.add_support("N1", Support::fixed()).unwrap();
    model.add_node_load("N2", NodeLoad::fz(-10000.0, "Case 1")).unwrap();

    model
}

/// Regular 3D frame: `stories` levels on a `bays` x `bays` grid
fn create_building(stories: usize, bays: usize) -> FEModel {
    let mut model = FEModel::new();

    model.add_material("Steel", Material::steel()).unwrap();
    model.add_section("Column", Section::rectangular(0.4, 0.4)).unwrap();
    model.add_section("Beam", Section::rectangular(0.3, 0.6)).unwrap();

    let story_height = 3.5;
    let bay_width = 6.0;
    let node = |s: usize, i: usize, j: usize| format!("N{}_{}_{}", s, i, j);

    for s in 0..=stories {
        for i in 0..=bays {
            for j in 0..=bays {
                let x = i as f64 * bay_width;
                let y = j as f64 * bay_width;
                let z = s as f64 * story_height;
                let mass = if s > 0 { 5_000.0 } else { 0.0 };
                model.add_node(&node(s, i, j), Node::new(x, y, z).with_mass(mass)).unwrap();
            }
        }
    }

    for s in 0..stories {
        for i in 0..=bays {
            for j in 0..=bays {
                let name = format!("C{}_{}_{}", s, i, j);
                model
                    .add_element(&name, Element::column(&node(s, i, j), &node(s + 1, i, j), "Steel", "Column"))
                    .unwrap();
            }
        }
    }

    for s in 1..=stories {
        for i in 0..=bays {
            for j in 0..=bays {
                if i < bays {
                    let name = format!("BX{}_{}_{}", s, i, j);
                    model
                        .add_element(&name, Element::beam(&node(s, i, j), &node(s, i + 1, j), "Steel", "Beam"))
                        .unwrap();
                    model
                        .add_distributed_load(&name, DistributedLoad::uniform_downward(15_000.0, "Dead"))
                        .unwrap();
                }
                if j < bays {
                    let name = format!("BY{}_{}_{}", s, i, j);
                    model
                        .add_element(&name, Element::beam(&node(s, i, j), &node(s, i, j + 1), "Steel", "Beam"))
                        .unwrap();
                }
            }
        }
        model
            .add_node_load(&node(s, 0, 0), NodeLoad::fx(20_000.0, "Wind"))
            .unwrap();
    }

    for i in 0..=bays {
        for j in 0..=bays {
            model.add_support(&node(0, i, j), Support::fixed()).unwrap();
        }
    }

    model
        .add_load_combo(LoadCombination::new("D+W").with_case("Dead", 1.2).with_case("Wind", 1.0))
        .unwrap();
    model
}

fn benchmark_cantilever(c: &mut Criterion) {
    let model = create_cantilever_model();
    c.bench_function("cantilever_linear", |b| {
        b.iter(|| black_box(model.analyze_linear("Case 1").unwrap()))
    });
}

fn benchmark_small_frame(c: &mut Criterion) {
    let model = create_building(3, 2);
    c.bench_function("building_3story_2bay_linear", |b| {
        b.iter(|| black_box(model.analyze_linear("D+W").unwrap()))
    });
}

fn benchmark_medium_frame(c: &mut Criterion) {
    let model = create_building(10, 4);
    c.bench_function("building_10story_4bay_linear", |b| {
        b.iter(|| black_box(model.analyze_linear("D+W").unwrap()))
    });
}

fn benchmark_modal(c: &mut Criterion) {
    let model = create_building(5, 3);
    c.bench_function("building_5story_3bay_modal", |b| {
        b.iter(|| black_box(model.analyze_modal(12).unwrap()))
    });
}

fn benchmark_pdelta(c: &mut Criterion) {
    let model = create_building(5, 3);
    c.bench_function("building_5story_3bay_pdelta", |b| {
        b.iter(|| black_box(model.analyze_nonlinear("D+W", 5).unwrap()))
    });
}

criterion_group!(
    benches,
    benchmark_cantilever,
    benchmark_small_frame,
    benchmark_medium_frame,
    benchmark_modal,
    benchmark_pdelta,
);

criterion_main!(benches);
