/*
MIT License

Copyright (c) 2025 Ameyanagi
*/

use avatom_rs::grid::RadialGrid;
use avatom_rs::occupation::OccupationCalculator;
use avatom_rs::solver::{BoundaryCondition, Eigensolver};
use avatom_rs::utils::math::fermi_dirac_integral;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::{Array2, Array3};

fn eigensolver_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("Eigensolver");

    for points in [500, 1000, 2000] {
        let grid = RadialGrid::logarithmic(10.0, points, -10.0).unwrap();
        let potential = Array2::from_shape_fn((1, grid.len()), |(_, i)| -10.0 / grid.radii()[i]);
        let solver =
            Eigensolver::new(5, 3, BoundaryCondition::Dirichlet, Eigensolver::default_window(10.0, 10.0, 5, 3))
                .unwrap();

        group.bench_function(format!("coulomb_z10_{}_points", points), |b| {
            b.iter(|| black_box(solver.solve(&grid, black_box(potential.view())).unwrap()))
        });
    }

    group.finish();
}

fn occupation_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("Occupations");

    let levels = Array3::from_shape_fn((1, 4, 10), |(_, l, nodes)| {
        let n = (l + nodes + 1) as f64;
        -200.0 / (n * n)
    });
    let calc = OccupationCalculator::new(1.0, 1).unwrap();

    group.bench_function("chemical_potential", |b| {
        b.iter(|| {
            black_box(
                calc.compute_from_eigenvalues(levels.view(), black_box(&[20.0]), 50.0)
                    .unwrap(),
            )
        })
    });

    group.bench_function("fermi_dirac_integral", |b| {
        b.iter(|| {
            for i in 0..100 {
                black_box(fermi_dirac_integral(0.5, black_box(-20.0 + 0.5 * i as f64)));
            }
        })
    });

    group.finish();
}

criterion_group!(benches, eigensolver_benchmark, occupation_benchmark);
criterion_main!(benches);
