/*
MIT License

Copyright (c) 2025 Ameyanagi
*/

//! Tests for the radial eigensolver

use approx::assert_relative_eq;
use avatom_rs::grid::RadialGrid;
use avatom_rs::solver::{BoundaryCondition, Eigensolver, OrbitalId};
use ndarray::Array2;
use rstest::rstest;

/// Hydrogen-like potential -Z/r, repeated for each spin channel
fn coulomb(grid: &RadialGrid, z: f64, n_spin: usize) -> Array2<f64> {
    Array2::from_shape_fn((n_spin, grid.len()), |(_, i)| -z / grid.radii()[i])
}

#[rstest]
#[case(1.0)]
#[case(2.0)]
#[case(6.0)]
fn test_hydrogen_like_levels(#[case] z: f64) {
    let radius = 80.0 / z;
    let grid = RadialGrid::logarithmic(radius, 2001, -10.0).unwrap();
    let window = Eigensolver::default_window(z, radius, 3, 3);
    let solver = Eigensolver::new(3, 3, BoundaryCondition::Dirichlet, window).unwrap();
    let orbitals = solver.solve(&grid, coulomb(&grid, z, 1).view()).unwrap();

    for id in orbitals.ids() {
        let n = id.principal() as f64;
        let exact = -z * z / (2.0 * n * n);
        // higher states feel the wall at 80/Z bohr
        if id.principal() <= 3 {
            assert_relative_eq!(orbitals.eigenvalue(id), exact, max_relative = 1e-5);
        }
    }
}

#[test]
fn test_boundary_conditions_bracket_free_levels() {
    let grid = RadialGrid::logarithmic(4.0, 1501, -10.0).unwrap();
    let potential = coulomb(&grid, 1.0, 1);
    let window = Eigensolver::default_window(1.0, 4.0, 1, 2);
    let dirichlet = Eigensolver::new(1, 2, BoundaryCondition::Dirichlet, window)
        .unwrap()
        .solve(&grid, potential.view())
        .unwrap();
    let neumann = Eigensolver::new(1, 2, BoundaryCondition::Neumann, window)
        .unwrap()
        .solve(&grid, potential.view())
        .unwrap();

    // 1s and 2p are the lowest states of their channels
    for (l, exact) in [(0, -0.5), (1, -0.125)] {
        let id = OrbitalId { spin: 0, l, nodes: 0 };
        assert!(neumann.eigenvalue(id) < exact, "l = {}: {}", l, neumann.eigenvalue(id));
        assert!(dirichlet.eigenvalue(id) > exact, "l = {}: {}", l, dirichlet.eigenvalue(id));
    }
}

#[test]
fn test_states_are_ordered_by_node_count() {
    let grid = RadialGrid::logarithmic(20.0, 1501, -10.0).unwrap();
    let solver = Eigensolver::new(5, 2, BoundaryCondition::Dirichlet, (-5.0, 500.0)).unwrap();
    let orbitals = solver.solve(&grid, coulomb(&grid, 1.0, 1).view()).unwrap();

    for l in 0..2 {
        for nodes in 1..5 {
            let lower = orbitals.eigenvalue(OrbitalId { spin: 0, l, nodes: nodes - 1 });
            let upper = orbitals.eigenvalue(OrbitalId { spin: 0, l, nodes });
            assert!(upper > lower, "l = {} nodes = {}: {} <= {}", l, nodes, upper, lower);
        }
    }
}

#[test]
fn test_sturm_index_is_monotone_in_energy() {
    let grid = RadialGrid::logarithmic(15.0, 1001, -10.0).unwrap();
    let solver = Eigensolver::new(1, 1, BoundaryCondition::Dirichlet, (-5.0, 100.0)).unwrap();
    let potential = coulomb(&grid, 1.0, 1);

    let mut previous = 0;
    for k in 0..40 {
        let energy = -2.0 + 0.1 * k as f64;
        let index = solver
            .sturm_index(&grid, potential.row(0).as_slice().unwrap(), 0, energy)
            .unwrap();
        assert!(index >= previous, "index dropped at E = {}", energy);
        previous = index;
    }
}

#[test]
fn test_identical_spin_channels_agree() {
    let grid = RadialGrid::logarithmic(20.0, 1001, -10.0).unwrap();
    let solver = Eigensolver::new(2, 2, BoundaryCondition::Neumann, (-5.0, 100.0)).unwrap();
    let orbitals = solver.solve(&grid, coulomb(&grid, 1.0, 2).view()).unwrap();

    assert_eq!(orbitals.n_spin(), 2);
    for l in 0..2 {
        for nodes in 0..2 {
            let up = orbitals.eigenvalue(OrbitalId { spin: 0, l, nodes });
            let down = orbitals.eigenvalue(OrbitalId { spin: 1, l, nodes });
            assert_eq!(up, down);
        }
    }
}

#[test]
fn test_potential_length_mismatch() {
    let grid = RadialGrid::logarithmic(10.0, 500, -10.0).unwrap();
    let other = RadialGrid::logarithmic(10.0, 400, -10.0).unwrap();
    let solver = Eigensolver::new(1, 1, BoundaryCondition::Dirichlet, (-5.0, 100.0)).unwrap();
    let err = solver.solve(&grid, coulomb(&other, 1.0, 1).view()).unwrap_err();
    assert!(err.is_numerical());
}
