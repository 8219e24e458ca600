/*
MIT License

Copyright (c) 2025 Ameyanagi
*/

//! Tests for Fermi-Dirac occupations and the chemical potential

use approx::assert_relative_eq;
use avatom_rs::occupation::OccupationCalculator;
use avatom_rs::solver::OrbitalId;
use avatom_rs::utils::math::fermi_dirac_integral;
use ndarray::Array3;
use rstest::rstest;
use std::f64::consts::PI;

/// Hydrogen-like levels ε = -Z²/2n² in channels l = 0..3, four states each
fn hydrogenic_levels(z: f64, n_spin: usize) -> Array3<f64> {
    Array3::from_shape_fn((n_spin, 3, 4), |(_, l, nodes)| {
        let n = (l + nodes + 1) as f64;
        -z * z / (2.0 * n * n)
    })
}

#[rstest]
#[case(1.0)]
#[case(3.5)]
#[case(10.0)]
fn test_occupations_sum_to_target(#[case] target: f64) {
    let calc = OccupationCalculator::new(0.5, 1).unwrap();
    let set = calc
        .compute_from_eigenvalues(hydrogenic_levels(10.0, 1).view(), &[target], 100.0)
        .unwrap();
    let total = set.bound_electrons()[0] + set.unbound_electrons()[0];
    assert_relative_eq!(total, target, max_relative = 1e-9);
}

#[test]
fn test_chemical_potential_is_nondecreasing() {
    let calc = OccupationCalculator::new(0.1, 1).unwrap();
    let levels = hydrogenic_levels(5.0, 1);

    let mut previous = f64::NEG_INFINITY;
    for k in 1..=40 {
        let target = 0.5 * k as f64;
        let set = calc
            .compute_from_eigenvalues(levels.view(), &[target], 30.0)
            .unwrap();
        let mu = set.chemical_potential()[0];
        assert!(mu >= previous, "μ decreased at N = {}", target);
        previous = mu;
    }
}

#[test]
fn test_low_temperature_fills_lowest_levels() {
    // 1s² and then two electrons in the degenerate n = 2 shell
    let calc = OccupationCalculator::new(1e-5, 1).unwrap();
    let set = calc
        .compute_from_eigenvalues(hydrogenic_levels(4.0, 1).view(), &[4.0], 1.0)
        .unwrap();

    let occ = |l, nodes| set.occupation(OrbitalId { spin: 0, l, nodes });
    assert_relative_eq!(occ(0, 0), 2.0, epsilon = 1e-8);
    // 2s and 2p are degenerate: the remaining two electrons share eight states
    assert_relative_eq!(occ(0, 1) + occ(1, 0), 2.0, epsilon = 1e-6);
    assert_relative_eq!(occ(0, 1) / 2.0, occ(1, 0) / 6.0, epsilon = 1e-6);
    assert_relative_eq!(occ(0, 2), 0.0, epsilon = 1e-8);
}

#[test]
fn test_spin_polarised_channels_are_independent() {
    let calc = OccupationCalculator::new(0.01, 2).unwrap();
    let set = calc
        .compute_from_eigenvalues(hydrogenic_levels(3.0, 2).view(), &[2.0, 1.0], 5.0)
        .unwrap();

    let up = OrbitalId { spin: 0, l: 0, nodes: 0 };
    let down = OrbitalId { spin: 1, l: 0, nodes: 0 };
    assert_eq!(set.degeneracy(up), 1.0);
    assert_relative_eq!(set.occupation(up), 1.0, epsilon = 1e-6);
    assert_relative_eq!(set.occupation(down), 1.0, epsilon = 1e-6);
    assert!(set.chemical_potential()[0] > set.chemical_potential()[1]);
}

#[test]
fn test_unbound_density_matches_ideal_gas() {
    let calc = OccupationCalculator::new(2.0, 1).unwrap();
    let mu = -1.5;
    let beta: f64 = 0.5;
    // n = √2/π² β^{-3/2} F_{1/2}(βμ) for two spin states
    let expected = 2.0f64.sqrt() / (PI * PI) * beta.powf(-1.5) * fermi_dirac_integral(0.5, beta * mu);
    assert_relative_eq!(calc.unbound_density(mu), expected, max_relative = 1e-10);
}

#[test]
fn test_states_above_continuum_are_not_counted() {
    let calc = OccupationCalculator::new(0.05, 1).unwrap();
    let mut levels = Array3::zeros((1, 1, 2));
    levels[[0, 0, 0]] = -1.0;
    levels[[0, 0, 1]] = 0.2;
    let set = calc
        .compute_from_eigenvalues(levels.view(), &[2.5], 10.0)
        .unwrap();
    assert_eq!(set.occupation(OrbitalId { spin: 0, l: 0, nodes: 1 }), 0.0);
    assert!(set.unbound_electrons()[0] > 0.4);
}

#[test]
fn test_unreachable_targets_are_convergence_errors() {
    let levels = hydrogenic_levels(2.0, 1);

    let calc = OccupationCalculator::new(0.1, 1).unwrap();
    let err = calc
        .compute_from_eigenvalues(levels.view(), &[-1.0], 10.0)
        .unwrap_err();
    assert!(err.is_convergence());

    // a window capped below the continuum cannot hold the whole bound spectrum
    let capped = OccupationCalculator::new(0.01, 1)
        .unwrap()
        .with_window((-10.0, -1.0));
    let err = capped
        .compute_from_eigenvalues(levels.view(), &[30.0], 10.0)
        .unwrap_err();
    assert!(err.is_convergence());
}
