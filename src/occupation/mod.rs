/*
MIT License

Copyright (c) 2025 Ameyanagi
*/

//! Fermi-Dirac occupations and the chemical potential
//!
//! Bound states (ε < 0) carry a degeneracy `(2l + 1)·(2 / n_spin)`. States at
//! or above the continuum edge are not counted as orbitals; their electrons
//! are described as an ideal Fermi gas filling the sphere uniformly, with
//! density `(2 / n_spin) / (√2 π²) ∫ e^{1/2} f(e) de`. For each spin channel
//! the chemical potential is the unique root of
//! `N_bound(μ) + N_unbound(μ) = N_target`.

use crate::solver::{OrbitalId, OrbitalSet};
use crate::utils::errors::{AtomError, Result};
use crate::utils::math::{fermi_dirac, fermi_dirac_integral_energy};
use ndarray::{Array1, Array3, ArrayView1, ArrayView2, ArrayView3, Axis};
use std::f64::consts::PI;

/// Default temperature floor in Hartree
pub const MIN_TEMPERATURE: f64 = 1.0e-6;

/// Default bisection window for the chemical potential
pub const DEFAULT_MU_WINDOW: (f64, f64) = (-1.0e4, 1.0e4);

/// Default tolerance on the electron count
pub const DEFAULT_ELECTRON_TOLERANCE: f64 = 1.0e-10;

const MAX_BISECTIONS: usize = 300;

/// Occupations of one SCF cycle
#[derive(Debug, Clone, PartialEq)]
pub struct OccupationSet {
    occupations: Array3<f64>,
    fractions: Array3<f64>,
    degeneracy: Array3<f64>,
    chemical_potential: Array1<f64>,
    unbound_density: Array1<f64>,
    unbound_electrons: Array1<f64>,
    temperature: f64,
}

impl OccupationSet {
    /// Electron count `g·f` of a state
    pub fn occupation(&self, id: OrbitalId) -> f64 {
        self.occupations[[id.spin, id.l, id.nodes]]
    }

    /// Fermi-Dirac fraction `f` of a state
    pub fn fraction(&self, id: OrbitalId) -> f64 {
        self.fractions[[id.spin, id.l, id.nodes]]
    }

    /// Bound-state degeneracy of a state (zero above the continuum edge)
    pub fn degeneracy(&self, id: OrbitalId) -> f64 {
        self.degeneracy[[id.spin, id.l, id.nodes]]
    }

    /// Electron counts as `[spin, l, nodes]`
    pub fn occupations(&self) -> ArrayView3<'_, f64> {
        self.occupations.view()
    }

    /// Chemical potential per spin
    pub fn chemical_potential(&self) -> ArrayView1<'_, f64> {
        self.chemical_potential.view()
    }

    /// Uniform unbound density per spin
    pub fn unbound_density(&self) -> ArrayView1<'_, f64> {
        self.unbound_density.view()
    }

    /// Unbound electrons per spin
    pub fn unbound_electrons(&self) -> ArrayView1<'_, f64> {
        self.unbound_electrons.view()
    }

    /// Bound electrons per spin
    pub fn bound_electrons(&self) -> Array1<f64> {
        self.occupations.sum_axis(Axis(2)).sum_axis(Axis(1))
    }

    /// Temperature the occupations were computed at
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Inverse temperature
    pub fn beta(&self) -> f64 {
        self.temperature.recip()
    }
}

/// Solves for the chemical potential and fills the orbitals
#[derive(Debug, Clone, PartialEq)]
pub struct OccupationCalculator {
    requested: f64,
    temperature: f64,
    n_spin: usize,
    window: (f64, f64),
    tolerance: f64,
}

impl OccupationCalculator {
    /// Calculator at `temperature` (Hartree) for `n_spin` channels
    pub fn new(temperature: f64, n_spin: usize) -> Result<Self> {
        if !temperature.is_finite() || temperature < 0.0 {
            return Err(AtomError::Configuration(format!(
                "Temperature must be non-negative, got {}",
                temperature
            )));
        }
        if n_spin != 1 && n_spin != 2 {
            return Err(AtomError::Configuration(format!(
                "Number of spin channels must be 1 or 2, got {}",
                n_spin
            )));
        }
        Ok(Self {
            requested: temperature,
            temperature: temperature.max(MIN_TEMPERATURE),
            n_spin,
            window: DEFAULT_MU_WINDOW,
            tolerance: DEFAULT_ELECTRON_TOLERANCE,
        })
    }

    /// Raise temperatures below `floor` to it
    pub fn with_temperature_floor(mut self, floor: f64) -> Result<Self> {
        if !floor.is_finite() || floor <= 0.0 {
            return Err(AtomError::Configuration(format!(
                "Temperature floor must be positive, got {}",
                floor
            )));
        }
        if self.requested < floor {
            log::debug!(
                "Temperature {:e} Ha raised to the floor of {:e} Ha",
                self.requested,
                floor
            );
        }
        self.temperature = self.requested.max(floor);
        Ok(self)
    }

    /// Set the chemical potential bisection window
    pub fn with_window(mut self, window: (f64, f64)) -> Self {
        self.window = window;
        self
    }

    /// Set the electron count tolerance
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Temperature actually used, after the floor is applied
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Temperature as requested
    pub fn requested_temperature(&self) -> f64 {
        self.requested
    }

    /// Electrons per state and spin channel, `2 / n_spin`
    pub fn spin_factor(&self) -> f64 {
        2.0 / self.n_spin as f64
    }

    /// `(2 / n_spin) / (√2 π²)`, the ideal-gas density-of-states prefactor
    pub fn unbound_prefactor(&self) -> f64 {
        self.spin_factor() / (2.0f64.sqrt() * PI * PI)
    }

    /// Uniform unbound density at chemical potential `mu`
    pub fn unbound_density(&self, mu: f64) -> f64 {
        self.unbound_prefactor() * fermi_dirac_integral_energy(0.5, mu, self.temperature.recip())
    }

    /// Degeneracy of a bound state, zero above the continuum edge
    pub fn degeneracy(&self, l: usize, eigenvalue: f64) -> f64 {
        if eigenvalue < 0.0 {
            (2 * l + 1) as f64 * self.spin_factor()
        } else {
            0.0
        }
    }

    /// Total electrons of one spin channel at chemical potential `mu`
    ///
    /// `eigenvalues` is `[l, nodes]`.
    pub fn electron_count(&self, eigenvalues: ArrayView2<f64>, mu: f64, volume: f64) -> f64 {
        let beta = self.temperature.recip();
        let bound: f64 = eigenvalues
            .indexed_iter()
            .map(|((l, _), &e)| self.degeneracy(l, e) * fermi_dirac(e, mu, beta))
            .sum();
        bound + volume * self.unbound_density(mu)
    }

    /// Occupations of an orbital set for the target electron count per spin
    pub fn compute(&self, orbitals: &OrbitalSet, targets: &[f64], volume: f64) -> Result<OccupationSet> {
        self.compute_from_eigenvalues(orbitals.eigenvalues(), targets, volume)
    }

    /// Occupations for eigenvalues given as `[spin, l, nodes]`
    pub fn compute_from_eigenvalues(
        &self,
        eigenvalues: ArrayView3<f64>,
        targets: &[f64],
        volume: f64,
    ) -> Result<OccupationSet> {
        let (n_spin, lmax, nmax) = eigenvalues.dim();
        if n_spin != self.n_spin || targets.len() != n_spin {
            return Err(AtomError::Numerical(format!(
                "Expected {} spin channels, got eigenvalues for {} and {} targets",
                self.n_spin,
                n_spin,
                targets.len()
            )));
        }

        let beta = self.temperature.recip();
        let mut occupations = Array3::zeros((n_spin, lmax, nmax));
        let mut fractions = Array3::zeros((n_spin, lmax, nmax));
        let mut degeneracy = Array3::zeros((n_spin, lmax, nmax));
        let mut chemical_potential = Array1::zeros(n_spin);
        let mut unbound_density = Array1::zeros(n_spin);
        let mut unbound_electrons = Array1::zeros(n_spin);

        for spin in 0..n_spin {
            let channel = eigenvalues.index_axis(Axis(0), spin);
            let target = targets[spin];

            if !target.is_finite() {
                return Err(AtomError::Numerical(format!(
                    "Electron target {} of spin channel {} is not finite",
                    target, spin
                )));
            }
            if target < 0.0 {
                return Err(AtomError::convergence(format!(
                    "No chemical potential gives {} electrons in spin channel {}",
                    target, spin
                )));
            }
            if target == 0.0 {
                // a fully polarised minority channel stays empty
                chemical_potential[spin] = self.window.0;
                continue;
            }

            let mu = self.chemical_potential(channel, target, volume)?;
            chemical_potential[spin] = mu;

            for ((l, k), &e) in channel.indexed_iter() {
                let g = self.degeneracy(l, e);
                let f = fermi_dirac(e, mu, beta);
                fractions[[spin, l, k]] = f;
                degeneracy[[spin, l, k]] = g;
                occupations[[spin, l, k]] = g * f;
            }
            unbound_density[spin] = self.unbound_density(mu);
            unbound_electrons[spin] = volume * unbound_density[spin];
        }

        Ok(OccupationSet {
            occupations,
            fractions,
            degeneracy,
            chemical_potential,
            unbound_density,
            unbound_electrons,
            temperature: self.temperature,
        })
    }

    /// Bisection for the chemical potential of one spin channel
    fn chemical_potential(&self, eigenvalues: ArrayView2<f64>, target: f64, volume: f64) -> Result<f64> {
        let (mut lower, mut upper) = self.window;
        let at_lower = self.electron_count(eigenvalues, lower, volume);
        let at_upper = self.electron_count(eigenvalues, upper, volume);
        if target < at_lower || target > at_upper {
            return Err(AtomError::convergence(format!(
                "Chemical potential for {} electrons not bracketed by [{}, {}] (N = {}..{})",
                target, lower, upper, at_lower, at_upper
            )));
        }

        let tolerance = self.tolerance * target.max(1.0);
        for _ in 0..MAX_BISECTIONS {
            let mid = 0.5 * (lower + upper);
            let count = self.electron_count(eigenvalues, mid, volume);
            if (count - target).abs() <= tolerance {
                return Ok(mid);
            }
            if count < target {
                lower = mid;
            } else {
                upper = mid;
            }
            // the count can jump by less than the tolerance only down to float resolution
            if upper - lower <= 4.0 * f64::EPSILON * lower.abs().max(upper.abs()).max(1.0) {
                return Ok(0.5 * (lower + upper));
            }
        }

        Err(AtomError::convergence(format!(
            "Chemical potential bisection did not converge for {} electrons",
            target
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array3;

    fn levels() -> Array3<f64> {
        // s: -2.0, -0.5 ; p: -1.0, 0.3
        let mut e = Array3::zeros((1, 2, 2));
        e[[0, 0, 0]] = -2.0;
        e[[0, 0, 1]] = -0.5;
        e[[0, 1, 0]] = -1.0;
        e[[0, 1, 1]] = 0.3;
        e
    }

    #[test]
    fn test_degeneracy_rules() {
        let unpolarized = OccupationCalculator::new(0.01, 1).unwrap();
        assert_eq!(unpolarized.degeneracy(1, -1.0), 6.0);
        assert_eq!(unpolarized.degeneracy(1, 0.5), 0.0);
        let polarized = OccupationCalculator::new(0.01, 2).unwrap();
        assert_eq!(polarized.degeneracy(2, -1.0), 5.0);
    }

    #[test]
    fn test_zero_temperature_fills_in_energy_order() {
        let calc = OccupationCalculator::new(0.0, 1).unwrap();
        let set = calc.compute_from_eigenvalues(levels().view(), &[5.0], 1.0).unwrap();

        let id = |l, nodes| OrbitalId { spin: 0, l, nodes };
        assert_relative_eq!(set.occupation(id(0, 0)), 2.0, epsilon = 1e-8);
        assert_relative_eq!(set.occupation(id(1, 0)), 3.0, epsilon = 1e-8);
        assert_relative_eq!(set.occupation(id(0, 1)), 0.0, epsilon = 1e-8);
        assert_eq!(set.degeneracy(id(1, 1)), 0.0);
        assert_relative_eq!(set.chemical_potential()[0], -1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_electron_count_is_conserved() {
        let calc = OccupationCalculator::new(0.2, 1).unwrap();
        let set = calc.compute_from_eigenvalues(levels().view(), &[7.0], 50.0).unwrap();
        let total = set.bound_electrons()[0] + set.unbound_electrons()[0];
        assert_relative_eq!(total, 7.0, epsilon = 1e-8);
        assert!(set.unbound_electrons()[0] > 0.0);
    }

    #[test]
    fn test_chemical_potential_increases_with_electron_count() {
        let calc = OccupationCalculator::new(0.05, 1).unwrap();
        let mut previous = f64::NEG_INFINITY;
        for n in 1..12 {
            let set = calc
                .compute_from_eigenvalues(levels().view(), &[n as f64], 20.0)
                .unwrap();
            let mu = set.chemical_potential()[0];
            assert!(mu >= previous, "mu decreased at N = {}", n);
            previous = mu;
        }
    }

    #[test]
    fn test_empty_spin_channel() {
        let calc = OccupationCalculator::new(0.01, 2).unwrap();
        let mut e = Array3::zeros((2, 1, 1));
        e[[0, 0, 0]] = -0.5;
        e[[1, 0, 0]] = -0.4;
        let set = calc.compute_from_eigenvalues(e.view(), &[1.0, 0.0], 10.0).unwrap();
        assert_eq!(set.bound_electrons()[1], 0.0);
        assert_relative_eq!(set.bound_electrons()[0], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_negative_target_has_no_chemical_potential() {
        let calc = OccupationCalculator::new(0.1, 1).unwrap();
        let err = calc.compute_from_eigenvalues(levels().view(), &[-3.0], 10.0).unwrap_err();
        assert!(err.is_convergence());

        let err = calc
            .compute_from_eigenvalues(levels().view(), &[f64::NAN], 10.0)
            .unwrap_err();
        assert!(err.is_numerical());
    }

    #[test]
    fn test_unbracketed_chemical_potential() {
        let calc = OccupationCalculator::new(0.01, 1)
            .unwrap()
            .with_window((-0.1, 0.0));
        // 2 electrons need μ near -2.0, outside the window
        let err = calc.compute_from_eigenvalues(levels().view(), &[2.0], 1e-6).unwrap_err();
        assert!(err.is_convergence());
    }

    #[test]
    fn test_temperature_floor() {
        let calc = OccupationCalculator::new(0.0, 1).unwrap();
        assert_eq!(calc.temperature(), MIN_TEMPERATURE);
        let calc = calc.with_temperature_floor(1e-3).unwrap();
        assert_eq!(calc.temperature(), 1e-3);
        assert_eq!(calc.requested_temperature(), 0.0);
        assert!(OccupationCalculator::new(0.5, 1)
            .unwrap()
            .with_temperature_floor(0.0)
            .is_err());
    }

    #[test]
    fn test_rejects_negative_temperature() {
        assert!(OccupationCalculator::new(-1.0, 1).unwrap_err().is_configuration());
    }
}
