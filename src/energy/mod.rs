/*
MIT License

Copyright (c) 2025 Ameyanagi
*/

//! Total energy, entropy and free energy of the average atom

use crate::density::Density;
use crate::grid::RadialGrid;
use crate::occupation::{OccupationCalculator, OccupationSet};
use crate::potential::{Potential, PotentialBuilder};
use crate::solver::OrbitalSet;
use crate::utils::errors::{AtomError, Result};
use crate::utils::math::{fermi_dirac_integral_energy, occupation_entropy};
use serde::{Deserialize, Serialize};

/// Energy decomposition in Hartree
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EnergyComponents {
    /// Sum of occupied eigenvalues
    pub eigenvalue_sum: f64,
    /// Kinetic energy of bound electrons
    pub kinetic_bound: f64,
    /// Kinetic energy of unbound electrons
    pub kinetic_unbound: f64,
    /// Electron-nuclear attraction
    pub electron_nuclear: f64,
    /// Hartree energy
    pub hartree: f64,
    /// Exchange-correlation energy
    pub exchange_correlation: f64,
    /// Internal energy
    pub internal: f64,
    /// Entropy of bound electrons (units of k_B)
    pub entropy_bound: f64,
    /// Entropy of unbound electrons (units of k_B)
    pub entropy_unbound: f64,
    /// Helmholtz free energy `E - TS`
    pub free_energy: f64,
    /// Ideal-gas pressure of the unbound electrons, `(2/3) T_u / V`
    pub pressure: f64,
}

impl EnergyComponents {
    /// Total kinetic energy
    pub fn kinetic(&self) -> f64 {
        self.kinetic_bound + self.kinetic_unbound
    }

    /// Total entropy
    pub fn entropy(&self) -> f64 {
        self.entropy_bound + self.entropy_unbound
    }

    /// Energies of an SCF cycle
    ///
    /// `potential` is the potential that produced `orbitals`; `density` is
    /// the output density built from them. The bound kinetic energy uses
    /// `T_b = Σ occ ε - ∫ ρ_b v_s`.
    pub fn compute(
        grid: &RadialGrid,
        builder: &PotentialBuilder,
        calculator: &OccupationCalculator,
        potential: &Potential,
        orbitals: &OrbitalSet,
        occupations: &OccupationSet,
        density: &Density,
    ) -> Result<Self> {
        let temperature = occupations.temperature();
        let beta = occupations.beta();
        let volume = grid.volume();

        let mut energies = EnergyComponents::default();

        for id in orbitals.ids() {
            let occupation = occupations.occupation(id);
            energies.eigenvalue_sum += occupation * orbitals.eigenvalue(id);
            let degeneracy = occupations.degeneracy(id);
            if degeneracy > 0.0 {
                energies.entropy_bound += degeneracy * occupation_entropy(occupations.fraction(id));
            }
        }

        let mut bound_potential_energy = 0.0;
        for spin in 0..density.n_spin() {
            let product: Vec<f64> = density
                .bound()
                .row(spin)
                .iter()
                .zip(potential.channel(spin).iter())
                .map(|(rho, v)| rho * v)
                .collect();
            bound_potential_energy += grid.integrate(&product);

            let mu = occupations.chemical_potential()[spin];
            let unbound_electrons = occupations.unbound_electrons()[spin];
            let kinetic = if unbound_electrons > 0.0 {
                volume * calculator.unbound_prefactor() * fermi_dirac_integral_energy(1.5, mu, beta)
            } else {
                0.0
            };
            energies.kinetic_unbound += kinetic;
            energies.entropy_unbound += beta * (5.0 / 3.0 * kinetic - mu * unbound_electrons);
        }
        energies.kinetic_bound = energies.eigenvalue_sum - bound_potential_energy;

        let rho = density.spin_summed();
        let nuclear = builder.nuclear(grid);
        let en: Vec<f64> = rho.iter().zip(nuclear.iter()).map(|(r, v)| r * v).collect();
        energies.electron_nuclear = grid.integrate(&en);

        let hartree = builder.hartree(grid, rho.view())?;
        let ha: Vec<f64> = rho.iter().zip(hartree.iter()).map(|(r, v)| r * v).collect();
        energies.hartree = 0.5 * grid.integrate(&ha);

        let xc = builder.exchange_correlation(grid, density)?;
        energies.exchange_correlation = grid.integrate(&xc.energy_density.to_vec());

        energies.internal = energies.kinetic()
            + energies.electron_nuclear
            + energies.hartree
            + energies.exchange_correlation;
        energies.free_energy = energies.internal - temperature * energies.entropy();
        energies.pressure = 2.0 / 3.0 * energies.kinetic_unbound / volume;

        if !energies.free_energy.is_finite() {
            return Err(AtomError::Numerical(format!(
                "Free energy is not finite: {:?}",
                energies
            )));
        }

        Ok(energies)
    }
}
