/*
MIT License

Copyright (c) 2025 Ameyanagi
*/

//! Physical constants and unit conversions
//!
//! Constants are carried by an immutable [`PhysicalConstants`] value that is
//! passed explicitly to the components that need it, so that calculations in
//! a parallel sweep never read shared global state.

use serde::{Deserialize, Serialize};

/// Physical constants used by the average-atom calculation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicalConstants {
    /// Hartree energy in eV
    pub hartree_ev: f64,
    /// Bohr radius in Angstroms
    pub bohr_angstrom: f64,
    /// Boltzmann constant in Hartree per Kelvin
    pub boltzmann_hartree_per_kelvin: f64,
    /// Atomic unit of pressure in GPa
    pub pressure_au_gpa: f64,
}

impl Default for PhysicalConstants {
    fn default() -> Self {
        // CODATA 2018
        Self {
            hartree_ev: 27.211_386_245_988,
            bohr_angstrom: 0.529_177_210_903,
            boltzmann_hartree_per_kelvin: 3.166_811_563e-6,
            pressure_au_gpa: 29_421.015_697,
        }
    }
}

impl PhysicalConstants {
    /// Convert energy from Hartree to eV
    pub fn hartree_to_ev(&self, hartree: f64) -> f64 {
        hartree * self.hartree_ev
    }

    /// Convert energy from eV to Hartree
    pub fn ev_to_hartree(&self, ev: f64) -> f64 {
        ev / self.hartree_ev
    }

    /// Convert a temperature in Kelvin to Hartree
    pub fn kelvin_to_hartree(&self, kelvin: f64) -> f64 {
        kelvin * self.boltzmann_hartree_per_kelvin
    }

    /// Convert a temperature in Hartree to Kelvin
    pub fn hartree_to_kelvin(&self, hartree: f64) -> f64 {
        hartree / self.boltzmann_hartree_per_kelvin
    }

    /// Convert from Angstroms to Bohr radii
    pub fn angstrom_to_bohr(&self, angstrom: f64) -> f64 {
        angstrom / self.bohr_angstrom
    }

    /// Convert a pressure in Hartree/bohr³ to GPa
    pub fn pressure_to_gpa(&self, pressure: f64) -> f64 {
        pressure * self.pressure_au_gpa
    }

    /// Wigner-Seitz radius (bohr) of an ion sphere for a mass density in
    /// g/cm³ and an atomic mass in atomic mass units
    pub fn wigner_seitz_radius(&self, mass_density: f64, atomic_mass: f64) -> f64 {
        const AVOGADRO: f64 = 6.022_140_76e23;
        // number density in 1/cm³, then sphere radius in cm
        let number_density = mass_density * AVOGADRO / atomic_mass;
        let radius_cm = (3.0 / (4.0 * std::f64::consts::PI * number_density)).cbrt();
        self.angstrom_to_bohr(radius_cm * 1.0e8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_unit_conversions() {
        let constants = PhysicalConstants::default();

        let ev = 10.0;
        let hartree = constants.ev_to_hartree(ev);
        assert_relative_eq!(constants.hartree_to_ev(hartree), ev, epsilon = 1e-10);

        let kelvin = 11_604.5;
        let t = constants.kelvin_to_hartree(kelvin);
        assert_relative_eq!(constants.hartree_to_kelvin(t), kelvin, epsilon = 1e-6);
        // 1 eV is about 11604.5 K
        assert_relative_eq!(constants.hartree_to_ev(t), 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_wigner_seitz_radius() {
        let constants = PhysicalConstants::default();
        // Aluminium at solid density: r_ws is about 3.0 bohr
        let r_ws = constants.wigner_seitz_radius(2.7, 26.98);
        assert_relative_eq!(r_ws, 2.99, epsilon = 0.02);
    }
}
