/*
MIT License

Copyright (c) 2025 Ameyanagi
*/

//! # avatom-rs
//!
//! An average-atom model for atoms embedded in warm dense matter.
//!
//! A single nucleus sits at the centre of a neutral sphere. Its electrons are
//! described by finite-temperature Kohn-Sham density functional theory in a
//! spherically symmetric potential: bound orbitals come from a radial
//! shooting eigensolver, continuum electrons are treated as a uniform ideal
//! Fermi gas, and the two are iterated to self-consistency.
//!
//! ```no_run
//! use avatom_rs::{AtomConfig, AverageAtom};
//!
//! let config = AtomConfig {
//!     nuclear_charge: 13.0,
//!     temperature: 0.1,
//!     radius: 3.0,
//!     ..Default::default()
//! };
//! let result = AverageAtom::new(config)?.run()?;
//! println!("F = {:.6} Ha", result.energies.free_energy);
//! # Ok::<(), avatom_rs::AtomError>(())
//! ```
//!
//! All quantities are in Hartree atomic units unless stated otherwise.

pub mod density;
pub mod energy;
pub mod grid;
pub mod input;
pub mod occupation;
pub mod potential;
pub mod scf;
pub mod solver;
pub mod sweep;
pub mod utils;
pub mod xc;

pub use energy::EnergyComponents;
pub use input::AtomConfig;
pub use utils::constants::PhysicalConstants;
pub use utils::errors::{AtomError, ConvergenceFailure, Result};

use density::Density;
use grid::RadialGrid;
use occupation::OccupationCalculator;
use potential::PotentialBuilder;
use scf::{ScfDriver, ScfState};
use serde::{Deserialize, Serialize};
use solver::Eigensolver;
use std::sync::Arc;
use xc::{BuiltinXc, XcAdapter};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");

/// Orbitals with an occupation below this are left out of summaries
const SUMMARY_OCCUPATION_CUTOFF: f64 = 1.0e-8;

/// The main entry point for an average-atom calculation
#[derive(Clone)]
pub struct AverageAtom {
    config: AtomConfig,
    constants: PhysicalConstants,
    xc: Arc<dyn XcAdapter>,
}

impl std::fmt::Debug for AverageAtom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AverageAtom")
            .field("config", &self.config)
            .field("constants", &self.constants)
            .finish()
    }
}

impl AverageAtom {
    /// Calculation using the built-in LDA functionals
    pub fn new(config: AtomConfig) -> Result<Self> {
        Self::with_xc(config, Arc::new(BuiltinXc))
    }

    /// Calculation using an external exchange-correlation adapter
    ///
    /// The configuration and the functional ids are checked here, before any
    /// grid is built.
    pub fn with_xc(config: AtomConfig, xc: Arc<dyn XcAdapter>) -> Result<Self> {
        config.validate()?;
        config.xc.validate(xc.as_ref(), config.spin_polarized)?;
        Ok(Self {
            config,
            constants: PhysicalConstants::default(),
            xc,
        })
    }

    /// Replace the physical constants
    pub fn with_constants(mut self, constants: PhysicalConstants) -> Self {
        self.constants = constants;
        self
    }

    /// Configuration of the calculation
    pub fn config(&self) -> &AtomConfig {
        &self.config
    }

    /// Physical constants in use
    pub fn constants(&self) -> &PhysicalConstants {
        &self.constants
    }

    /// Radial grid described by the configuration
    pub fn grid(&self) -> Result<RadialGrid> {
        let grid = &self.config.grid;
        RadialGrid::new(grid.spacing, self.config.radius, grid.points, grid.inner)
    }

    /// SCF driver with every component assembled from the configuration
    pub fn driver(&self) -> Result<ScfDriver> {
        let config = &self.config;
        let grid = self.grid()?;

        let builder = PotentialBuilder::new(
            config.nuclear_charge,
            config.hartree,
            config.xc.clone(),
            Arc::clone(&self.xc),
            config.spin_polarized,
        )?;

        let eigen = &config.eigensolver;
        let solver = Eigensolver::new(eigen.nmax, eigen.lmax, config.boundary, config.energy_window())?
            .with_tolerance(eigen.tolerance)
            .with_max_iterations(eigen.max_iterations);

        let occ = &config.occupation;
        let occupation = OccupationCalculator::new(
            config.temperature_hartree(&self.constants),
            config.n_spin(),
        )?
        .with_temperature_floor(occ.temperature_floor)?
        .with_window((occ.mu_window[0], occ.mu_window[1]))
        .with_tolerance(occ.electron_tolerance);

        ScfDriver::new(
            grid,
            builder,
            solver,
            occupation,
            config.electron_targets(),
            config.scf.clone(),
        )
    }

    /// Run to self-consistency from the bare-nucleus guess
    pub fn run(&self) -> Result<AtomResult> {
        let driver = self.driver()?;
        let outcome = driver.run()?;
        Ok(AtomResult {
            state: outcome.state,
            energies: outcome.energies,
            grid: driver.grid().clone(),
        })
    }

    /// Run to self-consistency starting from a density on the same grid
    pub fn run_from_density(&self, density: &Density) -> Result<AtomResult> {
        let driver = self.driver()?;
        let outcome = driver.run_from(density)?;
        Ok(AtomResult {
            state: outcome.state,
            energies: outcome.energies,
            grid: driver.grid().clone(),
        })
    }

    /// Restart from a previous state
    pub fn run_from(&self, previous: &ScfState) -> Result<AtomResult> {
        self.run_from_density(&previous.density)
    }

    /// Serialisable summary of a finished calculation
    pub fn summarize(&self, result: &AtomResult) -> ResultSummary {
        ResultSummary::new(&self.config, &self.constants, result)
    }
}

/// Converged calculation
#[derive(Debug, Clone)]
pub struct AtomResult {
    /// Final SCF state
    pub state: ScfState,
    /// Energies of the final iteration
    pub energies: EnergyComponents,
    /// Grid the state lives on
    pub grid: RadialGrid,
}

impl AtomResult {
    /// Electrons in the final density
    pub fn electron_count(&self) -> f64 {
        self.state.density.total_electrons(&self.grid)
    }

    /// Number of SCF iterations performed
    pub fn iterations(&self) -> usize {
        self.state.iteration
    }
}

/// One orbital in a [`ResultSummary`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrbitalSummary {
    /// Spectroscopic label, e.g. `2p`
    pub label: String,
    /// Spin channel
    pub spin: usize,
    /// Eigenvalue in Hartree
    pub eigenvalue: f64,
    /// Electrons in the state
    pub occupation: f64,
}

/// Report of a calculation for downstream tools
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSummary {
    /// Crate version that produced the result
    pub version: String,
    /// Nuclear charge
    pub nuclear_charge: f64,
    /// Electron count requested
    pub electrons: f64,
    /// Electrons in the final density
    pub electrons_found: f64,
    /// Temperature used, in Hartree
    pub temperature: f64,
    /// Sphere radius in bohr
    pub radius: f64,
    /// SCF iterations performed
    pub iterations: usize,
    /// Chemical potential per spin channel
    pub chemical_potential: Vec<f64>,
    /// Unbound electrons per spin channel
    pub unbound_electrons: Vec<f64>,
    /// Energy decomposition in Hartree
    pub energies: EnergyComponents,
    /// Internal energy in eV
    pub internal_energy_ev: f64,
    /// Free energy in eV
    pub free_energy_ev: f64,
    /// Electron pressure in GPa
    pub pressure_gpa: f64,
    /// Occupied orbitals
    pub orbitals: Vec<OrbitalSummary>,
}

impl ResultSummary {
    /// Summarise `result`, computed from `config`
    pub fn new(config: &AtomConfig, constants: &PhysicalConstants, result: &AtomResult) -> Self {
        let state = &result.state;
        let orbitals = state
            .orbitals
            .ids()
            .filter_map(|id| {
                let occupation = state.occupations.occupation(id);
                (occupation > SUMMARY_OCCUPATION_CUTOFF).then(|| OrbitalSummary {
                    label: id.label(),
                    spin: id.spin,
                    eigenvalue: state.orbitals.eigenvalue(id),
                    occupation,
                })
            })
            .collect();

        Self {
            version: VERSION.to_string(),
            nuclear_charge: config.nuclear_charge,
            electrons: config.total_electrons(),
            electrons_found: result.electron_count(),
            temperature: state.occupations.temperature(),
            radius: config.radius,
            iterations: state.iteration,
            chemical_potential: state.occupations.chemical_potential().to_vec(),
            unbound_electrons: state.occupations.unbound_electrons().to_vec(),
            energies: result.energies,
            internal_energy_ev: constants.hartree_to_ev(result.energies.internal),
            free_energy_ev: constants.hartree_to_ev(result.energies.free_energy),
            pressure_gpa: constants.pressure_to_gpa(result.energies.pressure),
            orbitals,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xc::XcFunctionals;

    #[test]
    fn test_invalid_config_rejected_before_grid() {
        let config = AtomConfig {
            electron_count: Some(-1.0),
            ..Default::default()
        };
        let err = AverageAtom::new(config).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_driver_assembly() {
        let config = AtomConfig {
            nuclear_charge: 2.0,
            spin_polarized: true,
            xc: XcFunctionals::none(),
            ..Default::default()
        };
        let atom = AverageAtom::new(config).unwrap();
        let driver = atom.driver().unwrap();
        assert_eq!(driver.n_spin(), 2);
        assert_eq!(driver.targets(), &[1.0, 1.0]);
        assert_eq!(driver.grid().len(), 1000);
    }
}
