/*
MIT License

Copyright (c) 2025 Ameyanagi
*/

//! Configuration of an average-atom calculation

use crate::grid::GridType;
use crate::occupation::{DEFAULT_ELECTRON_TOLERANCE, DEFAULT_MU_WINDOW, MIN_TEMPERATURE};
use crate::scf::ScfSettings;
use crate::solver::{BoundaryCondition, Eigensolver, DEFAULT_EIGEN_ITERATIONS, DEFAULT_EIGEN_TOLERANCE};
use crate::utils::constants::PhysicalConstants;
use crate::utils::errors::{AtomError, Result};
use crate::xc::XcFunctionals;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Unit of the configured temperature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    /// Hartree
    #[default]
    Hartree,
    /// Kelvin
    Kelvin,
    /// Electron volts
    Ev,
}

/// Radial grid settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Number of grid points
    pub points: usize,
    /// Spacing scheme
    pub spacing: GridType,
    /// `x0 = ln r_min` (logarithmic) or `r_min` (uniform); `None` for the default
    pub inner: Option<f64>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            points: 1000,
            spacing: GridType::Logarithmic,
            inner: None,
        }
    }
}

/// Eigensolver settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EigensolverConfig {
    /// States per angular momentum channel
    pub nmax: usize,
    /// Number of angular momentum channels (`l = 0..lmax`)
    pub lmax: usize,
    /// Energy search window; derived from the nuclear charge when absent
    pub energy_window: Option<[f64; 2]>,
    /// Relative eigenvalue tolerance
    pub tolerance: f64,
    /// Sturm evaluations allowed per eigenvalue
    pub max_iterations: usize,
}

impl Default for EigensolverConfig {
    fn default() -> Self {
        Self {
            nmax: 20,
            lmax: 3,
            energy_window: None,
            tolerance: DEFAULT_EIGEN_TOLERANCE,
            max_iterations: DEFAULT_EIGEN_ITERATIONS,
        }
    }
}

/// Occupation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OccupationConfig {
    /// Bisection window for the chemical potential
    pub mu_window: [f64; 2],
    /// Temperatures below this (Hartree) are raised to it
    pub temperature_floor: f64,
    /// Tolerance on the electron count
    pub electron_tolerance: f64,
}

impl Default for OccupationConfig {
    fn default() -> Self {
        Self {
            mu_window: [DEFAULT_MU_WINDOW.0, DEFAULT_MU_WINDOW.1],
            temperature_floor: MIN_TEMPERATURE,
            electron_tolerance: DEFAULT_ELECTRON_TOLERANCE,
        }
    }
}

/// Complete description of one average-atom calculation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtomConfig {
    /// Nuclear charge Z
    pub nuclear_charge: f64,
    /// Electron count; the neutral atom when absent
    pub electron_count: Option<f64>,
    /// Electron temperature in `temperature_unit`
    pub temperature: f64,
    /// Unit of `temperature`
    pub temperature_unit: TemperatureUnit,
    /// Radius of the ion sphere in bohr
    pub radius: f64,
    /// Radial grid
    pub grid: GridConfig,
    /// Exchange and correlation functionals
    pub xc: XcFunctionals,
    /// Whether the Hartree potential is included
    pub hartree: bool,
    /// Spin-polarised calculation
    pub spin_polarized: bool,
    /// `N_up - N_down` for spin-polarised calculations
    pub net_spin: f64,
    /// Boundary condition at the sphere radius
    pub boundary: BoundaryCondition,
    /// Eigensolver
    pub eigensolver: EigensolverConfig,
    /// Occupations
    pub occupation: OccupationConfig,
    /// SCF iteration
    pub scf: ScfSettings,
}

impl Default for AtomConfig {
    fn default() -> Self {
        Self {
            nuclear_charge: 1.0,
            electron_count: None,
            temperature: 0.0,
            temperature_unit: TemperatureUnit::Hartree,
            radius: 5.0,
            grid: GridConfig::default(),
            xc: XcFunctionals::default(),
            hartree: true,
            spin_polarized: false,
            net_spin: 0.0,
            boundary: BoundaryCondition::Dirichlet,
            eigensolver: EigensolverConfig::default(),
            occupation: OccupationConfig::default(),
            scf: ScfSettings::default(),
        }
    }
}

impl AtomConfig {
    /// Parse a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| AtomError::Configuration(format!("Invalid configuration: {}", e)))
    }

    /// Read a JSON configuration file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            AtomError::Configuration(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&text)
    }

    /// Serialise to pretty JSON
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| AtomError::Configuration(format!("Cannot serialise configuration: {}", e)))
    }

    /// Number of spin channels
    pub fn n_spin(&self) -> usize {
        if self.spin_polarized {
            2
        } else {
            1
        }
    }

    /// Total electron count
    pub fn total_electrons(&self) -> f64 {
        self.electron_count.unwrap_or(self.nuclear_charge)
    }

    /// Target electrons per spin channel
    pub fn electron_targets(&self) -> Vec<f64> {
        let n = self.total_electrons();
        if self.spin_polarized {
            vec![0.5 * (n + self.net_spin), 0.5 * (n - self.net_spin)]
        } else {
            vec![n]
        }
    }

    /// Temperature in Hartree
    pub fn temperature_hartree(&self, constants: &PhysicalConstants) -> f64 {
        match self.temperature_unit {
            TemperatureUnit::Hartree => self.temperature,
            TemperatureUnit::Kelvin => constants.kelvin_to_hartree(self.temperature),
            TemperatureUnit::Ev => constants.ev_to_hartree(self.temperature),
        }
    }

    /// Eigenvalue search window
    pub fn energy_window(&self) -> (f64, f64) {
        match self.eigensolver.energy_window {
            Some([lower, upper]) => (lower, upper),
            None => Eigensolver::default_window(
                self.nuclear_charge,
                self.radius,
                self.eigensolver.nmax,
                self.eigensolver.lmax,
            ),
        }
    }

    /// Check physical consistency
    ///
    /// Runs before any grid or potential is constructed.
    pub fn validate(&self) -> Result<()> {
        if !self.nuclear_charge.is_finite() || self.nuclear_charge <= 0.0 {
            return Err(AtomError::Configuration(format!(
                "Nuclear charge must be positive, got {}",
                self.nuclear_charge
            )));
        }

        let n = self.total_electrons();
        if !n.is_finite() || n <= 0.0 {
            return Err(AtomError::Configuration(format!(
                "Electron count must be positive, got {}",
                n
            )));
        }

        if self.spin_polarized {
            if !self.net_spin.is_finite() || self.net_spin.abs() > n {
                return Err(AtomError::Configuration(format!(
                    "Net spin {} is incompatible with {} electrons",
                    self.net_spin, n
                )));
            }
        } else if self.net_spin != 0.0 {
            return Err(AtomError::Configuration(
                "Net spin requires a spin-polarised calculation".to_string(),
            ));
        }

        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(AtomError::Configuration(format!(
                "Temperature must be non-negative, got {}",
                self.temperature
            )));
        }

        if !self.radius.is_finite() || self.radius <= 0.0 {
            return Err(AtomError::Configuration(format!(
                "Sphere radius must be positive, got {}",
                self.radius
            )));
        }
        if self.grid.points < 5 {
            return Err(AtomError::Configuration(format!(
                "Radial grid needs at least 5 points, got {}",
                self.grid.points
            )));
        }

        let (lower, upper) = self.energy_window();
        if !lower.is_finite() || !upper.is_finite() || lower >= upper {
            return Err(AtomError::Configuration(format!(
                "Invalid eigenvalue search window [{}, {}]",
                lower, upper
            )));
        }
        if self.eigensolver.nmax == 0 || self.eigensolver.lmax == 0 {
            return Err(AtomError::Configuration(
                "Eigensolver needs at least one state and one channel".to_string(),
            ));
        }

        let [mu_lower, mu_upper] = self.occupation.mu_window;
        if !mu_lower.is_finite() || !mu_upper.is_finite() || mu_lower >= mu_upper {
            return Err(AtomError::Configuration(format!(
                "Invalid chemical potential window [{}, {}]",
                mu_lower, mu_upper
            )));
        }
        if !(self.occupation.temperature_floor > 0.0) {
            return Err(AtomError::Configuration(format!(
                "Temperature floor must be positive, got {}",
                self.occupation.temperature_floor
            )));
        }

        self.scf.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_is_valid_neutral_hydrogen() {
        let config = AtomConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.electron_targets(), vec![1.0]);
    }

    #[test]
    fn test_spin_targets() {
        let config = AtomConfig {
            nuclear_charge: 8.0,
            spin_polarized: true,
            net_spin: 2.0,
            ..Default::default()
        };
        assert_eq!(config.electron_targets(), vec![5.0, 3.0]);
        assert_eq!(config.n_spin(), 2);
    }

    #[test]
    fn test_rejects_nonpositive_electron_count() {
        let config = AtomConfig {
            electron_count: Some(0.0),
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().is_configuration());
    }

    #[test]
    fn test_kelvin_temperature() {
        let constants = PhysicalConstants::default();
        let config = AtomConfig {
            temperature: 315_775.0,
            temperature_unit: TemperatureUnit::Kelvin,
            ..Default::default()
        };
        assert_relative_eq!(config.temperature_hartree(&constants), 1.0, max_relative = 1e-4);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = AtomConfig::from_json_str(
            r#"{ "nuclear_charge": 13.0, "radius": 3.0, "scf": { "mixing": { "scheme": "pulay", "fraction": 0.5, "history": 4 } } }"#,
        )
        .unwrap();
        assert_eq!(config.nuclear_charge, 13.0);
        assert_eq!(config.grid.points, 1000);
        assert_eq!(config.scf.convergence_streak, 2);
        assert_eq!(config.total_electrons(), 13.0);
    }
}
