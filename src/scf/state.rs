/*
MIT License

Copyright (c) 2025 Ameyanagi
*/

//! State carried between SCF iterations

use super::mixer::Mixer;
use crate::density::Density;
use crate::energy::EnergyComponents;
use crate::occupation::OccupationSet;
use crate::potential::Potential;
use crate::solver::OrbitalSet;
use serde::{Deserialize, Serialize};

/// Phase of an SCF calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScfPhase {
    /// Building the initial guess
    Initializing,
    /// Iterating towards self-consistency
    Iterating,
    /// Residuals stayed below tolerance for the required streak
    Converged,
    /// Iteration budget exhausted
    Failed,
}

/// Convergence thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergenceTolerances {
    /// Change of the free energy between iterations (Hartree)
    pub energy: f64,
    /// `Σ ∫|Δρ| dV` per electron between input and output density
    pub density: f64,
    /// Relative error of the output electron count
    pub electrons: f64,
}

impl Default for ConvergenceTolerances {
    fn default() -> Self {
        Self {
            energy: 1.0e-6,
            density: 1.0e-6,
            electrons: 1.0e-6,
        }
    }
}

/// Residuals of one iteration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IterationResidual {
    /// Iteration number, starting at 1
    pub iteration: usize,
    /// Free energy after the iteration
    pub free_energy: f64,
    /// Absolute change of the free energy
    pub energy_change: f64,
    /// Density change per electron
    pub density_change: f64,
    /// Relative electron count error
    pub electron_error: f64,
    /// Largest residual in units of its tolerance; below 1 means converged
    pub combined: f64,
}

impl IterationResidual {
    /// Residuals of an iteration against the tolerances
    pub fn new(
        iteration: usize,
        free_energy: f64,
        energy_change: f64,
        density_change: f64,
        electron_error: f64,
        tolerances: &ConvergenceTolerances,
    ) -> Self {
        let combined = (energy_change / tolerances.energy)
            .max(density_change / tolerances.density)
            .max(electron_error / tolerances.electrons);
        Self {
            iteration,
            free_energy,
            energy_change,
            density_change,
            electron_error,
            combined,
        }
    }

    /// Whether every residual is below its tolerance
    pub fn is_converged(&self) -> bool {
        self.combined < 1.0
    }
}

/// Residual trace of an SCF run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceRecord {
    entries: Vec<IterationResidual>,
}

impl ConvergenceRecord {
    /// Append one iteration
    pub fn push(&mut self, residual: IterationResidual) {
        self.entries.push(residual);
    }

    /// All iterations so far
    pub fn entries(&self) -> &[IterationResidual] {
        &self.entries
    }

    /// Most recent iteration
    pub fn last(&self) -> Option<&IterationResidual> {
        self.entries.last()
    }

    /// Number of recorded iterations
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no iteration has been recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of trailing iterations that met all tolerances
    pub fn streak(&self) -> usize {
        self.entries
            .iter()
            .rev()
            .take_while(|r| r.is_converged())
            .count()
    }
}

/// Everything one SCF calculation carries from iteration to iteration
///
/// `input_density` generated `potential`, which produced `orbitals`,
/// `occupations` and the output `density`. After each iteration
/// `input_density` holds the mixed density for the next one.
#[derive(Debug, Clone)]
pub struct ScfState {
    /// Current phase
    pub phase: ScfPhase,
    /// Completed iterations
    pub iteration: usize,
    /// Density the next potential is built from
    pub input_density: Density,
    /// Potential of the last iteration
    pub potential: Potential,
    /// Orbitals of the last iteration
    pub orbitals: OrbitalSet,
    /// Occupations of the last iteration
    pub occupations: OccupationSet,
    /// Output density of the last iteration
    pub density: Density,
    /// Energies of the last iteration
    pub energies: Option<EnergyComponents>,
    /// Residual trace
    pub record: ConvergenceRecord,
    pub(crate) mixer: Mixer,
}

impl ScfState {
    /// Whether the calculation has converged
    pub fn is_converged(&self) -> bool {
        self.phase == ScfPhase::Converged
    }

    /// Free energy of the last iteration
    pub fn free_energy(&self) -> Option<f64> {
        self.energies.map(|e| e.free_energy)
    }

    /// Mixer driving this calculation
    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn residual(iteration: usize, density_change: f64) -> IterationResidual {
        IterationResidual::new(
            iteration,
            -0.5,
            0.0,
            density_change,
            0.0,
            &ConvergenceTolerances::default(),
        )
    }

    #[test]
    fn test_combined_residual() {
        let r = residual(1, 5e-6);
        assert!((r.combined - 5.0).abs() < 1e-9);
        assert!(!r.is_converged());
        assert!(residual(1, 5e-7).is_converged());
    }

    #[test]
    fn test_streak_counts_trailing_converged() {
        let mut record = ConvergenceRecord::default();
        record.push(residual(1, 1e-7));
        record.push(residual(2, 1e-3));
        record.push(residual(3, 1e-7));
        record.push(residual(4, 1e-8));
        assert_eq!(record.streak(), 2);
        assert_eq!(record.last().map(|r| r.iteration), Some(4));
    }
}
