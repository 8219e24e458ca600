/*
MIT License

Copyright (c) 2025 Ameyanagi
*/

//! Self-consistent field loop

use super::mixer::{Mixer, MixingMethod};
use super::state::{ConvergenceTolerances, IterationResidual, ScfPhase, ScfState};
use crate::density::{construct_density, Density};
use crate::energy::EnergyComponents;
use crate::grid::RadialGrid;
use crate::occupation::{OccupationCalculator, OccupationSet};
use crate::potential::{Potential, PotentialBuilder};
use crate::solver::{Eigensolver, OrbitalSet};
use crate::utils::errors::{AtomError, ConvergenceFailure, Result};
use serde::{Deserialize, Serialize};

/// Iteration control of the SCF loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScfSettings {
    /// Iteration budget
    pub max_iterations: usize,
    /// Convergence thresholds
    pub tolerances: ConvergenceTolerances,
    /// Consecutive converged iterations required
    pub convergence_streak: usize,
    /// Mixing scheme
    pub mixing: MixingMethod,
}

impl Default for ScfSettings {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            tolerances: ConvergenceTolerances::default(),
            convergence_streak: 2,
            mixing: MixingMethod::default(),
        }
    }
}

impl ScfSettings {
    /// Check the settings are usable
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(AtomError::Configuration(
                "SCF needs at least one iteration".to_string(),
            ));
        }
        if self.convergence_streak == 0 {
            return Err(AtomError::Configuration(
                "Convergence streak must be at least 1".to_string(),
            ));
        }
        let t = &self.tolerances;
        for (name, value) in [
            ("energy", t.energy),
            ("density", t.density),
            ("electron", t.electrons),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(AtomError::Configuration(format!(
                    "SCF {} tolerance must be positive, got {}",
                    name, value
                )));
            }
        }
        self.mixing.validate()
    }
}

/// Converged SCF state with its energies
#[derive(Debug, Clone)]
pub struct ScfOutcome {
    /// Final state
    pub state: ScfState,
    /// Energies of the final iteration
    pub energies: EnergyComponents,
}

/// Drives potential → orbitals → occupations → density → mixing to
/// self-consistency
#[derive(Debug, Clone)]
pub struct ScfDriver {
    grid: RadialGrid,
    builder: PotentialBuilder,
    solver: Eigensolver,
    occupation: OccupationCalculator,
    targets: Vec<f64>,
    settings: ScfSettings,
}

impl ScfDriver {
    /// Driver on `grid` for the target electron count of each spin channel
    pub fn new(
        grid: RadialGrid,
        builder: PotentialBuilder,
        solver: Eigensolver,
        occupation: OccupationCalculator,
        targets: Vec<f64>,
        settings: ScfSettings,
    ) -> Result<Self> {
        if targets.is_empty() || targets.len() > 2 {
            return Err(AtomError::Configuration(format!(
                "Expected 1 or 2 spin channels, got {}",
                targets.len()
            )));
        }
        if targets.iter().any(|n| !n.is_finite() || *n < 0.0) || targets.iter().sum::<f64>() <= 0.0 {
            return Err(AtomError::Configuration(format!(
                "Electron counts must be non-negative with a positive total, got {:?}",
                targets
            )));
        }
        settings.validate()?;

        Ok(Self {
            grid,
            builder,
            solver,
            occupation,
            targets,
            settings,
        })
    }

    /// Radial grid of the calculation
    pub fn grid(&self) -> &RadialGrid {
        &self.grid
    }

    /// Potential builder
    pub fn builder(&self) -> &PotentialBuilder {
        &self.builder
    }

    /// Iteration settings
    pub fn settings(&self) -> &ScfSettings {
        &self.settings
    }

    /// Target electrons per spin
    pub fn targets(&self) -> &[f64] {
        &self.targets
    }

    /// Number of spin channels
    pub fn n_spin(&self) -> usize {
        self.targets.len()
    }

    fn total_electrons(&self) -> f64 {
        self.targets.iter().sum()
    }

    /// Starting state
    ///
    /// Without a guess the orbitals of the bare nuclear potential are
    /// occupied and turned into the first density.
    pub fn initial_state(&self, guess: Option<&Density>) -> Result<ScfState> {
        let n_spin = self.n_spin();
        let potential = match guess {
            Some(density) => {
                if density.len() != self.grid.len() || density.n_spin() != n_spin {
                    return Err(AtomError::Configuration(format!(
                        "Restart density has {} spin channels on {} points, expected {} on {}",
                        density.n_spin(),
                        density.len(),
                        n_spin,
                        self.grid.len()
                    )));
                }
                self.builder.build(&self.grid, density)?
            }
            None => self.builder.bare(&self.grid, n_spin),
        };

        let (orbitals, occupations, density) = self.solve(&potential)?;
        let input_density = guess.cloned().unwrap_or_else(|| density.clone());

        Ok(ScfState {
            phase: ScfPhase::Initializing,
            iteration: 0,
            input_density,
            potential,
            orbitals,
            occupations,
            density,
            energies: None,
            record: Default::default(),
            mixer: Mixer::new(self.settings.mixing)?,
        })
    }

    fn solve(&self, potential: &Potential) -> Result<(OrbitalSet, OccupationSet, Density)> {
        let orbitals = self.solver.solve(&self.grid, potential.total.view())?;
        let occupations = self
            .occupation
            .compute(&orbitals, &self.targets, self.grid.volume())?;
        let density = construct_density(&self.grid, &orbitals, &occupations)?;
        Ok((orbitals, occupations, density))
    }

    /// One SCF iteration on `state`
    pub fn step(&self, state: &mut ScfState) -> Result<IterationResidual> {
        let potential = self.builder.build(&self.grid, &state.input_density)?;
        let (orbitals, occupations, density) = self.solve(&potential)?;
        let energies = EnergyComponents::compute(
            &self.grid,
            &self.builder,
            &self.occupation,
            &potential,
            &orbitals,
            &occupations,
            &density,
        )?;

        let n_target = self.total_electrons();
        let iteration = state.iteration + 1;
        let energy_change = state
            .free_energy()
            .map(|previous| (energies.free_energy - previous).abs())
            .unwrap_or(f64::INFINITY);
        let density_change = density.distance(&state.input_density, &self.grid)? / n_target;
        let electron_error = (density.total_electrons(&self.grid) - n_target).abs() / n_target;
        let residual = IterationResidual::new(
            iteration,
            energies.free_energy,
            energy_change,
            density_change,
            electron_error,
            &self.settings.tolerances,
        );

        let metric = Density::mixing_metric(&self.grid, self.n_spin());
        let mixed = state.mixer.mix(
            &state.input_density.to_vector(),
            &density.to_vector(),
            &metric,
        )?;
        let next = Density::from_vector(self.n_spin(), self.grid.len(), &mixed)?;

        log::debug!(
            "SCF iteration {}: F = {:.10} dF = {:.3e} drho = {:.3e} dN = {:.3e}",
            iteration,
            energies.free_energy,
            energy_change,
            density_change,
            electron_error
        );

        state.iteration = iteration;
        state.potential = potential;
        state.orbitals = orbitals;
        state.occupations = occupations;
        state.density = density;
        state.input_density = next;
        state.energies = Some(energies);

        Ok(residual)
    }

    /// Run from the bare-nucleus guess
    pub fn run(&self) -> Result<ScfOutcome> {
        let state = self.initial_state(None)?;
        self.iterate(state)
    }

    /// Run from a supplied density on the same grid
    pub fn run_from(&self, density: &Density) -> Result<ScfOutcome> {
        let state = self.initial_state(Some(density))?;
        self.iterate(state)
    }

    /// Continue an existing state with a fresh mixer and residual trace
    pub fn resume(&self, previous: &ScfState) -> Result<ScfOutcome> {
        self.run_from(&previous.density)
    }

    fn iterate(&self, mut state: ScfState) -> Result<ScfOutcome> {
        state.phase = ScfPhase::Iterating;
        log::info!(
            "Starting SCF: Z = {}, N = {:?}, {} grid points, R = {}",
            self.builder.nuclear_charge(),
            self.targets,
            self.grid.len(),
            self.grid.radius()
        );

        while state.record.streak() < self.settings.convergence_streak {
            if state.iteration >= self.settings.max_iterations {
                state.phase = ScfPhase::Failed;
                let message = format!(
                    "SCF did not converge in {} iterations (last residual {:.3e})",
                    self.settings.max_iterations,
                    state.record.last().map(|r| r.combined).unwrap_or(f64::NAN)
                );
                log::warn!("{}", message);
                return Err(AtomError::Convergence(Box::new(ConvergenceFailure {
                    message,
                    record: state.record,
                    last_density: Some(state.density),
                    cause: None,
                })));
            }
            let residual = match self.step(&mut state) {
                Ok(residual) => residual,
                Err(err) => {
                    // the state still holds the output of the last completed iteration
                    state.phase = ScfPhase::Failed;
                    let message = format!("SCF iteration {} failed: {}", state.iteration + 1, err);
                    log::warn!("{}", message);
                    return Err(AtomError::Convergence(Box::new(ConvergenceFailure {
                        message,
                        record: state.record,
                        last_density: Some(state.density),
                        cause: Some(Box::new(err)),
                    })));
                }
            };
            state.record.push(residual);
        }

        state.phase = ScfPhase::Converged;
        state.mixer.mark_converged();

        let energies = state.energies.ok_or_else(|| {
            AtomError::Numerical("Converged state carries no energies".to_string())
        })?;
        log::info!(
            "SCF converged in {} iterations: F = {:.10} Ha",
            state.iteration,
            energies.free_energy
        );

        Ok(ScfOutcome { state, energies })
    }
}
