/*
MIT License

Copyright (c) 2025 Ameyanagi
*/

//! Parameter sweeps over temperature and sphere radius
//!
//! Points are either run independently in parallel, or chained so that each
//! point starts from the converged density of the previous one whenever the
//! two share a grid. Cancellation is cooperative: the token is checked
//! before each point starts, never in the middle of an SCF calculation.

use crate::input::AtomConfig;
use crate::utils::constants::PhysicalConstants;
use crate::utils::errors::{AtomError, Result};
use crate::xc::{BuiltinXc, XcAdapter};
use crate::{AtomResult, AverageAtom};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag that stops a sweep between points
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Fresh, uncancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Overrides applied to the base configuration for one sweep point
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SweepPoint {
    /// Temperature in the base configuration's unit
    pub temperature: Option<f64>,
    /// Sphere radius in bohr
    pub radius: Option<f64>,
}

impl SweepPoint {
    /// Point at a temperature
    pub fn temperature(temperature: f64) -> Self {
        Self {
            temperature: Some(temperature),
            radius: None,
        }
    }

    /// Point at a sphere radius
    pub fn radius(radius: f64) -> Self {
        Self {
            temperature: None,
            radius: Some(radius),
        }
    }

    /// Base configuration with this point's overrides
    pub fn apply(&self, base: &AtomConfig) -> AtomConfig {
        let mut config = base.clone();
        if let Some(temperature) = self.temperature {
            config.temperature = temperature;
        }
        if let Some(radius) = self.radius {
            config.radius = radius;
        }
        config
    }
}

/// Result of one sweep point
#[derive(Debug)]
pub enum SweepOutcome {
    /// Converged calculation
    Completed(Box<AtomResult>),
    /// Calculation failed
    Failed(AtomError),
    /// Never started because the sweep was cancelled
    Cancelled,
}

impl SweepOutcome {
    /// Whether the point converged
    pub fn is_completed(&self) -> bool {
        matches!(self, SweepOutcome::Completed(_))
    }

    /// Whether the point was skipped by cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SweepOutcome::Cancelled)
    }

    /// Converged result, if any
    pub fn result(&self) -> Option<&AtomResult> {
        match self {
            SweepOutcome::Completed(result) => Some(result),
            _ => None,
        }
    }
}

impl From<Result<AtomResult>> for SweepOutcome {
    fn from(result: Result<AtomResult>) -> Self {
        match result {
            Ok(result) => SweepOutcome::Completed(Box::new(result)),
            Err(err) => SweepOutcome::Failed(err),
        }
    }
}

/// A series of calculations sharing a base configuration
#[derive(Clone)]
pub struct Sweep {
    atoms: Vec<AverageAtom>,
    token: CancellationToken,
}

impl std::fmt::Debug for Sweep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sweep")
            .field("points", &self.atoms.len())
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}

impl Sweep {
    /// Sweep with the built-in functionals
    pub fn new(base: &AtomConfig, points: &[SweepPoint]) -> Result<Self> {
        Self::with_xc(base, points, Arc::new(BuiltinXc))
    }

    /// Sweep with an external exchange-correlation adapter
    ///
    /// Every point is validated up front, so a bad point fails the whole
    /// sweep before anything runs.
    pub fn with_xc(base: &AtomConfig, points: &[SweepPoint], xc: Arc<dyn XcAdapter>) -> Result<Self> {
        if points.is_empty() {
            return Err(AtomError::Configuration("Sweep has no points".to_string()));
        }
        let atoms = points
            .iter()
            .map(|point| AverageAtom::with_xc(point.apply(base), Arc::clone(&xc)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            atoms,
            token: CancellationToken::new(),
        })
    }

    /// Replace the physical constants of every point
    pub fn with_constants(mut self, constants: PhysicalConstants) -> Self {
        self.atoms = self
            .atoms
            .into_iter()
            .map(|atom| atom.with_constants(constants))
            .collect();
        self
    }

    /// Use an existing cancellation token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Token that cancels this sweep
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Number of points
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    /// Whether the sweep has no points
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Run every point independently in parallel
    ///
    /// Outcomes are returned in point order.
    pub fn run_parallel(&self) -> Vec<SweepOutcome> {
        log::info!("Running {} sweep points in parallel", self.atoms.len());
        self.atoms
            .par_iter()
            .map(|atom| {
                if self.token.is_cancelled() {
                    SweepOutcome::Cancelled
                } else {
                    atom.run().into()
                }
            })
            .collect()
    }

    /// Run the points in order, restarting each from the previous density
    pub fn run_chained(&self) -> Vec<SweepOutcome> {
        self.run_chained_with(|_, _| {})
    }

    /// Run the points in order, calling `on_point` after each one
    ///
    /// A point restarts from the last converged density when its grid is
    /// identical to that density's grid, and from the bare nucleus
    /// otherwise.
    pub fn run_chained_with<F>(&self, mut on_point: F) -> Vec<SweepOutcome>
    where
        F: FnMut(usize, &SweepOutcome),
    {
        let mut outcomes = Vec::with_capacity(self.atoms.len());
        let mut previous: Option<usize> = None;

        for (index, atom) in self.atoms.iter().enumerate() {
            if self.token.is_cancelled() {
                log::info!("Sweep cancelled before point {}", index);
                outcomes.push(SweepOutcome::Cancelled);
                continue;
            }

            let seed = previous.and_then(|p| outcomes.get(p)?.result().map(|r| (p, r)));
            let outcome: SweepOutcome = match seed {
                Some((p, seed)) => match atom.grid() {
                    Ok(grid) if grid == seed.grid => {
                        log::debug!("Point {} restarts from point {}", index, p);
                        atom.run_from(&seed.state).into()
                    }
                    Ok(_) => atom.run().into(),
                    Err(err) => SweepOutcome::Failed(err),
                },
                None => atom.run().into(),
            };

            if let SweepOutcome::Failed(err) = &outcome {
                log::warn!("Sweep point {} failed: {}", index, err);
            }
            if outcome.is_completed() {
                previous = Some(index);
            }
            on_point(index, &outcome);
            outcomes.push(outcome);
        }

        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_overrides() {
        let base = AtomConfig::default();
        let config = SweepPoint::radius(7.5).apply(&base);
        assert_eq!(config.radius, 7.5);
        assert_eq!(config.temperature, base.temperature);
    }

    #[test]
    fn test_token_is_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_invalid_point_rejects_sweep() {
        let base = AtomConfig::default();
        let points = [SweepPoint::radius(2.0), SweepPoint::radius(-1.0)];
        assert!(Sweep::new(&base, &points).unwrap_err().is_configuration());
    }

    #[test]
    fn test_cancelled_sweep_runs_nothing() {
        let base = AtomConfig::default();
        let sweep = Sweep::new(&base, &[SweepPoint::temperature(0.1), SweepPoint::temperature(0.2)])
            .unwrap();
        sweep.token().cancel();
        assert!(sweep.run_parallel().iter().all(SweepOutcome::is_cancelled));
        assert!(sweep.run_chained().iter().all(SweepOutcome::is_cancelled));
    }
}
