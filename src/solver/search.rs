/*
MIT License

Copyright (c) 2025 Ameyanagi
*/

//! Eigenvalue search as an explicit state machine
//!
//! The search only consumes Sturm indices: it proposes a trial energy, is told
//! the index at that energy, and moves on. The eigenvalue is the lowest energy
//! at which the index reaches `threshold`.

use crate::utils::errors::{AtomError, Result};

/// Phase of an eigenvalue search
#[derive(Debug, Clone, PartialEq)]
pub enum SearchPhase {
    /// Checking that the starting energy lies below the eigenvalue
    Start { lower: f64 },
    /// Stepping upwards until the index reaches the threshold
    Bracketing { lower: f64, step: f64 },
    /// Halving a bracket `[lower, upper]` known to contain the eigenvalue
    Bisecting { lower: f64, upper: f64 },
    /// Converged eigenvalue
    Done(f64),
    /// No bracket could be established
    Failed(String),
}

/// Bracketing and bisection search for one eigenvalue
#[derive(Debug, Clone)]
pub struct EigenSearch {
    threshold: usize,
    ceiling: f64,
    tolerance: f64,
    max_iterations: usize,
    iterations: usize,
    trial: f64,
    phase: SearchPhase,
}

impl EigenSearch {
    /// Initial bracketing step
    pub const INITIAL_STEP: f64 = 0.5;

    /// New search starting at `lower`, never going beyond `ceiling`
    pub fn new(threshold: usize, lower: f64, ceiling: f64, tolerance: f64, max_iterations: usize) -> Self {
        Self {
            threshold,
            ceiling,
            tolerance,
            max_iterations,
            iterations: 0,
            trial: lower,
            phase: SearchPhase::Start { lower },
        }
    }

    /// Current phase
    pub fn phase(&self) -> &SearchPhase {
        &self.phase
    }

    /// Number of indices consumed so far
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Energy to evaluate next, or `None` once the search has finished
    pub fn trial(&self) -> Option<f64> {
        match self.phase {
            SearchPhase::Done(_) | SearchPhase::Failed(_) => None,
            _ => Some(self.trial),
        }
    }

    /// Feed the Sturm index at the current trial energy
    pub fn advance(&mut self, index: usize) {
        self.iterations += 1;
        let reached = index >= self.threshold;

        self.phase = match std::mem::replace(&mut self.phase, SearchPhase::Done(f64::NAN)) {
            SearchPhase::Start { lower } => {
                if reached {
                    SearchPhase::Failed(format!(
                        "Eigenvalue lies below the search window (index {} at E = {})",
                        index, lower
                    ))
                } else {
                    self.next_bracket(lower, Self::INITIAL_STEP)
                }
            }
            SearchPhase::Bracketing { lower, step } => {
                if reached {
                    self.bisect(lower, self.trial)
                } else if self.trial >= self.ceiling {
                    SearchPhase::Failed(format!(
                        "No eigenvalue bracket found below E = {}",
                        self.ceiling
                    ))
                } else {
                    self.next_bracket(self.trial, 2.0 * step.max(self.trial - lower))
                }
            }
            SearchPhase::Bisecting { lower, upper } => {
                if reached {
                    self.bisect(lower, self.trial)
                } else {
                    self.bisect(self.trial, upper)
                }
            }
            finished => finished,
        };

        if self.iterations >= self.max_iterations && self.trial().is_some() {
            self.phase = SearchPhase::Failed(format!(
                "Eigenvalue search did not converge in {} iterations",
                self.max_iterations
            ));
        }
    }

    fn next_bracket(&mut self, lower: f64, step: f64) -> SearchPhase {
        self.trial = (lower + step).min(self.ceiling);
        SearchPhase::Bracketing { lower, step }
    }

    fn bisect(&mut self, lower: f64, upper: f64) -> SearchPhase {
        let mid = 0.5 * (lower + upper);
        if upper - lower <= self.tolerance * mid.abs().max(1.0) {
            return SearchPhase::Done(mid);
        }
        self.trial = mid;
        SearchPhase::Bisecting { lower, upper }
    }

    /// Drive the search to completion with an index function
    pub fn run<F>(mut self, mut index: F) -> Result<f64>
    where
        F: FnMut(f64) -> Result<usize>,
    {
        while let Some(energy) = self.trial() {
            let value = index(energy)?;
            self.advance(value);
        }

        match self.phase {
            SearchPhase::Done(energy) => Ok(energy),
            SearchPhase::Failed(message) => Err(AtomError::convergence(message)),
            _ => Err(AtomError::convergence("Eigenvalue search stopped early")),
        }
    }
}
