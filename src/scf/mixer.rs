/*
MIT License

Copyright (c) 2025 Ameyanagi
*/

//! Density mixing
//!
//! The mixer blends the density that generated the current potential with
//! the density the potential produced. It is a small state machine: the first
//! density passes through untouched, later ones are mixed, and once the SCF
//! loop has converged it keeps mixing but no longer matters.

use crate::utils::errors::{AtomError, Result};
use faer::prelude::Solve;
use faer::{Col, Mat};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Relative pivot size below which the Pulay system is treated as singular
const PULAY_SINGULAR_THRESHOLD: f64 = 1.0e-12;

/// Mixing scheme
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "lowercase")]
pub enum MixingMethod {
    /// `ρ = α ρ_new + (1 - α) ρ_old`
    Linear {
        /// Fraction of the new density
        fraction: f64,
    },
    /// Pulay (DIIS) extrapolation over a bounded history
    Pulay {
        /// Fraction of the extrapolated residual added back
        fraction: f64,
        /// Number of past iterates kept
        history: usize,
    },
}

impl Default for MixingMethod {
    fn default() -> Self {
        MixingMethod::Linear { fraction: 0.3 }
    }
}

impl MixingMethod {
    /// Mixing fraction
    pub fn fraction(&self) -> f64 {
        match *self {
            MixingMethod::Linear { fraction } | MixingMethod::Pulay { fraction, .. } => fraction,
        }
    }

    /// Check the fraction lies in `(0, 1]`
    pub fn validate(&self) -> Result<()> {
        let fraction = self.fraction();
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(AtomError::Configuration(format!(
                "Mixing fraction must lie in (0, 1], got {}",
                fraction
            )));
        }
        Ok(())
    }
}

/// Lifecycle of a mixer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixerState {
    /// No density seen yet; the next one is returned unmixed
    ColdStart,
    /// Mixing every new density
    Mixing,
    /// The SCF loop has converged
    Converged,
}

/// Density mixer with its history buffer
#[derive(Debug, Clone)]
pub struct Mixer {
    method: MixingMethod,
    state: MixerState,
    inputs: VecDeque<Vec<f64>>,
    residuals: VecDeque<Vec<f64>>,
}

impl Mixer {
    /// New mixer in the cold-start state
    pub fn new(method: MixingMethod) -> Result<Self> {
        method.validate()?;
        Ok(Self {
            method,
            state: MixerState::ColdStart,
            inputs: VecDeque::new(),
            residuals: VecDeque::new(),
        })
    }

    /// Mixing scheme
    pub fn method(&self) -> MixingMethod {
        self.method
    }

    /// Current state
    pub fn state(&self) -> MixerState {
        self.state
    }

    /// Number of stored iterates
    pub fn history_len(&self) -> usize {
        self.inputs.len()
    }

    /// Forget the history and return to the cold-start state
    pub fn reset(&mut self) {
        self.inputs.clear();
        self.residuals.clear();
        self.state = MixerState::ColdStart;
    }

    /// Record that the SCF loop has converged
    pub fn mark_converged(&mut self) {
        self.state = MixerState::Converged;
    }

    /// Mix `old` (input of the last cycle) with `new` (its output)
    ///
    /// `metric` holds the integration weight of every component and is used
    /// for the Pulay residual overlaps.
    pub fn mix(&mut self, old: &[f64], new: &[f64], metric: &[f64]) -> Result<Vec<f64>> {
        if old.len() != new.len() || old.len() != metric.len() {
            return Err(AtomError::Numerical(format!(
                "Mismatch in density array sizes ({}, {}, {})",
                old.len(),
                new.len(),
                metric.len()
            )));
        }

        let history = match self.method {
            MixingMethod::Pulay { history, .. } => history,
            MixingMethod::Linear { .. } => 0,
        };
        if history > 0 {
            self.inputs.push_back(old.to_vec());
            self.residuals
                .push_back(new.iter().zip(old).map(|(n, o)| n - o).collect());
            while self.inputs.len() > history {
                self.inputs.pop_front();
                self.residuals.pop_front();
            }
        }

        if self.state == MixerState::ColdStart {
            self.state = MixerState::Mixing;
            return Ok(new.to_vec());
        }

        let fraction = self.method.fraction();
        if self.inputs.len() < 2 {
            return Ok(linear(old, new, fraction));
        }

        match self.pulay(fraction, metric) {
            Some(mixed) if mixed.iter().all(|v| v.is_finite() && *v >= 0.0) => Ok(mixed),
            Some(_) => {
                log::warn!("Pulay extrapolation produced a negative density, using linear mixing");
                Ok(linear(old, new, fraction))
            }
            None => {
                log::warn!("Pulay system is singular, using linear mixing");
                Ok(linear(old, new, fraction))
            }
        }
    }

    /// DIIS step: minimise the weighted norm of `Σ c_i R_i` with `Σ c_i = 1`
    fn pulay(&self, fraction: f64, metric: &[f64]) -> Option<Vec<f64>> {
        let n_hist = self.residuals.len();
        let size = n_hist + 1;

        let mut overlaps = Mat::<f64>::zeros(size, size);
        for i in 0..n_hist {
            for j in 0..=i {
                let dot: f64 = self.residuals[i]
                    .iter()
                    .zip(&self.residuals[j])
                    .zip(metric)
                    .map(|((a, b), w)| w * a * b)
                    .sum();
                overlaps[(i, j)] = dot;
                overlaps[(j, i)] = dot;
            }
        }

        // scale so the pivot threshold is relative
        let scale = (0..n_hist)
            .map(|i| overlaps[(i, i)].abs())
            .fold(0.0, f64::max);
        if scale <= 0.0 || !scale.is_finite() {
            return None;
        }
        for i in 0..n_hist {
            for j in 0..n_hist {
                overlaps[(i, j)] /= scale;
            }
            overlaps[(i, n_hist)] = 1.0;
            overlaps[(n_hist, i)] = 1.0;
        }

        let mut rhs = vec![0.0; size];
        rhs[n_hist] = 1.0;

        let coefficients = solve_pivoted(overlaps, rhs)?;

        let n = metric.len();
        let mut mixed = vec![0.0; n];
        for (c, (input, residual)) in coefficients
            .iter()
            .take(n_hist)
            .zip(self.inputs.iter().zip(&self.residuals))
        {
            for k in 0..n {
                mixed[k] += c * (input[k] + fraction * residual[k]);
            }
        }
        Some(mixed)
    }
}

fn linear(old: &[f64], new: &[f64], fraction: f64) -> Vec<f64> {
    old.iter()
        .zip(new)
        .map(|(o, n)| fraction * n + (1.0 - fraction) * o)
        .collect()
}

/// LU solve with partial pivoting, `None` if a pivot vanishes
fn solve_pivoted(a: Mat<f64>, b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    let lu = a.partial_piv_lu();
    let u = lu.U();
    if (0..n).any(|i| u[(i, i)].abs() < PULAY_SINGULAR_THRESHOLD) {
        return None;
    }

    let rhs = Col::from_fn(n, |i| b[i]);
    let x = lu.solve(&rhs);
    let x: Vec<f64> = (0..n).map(|i| x[i]).collect();
    x.iter().all(|v| v.is_finite()).then_some(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_solve_pivoted() {
        // needs a row swap: [[0, 1], [1, 1]] x = [1, 3] -> x = [2, 1]
        let a = Mat::from_fn(2, 2, |i, j| [[0.0, 1.0], [1.0, 1.0]][i][j]);
        let x = solve_pivoted(a, vec![1.0, 3.0]).unwrap();
        assert_relative_eq!(x[0], 2.0);
        assert_relative_eq!(x[1], 1.0);

        let singular = Mat::from_fn(2, 2, |_, _| 1.0);
        assert!(solve_pivoted(singular, vec![1.0, 1.0]).is_none());
    }

    #[test]
    fn test_linear_combination() {
        let mixed = linear(&[1.0, 2.0], &[3.0, 4.0], 0.25);
        assert_relative_eq!(mixed[0], 1.5);
        assert_relative_eq!(mixed[1], 2.5);
    }

    #[test]
    fn test_fraction_validation() {
        assert!(Mixer::new(MixingMethod::Linear { fraction: 0.0 }).is_err());
        assert!(Mixer::new(MixingMethod::Linear { fraction: 1.5 }).is_err());
        assert!(Mixer::new(MixingMethod::Pulay { fraction: 0.5, history: 4 }).is_ok());
    }
}
