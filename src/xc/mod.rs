/*
MIT License

Copyright (c) 2025 Ameyanagi
*/

//! Exchange-correlation adapter
//!
//! The exchange-correlation functional library is an external collaborator.
//! The core only talks to it through the [`XcAdapter`] trait, which maps a
//! density (and optionally its radial gradient) to an energy density and a
//! potential. [`BuiltinXc`] is a small reference adapter covering the local
//! density approximation; other libraries plug in by implementing the trait.

mod builtin;

pub use builtin::{
    pw92_correlation, pz81_correlation, slater_exchange, BuiltinXc, CORRELATION_PW92,
    CORRELATION_PZ81, EXCHANGE_SLATER,
};

use crate::utils::errors::{AtomError, Result};
use ndarray::{Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};

/// Identifier meaning "no functional"
pub const NO_FUNCTIONAL: &str = "none";

/// Output of a functional evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct XcOutput {
    /// Energy per unit volume at each grid point
    pub energy_density: Array1<f64>,
    /// Potential per spin channel (rows) at each grid point
    pub potential: Array2<f64>,
}

impl XcOutput {
    /// Zero output for `n_spin` channels on `n_points` grid points
    pub fn zeros(n_spin: usize, n_points: usize) -> Self {
        Self {
            energy_density: Array1::zeros(n_points),
            potential: Array2::zeros((n_spin, n_points)),
        }
    }
}

/// Capability that evaluates exchange-correlation functionals
///
/// Implementations must be pure: the same input always yields the same
/// output, and no state is carried between calls.
pub trait XcAdapter: Send + Sync {
    /// Whether the functional can be evaluated for the given spin treatment
    fn is_available(&self, functional: &str, spin_polarized: bool) -> bool;

    /// Whether the functional depends on the density gradient
    fn requires_gradient(&self, _functional: &str) -> bool {
        false
    }

    /// Evaluate the functional
    ///
    /// `density` has one row per spin channel. `gradient`, when supplied, has
    /// the same shape and holds `dρ/dr`.
    fn evaluate(
        &self,
        functional: &str,
        density: ArrayView2<f64>,
        gradient: Option<ArrayView2<f64>>,
    ) -> Result<XcOutput>;
}

/// Exchange and correlation functional identifiers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XcFunctionals {
    /// Exchange functional id
    pub exchange: String,
    /// Correlation functional id
    pub correlation: String,
}

impl Default for XcFunctionals {
    fn default() -> Self {
        Self {
            exchange: EXCHANGE_SLATER.to_string(),
            correlation: CORRELATION_PW92.to_string(),
        }
    }
}

impl XcFunctionals {
    /// No exchange-correlation at all
    pub fn none() -> Self {
        Self {
            exchange: NO_FUNCTIONAL.to_string(),
            correlation: NO_FUNCTIONAL.to_string(),
        }
    }

    /// Functional ids that are actually evaluated
    pub fn active(&self) -> impl Iterator<Item = &str> {
        [self.exchange.as_str(), self.correlation.as_str()]
            .into_iter()
            .filter(|id| !id.eq_ignore_ascii_case(NO_FUNCTIONAL))
    }

    /// Check every active functional against the adapter
    pub fn validate(&self, adapter: &dyn XcAdapter, spin_polarized: bool) -> Result<()> {
        for id in self.active() {
            if !adapter.is_available(id, spin_polarized) {
                return Err(AtomError::Configuration(format!(
                    "Exchange-correlation functional '{}' is unavailable{}",
                    id,
                    if spin_polarized {
                        " for spin-polarized densities"
                    } else {
                        ""
                    }
                )));
            }
        }
        Ok(())
    }

    /// Whether any active functional needs the density gradient
    pub fn requires_gradient(&self, adapter: &dyn XcAdapter) -> bool {
        self.active().any(|id| adapter.requires_gradient(id))
    }

    /// Evaluate and sum all active functionals
    pub fn evaluate(
        &self,
        adapter: &dyn XcAdapter,
        density: ArrayView2<f64>,
        gradient: Option<ArrayView2<f64>>,
    ) -> Result<XcOutput> {
        let (n_spin, n_points) = density.dim();
        let mut total = XcOutput::zeros(n_spin, n_points);

        for id in self.active() {
            let out = adapter.evaluate(id, density, gradient)?;
            if out.energy_density.len() != n_points || out.potential.dim() != (n_spin, n_points) {
                return Err(AtomError::Numerical(format!(
                    "Functional '{}' returned arrays of mismatched shape",
                    id
                )));
            }
            total.energy_density += &out.energy_density;
            total.potential += &out.potential;
        }

        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_skips_none() {
        let functionals = XcFunctionals {
            exchange: "lda_x".to_string(),
            correlation: "None".to_string(),
        };
        let active: Vec<&str> = functionals.active().collect();
        assert_eq!(active, vec!["lda_x"]);
        assert_eq!(XcFunctionals::none().active().count(), 0);
    }

    #[test]
    fn test_validate_reports_unknown_functional() {
        let functionals = XcFunctionals {
            exchange: "gga_x_pbe".to_string(),
            correlation: NO_FUNCTIONAL.to_string(),
        };
        let err = functionals.validate(&BuiltinXc, false).unwrap_err();
        assert!(err.is_configuration());
    }
}
