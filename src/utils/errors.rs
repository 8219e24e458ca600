/*
MIT License

Copyright (c) 2025 Ameyanagi
*/

//! Error types for the average-atom calculation

use crate::density::Density;
use crate::scf::ConvergenceRecord;
use thiserror::Error;

/// A specialized Result type for average-atom operations
pub type Result<T> = std::result::Result<T, AtomError>;

/// Errors raised by the average-atom model
#[derive(Error, Debug, Clone)]
pub enum AtomError {
    /// Invalid or physically inconsistent input, raised before iteration begins
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Non-finite or invariant-violating intermediate values
    #[error("Numerical error: {0}")]
    Numerical(String),

    /// A root search or the SCF loop exhausted its budget
    #[error("Convergence error: {}", .0.message)]
    Convergence(Box<ConvergenceFailure>),
}

impl AtomError {
    /// Convergence failure without residual history, used by the inner
    /// root searches
    pub fn convergence(message: impl Into<String>) -> Self {
        AtomError::Convergence(Box::new(ConvergenceFailure {
            message: message.into(),
            record: ConvergenceRecord::default(),
            last_density: None,
            cause: None,
        }))
    }

    /// Whether this is a configuration error
    pub fn is_configuration(&self) -> bool {
        matches!(self, AtomError::Configuration(_))
    }

    /// Whether this is a numerical error
    pub fn is_numerical(&self) -> bool {
        matches!(self, AtomError::Numerical(_))
    }

    /// Whether this is a convergence error
    pub fn is_convergence(&self) -> bool {
        matches!(self, AtomError::Convergence(_))
    }
}

/// Diagnostic state attached to a convergence error
#[derive(Debug, Clone)]
pub struct ConvergenceFailure {
    /// Description of what failed to converge
    pub message: String,
    /// Residual trace up to the failure
    pub record: ConvergenceRecord,
    /// Last density of the SCF loop, if the failure happened there
    pub last_density: Option<Density>,
    /// Error that stopped an SCF iteration midway
    pub cause: Option<Box<AtomError>>,
}

impl ConvergenceFailure {
    /// Last combined residual, if any iteration completed
    pub fn last_residual(&self) -> Option<f64> {
        self.record.last().map(|r| r.combined)
    }
}
