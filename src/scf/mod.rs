/*
MIT License

Copyright (c) 2025 Ameyanagi
*/

//! Self-consistent field (SCF) calculation
//!
//! The driver iterates potential construction, the eigensolve, occupation and
//! density construction until the free energy, the density and the electron
//! count have all settled for a configurable number of consecutive
//! iterations.

mod driver;
mod mixer;
mod state;

pub use driver::{ScfDriver, ScfOutcome, ScfSettings};
pub use mixer::{Mixer, MixerState, MixingMethod};
pub use state::{ConvergenceRecord, ConvergenceTolerances, IterationResidual, ScfPhase, ScfState};
