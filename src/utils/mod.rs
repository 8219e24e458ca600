/*
MIT License

Copyright (c) 2025 Ameyanagi
*/

//! Utility functions for average-atom calculations
//!
//! This module provides the constants object, the crate error type and the
//! numerical helpers used throughout the code.

pub mod constants;
pub mod errors;
pub mod math;

pub use constants::PhysicalConstants;
pub use errors::{AtomError, ConvergenceFailure, Result};
