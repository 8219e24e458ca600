/*
MIT License

Copyright (c) 2025 Ameyanagi
*/

//! Radial grid module
//!
//! All field quantities of the average atom (densities, potentials, orbitals)
//! live on a single radial mesh spanning the ion sphere.

mod radial;

pub use radial::{GridType, RadialGrid, DEFAULT_LOG_X0, DEFAULT_UNIFORM_INNER_FRACTION};
