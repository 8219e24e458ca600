/*
MIT License

Copyright (c) 2025 Ameyanagi
*/

//! Potential calculation module
//!
//! Maps a spin-resolved density to the Kohn-Sham potential
//! `v_s = v_en + v_H + v_xc` on the radial grid.

mod builder;

pub use builder::{Potential, PotentialBuilder};
