/*
MIT License

Copyright (c) 2025 Ameyanagi
*/

//! Input handling
//!
//! A calculation is described by an [`AtomConfig`], usually read from a
//! JSON file. Every field has a default, so a file only needs to name what
//! differs from them:
//!
//! ```json
//! {
//!   "nuclear_charge": 13.0,
//!   "temperature": 10.0,
//!   "temperature_unit": "ev",
//!   "radius": 3.0
//! }
//! ```

mod config;

pub use config::{AtomConfig, EigensolverConfig, GridConfig, OccupationConfig, TemperatureUnit};
