/*
MIT License

Copyright (c) 2025 Ameyanagi
*/

//! Electron density of the average atom
//!
//! The density is split per spin into a bound part sampled on the grid and a
//! uniform unbound part. Both are kept so that mixing can act on them
//! together while energies can still tell them apart.

use crate::grid::RadialGrid;
use crate::occupation::OccupationSet;
use crate::solver::OrbitalSet;
use crate::utils::errors::{AtomError, Result};
use ndarray::{Array1, Array2, Axis};
use std::f64::consts::PI;

/// Spin-resolved electron density
#[derive(Debug, Clone, PartialEq)]
pub struct Density {
    bound: Array2<f64>,
    unbound: Array1<f64>,
}

impl Density {
    /// Density from a bound part `[spin, grid]` and a uniform unbound part per spin
    ///
    /// Fails with a numerical error if any value is negative or non-finite.
    pub fn new(bound: Array2<f64>, unbound: Array1<f64>) -> Result<Self> {
        if bound.nrows() != unbound.len() || bound.nrows() == 0 || bound.nrows() > 2 {
            return Err(AtomError::Numerical(format!(
                "Density with {} bound rows and {} unbound values",
                bound.nrows(),
                unbound.len()
            )));
        }
        if let Some(((spin, i), value)) = bound
            .indexed_iter()
            .find(|(_, v)| !v.is_finite() || **v < 0.0)
        {
            return Err(AtomError::Numerical(format!(
                "Density is {} at grid point {} (spin {})",
                value, i, spin
            )));
        }
        if let Some(value) = unbound.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(AtomError::Numerical(format!(
                "Unbound density is {}",
                value
            )));
        }
        Ok(Self { bound, unbound })
    }

    /// Purely bound density with no unbound part
    pub fn from_bound(bound: Array2<f64>) -> Result<Self> {
        let n_spin = bound.nrows();
        Self::new(bound, Array1::zeros(n_spin))
    }

    /// Number of spin channels
    pub fn n_spin(&self) -> usize {
        self.bound.nrows()
    }

    /// Number of grid points
    pub fn len(&self) -> usize {
        self.bound.ncols()
    }

    /// Whether the density has no grid points
    pub fn is_empty(&self) -> bool {
        self.bound.ncols() == 0
    }

    /// Bound density `[spin, grid]`
    pub fn bound(&self) -> &Array2<f64> {
        &self.bound
    }

    /// Uniform unbound density per spin
    pub fn unbound(&self) -> &Array1<f64> {
        &self.unbound
    }

    /// Total density `[spin, grid]`
    pub fn total(&self) -> Array2<f64> {
        let mut total = self.bound.clone();
        for (mut row, &u) in total.outer_iter_mut().zip(self.unbound.iter()) {
            row += u;
        }
        total
    }

    /// Total density summed over spins
    pub fn spin_summed(&self) -> Array1<f64> {
        self.total().sum_axis(Axis(0))
    }

    /// Electron count per spin
    pub fn electron_count(&self, grid: &RadialGrid) -> Array1<f64> {
        self.total()
            .outer_iter()
            .map(|row| grid.integrate(&row.to_vec()))
            .collect()
    }

    /// Total electron count
    pub fn total_electrons(&self, grid: &RadialGrid) -> f64 {
        self.electron_count(grid).sum()
    }

    /// `Σ_σ ∫ |ρ_σ - ρ'_σ| dV`
    pub fn distance(&self, other: &Density, grid: &RadialGrid) -> Result<f64> {
        if self.bound.dim() != other.bound.dim() {
            return Err(AtomError::Numerical(format!(
                "Cannot compare densities of shapes {:?} and {:?}",
                self.bound.dim(),
                other.bound.dim()
            )));
        }
        let difference = (self.total() - other.total()).mapv(f64::abs);
        Ok(difference
            .outer_iter()
            .map(|row| grid.integrate(&row.to_vec()))
            .sum())
    }

    /// Flatten into `[bound spin 0, .., bound spin n, unbound]` for mixing
    pub fn to_vector(&self) -> Vec<f64> {
        self.bound
            .iter()
            .chain(self.unbound.iter())
            .copied()
            .collect()
    }

    /// Inverse of [`Density::to_vector`]
    pub fn from_vector(n_spin: usize, n_points: usize, values: &[f64]) -> Result<Self> {
        if values.len() != n_spin * (n_points + 1) {
            return Err(AtomError::Numerical(format!(
                "Vector of length {} cannot hold {} spin channels of {} points",
                values.len(),
                n_spin,
                n_points
            )));
        }
        let (bound, unbound) = values.split_at(n_spin * n_points);
        let bound = Array2::from_shape_vec((n_spin, n_points), bound.to_vec())
            .map_err(|e| AtomError::Numerical(e.to_string()))?;
        Self::new(bound, Array1::from(unbound.to_vec()))
    }

    /// Integration weights matching [`Density::to_vector`]
    pub fn mixing_metric(grid: &RadialGrid, n_spin: usize) -> Vec<f64> {
        let mut metric = Vec::with_capacity(n_spin * (grid.len() + 1));
        for _ in 0..n_spin {
            metric.extend_from_slice(grid.weights());
        }
        metric.extend(std::iter::repeat(grid.volume()).take(n_spin));
        metric
    }
}

/// Build the density from occupied orbitals
///
/// `ρ_σ(r) = Σ occ |R(r)|² / 4π` plus the uniform unbound density of each
/// spin channel.
pub fn construct_density(
    grid: &RadialGrid,
    orbitals: &OrbitalSet,
    occupations: &OccupationSet,
) -> Result<Density> {
    let n_spin = orbitals.n_spin();
    let mut bound = Array2::zeros((n_spin, grid.len()));

    for id in orbitals.ids() {
        let occupation = occupations.occupation(id);
        if occupation == 0.0 {
            continue;
        }
        let radial = orbitals.radial(id);
        let mut row = bound.row_mut(id.spin);
        row.zip_mut_with(&radial, |rho, r| *rho += occupation * r * r / (4.0 * PI));
    }

    Density::new(bound, occupations.unbound_density().to_owned())
}
