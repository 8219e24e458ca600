/*
MIT License

Copyright (c) 2025 Ameyanagi
*/

//! Kohn-Sham orbitals indexed by spin, angular momentum and node count

use crate::utils::errors::{AtomError, Result};
use ndarray::{s, Array3, Array4, ArrayView1, ArrayView3};

const ORBITAL_LETTERS: [char; 7] = ['s', 'p', 'd', 'f', 'g', 'h', 'i'];

/// Identity of a bound orbital
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OrbitalId {
    /// Spin channel index
    pub spin: usize,
    /// Angular momentum quantum number
    pub l: usize,
    /// Number of radial nodes
    pub nodes: usize,
}

impl OrbitalId {
    /// Principal quantum number `n = nodes + l + 1`
    pub fn principal(&self) -> usize {
        self.nodes + self.l + 1
    }

    /// Spectroscopic label, e.g. `2p`
    pub fn label(&self) -> String {
        match ORBITAL_LETTERS.get(self.l) {
            Some(letter) => format!("{}{}", self.principal(), letter),
            None => format!("{}l{}", self.principal(), self.l),
        }
    }
}

/// Single normalised eigenstate of one channel
#[derive(Debug, Clone)]
pub struct Orbital {
    /// Identity of the state
    pub id: OrbitalId,
    /// Eigenvalue in Hartree
    pub eigenvalue: f64,
    /// Radial function `R(r)` with `∫ R² r² dr = 1`
    pub radial: Vec<f64>,
}

/// All orbitals of one SCF cycle
///
/// Eigenvalues are stored as `[spin, l, nodes]` and radial functions as
/// `[spin, l, nodes, grid]`.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitalSet {
    eigenvalues: Array3<f64>,
    radial: Array4<f64>,
}

impl OrbitalSet {
    /// Assemble a set from the states of every channel
    pub fn from_orbitals(
        n_spin: usize,
        lmax: usize,
        nmax: usize,
        n_points: usize,
        orbitals: impl IntoIterator<Item = Orbital>,
    ) -> Result<Self> {
        let mut eigenvalues = Array3::from_elem((n_spin, lmax, nmax), f64::NAN);
        let mut radial = Array4::zeros((n_spin, lmax, nmax, n_points));

        for orbital in orbitals {
            let OrbitalId { spin, l, nodes } = orbital.id;
            if spin >= n_spin || l >= lmax || nodes >= nmax || orbital.radial.len() != n_points {
                return Err(AtomError::Numerical(format!(
                    "Orbital {} (spin {}) does not fit the orbital set",
                    orbital.id.label(),
                    spin
                )));
            }
            eigenvalues[[spin, l, nodes]] = orbital.eigenvalue;
            radial
                .slice_mut(s![spin, l, nodes, ..])
                .assign(&ArrayView1::from(&orbital.radial[..]));
        }

        if eigenvalues.iter().any(|e| !e.is_finite()) {
            return Err(AtomError::Numerical(
                "Orbital set is missing eigenvalues".to_string(),
            ));
        }

        Ok(Self { eigenvalues, radial })
    }

    /// Number of spin channels
    pub fn n_spin(&self) -> usize {
        self.eigenvalues.dim().0
    }

    /// Number of angular momentum channels
    pub fn lmax(&self) -> usize {
        self.eigenvalues.dim().1
    }

    /// Number of states per channel
    pub fn nmax(&self) -> usize {
        self.eigenvalues.dim().2
    }

    /// Eigenvalues as `[spin, l, nodes]`
    pub fn eigenvalues(&self) -> ArrayView3<'_, f64> {
        self.eigenvalues.view()
    }

    /// Eigenvalue of one state
    pub fn eigenvalue(&self, id: OrbitalId) -> f64 {
        self.eigenvalues[[id.spin, id.l, id.nodes]]
    }

    /// Radial function of one state
    pub fn radial(&self, id: OrbitalId) -> ArrayView1<'_, f64> {
        self.radial.slice(s![id.spin, id.l, id.nodes, ..])
    }

    /// Every state in `[spin, l, nodes]` order
    pub fn ids(&self) -> impl Iterator<Item = OrbitalId> {
        let (n_spin, lmax, nmax) = self.eigenvalues.dim();
        (0..n_spin).flat_map(move |spin| {
            (0..lmax).flat_map(move |l| (0..nmax).map(move |nodes| OrbitalId { spin, l, nodes }))
        })
    }
}
