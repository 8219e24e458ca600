/*
MIT License

Copyright (c) 2025 Ameyanagi
*/

//! Radial Kohn-Sham eigensolver
//!
//! Every `(spin, l)` channel is solved independently by Numerov shooting. The
//! radial function is integrated in the uniform grid coordinate:
//!
//! * logarithmic grid: `P = r^{1/2} R`, `P'' = [2r²(v - ε) + (l + 1/2)²] P`
//! * uniform grid: `u = r R`, `u'' = [2(v - ε) + l(l + 1)/r²] u`
//!
//! Eigenvalues are located with a generalised Sturm index that combines the
//! number of nodes with the boundary condition at the sphere radius, so both
//! Dirichlet and Neumann problems reduce to finding the lowest energy at
//! which the index reaches a threshold.

mod numerov;
mod orbitals;
mod search;

pub use numerov::{
    matched_solution, numerov_coefficients, numerov_integration, regular_origin, sturm_index,
    InwardStart,
};
pub use orbitals::{Orbital, OrbitalId, OrbitalSet};
pub use search::{EigenSearch, SearchPhase};

use crate::grid::{GridType, RadialGrid};
use crate::utils::errors::{AtomError, Result};
use ndarray::{ArrayView1, ArrayView2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Default relative tolerance on eigenvalues
pub const DEFAULT_EIGEN_TOLERANCE: f64 = 1.0e-10;

/// Default limit on Sturm evaluations per eigenvalue
pub const DEFAULT_EIGEN_ITERATIONS: usize = 500;

/// Lowest upper edge of the default eigenvalue window in Hartree
pub const DEFAULT_WINDOW_CEILING: f64 = 1.0e4;

/// Boundary condition on the radial functions at the sphere radius
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryCondition {
    /// `R(R_ws) = 0`
    #[default]
    Dirichlet,
    /// `dR/dr (R_ws) = 0`
    Neumann,
}

impl BoundaryCondition {
    /// Sturm index at which the state with `nodes` nodes appears
    pub fn threshold(&self, nodes: usize) -> usize {
        match self {
            BoundaryCondition::Dirichlet => 2 * nodes + 2,
            BoundaryCondition::Neumann => 2 * nodes + 1,
        }
    }
}

/// One radial equation `y'' = -k² y` for a fixed channel
struct RadialEquation<'a> {
    grid: &'a RadialGrid,
    potential: &'a [f64],
    l: usize,
}

impl RadialEquation<'_> {
    fn k_squared(&self, energy: f64) -> Vec<f64> {
        let l = self.l as f64;
        self.grid
            .radii()
            .iter()
            .zip(self.potential)
            .map(|(&r, &v)| match self.grid.grid_type() {
                GridType::Logarithmic => -(2.0 * r * r * (v - energy) + (l + 0.5).powi(2)),
                GridType::Uniform => 2.0 * (energy - v) - l * (l + 1.0) / (r * r),
            })
            .collect()
    }

    /// First two values of the regular solution, `y ∝ r^p`, from `origin` on
    fn start(&self, origin: usize) -> (f64, f64) {
        let radii = self.grid.radii();
        let power = match self.grid.grid_type() {
            GridType::Logarithmic => self.l as f64 + 0.5,
            GridType::Uniform => self.l as f64 + 1.0,
        };
        ((radii[origin] / radii[origin + 1]).powf(power), 1.0)
    }

    /// Value of `y'/y` (in the grid coordinate) for `dR/dr = 0`
    fn robin(&self) -> f64 {
        match self.grid.grid_type() {
            GridType::Logarithmic => 0.5,
            GridType::Uniform => 1.0 / self.grid.radius(),
        }
    }

    fn sturm_index(&self, energy: f64) -> Result<usize> {
        let coefficients = numerov_coefficients(&self.k_squared(energy), self.grid.step());
        let origin = regular_origin(&coefficients);
        if origin + 3 > coefficients.len() {
            return Ok(0);
        }
        sturm_index(
            &coefficients[origin..],
            self.start(origin),
            self.grid.step(),
            self.robin(),
        )
    }

    /// Normalised `R(r)` at a converged eigenvalue
    fn radial_function(&self, energy: f64, boundary: BoundaryCondition) -> Result<Vec<f64>> {
        let k_squared = self.k_squared(energy);
        let coefficients = numerov_coefficients(&k_squared, self.grid.step());
        let inward = match boundary {
            BoundaryCondition::Dirichlet => InwardStart::Node,
            BoundaryCondition::Neumann => InwardStart::Robin(self.robin()),
        };
        let origin = regular_origin(&coefficients);
        if origin + 5 > coefficients.len() {
            return Err(AtomError::Numerical(format!(
                "No usable grid for the l = {} orbital at E = {}",
                self.l, energy
            )));
        }
        let mut y = vec![0.0; origin];
        y.extend(matched_solution(
            &coefficients[origin..],
            &k_squared[origin..],
            self.start(origin),
            self.grid.step(),
            inward,
        )?);

        let mut radial: Vec<f64> = y
            .iter()
            .zip(self.grid.radii())
            .map(|(&y, &r)| match self.grid.grid_type() {
                GridType::Logarithmic => y / r.sqrt(),
                GridType::Uniform => y / r,
            })
            .collect();

        let squared: Vec<f64> = radial.iter().map(|r| r * r).collect();
        let norm = self.grid.integrate(&squared) / (4.0 * PI);
        if !norm.is_finite() || norm <= 0.0 {
            return Err(AtomError::Numerical(format!(
                "Cannot normalise l = {} orbital at E = {} (norm {})",
                self.l, energy, norm
            )));
        }
        let scale = norm.sqrt().recip();
        radial.iter_mut().for_each(|r| *r *= scale);

        Ok(radial)
    }
}

/// Shooting eigensolver for all `(spin, l)` channels
#[derive(Debug, Clone, PartialEq)]
pub struct Eigensolver {
    nmax: usize,
    lmax: usize,
    boundary: BoundaryCondition,
    window: (f64, f64),
    tolerance: f64,
    max_iterations: usize,
}

impl Eigensolver {
    /// Solver for `nmax` states in each of the channels `l = 0..lmax`
    pub fn new(nmax: usize, lmax: usize, boundary: BoundaryCondition, window: (f64, f64)) -> Result<Self> {
        if nmax == 0 || lmax == 0 {
            return Err(AtomError::Configuration(format!(
                "Eigensolver needs at least one state and one channel (nmax = {}, lmax = {})",
                nmax, lmax
            )));
        }
        if !window.0.is_finite() || !window.1.is_finite() || window.0 >= window.1 {
            return Err(AtomError::Configuration(format!(
                "Invalid eigenvalue search window [{}, {}]",
                window.0, window.1
            )));
        }
        Ok(Self {
            nmax,
            lmax,
            boundary,
            window,
            tolerance: DEFAULT_EIGEN_TOLERANCE,
            max_iterations: DEFAULT_EIGEN_ITERATIONS,
        })
    }

    /// Search window wide enough for any screened potential of nuclear charge
    /// `z` confined to a sphere of `radius`
    ///
    /// The ceiling covers at least twice the kinetic energy `(kπ/R)²/2` of the
    /// highest requested state, `k = nmax + lmax`, so small spheres stay
    /// bracketed.
    pub fn default_window(nuclear_charge: f64, radius: f64, nmax: usize, lmax: usize) -> (f64, f64) {
        let z = nuclear_charge.abs();
        let confinement = ((nmax + lmax) as f64 * PI / radius).powi(2);
        (-(z * z + 10.0 * z + 10.0), confinement.max(DEFAULT_WINDOW_CEILING))
    }

    /// Set the relative eigenvalue tolerance
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the evaluation limit per eigenvalue
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// States per channel
    pub fn nmax(&self) -> usize {
        self.nmax
    }

    /// Number of angular momentum channels
    pub fn lmax(&self) -> usize {
        self.lmax
    }

    /// Boundary condition
    pub fn boundary(&self) -> BoundaryCondition {
        self.boundary
    }

    /// Eigenvalue search window
    pub fn window(&self) -> (f64, f64) {
        self.window
    }

    /// Solve every channel of a potential with one row per spin
    ///
    /// Channels are solved in parallel; the first failing channel aborts the
    /// whole solve.
    pub fn solve(&self, grid: &RadialGrid, potential: ArrayView2<f64>) -> Result<OrbitalSet> {
        let (n_spin, n_points) = potential.dim();
        if n_points != grid.len() {
            return Err(AtomError::Numerical(format!(
                "Potential of length {} does not match grid of {} points",
                n_points,
                grid.len()
            )));
        }

        let rows: Vec<Vec<f64>> = potential.outer_iter().map(|row| row.to_vec()).collect();
        let channels: Vec<(usize, usize)> = (0..n_spin)
            .flat_map(|spin| (0..self.lmax).map(move |l| (spin, l)))
            .collect();

        let solved = channels
            .par_iter()
            .map(|&(spin, l)| self.solve_channel(grid, ArrayView1::from(&rows[spin][..]), spin, l))
            .collect::<Result<Vec<Vec<Orbital>>>>()?;

        OrbitalSet::from_orbitals(
            n_spin,
            self.lmax,
            self.nmax,
            grid.len(),
            solved.into_iter().flatten(),
        )
    }

    /// The `nmax` lowest states of one channel, in order of node count
    pub fn solve_channel(
        &self,
        grid: &RadialGrid,
        potential: ArrayView1<f64>,
        spin: usize,
        l: usize,
    ) -> Result<Vec<Orbital>> {
        let potential = potential.to_vec();
        let equation = RadialEquation {
            grid,
            potential: &potential,
            l,
        };

        let mut orbitals = Vec::with_capacity(self.nmax);
        let mut lower = self.window.0;

        for nodes in 0..self.nmax {
            let search = EigenSearch::new(
                self.boundary.threshold(nodes),
                lower,
                self.window.1,
                self.tolerance,
                self.max_iterations,
            );
            let eigenvalue = search.run(|energy| equation.sturm_index(energy)).map_err(|e| {
                match e {
                    AtomError::Convergence(mut failure) => {
                        failure.message = format!(
                            "{} (spin {}, l = {}, {} nodes)",
                            failure.message, spin, l, nodes
                        );
                        AtomError::Convergence(failure)
                    }
                    other => other,
                }
            })?;
            let radial = equation.radial_function(eigenvalue, self.boundary)?;

            orbitals.push(Orbital {
                id: OrbitalId { spin, l, nodes },
                eigenvalue,
                radial,
            });
            lower = eigenvalue;
        }

        log::trace!(
            "Channel spin {} l {}: lowest eigenvalue {:.8}",
            spin,
            l,
            orbitals.first().map(|o| o.eigenvalue).unwrap_or(f64::NAN)
        );

        Ok(orbitals)
    }

    /// Sturm index of one channel at a trial energy
    pub fn sturm_index(&self, grid: &RadialGrid, potential: &[f64], l: usize, energy: f64) -> Result<usize> {
        RadialEquation { grid, potential, l }.sturm_index(energy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array2;

    fn coulomb(grid: &RadialGrid, z: f64) -> Array2<f64> {
        Array2::from_shape_fn((1, grid.len()), |(_, i)| -z / grid.radii()[i])
    }

    #[test]
    fn test_hydrogen_ground_state_log_grid() {
        let grid = RadialGrid::logarithmic(30.0, 2001, -10.0).unwrap();
        let solver = Eigensolver::new(2, 2, BoundaryCondition::Dirichlet, (-5.0, 100.0)).unwrap();
        let orbitals = solver.solve(&grid, coulomb(&grid, 1.0).view()).unwrap();

        let e1s = orbitals.eigenvalue(OrbitalId { spin: 0, l: 0, nodes: 0 });
        let e2s = orbitals.eigenvalue(OrbitalId { spin: 0, l: 0, nodes: 1 });
        let e2p = orbitals.eigenvalue(OrbitalId { spin: 0, l: 1, nodes: 0 });
        assert_relative_eq!(e1s, -0.5, epsilon = 1e-6);
        assert_relative_eq!(e2s, -0.125, epsilon = 1e-6);
        assert_relative_eq!(e2p, -0.125, epsilon = 1e-6);
    }

    #[test]
    fn test_hydrogen_orbital_is_normalised_and_nodeless() {
        let grid = RadialGrid::logarithmic(30.0, 2001, -10.0).unwrap();
        let solver = Eigensolver::new(1, 1, BoundaryCondition::Dirichlet, (-5.0, 100.0)).unwrap();
        let potential = coulomb(&grid, 1.0);
        let states = solver.solve_channel(&grid, potential.row(0), 0, 0).unwrap();
        let radial = &states[0].radial;

        let squared: Vec<f64> = radial.iter().map(|r| r * r).collect();
        assert_relative_eq!(grid.integrate(&squared) / (4.0 * PI), 1.0, epsilon = 1e-10);
        assert!(radial.iter().all(|r| *r >= -1e-12));

        // R_1s = 2 exp(-r)
        let i = grid.radii().iter().position(|&r| r > 1.0).unwrap();
        let r = grid.radii()[i];
        assert_relative_eq!(radial[i], 2.0 * (-r).exp(), max_relative = 1e-5);
    }

    #[test]
    fn test_uniform_grid_matches_log_grid() {
        let grid = RadialGrid::uniform(20.0, 8001, 1e-4).unwrap();
        let solver = Eigensolver::new(1, 1, BoundaryCondition::Dirichlet, (-5.0, 100.0)).unwrap();
        let orbitals = solver.solve(&grid, coulomb(&grid, 1.0).view()).unwrap();
        assert_relative_eq!(
            orbitals.eigenvalue(OrbitalId { spin: 0, l: 0, nodes: 0 }),
            -0.5,
            epsilon = 1e-4
        );
    }

    #[test]
    fn test_boundary_condition_orders_confined_levels() {
        // confinement raises the Dirichlet level and lowers the Neumann level
        let grid = RadialGrid::logarithmic(3.0, 1501, -10.0).unwrap();
        let potential = coulomb(&grid, 1.0);
        let solve = |boundary| {
            Eigensolver::new(1, 1, boundary, (-5.0, 100.0))
                .unwrap()
                .solve(&grid, potential.view())
                .unwrap()
                .eigenvalue(OrbitalId { spin: 0, l: 0, nodes: 0 })
        };
        let dirichlet = solve(BoundaryCondition::Dirichlet);
        let neumann = solve(BoundaryCondition::Neumann);
        assert!(dirichlet > -0.5);
        assert!(neumann < -0.5);
    }

    #[test]
    fn test_window_without_bracket_fails() {
        let grid = RadialGrid::logarithmic(10.0, 801, -10.0).unwrap();
        let solver = Eigensolver::new(1, 1, BoundaryCondition::Dirichlet, (-0.4, -0.1)).unwrap();
        let err = solver.solve(&grid, coulomb(&grid, 1.0).view()).unwrap_err();
        assert!(err.is_convergence());
    }

    #[test]
    fn test_default_window_reaches_confined_states() {
        let (lower, upper) = Eigensolver::default_window(1.0, 0.3, 20, 3);
        assert_eq!(lower, -21.0);
        assert!(upper > DEFAULT_WINDOW_CEILING);
        assert_eq!(Eigensolver::default_window(1.0, 5.0, 20, 3).1, DEFAULT_WINDOW_CEILING);

        let grid = RadialGrid::logarithmic(0.3, 1001, -10.0).unwrap();
        let solver = Eigensolver::new(20, 3, BoundaryCondition::Dirichlet, (lower, upper)).unwrap();
        let orbitals = solver.solve(&grid, coulomb(&grid, 1.0).view()).unwrap();
        let highest = orbitals.eigenvalue(OrbitalId { spin: 0, l: 2, nodes: 19 });
        assert!(highest > DEFAULT_WINDOW_CEILING && highest < upper, "{}", highest);
    }

    #[test]
    fn test_invalid_solver_settings() {
        assert!(Eigensolver::new(0, 1, BoundaryCondition::Dirichlet, (-1.0, 1.0)).is_err());
        assert!(Eigensolver::new(1, 1, BoundaryCondition::Dirichlet, (1.0, -1.0)).is_err());
    }
}
