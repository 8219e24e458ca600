/*
MIT License

Copyright (c) 2025 Ameyanagi
*/

//! Kohn-Sham potential from a density

use crate::density::Density;
use crate::grid::RadialGrid;
use crate::utils::errors::{AtomError, Result};
use crate::xc::{XcAdapter, XcFunctionals, XcOutput};
use ndarray::{Array1, Array2, ArrayView1};
use std::fmt;
use std::sync::Arc;

/// Allowed relative deviation of `r·v(r)` from `-Z` at the innermost point
const NUCLEAR_LIMIT_TOLERANCE: f64 = 0.1;

/// Components of the Kohn-Sham potential on the grid
#[derive(Debug, Clone, PartialEq)]
pub struct Potential {
    /// Electron-nuclear attraction `-Z/r`
    pub nuclear: Array1<f64>,
    /// Hartree potential of the total density
    pub hartree: Array1<f64>,
    /// Exchange-correlation potential per spin
    pub xc: Array2<f64>,
    /// Total potential per spin
    pub total: Array2<f64>,
}

impl Potential {
    /// Number of spin channels
    pub fn n_spin(&self) -> usize {
        self.total.nrows()
    }

    /// Total potential of one spin channel
    pub fn channel(&self, spin: usize) -> ArrayView1<'_, f64> {
        self.total.row(spin)
    }
}

/// Builds `v_s = v_en + v_H + v_xc` from a density
#[derive(Clone)]
pub struct PotentialBuilder {
    nuclear_charge: f64,
    hartree: bool,
    functionals: XcFunctionals,
    xc: Arc<dyn XcAdapter>,
    gradient: bool,
}

impl fmt::Debug for PotentialBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PotentialBuilder")
            .field("nuclear_charge", &self.nuclear_charge)
            .field("hartree", &self.hartree)
            .field("functionals", &self.functionals)
            .field("gradient", &self.gradient)
            .finish()
    }
}

impl PotentialBuilder {
    /// Builder for a nucleus of charge `nuclear_charge`
    ///
    /// The functionals are checked against the adapter here, so an
    /// unavailable functional is reported before any iteration.
    pub fn new(
        nuclear_charge: f64,
        hartree: bool,
        functionals: XcFunctionals,
        xc: Arc<dyn XcAdapter>,
        spin_polarized: bool,
    ) -> Result<Self> {
        if !nuclear_charge.is_finite() || nuclear_charge <= 0.0 {
            return Err(AtomError::Configuration(format!(
                "Nuclear charge must be positive, got {}",
                nuclear_charge
            )));
        }
        functionals.validate(xc.as_ref(), spin_polarized)?;
        let gradient = functionals.requires_gradient(xc.as_ref());

        Ok(Self {
            nuclear_charge,
            hartree,
            functionals,
            xc,
            gradient,
        })
    }

    /// Nuclear charge
    pub fn nuclear_charge(&self) -> f64 {
        self.nuclear_charge
    }

    /// Whether the Hartree term is included
    pub fn includes_hartree(&self) -> bool {
        self.hartree
    }

    /// Whether the functionals receive the density gradient
    pub fn supplies_gradient(&self) -> bool {
        self.gradient
    }

    /// Nuclear attraction `-Z/r`
    pub fn nuclear(&self, grid: &RadialGrid) -> Array1<f64> {
        grid.radii().iter().map(|r| -self.nuclear_charge / r).collect()
    }

    /// Hartree potential `Q(r)/r + ∫_r^R 4πr'ρ(r') dr'` of a spin-summed density
    pub fn hartree(&self, grid: &RadialGrid, density: ArrayView1<f64>) -> Result<Array1<f64>> {
        if !self.hartree {
            return Ok(Array1::zeros(grid.len()));
        }
        let rho = density.to_vec();
        if rho.len() != grid.len() {
            return Err(AtomError::Numerical(format!(
                "Density of length {} does not match grid of {} points",
                rho.len(),
                grid.len()
            )));
        }

        let enclosed = grid.cumulative_integral(&rho);
        let outer = grid.outer_integral(&rho);
        let potential: Array1<f64> = grid
            .radii()
            .iter()
            .zip(enclosed.iter().zip(outer.iter()))
            .map(|(r, (q, o))| q / r + o)
            .collect();

        if let Some(i) = potential.iter().position(|v| !v.is_finite()) {
            return Err(AtomError::Numerical(format!(
                "Hartree potential is not finite at r = {}",
                grid.radii()[i]
            )));
        }
        Ok(potential)
    }

    /// Exchange-correlation energy density and potential
    pub fn exchange_correlation(&self, grid: &RadialGrid, density: &Density) -> Result<XcOutput> {
        let total = density.total();
        let gradient = if self.gradient {
            let mut gradient = Array2::zeros(total.dim());
            for (mut out, row) in gradient.outer_iter_mut().zip(total.outer_iter()) {
                out.assign(&Array1::from(grid.gradient(&row.to_vec())));
            }
            Some(gradient)
        } else {
            None
        };

        let output = self.functionals.evaluate(
            self.xc.as_ref(),
            total.view(),
            gradient.as_ref().map(|g| g.view()),
        )?;

        if output.potential.iter().any(|v| !v.is_finite())
            || output.energy_density.iter().any(|v| !v.is_finite())
        {
            return Err(AtomError::Numerical(
                "Exchange-correlation evaluation returned non-finite values".to_string(),
            ));
        }
        Ok(output)
    }

    /// Full potential generated by a density
    pub fn build(&self, grid: &RadialGrid, density: &Density) -> Result<Potential> {
        if density.len() != grid.len() {
            return Err(AtomError::Numerical(format!(
                "Density of length {} does not match grid of {} points",
                density.len(),
                grid.len()
            )));
        }

        let nuclear = self.nuclear(grid);
        let hartree = self.hartree(grid, density.spin_summed().view())?;
        let xc = self.exchange_correlation(grid, density)?.potential;

        let mut total = xc.clone();
        for mut row in total.outer_iter_mut() {
            row += &nuclear;
            row += &hartree;
        }

        let potential = Potential {
            nuclear,
            hartree,
            xc,
            total,
        };
        self.check_nuclear_limit(grid, &potential)?;
        Ok(potential)
    }

    /// Bare nuclear potential, used for the cold-start guess
    pub fn bare(&self, grid: &RadialGrid, n_spin: usize) -> Potential {
        let nuclear = self.nuclear(grid);
        let mut total = Array2::zeros((n_spin, grid.len()));
        for mut row in total.outer_iter_mut() {
            row.assign(&nuclear);
        }
        Potential {
            hartree: Array1::zeros(grid.len()),
            xc: Array2::zeros((n_spin, grid.len())),
            nuclear,
            total,
        }
    }

    /// Check that `r·v(r) → -Z` at the innermost grid point
    pub fn check_nuclear_limit(&self, grid: &RadialGrid, potential: &Potential) -> Result<()> {
        let r0 = grid.r_min();
        for (spin, row) in potential.total.outer_iter().enumerate() {
            let limit = r0 * row[0];
            if (limit + self.nuclear_charge).abs() > NUCLEAR_LIMIT_TOLERANCE * self.nuclear_charge {
                return Err(AtomError::Numerical(format!(
                    "r·v(r) = {} at r = {} (spin {}) is far from -Z = {}",
                    limit, r0, spin, -self.nuclear_charge
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xc::BuiltinXc;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn builder(hartree: bool, functionals: XcFunctionals) -> PotentialBuilder {
        PotentialBuilder::new(2.0, hartree, functionals, Arc::new(BuiltinXc), false).unwrap()
    }

    #[test]
    fn test_hartree_of_uniform_sphere() {
        // uniform charge q in radius R: v_H = q (3R² - r²) / (2R³)
        let grid = RadialGrid::logarithmic(2.0, 2001, -10.0).unwrap();
        let rho0 = 0.3;
        let q = rho0 * grid.volume();
        let density = Array1::from_elem(grid.len(), rho0);
        let v = builder(true, XcFunctionals::none())
            .hartree(&grid, density.view())
            .unwrap();
        for i in [0, 1000, 2000] {
            let r = grid.radii()[i];
            let expected = q * (3.0 * 4.0 - r * r) / (2.0 * 8.0);
            assert_relative_eq!(v[i], expected, max_relative = 1e-4);
        }
    }

    #[test]
    fn test_hartree_outside_charge_is_coulombic() {
        // 1s hydrogen-like density: outside the charge v_H = N/r
        let grid = RadialGrid::logarithmic(40.0, 3001, -10.0).unwrap();
        let density: Array1<f64> = grid.radii().iter().map(|r| (-2.0 * r).exp() / PI).collect();
        let v = builder(true, XcFunctionals::none())
            .hartree(&grid, density.view())
            .unwrap();
        let i = grid.radii().iter().position(|&r| r > 20.0).unwrap();
        assert_relative_eq!(v[i], 1.0 / grid.radii()[i], max_relative = 1e-4);
        // v_H(0) = 1 for this density
        assert_relative_eq!(v[0], 1.0, max_relative = 1e-3);
    }

    #[test]
    fn test_hartree_energy_of_hydrogen_1s() {
        // E_H = 5/16 for ρ = exp(-2r)/π
        let grid = RadialGrid::logarithmic(20.0, 1000, -10.0).unwrap();
        let density: Array1<f64> = grid.radii().iter().map(|r| (-2.0 * r).exp() / PI).collect();
        let v = builder(true, XcFunctionals::none())
            .hartree(&grid, density.view())
            .unwrap();
        let integrand: Vec<f64> = density.iter().zip(v.iter()).map(|(n, v)| n * v).collect();
        assert_relative_eq!(0.5 * grid.integrate(&integrand), 5.0 / 16.0, epsilon = 1e-7);
    }

    #[test]
    fn test_disabled_hartree_and_xc_leave_bare_potential() {
        let grid = RadialGrid::logarithmic(5.0, 501, -8.0).unwrap();
        let density = Density::from_bound(Array2::from_elem((1, grid.len()), 0.1)).unwrap();
        let b = builder(false, XcFunctionals::none());
        let built = b.build(&grid, &density).unwrap();
        assert_eq!(built, b.bare(&grid, 1));
    }

    #[test]
    fn test_total_is_sum_of_components() {
        let grid = RadialGrid::logarithmic(5.0, 801, -10.0).unwrap();
        let rho = Array2::from_shape_fn((2, grid.len()), |(s, i)| {
            (0.5 + 0.25 * s as f64) * (-grid.radii()[i]).exp()
        });
        let density = Density::from_bound(rho).unwrap();
        let b = PotentialBuilder::new(2.0, true, XcFunctionals::default(), Arc::new(BuiltinXc), true)
            .unwrap();
        let v = b.build(&grid, &density).unwrap();
        assert_eq!(v.n_spin(), 2);
        for s in 0..2 {
            let i = 400;
            let sum = v.nuclear[i] + v.hartree[i] + v.xc[[s, i]];
            assert_relative_eq!(v.channel(s)[i], sum, epsilon = 1e-12);
        }
        // more density in spin 1 means deeper exchange
        assert!(v.xc[[1, 400]] < v.xc[[0, 400]]);
    }

    #[test]
    fn test_rejects_nonpositive_charge() {
        let err = PotentialBuilder::new(0.0, true, XcFunctionals::none(), Arc::new(BuiltinXc), false)
            .unwrap_err();
        assert!(err.is_configuration());
    }
}
