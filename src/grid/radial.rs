/*
MIT License

Copyright (c) 2025 Ameyanagi
*/

//! Radial grid on which every field of the average atom is sampled

use crate::utils::errors::{AtomError, Result};
use crate::utils::math::{cumulative_simpson, simpson_weights, uniform_derivative};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Default inner coordinate `x0 = ln(r_min)` of a logarithmic grid
pub const DEFAULT_LOG_X0: f64 = -10.0;

/// Default inner radius of a uniform grid as a fraction of the sphere radius
pub const DEFAULT_UNIFORM_INNER_FRACTION: f64 = 1.0e-4;

/// Spacing scheme of the radial mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GridType {
    /// Logarithmic grid: r(i) = exp(x0 + i*h)
    #[default]
    Logarithmic,
    /// Uniform grid: r(i) = r_min + i*h
    Uniform,
}

/// Discretised radial coordinate with integration weights
///
/// The grid is uniform in a transformed coordinate `s` (`s = ln r` for the
/// logarithmic grid, `s = r` for the uniform one). The weights include the
/// Jacobian `dr/ds` and the spherical volume element `4πr²`, so that
/// `Σ w_i f(r_i)` approximates `∫ f(r) 4πr² dr` over the sphere.
#[derive(Debug, Clone, PartialEq)]
pub struct RadialGrid {
    grid_type: GridType,
    /// Radii in bohr
    radii: Vec<f64>,
    /// Constant step in the transformed coordinate
    step: f64,
    /// Volume integration weights
    weights: Vec<f64>,
    /// Sphere radius in bohr
    radius: f64,
}

impl RadialGrid {
    /// Create a grid from its spacing scheme
    ///
    /// `inner` is `x0 = ln(r_min)` for a logarithmic grid and `r_min` for a
    /// uniform grid; `None` selects the defaults.
    pub fn new(grid_type: GridType, radius: f64, points: usize, inner: Option<f64>) -> Result<Self> {
        match grid_type {
            GridType::Logarithmic => {
                Self::logarithmic(radius, points, inner.unwrap_or(DEFAULT_LOG_X0))
            }
            GridType::Uniform => Self::uniform(
                radius,
                points,
                inner.unwrap_or(radius * DEFAULT_UNIFORM_INNER_FRACTION),
            ),
        }
    }

    /// Logarithmic grid between `exp(x0)` and `radius`
    pub fn logarithmic(radius: f64, points: usize, x0: f64) -> Result<Self> {
        validate(radius, points)?;
        let x_max = radius.ln();
        if !x0.is_finite() || x0 >= x_max {
            return Err(AtomError::Configuration(format!(
                "Inner log coordinate x0 = {} must be below ln(R) = {}",
                x0, x_max
            )));
        }

        let step = (x_max - x0) / (points - 1) as f64;
        let mut radii: Vec<f64> = (0..points).map(|i| (x0 + i as f64 * step).exp()).collect();
        // pin the last point exactly on the boundary
        radii[points - 1] = radius;

        Self::assemble(GridType::Logarithmic, radii, step, radius)
    }

    /// Uniform grid between `r_min` and `radius`
    pub fn uniform(radius: f64, points: usize, r_min: f64) -> Result<Self> {
        validate(radius, points)?;
        if !r_min.is_finite() || r_min <= 0.0 || r_min >= radius {
            return Err(AtomError::Configuration(format!(
                "Inner radius {} must lie in (0, {})",
                r_min, radius
            )));
        }

        let step = (radius - r_min) / (points - 1) as f64;
        let radii: Vec<f64> = (0..points).map(|i| r_min + i as f64 * step).collect();

        Self::assemble(GridType::Uniform, radii, step, radius)
    }

    fn assemble(
        grid_type: GridType,
        radii: Vec<f64>,
        step: f64,
        radius: f64,
    ) -> Result<Self> {
        let quadrature = simpson_weights(radii.len(), step)?;
        let weights = radii
            .iter()
            .zip(quadrature)
            .map(|(&r, q)| {
                let jacobian = match grid_type {
                    GridType::Logarithmic => r,
                    GridType::Uniform => 1.0,
                };
                4.0 * PI * r * r * jacobian * q
            })
            .collect();

        Ok(Self {
            grid_type,
            radii,
            step,
            weights,
            radius,
        })
    }

    /// Number of grid points
    pub fn len(&self) -> usize {
        self.radii.len()
    }

    /// Whether the grid has no points (never true for a constructed grid)
    pub fn is_empty(&self) -> bool {
        self.radii.is_empty()
    }

    /// Spacing scheme
    pub fn grid_type(&self) -> GridType {
        self.grid_type
    }

    /// Radii in bohr
    pub fn radii(&self) -> &[f64] {
        &self.radii
    }

    /// Step in the transformed coordinate
    pub fn step(&self) -> f64 {
        self.step
    }

    /// Volume integration weights
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Sphere radius in bohr
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Innermost radius
    pub fn r_min(&self) -> f64 {
        self.radii[0]
    }

    /// Volume of the sphere
    pub fn volume(&self) -> f64 {
        4.0 / 3.0 * PI * self.radius.powi(3)
    }

    /// Jacobian `dr/ds` at point `i`
    pub fn jacobian(&self, i: usize) -> f64 {
        match self.grid_type {
            GridType::Logarithmic => self.radii[i],
            GridType::Uniform => 1.0,
        }
    }

    /// Volume integral `∫ f(r) 4πr² dr`
    pub fn integrate(&self, values: &[f64]) -> f64 {
        self.weights.iter().zip(values).map(|(w, f)| w * f).sum()
    }

    /// Running volume integral `∫_{r_min}^{r_i} f 4πr² dr`
    pub fn cumulative_integral(&self, values: &[f64]) -> Vec<f64> {
        let integrand: Vec<f64> = values
            .iter()
            .enumerate()
            .map(|(i, f)| 4.0 * PI * self.radii[i] * self.radii[i] * self.jacobian(i) * f)
            .collect();
        cumulative_simpson(&integrand, self.step)
    }

    /// Outer integral `∫_{r_i}^{R} f 4πr dr` used by the Hartree potential
    pub fn outer_integral(&self, values: &[f64]) -> Vec<f64> {
        let integrand: Vec<f64> = values
            .iter()
            .enumerate()
            .map(|(i, f)| 4.0 * PI * self.radii[i] * self.jacobian(i) * f)
            .collect();
        // integrate inward from R so that every point closes its own panels
        let reversed: Vec<f64> = integrand.iter().rev().copied().collect();
        let mut outer = cumulative_simpson(&reversed, self.step);
        outer.reverse();
        outer
    }

    /// Radial derivative `df/dr`
    pub fn gradient(&self, values: &[f64]) -> Vec<f64> {
        let mut derivative = uniform_derivative(values, self.step);
        for (i, d) in derivative.iter_mut().enumerate() {
            *d /= self.jacobian(i);
        }
        derivative
    }
}

fn validate(radius: f64, points: usize) -> Result<()> {
    if points < 2 {
        return Err(AtomError::Configuration(format!(
            "Radial grid needs at least 2 points, got {}",
            points
        )));
    }
    if !radius.is_finite() || radius <= 0.0 {
        return Err(AtomError::Configuration(format!(
            "Domain radius must be positive, got {}",
            radius
        )));
    }
    Ok(())
}
