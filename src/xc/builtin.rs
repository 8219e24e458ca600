/*
MIT License

Copyright (c) 2025 Ameyanagi
*/

//! Reference local-density functionals
//!
//! Slater exchange and two parameterisations of the Ceperley-Alder
//! correlation energy: Perdew-Wang (1992), the default, and Perdew-Zunger
//! (1981) with the von Barth-Hedin spin interpolation.

use super::{XcAdapter, XcOutput};
use crate::utils::errors::{AtomError, Result};
use ndarray::{Array1, Array2, ArrayView2};
use std::f64::consts::PI;

/// Slater (LDA) exchange identifier
pub const EXCHANGE_SLATER: &str = "lda_x";

/// Perdew-Zunger 1981 correlation identifier
pub const CORRELATION_PZ81: &str = "lda_c_pz";

/// Perdew-Wang 1992 correlation identifier
pub const CORRELATION_PW92: &str = "lda_c_pw";

/// Densities below this are treated as vacuum
const DENSITY_FLOOR: f64 = 1.0e-14;

/// Perdew-Zunger parameters for one spin limit
struct Pz81Params {
    gamma: f64,
    beta1: f64,
    beta2: f64,
    a: f64,
    b: f64,
    c: f64,
    d: f64,
}

const PZ81_UNPOLARIZED: Pz81Params = Pz81Params {
    gamma: -0.1423,
    beta1: 1.0529,
    beta2: 0.3334,
    a: 0.0311,
    b: -0.048,
    c: 0.0020,
    d: -0.0116,
};

const PZ81_POLARIZED: Pz81Params = Pz81Params {
    gamma: -0.0843,
    beta1: 1.3981,
    beta2: 0.2611,
    a: 0.01555,
    b: -0.0269,
    c: 0.0007,
    d: -0.0048,
};

impl Pz81Params {
    /// Correlation energy per electron and its derivative with respect to rs
    fn energy(&self, rs: f64) -> (f64, f64) {
        if rs >= 1.0 {
            let sq = rs.sqrt();
            let denom = 1.0 + self.beta1 * sq + self.beta2 * rs;
            let eps = self.gamma / denom;
            let deps = -self.gamma * (0.5 * self.beta1 / sq + self.beta2) / (denom * denom);
            (eps, deps)
        } else {
            let ln_rs = rs.ln();
            let eps = self.a * ln_rs + self.b + self.c * rs * ln_rs + self.d * rs;
            let deps = self.a / rs + self.c * (ln_rs + 1.0) + self.d;
            (eps, deps)
        }
    }
}

/// Perdew-Wang fit `G(rs)` for one spin limit
struct Pw92Params {
    a: f64,
    alpha1: f64,
    beta: [f64; 4],
}

const PW92_UNPOLARIZED: Pw92Params = Pw92Params {
    a: 0.031091,
    alpha1: 0.21370,
    beta: [7.5957, 3.5876, 1.6382, 0.49294],
};

const PW92_POLARIZED: Pw92Params = Pw92Params {
    a: 0.015545,
    alpha1: 0.20548,
    beta: [14.1189, 6.1977, 3.3662, 0.62517],
};

/// Fit of minus the spin stiffness
const PW92_STIFFNESS: Pw92Params = Pw92Params {
    a: 0.016887,
    alpha1: 0.11125,
    beta: [10.357, 3.6231, 0.88026, 0.49671],
};

/// Second derivative of the spin interpolation `f(ζ)` at ζ = 0
const PW92_FZ0: f64 = 1.709921;

impl Pw92Params {
    /// `G(rs)` and its derivative with respect to rs
    fn energy(&self, rs: f64) -> (f64, f64) {
        let [b1, b2, b3, b4] = self.beta;
        let sq = rs.sqrt();
        let q0 = -2.0 * self.a * (1.0 + self.alpha1 * rs);
        let q1 = 2.0 * self.a * (b1 * sq + b2 * rs + b3 * rs * sq + b4 * rs * rs);
        let dq1 = self.a * (b1 / sq + 2.0 * b2 + 3.0 * b3 * sq + 4.0 * b4 * rs);
        let log = (1.0 + q1.recip()).ln();
        let g = q0 * log;
        let dg = -2.0 * self.a * self.alpha1 * log - q0 * dq1 / (q1 * q1 + q1);
        (g, dg)
    }
}

/// Spin interpolation `f(ζ)` and its derivative
fn spin_interpolation(zeta: f64) -> (f64, f64) {
    let norm = 2.0f64.powf(4.0 / 3.0) - 2.0;
    let f = ((1.0 + zeta).powf(4.0 / 3.0) + (1.0 - zeta).powf(4.0 / 3.0) - 2.0) / norm;
    let df = 4.0 / 3.0 * ((1.0 + zeta).cbrt() - (1.0 - zeta).cbrt()) / norm;
    (f, df)
}

/// Energy per volume and spin potentials from `ε(rs, ζ)` and its partial derivatives
fn spin_potentials(
    density: f64,
    rs: f64,
    zeta: f64,
    eps: f64,
    deps_drs: f64,
    deps_dzeta: f64,
) -> (f64, f64, f64) {
    let common = eps - rs / 3.0 * deps_drs;
    let v_up = common + (1.0 - zeta) * deps_dzeta;
    let v_down = common - (1.0 + zeta) * deps_dzeta;
    (eps * density, v_up, v_down)
}

/// Wigner-Seitz radius and polarisation, `None` below the vacuum floor
fn rs_zeta(up: f64, down: f64) -> Option<(f64, f64, f64)> {
    let density = up + down;
    if density <= DENSITY_FLOOR {
        return None;
    }
    let rs = (3.0 / (4.0 * PI * density)).cbrt();
    let zeta = ((up - down) / density).clamp(-1.0, 1.0);
    Some((density, rs, zeta))
}

/// Slater exchange for a spin-unpolarised density
///
/// Returns the energy per unit volume and the potential.
pub fn slater_exchange(density: f64) -> (f64, f64) {
    if density <= DENSITY_FLOOR {
        return (0.0, 0.0);
    }
    let v = -(3.0 * density / PI).cbrt();
    (0.75 * v * density, v)
}

/// Perdew-Zunger correlation for spin densities `(up, down)`
///
/// Returns the energy per unit volume and the potentials for both spins.
pub fn pz81_correlation(up: f64, down: f64) -> (f64, f64, f64) {
    let Some((density, rs, zeta)) = rs_zeta(up, down) else {
        return (0.0, 0.0, 0.0);
    };

    let (eps_u, deps_u) = PZ81_UNPOLARIZED.energy(rs);
    let (eps_p, deps_p) = PZ81_POLARIZED.energy(rs);
    let (f, df) = spin_interpolation(zeta);

    let eps = eps_u + f * (eps_p - eps_u);
    let deps_drs = deps_u + f * (deps_p - deps_u);
    let deps_dzeta = df * (eps_p - eps_u);
    spin_potentials(density, rs, zeta, eps, deps_drs, deps_dzeta)
}

/// Perdew-Wang correlation for spin densities `(up, down)`
///
/// Returns the energy per unit volume and the potentials for both spins.
pub fn pw92_correlation(up: f64, down: f64) -> (f64, f64, f64) {
    let Some((density, rs, zeta)) = rs_zeta(up, down) else {
        return (0.0, 0.0, 0.0);
    };

    let (e0, de0) = PW92_UNPOLARIZED.energy(rs);
    let (e1, de1) = PW92_POLARIZED.energy(rs);
    let (g, dg) = PW92_STIFFNESS.energy(rs);
    let (alpha, dalpha) = (-g, -dg);
    let (f, df) = spin_interpolation(zeta);
    let z3 = zeta.powi(3);
    let z4 = z3 * zeta;

    let eps = e0 + alpha * f * (1.0 - z4) / PW92_FZ0 + (e1 - e0) * f * z4;
    let deps_drs = de0 + dalpha * f * (1.0 - z4) / PW92_FZ0 + (de1 - de0) * f * z4;
    let deps_dzeta = alpha / PW92_FZ0 * (df * (1.0 - z4) - 4.0 * z3 * f)
        + (e1 - e0) * (df * z4 + 4.0 * z3 * f);
    spin_potentials(density, rs, zeta, eps, deps_drs, deps_dzeta)
}

/// Built-in LDA adapter
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinXc;

impl XcAdapter for BuiltinXc {
    fn is_available(&self, functional: &str, _spin_polarized: bool) -> bool {
        matches!(
            functional.to_ascii_lowercase().as_str(),
            EXCHANGE_SLATER | CORRELATION_PZ81 | CORRELATION_PW92
        )
    }

    fn evaluate(
        &self,
        functional: &str,
        density: ArrayView2<f64>,
        _gradient: Option<ArrayView2<f64>>,
    ) -> Result<XcOutput> {
        let (n_spin, n_points) = density.dim();
        if n_spin != 1 && n_spin != 2 {
            return Err(AtomError::Configuration(format!(
                "Density must have 1 or 2 spin channels, got {}",
                n_spin
            )));
        }

        let mut energy_density = Array1::zeros(n_points);
        let mut potential = Array2::zeros((n_spin, n_points));

        match functional.to_ascii_lowercase().as_str() {
            EXCHANGE_SLATER => {
                for i in 0..n_points {
                    if n_spin == 1 {
                        let (e, v) = slater_exchange(density[[0, i]]);
                        energy_density[i] = e;
                        potential[[0, i]] = v;
                    } else {
                        // E_x[ρ↑, ρ↓] = (E_x[2ρ↑] + E_x[2ρ↓]) / 2
                        for s in 0..2 {
                            let (e, v) = slater_exchange(2.0 * density[[s, i]]);
                            energy_density[i] += 0.5 * e;
                            potential[[s, i]] = v;
                        }
                    }
                }
            }
            id @ (CORRELATION_PZ81 | CORRELATION_PW92) => {
                let correlation = if id == CORRELATION_PW92 {
                    pw92_correlation
                } else {
                    pz81_correlation
                };
                for i in 0..n_points {
                    let (up, down) = if n_spin == 1 {
                        let half = 0.5 * density[[0, i]];
                        (half, half)
                    } else {
                        (density[[0, i]], density[[1, i]])
                    };
                    let (e, v_up, v_down) = correlation(up, down);
                    energy_density[i] = e;
                    potential[[0, i]] = v_up;
                    if n_spin == 2 {
                        potential[[1, i]] = v_down;
                    }
                }
            }
            other => {
                return Err(AtomError::Configuration(format!(
                    "Exchange-correlation functional '{}' is unavailable",
                    other
                )))
            }
        }

        Ok(XcOutput {
            energy_density,
            potential,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn density_at_rs(rs: f64) -> f64 {
        3.0 / (4.0 * PI * rs.powi(3))
    }

    #[test]
    fn test_slater_exchange_values() {
        assert_eq!(slater_exchange(0.0), (0.0, 0.0));

        // ε_x = -0.458165 / rs per electron
        let rho = density_at_rs(2.0);
        let (e, v) = slater_exchange(rho);
        assert_relative_eq!(e / rho, -0.458165 / 2.0, epsilon = 1e-5);
        assert_relative_eq!(v, 4.0 / 3.0 * e / rho, epsilon = 1e-12);
    }

    #[test]
    fn test_pz81_continuity_at_rs_one() {
        let below = PZ81_UNPOLARIZED.energy(1.0 - 1e-9).0;
        let above = PZ81_UNPOLARIZED.energy(1.0 + 1e-9).0;
        assert_relative_eq!(below, above, epsilon = 1e-4);
    }

    #[test]
    fn test_pz81_potential_is_energy_derivative() {
        // v_c = d(ρ ε_c)/dρ for an unpolarised density
        let rho = density_at_rs(3.0);
        let h = rho * 1e-5;
        let (e_plus, _, _) = pz81_correlation(0.5 * (rho + h), 0.5 * (rho + h));
        let (e_minus, _, _) = pz81_correlation(0.5 * (rho - h), 0.5 * (rho - h));
        let (_, v_up, v_down) = pz81_correlation(0.5 * rho, 0.5 * rho);
        assert_relative_eq!(v_up, (e_plus - e_minus) / (2.0 * h), max_relative = 1e-6);
        assert_relative_eq!(v_up, v_down, epsilon = 1e-14);
    }

    #[test]
    fn test_pz81_spin_potential_is_partial_derivative() {
        let (up, down) = (0.03, 0.01);
        let h = 1e-7;
        let (e_plus, _, _) = pz81_correlation(up + h, down);
        let (e_minus, _, _) = pz81_correlation(up - h, down);
        let (_, v_up, _) = pz81_correlation(up, down);
        assert_relative_eq!(v_up, (e_plus - e_minus) / (2.0 * h), max_relative = 1e-5);
    }

    #[test]
    fn test_pw92_close_to_pz81() {
        // both fit the same Monte Carlo data
        for rs in [0.5, 2.0, 5.0] {
            let rho = density_at_rs(rs);
            let pw = pw92_correlation(0.5 * rho, 0.5 * rho).0 / rho;
            let pz = pz81_correlation(0.5 * rho, 0.5 * rho).0 / rho;
            assert_relative_eq!(pw, pz, epsilon = 1e-3);
            let pw = pw92_correlation(rho, 0.0).0 / rho;
            let pz = pz81_correlation(rho, 0.0).0 / rho;
            assert_relative_eq!(pw, pz, epsilon = 1e-3);
        }
        let rho = density_at_rs(2.0);
        assert_relative_eq!(pw92_correlation(0.5 * rho, 0.5 * rho).0 / rho, -0.04476, epsilon = 1e-5);
    }

    #[test]
    fn test_pw92_potentials_are_partial_derivatives() {
        let (up, down) = (0.03, 0.01);
        let h = 1e-7;
        let (_, v_up, v_down) = pw92_correlation(up, down);
        let (e_plus, _, _) = pw92_correlation(up + h, down);
        let (e_minus, _, _) = pw92_correlation(up - h, down);
        assert_relative_eq!(v_up, (e_plus - e_minus) / (2.0 * h), max_relative = 1e-5);
        let (e_plus, _, _) = pw92_correlation(up, down + h);
        let (e_minus, _, _) = pw92_correlation(up, down - h);
        assert_relative_eq!(v_down, (e_plus - e_minus) / (2.0 * h), max_relative = 1e-5);
    }

    #[test]
    fn test_polarized_matches_unpolarized_for_equal_spins() {
        let total = array![[0.2, 0.02, 0.002]];
        let split = array![[0.1, 0.01, 0.001], [0.1, 0.01, 0.001]];
        for id in [EXCHANGE_SLATER, CORRELATION_PZ81, CORRELATION_PW92] {
            let a = BuiltinXc.evaluate(id, total.view(), None).unwrap();
            let b = BuiltinXc.evaluate(id, split.view(), None).unwrap();
            for i in 0..3 {
                assert_relative_eq!(a.energy_density[i], b.energy_density[i], max_relative = 1e-12);
                assert_relative_eq!(a.potential[[0, i]], b.potential[[0, i]], max_relative = 1e-12);
                assert_relative_eq!(a.potential[[0, i]], b.potential[[1, i]], max_relative = 1e-12);
            }
        }
    }

    #[test]
    fn test_unknown_functional() {
        assert!(!BuiltinXc.is_available("gga_x_pbe", false));
        let rho = array![[0.1]];
        assert!(BuiltinXc.evaluate("gga_x_pbe", rho.view(), None).is_err());
    }
}
