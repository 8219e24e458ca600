/*
MIT License

Copyright (c) 2025 Ameyanagi
*/

//! Numerical helpers shared by the grid, occupation and energy modules

use super::errors::{AtomError, Result};

/// Width (in units of kT) of the Fermi edge that is integrated numerically
const FERMI_EDGE_WIDTH: f64 = 60.0;

/// Number of Simpson intervals used for each Fermi-Dirac integral segment
const FERMI_INTEGRAL_INTERVALS: usize = 2000;

/// Fermi-Dirac occupation `1 / (1 + exp(beta (energy - mu)))`
///
/// Evaluated in a form that never overflows for large arguments.
pub fn fermi_dirac(energy: f64, mu: f64, beta: f64) -> f64 {
    let z = beta * (energy - mu);
    if z > 0.0 {
        let e = (-z).exp();
        e / (1.0 + e)
    } else {
        1.0 / (1.0 + z.exp())
    }
}

/// Mixing entropy `-(f ln f + (1 - f) ln(1 - f))` of a fractional occupation
pub fn occupation_entropy(f: f64) -> f64 {
    let term = |p: f64| if p > 0.0 { p * p.ln() } else { 0.0 };
    -(term(f) + term(1.0 - f))
}

/// Complete Fermi-Dirac integral `F_j(eta) = ∫_0^∞ x^j / (1 + exp(x - eta)) dx`
///
/// No Gamma-function normalisation is applied. For a degenerate argument the
/// bulk of the integral is taken analytically and only the Fermi edge is
/// integrated numerically.
pub fn fermi_dirac_integral(order: f64, eta: f64) -> f64 {
    if eta > 10.0 {
        // ∫_0^eta x^j dx minus the hole distribution below the edge
        let bulk = eta.powf(order + 1.0) / (order + 1.0);
        let lower = (eta - FERMI_EDGE_WIDTH).max(0.0);
        let holes = simpson(
            |x| x.powf(order) / (1.0 + (eta - x).exp()),
            lower,
            eta,
            FERMI_INTEGRAL_INTERVALS,
        );
        let tail = simpson(
            |x| x.powf(order) * fermi_dirac(x, eta, 1.0),
            eta,
            eta + FERMI_EDGE_WIDTH,
            FERMI_INTEGRAL_INTERVALS,
        );
        bulk - holes + tail
    } else {
        // x = t² removes the square-root behaviour at the origin
        let t_max = (eta.max(0.0) + FERMI_EDGE_WIDTH).sqrt();
        simpson(
            |t| 2.0 * t.powf(2.0 * order + 1.0) * fermi_dirac(t * t, eta, 1.0),
            0.0,
            t_max,
            FERMI_INTEGRAL_INTERVALS,
        )
    }
}

/// Energy-scaled Fermi-Dirac integral `∫_0^∞ e^j f(e; mu, beta) de`
pub fn fermi_dirac_integral_energy(order: f64, mu: f64, beta: f64) -> f64 {
    beta.powf(-(order + 1.0)) * fermi_dirac_integral(order, beta * mu)
}

/// Composite Simpson rule for a function on `[a, b]` with an even number of
/// intervals (odd counts are rounded up)
pub fn simpson<F>(f: F, a: f64, b: f64, n: usize) -> f64
where
    F: Fn(f64) -> f64,
{
    if a == b {
        return 0.0;
    }
    let n = if n % 2 == 0 { n.max(2) } else { n + 1 };
    let h = (b - a) / n as f64;
    let mut sum = f(a) + f(b);
    for i in 1..n {
        let x = a + i as f64 * h;
        sum += if i % 2 == 1 { 4.0 * f(x) } else { 2.0 * f(x) };
    }
    sum * h / 3.0
}

/// Quadrature weights for `n` equally spaced samples with step `h`
///
/// Simpson's 1/3 rule is used on an even number of intervals; an odd
/// interval count closes with Simpson's 3/8 rule on the last three
/// intervals. Two points fall back to the trapezoidal rule.
pub fn simpson_weights(n: usize, h: f64) -> Result<Vec<f64>> {
    if n < 2 {
        return Err(AtomError::Configuration(format!(
            "Quadrature needs at least 2 points, got {}",
            n
        )));
    }

    let mut weights = vec![0.0; n];
    let intervals = n - 1;

    if intervals == 1 {
        weights[0] = 0.5 * h;
        weights[1] = 0.5 * h;
        return Ok(weights);
    }

    let simpson_intervals = if intervals % 2 == 0 {
        intervals
    } else {
        intervals - 3
    };

    for pair in 0..simpson_intervals / 2 {
        let i = 2 * pair;
        weights[i] += h / 3.0;
        weights[i + 1] += 4.0 * h / 3.0;
        weights[i + 2] += h / 3.0;
    }

    if intervals % 2 == 1 {
        let i = simpson_intervals;
        let c = 3.0 * h / 8.0;
        weights[i] += c;
        weights[i + 1] += 3.0 * c;
        weights[i + 2] += 3.0 * c;
        weights[i + 3] += c;
    }

    Ok(weights)
}

/// Running Simpson integral of equally spaced samples, starting at zero
///
/// Even points close a Simpson panel; odd points add one interval of the
/// parabola through the neighbouring three samples. Fewer than three samples
/// fall back to the trapezoid.
pub fn cumulative_simpson(values: &[f64], h: f64) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![0.0; n];
    if n < 3 {
        if n == 2 {
            out[1] = 0.5 * h * (values[0] + values[1]);
        }
        return out;
    }

    out[1] = h / 12.0 * (5.0 * values[0] + 8.0 * values[1] - values[2]);
    for i in 2..n {
        out[i] = if i % 2 == 0 {
            out[i - 2] + h / 3.0 * (values[i - 2] + 4.0 * values[i - 1] + values[i])
        } else {
            out[i - 1] + h / 12.0 * (-values[i - 2] + 8.0 * values[i - 1] + 5.0 * values[i])
        };
    }
    out
}

/// Second-order finite-difference derivative of equally spaced samples
pub fn uniform_derivative(values: &[f64], h: f64) -> Vec<f64> {
    let n = values.len();
    if n < 3 {
        return vec![0.0; n];
    }
    let mut out = vec![0.0; n];
    out[0] = (-3.0 * values[0] + 4.0 * values[1] - values[2]) / (2.0 * h);
    for i in 1..n - 1 {
        out[i] = (values[i + 1] - values[i - 1]) / (2.0 * h);
    }
    out[n - 1] = (3.0 * values[n - 1] - 4.0 * values[n - 2] + values[n - 3]) / (2.0 * h);
    out
}
