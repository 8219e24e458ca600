/*
MIT License

Copyright (c) 2025 Ameyanagi
*/

//! Numerov method implementation for solving second-order differential equations
//!
//! The radial Kohn-Sham equation is written in the uniform grid coordinate
//! `s` as `y''(s) = -k²(s) y(s)`, which the Numerov recurrence solves to
//! fourth order:
//!
//! `f_{n+1} y_{n+1} = (12 - 10 f_n) y_n - f_{n-1} y_{n-1}`, `f_n = 1 + h² k²_n / 12`.

use crate::utils::errors::{AtomError, Result};

/// Magnitude at which accumulated values are rescaled to avoid overflow
const RESCALE_THRESHOLD: f64 = 1.0e100;

/// Numerov coefficients below this mark a region so deep in the classically
/// forbidden zone that the recurrence is no longer stable; the solution is
/// negligible (or purely growing) there and integration stops.
pub const FORBIDDEN_CUTOFF: f64 = 0.25;

/// Numerov coefficients `f_n = 1 + h² k²_n / 12`
pub fn numerov_coefficients(k_squared: &[f64], h: f64) -> Vec<f64> {
    let h12 = h * h / 12.0;
    k_squared.iter().map(|k2| 1.0 + h12 * k2).collect()
}

/// First index at which the recurrence is usable, past any centrifugal
/// barrier too steep for the grid next to the origin
///
/// The regular solution is vanishingly small inside such a barrier and is
/// taken as zero there.
pub fn regular_origin(coefficients: &[f64]) -> usize {
    coefficients
        .iter()
        .position(|f| *f >= FORBIDDEN_CUTOFF)
        .unwrap_or(coefficients.len())
}

/// First index (from 2 on) where the recurrence becomes unstable, or `len`
pub fn stable_extent(coefficients: &[f64]) -> usize {
    coefficients
        .iter()
        .enumerate()
        .skip(2)
        .find(|(_, f)| **f < FORBIDDEN_CUTOFF)
        .map(|(i, _)| i)
        .unwrap_or(coefficients.len())
}

/// Integrates `y'' = -k² y` forward in place from the initial values `y[0]`
/// and `y[1]`
///
/// Values are rescaled on the fly when they grow past 1e100, which keeps the
/// shape of the solution and its sign changes intact.
pub fn numerov_integration(y: &mut [f64], coefficients: &[f64]) -> Result<()> {
    if y.len() != coefficients.len() {
        return Err(AtomError::Numerical(
            "Arrays in Numerov integration must have the same length".to_string(),
        ));
    }
    let n = y.len();
    if n < 3 {
        return Err(AtomError::Numerical(
            "Numerov integration requires at least 3 grid points".to_string(),
        ));
    }

    for i in 2..n {
        y[i] = ((12.0 - 10.0 * coefficients[i - 1]) * y[i - 1]
            - coefficients[i - 2] * y[i - 2])
            / coefficients[i];

        if !y[i].is_finite() {
            return Err(AtomError::Numerical(format!(
                "Numerov integration produced a non-finite value at point {}",
                i
            )));
        }
        if y[i].abs() > RESCALE_THRESHOLD {
            for value in y[..=i].iter_mut() {
                *value /= RESCALE_THRESHOLD;
            }
        }
    }

    Ok(())
}

/// Generalised Sturm index of the outward solution
///
/// Returns `2 × (sign changes of y) + [y·(y' - robin·y) < 0 at the last
/// point]`, which is non-decreasing in the trial energy. `start` holds the
/// first two values of the regular solution. When the recurrence runs into
/// the deep forbidden region the solution is growing there, contributes no
/// further nodes and has `y'/y > robin`.
pub fn sturm_index(coefficients: &[f64], start: (f64, f64), h: f64, robin: f64) -> Result<usize> {
    let n = coefficients.len();
    if n < 3 {
        return Err(AtomError::Numerical(
            "Sturm index requires at least 3 grid points".to_string(),
        ));
    }

    let mut older = start.0;
    let mut prev = start.1;
    let mut last_sign = if prev != 0.0 { prev.signum() } else { start.0.signum() };
    let mut crossings = 0usize;
    let mut before_prev = older;

    for i in 2..n {
        if coefficients[i] < FORBIDDEN_CUTOFF {
            return Ok(2 * crossings);
        }

        let y = ((12.0 - 10.0 * coefficients[i - 1]) * prev - coefficients[i - 2] * older)
            / coefficients[i];
        if !y.is_finite() {
            return Err(AtomError::Numerical(format!(
                "Numerov integration produced a non-finite value at point {}",
                i
            )));
        }

        if y != 0.0 && y.signum() != last_sign {
            crossings += 1;
            last_sign = y.signum();
        }

        before_prev = older;
        older = prev;
        prev = y;

        if prev.abs() > RESCALE_THRESHOLD {
            prev /= RESCALE_THRESHOLD;
            older /= RESCALE_THRESHOLD;
            before_prev /= RESCALE_THRESHOLD;
        }
    }

    // prev = y[n-1], older = y[n-2], before_prev = y[n-3]
    let derivative = (3.0 * prev - 4.0 * older + before_prev) / (2.0 * h);
    let boundary = usize::from(prev * (derivative - robin * prev) < 0.0);

    Ok(2 * crossings + boundary)
}

/// Boundary behaviour used when integrating inward
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InwardStart {
    /// The solution vanishes at the last point
    Node,
    /// The solution satisfies `y' = robin·y` at the last point
    Robin(f64),
}

/// Eigenfunction at a converged eigenvalue, from outward and inward
/// integration matched at the outermost classical turning point
///
/// Outward integration alone amplifies the residual eigenvalue error in the
/// forbidden tail, so the tail is integrated inward from the boundary and
/// scaled to meet the outward solution.
pub fn matched_solution(
    coefficients: &[f64],
    k_squared: &[f64],
    start: (f64, f64),
    h: f64,
    boundary: InwardStart,
) -> Result<Vec<f64>> {
    let n = coefficients.len();
    if n < 5 || k_squared.len() != n {
        return Err(AtomError::Numerical(
            "Matched Numerov integration requires at least 5 consistent grid points".to_string(),
        ));
    }

    let end = stable_extent(coefficients);
    let mut y = vec![0.0; n];

    let turning = (0..end).rev().find(|&i| k_squared[i] > 0.0).unwrap_or(end / 2);
    let matching = turning.max(2);

    y[0] = start.0;
    y[1] = start.1;

    if matching + 3 >= end {
        numerov_integration(&mut y[..end], &coefficients[..end])?;
        return Ok(y);
    }

    numerov_integration(&mut y[..=matching], &coefficients[..=matching])?;

    // inward part, stored reversed so the same recurrence applies
    let mut inward = vec![0.0; end - matching];
    let inward_coefficients: Vec<f64> = coefficients[matching..end].iter().rev().copied().collect();
    match boundary {
        InwardStart::Robin(robin) if end == n => {
            let k2 = k_squared[n - 1];
            inward[0] = 1.0;
            inward[1] = 1.0 - robin * h - 0.5 * h * h * k2;
        }
        _ => {
            inward[0] = 0.0;
            inward[1] = 1.0;
        }
    }
    numerov_integration(&mut inward, &inward_coefficients)?;
    inward.reverse();

    if inward[0] == 0.0 {
        return Err(AtomError::Numerical(
            "Inward solution vanishes at the matching point".to_string(),
        ));
    }
    let scale = y[matching] / inward[0];
    for (target, value) in y[matching..end].iter_mut().zip(inward.iter()) {
        *target = scale * value;
    }

    Ok(y)
}
