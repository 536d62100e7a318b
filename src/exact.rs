//! Exact escape rate by quadrature
//!
//! Mean first-passage time from a point start at `lower` to `x_thresh`:
//!
//! ```text
//! T(D) = (1/D) ∫_{lower}^{x_thresh} dy e^{V(y)/D} ∫_{-∞}^{y} e^{-V(x)/D} dx
//! ```
//!
//! and the rate is `1 / T(D)`. The inner integral is accumulated on the same
//! grid as the outer one with the trapezoid rule, so the double integral
//! costs a single pass. Both exponents are shifted by the grid minimum of
//! `V`; only their difference enters the product.

use serde::{Deserialize, Serialize};

use crate::potential::Potential;
use crate::rate::{RatePoint, RateSeries};
use crate::EscapeError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuadratureSettings {
    /// Grid points on `[lower, x_thresh]` and again on the left tail
    pub grid_points: usize,
    /// The `-∞` limit is cut where `(V(x) - V_min) / D` exceeds this
    pub tail_cutoff: f64,
    /// Step of the leftward walk that locates the cut
    pub tail_step: f64,
    pub max_tail_steps: usize,
}

impl Default for QuadratureSettings {
    fn default() -> Self {
        Self {
            grid_points: 4001,
            tail_cutoff: 40.0,
            tail_step: 0.01,
            max_tail_steps: 100_000,
        }
    }
}

impl QuadratureSettings {
    pub fn validate(&self) -> Result<(), EscapeError> {
        if self.grid_points < 2 {
            return Err(EscapeError::InvalidConfig(
                "grid_points must be at least 2".to_string(),
            ));
        }
        if !(self.tail_cutoff > 0.0) || !(self.tail_step > 0.0) {
            return Err(EscapeError::InvalidConfig(
                "tail_cutoff and tail_step must be positive".to_string(),
            ));
        }
        if self.max_tail_steps == 0 {
            return Err(EscapeError::InvalidConfig(
                "max_tail_steps must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    let denom = (n - 1) as f64;
    (0..n)
        .map(|idx| start + (end - start) * idx as f64 / denom)
        .collect()
}

fn trapz(values: &[f64], grid: &[f64]) -> f64 {
    values
        .windows(2)
        .zip(grid.windows(2))
        .map(|(v, x)| 0.5 * (v[0] + v[1]) * (x[1] - x[0]))
        .sum()
}

/// Walks left from `lower` until the Boltzmann weight is negligible and
/// returns the cut together with the lowest `V` seen.
fn left_cut<P: Potential + ?Sized>(
    potential: &P,
    settings: &QuadratureSettings,
    lower: f64,
    d: f64,
    mut v_min: f64,
) -> Result<(f64, f64), EscapeError> {
    let mut x = lower;

    for _ in 0..settings.max_tail_steps {
        x -= settings.tail_step;
        let v = potential.value(x);
        if !v.is_finite() {
            return Err(EscapeError::Quadrature(format!(
                "potential is not finite at x = {x}"
            )));
        }
        v_min = v_min.min(v);
        if (v - v_min) / d > settings.tail_cutoff {
            return Ok((x, v_min));
        }
    }

    Err(EscapeError::Quadrature(format!(
        "potential is not confining to the left of {lower} at D = {d}"
    )))
}

/// Exact rate `1 / T(D)` for a particle started at `lower`.
pub fn exact_rate<P: Potential + ?Sized>(
    potential: &P,
    settings: &QuadratureSettings,
    lower: f64,
    x_thresh: f64,
    d: f64,
) -> Result<f64, EscapeError> {
    settings.validate()?;
    if !d.is_finite() || d <= 0.0 {
        return Err(EscapeError::InvalidConfig(format!(
            "noise strength must be finite and positive, got {d}"
        )));
    }
    if !(x_thresh > lower) {
        return Err(EscapeError::InvalidConfig(
            "x_thresh must lie above the quadrature lower limit".to_string(),
        ));
    }

    let grid = linspace(lower, x_thresh, settings.grid_points);
    let v_grid: Vec<f64> = grid.iter().map(|&x| potential.value(x)).collect();
    let v_min = v_grid.iter().copied().fold(f64::INFINITY, f64::min);

    let (cut, v_min) = left_cut(potential, settings, lower, d, v_min)?;

    let tail = linspace(cut, lower, settings.grid_points);
    let tail_weights: Vec<f64> = tail
        .iter()
        .map(|&x| (-(potential.value(x) - v_min) / d).exp())
        .collect();
    let tail_integral = trapz(&tail_weights, &tail);

    let weights: Vec<f64> = v_grid.iter().map(|&v| (-(v - v_min) / d).exp()).collect();
    let mut inner = tail_integral;
    let mut outer = Vec::with_capacity(grid.len());
    for idx in 0..grid.len() {
        if idx > 0 {
            inner += 0.5 * (weights[idx - 1] + weights[idx]) * (grid[idx] - grid[idx - 1]);
        }
        outer.push(((v_grid[idx] - v_min) / d).exp() * inner);
    }

    let mfpt = trapz(&outer, &grid) / d;
    if !mfpt.is_finite() || mfpt <= 0.0 {
        return Err(EscapeError::Quadrature(format!(
            "mean first-passage time is not finite at D = {d}"
        )));
    }

    Ok(mfpt.recip())
}

/// Exact rate at every noise strength of a sweep.
pub fn exact_rates<P: Potential + ?Sized>(
    potential: &P,
    settings: &QuadratureSettings,
    lower: f64,
    x_thresh: f64,
    d_values: &[f64],
) -> Result<RateSeries, EscapeError> {
    let mut points = Vec::with_capacity(d_values.len());
    for &d in d_values {
        let rate = exact_rate(potential, settings, lower, x_thresh, d)?;
        points.push(RatePoint::analytic(d, rate));
    }
    Ok(RateSeries { points })
}
