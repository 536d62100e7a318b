//! Potentials and drift functions
//!
//! The simulator only needs the drift `F(x) = -V'(x)`; the analytic and
//! quadrature rates also need `V` itself and its curvature.

use serde::{Deserialize, Serialize};

use crate::EscapeError;

const NEWTON_MAX_ITER: usize = 100;
const NEWTON_TOL: f64 = 1e-12;

/// Deterministic drift term of the overdamped Langevin equation.
///
/// Any `Fn(f64) -> f64` closure is a drift. Implementations must be `Sync`
/// because particles are advanced in parallel.
pub trait Drift: Sync {
    fn drift(&self, x: f64) -> f64;
}

impl<F> Drift for F
where
    F: Fn(f64) -> f64 + Sync,
{
    fn drift(&self, x: f64) -> f64 {
        self(x)
    }
}

/// One-dimensional scalar potential `V(x)`.
pub trait Potential {
    fn value(&self, x: f64) -> f64;

    /// `V'(x)`
    fn derivative(&self, x: f64) -> f64;

    /// `V''(x)`
    fn curvature(&self, x: f64) -> f64;

    /// Conservative force `-V'(x)`
    fn force(&self, x: f64) -> f64 {
        -self.derivative(x)
    }
}

/// Polynomial potential with coefficients in ascending powers of `x`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polynomial {
    pub coefficients: Vec<f64>,
}

impl Polynomial {
    pub fn new(coefficients: Vec<f64>) -> Self {
        Self { coefficients }
    }

    /// `x^4 - 4x^3 + 4x^2 - 0.6x + 1.6`: a metastable well near 0.086 and a
    /// barrier near 0.846.
    pub fn tilted_quartic() -> Self {
        Self::new(vec![1.6, -0.6, 4.0, -4.0, 1.0])
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len().saturating_sub(1)
    }
}

impl Default for Polynomial {
    fn default() -> Self {
        Self::tilted_quartic()
    }
}

impl Potential for Polynomial {
    fn value(&self, x: f64) -> f64 {
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, &c| acc * x + c)
    }

    fn derivative(&self, x: f64) -> f64 {
        self.coefficients
            .iter()
            .enumerate()
            .skip(1)
            .rev()
            .fold(0.0, |acc, (k, &c)| acc * x + k as f64 * c)
    }

    fn curvature(&self, x: f64) -> f64 {
        self.coefficients
            .iter()
            .enumerate()
            .skip(2)
            .rev()
            .fold(0.0, |acc, (k, &c)| acc * x + (k * (k - 1)) as f64 * c)
    }
}

impl Drift for Polynomial {
    fn drift(&self, x: f64) -> f64 {
        self.force(x)
    }
}

/// Newton iteration on `V'` starting from `guess`, returning the nearby
/// stationary point (well minimum or barrier top).
pub fn refine_extremum<P: Potential + ?Sized>(
    potential: &P,
    guess: f64,
) -> Result<f64, EscapeError> {
    let mut x = guess;

    for _ in 0..NEWTON_MAX_ITER {
        let slope = potential.derivative(x);
        let curvature = potential.curvature(x);
        if !curvature.is_finite() || curvature == 0.0 {
            return Err(EscapeError::InvalidConfig(format!(
                "degenerate curvature while refining extremum near {guess}"
            )));
        }

        let step = slope / curvature;
        x -= step;
        if !x.is_finite() {
            break;
        }
        if step.abs() < NEWTON_TOL {
            return Ok(x);
        }
    }

    Err(EscapeError::InvalidConfig(format!(
        "no stationary point found near {guess}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn quartic_matches_closed_form() {
        let v = Polynomial::tilted_quartic();
        for &x in &[-1.3_f64, 0.0, 0.0857, 0.5, 1.05, 2.2] {
            let value = x.powi(4) - 4.0 * x.powi(3) + 4.0 * x * x - 0.6 * x + 1.6;
            let force = -4.0 * x.powi(3) + 12.0 * x * x - 8.0 * x + 0.6;
            let curvature = 12.0 * x * x - 24.0 * x + 8.0;
            assert_relative_eq!(v.value(x), value, epsilon = 1e-12);
            assert_relative_eq!(v.force(x), force, epsilon = 1e-12);
            assert_relative_eq!(v.curvature(x), curvature, epsilon = 1e-12);
        }
    }

    #[test]
    fn quartic_extrema_match_tuned_locations() {
        let v = Polynomial::tilted_quartic();
        let well = refine_extremum(&v, 0.086).unwrap();
        let barrier = refine_extremum(&v, 0.846).unwrap();

        assert!((well - 0.086).abs() < 5e-3);
        assert!((barrier - 0.846).abs() < 5e-3);
        assert!(v.curvature(well) > 0.0);
        assert!(v.curvature(barrier) < 0.0);
        assert!(v.derivative(well).abs() < 1e-9);
    }

    #[test]
    fn closures_and_potentials_are_drifts() {
        let linear = |x: f64| 1.0 - x;
        assert_eq!(linear.drift(0.25), 0.75);

        let v = Polynomial::tilted_quartic();
        assert_eq!(Drift::drift(&v, 0.3), v.force(0.3));
    }

    #[test]
    fn flat_potential_has_no_extremum() {
        let flat = Polynomial::new(vec![2.0, 1.0]);
        assert!(matches!(
            refine_extremum(&flat, 0.0),
            Err(EscapeError::InvalidConfig(_))
        ));
        assert_eq!(flat.degree(), 1);
    }
}
