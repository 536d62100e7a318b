//! Kramers' rate
//!
//! Low-noise approximation `Γ = ω exp(-E_b / D)` with the overdamped
//! prefactor `ω = sqrt(|V''(a)| |V''(b)|) / 2π`.

use std::f64::consts::TAU;

use serde::Serialize;

use crate::potential::{refine_extremum, Potential};
use crate::rate::{RatePoint, RateSeries};
use crate::EscapeError;

/// Well and barrier of a metastable potential.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BarrierGeometry {
    /// Bottom of the metastable well `a`
    pub well: f64,
    /// Top of the barrier `b`
    pub barrier: f64,
    /// `V(b) - V(a)`
    pub barrier_height: f64,
    /// `V''(a)`
    pub well_curvature: f64,
    /// `V''(b)`
    pub barrier_curvature: f64,
}

impl BarrierGeometry {
    /// Geometry at the given well and barrier locations, used as-is.
    pub fn at<P: Potential + ?Sized>(potential: &P, well: f64, barrier: f64) -> Self {
        Self {
            well,
            barrier,
            barrier_height: potential.value(barrier) - potential.value(well),
            well_curvature: potential.curvature(well),
            barrier_curvature: potential.curvature(barrier),
        }
    }

    /// Geometry after refining both guesses to stationary points of `V`.
    pub fn locate<P: Potential + ?Sized>(
        potential: &P,
        well_guess: f64,
        barrier_guess: f64,
    ) -> Result<Self, EscapeError> {
        let well = refine_extremum(potential, well_guess)?;
        let barrier = refine_extremum(potential, barrier_guess)?;
        let geometry = Self::at(potential, well, barrier);

        if geometry.well_curvature <= 0.0 {
            return Err(EscapeError::InvalidConfig(format!(
                "stationary point {well} is not a minimum"
            )));
        }
        if geometry.barrier_curvature >= 0.0 {
            return Err(EscapeError::InvalidConfig(format!(
                "stationary point {barrier} is not a barrier top"
            )));
        }

        Ok(geometry)
    }
}

pub fn kramers_prefactor(geometry: &BarrierGeometry) -> f64 {
    (geometry.well_curvature.abs() * geometry.barrier_curvature.abs()).sqrt() / TAU
}

pub fn kramers_rate(geometry: &BarrierGeometry, d: f64) -> f64 {
    kramers_prefactor(geometry) * (-geometry.barrier_height / d).exp()
}

/// Kramers' rate at every noise strength of a sweep.
pub fn kramers_rates(geometry: &BarrierGeometry, d_values: &[f64]) -> RateSeries {
    d_values
        .iter()
        .map(|&d| RatePoint::analytic(d, kramers_rate(geometry, d)))
        .collect()
}
