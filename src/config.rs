//! Simulation parameters
//!
//! The numeric block handed to [`crate::simulate`]. The drift is supplied
//! alongside it as a [`crate::Drift`] value so that this struct stays plain
//! data and can be loaded from a file.

use serde::{Deserialize, Serialize};

use crate::EscapeError;

/// Escape threshold used for the tilted quartic, just past its barrier.
pub const DEFAULT_X_THRESH: f64 = 1.05;
/// Starting point at the bottom of the tilted quartic's metastable well.
pub const DEFAULT_Q0: f64 = 0.0857;

/// Immutable parameters for one ensemble sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of independent particles per noise level
    pub n_particles: usize,
    /// Number of fixed Euler-Maruyama steps per noise level
    pub n_steps: usize,
    /// Time step
    pub dt: f64,
    /// Noise strengths, processed in the given order
    pub d_values: Vec<f64>,
    /// Initial position of every particle
    pub q0: f64,
    /// Absorbing threshold, a particle escapes once `x > x_thresh`
    pub x_thresh: f64,
    /// Seed for the particle noise streams; `None` draws one from entropy
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            n_particles: 500,
            n_steps: 50_000,
            dt: 0.01,
            d_values: NoiseSweep::default().grid(),
            q0: DEFAULT_Q0,
            x_thresh: DEFAULT_X_THRESH,
            seed: None,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), EscapeError> {
        if self.n_particles == 0 {
            return Err(EscapeError::InvalidConfig(
                "n_particles must be greater than zero".to_string(),
            ));
        }

        if self.n_steps == 0 {
            return Err(EscapeError::InvalidConfig(
                "n_steps must be greater than zero".to_string(),
            ));
        }

        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(EscapeError::InvalidConfig(
                "dt must be finite and greater than zero".to_string(),
            ));
        }

        if !self.q0.is_finite() || !self.x_thresh.is_finite() {
            return Err(EscapeError::InvalidConfig(
                "q0 and x_thresh must be finite".to_string(),
            ));
        }

        if self.x_thresh <= self.q0 {
            return Err(EscapeError::InvalidConfig(
                "x_thresh must lie above q0".to_string(),
            ));
        }

        validate_noise_levels(&self.d_values)
    }

    /// Simulated time span `n_steps * dt`; particles still active at the end
    /// are censored at this horizon.
    pub fn horizon(&self) -> f64 {
        self.n_steps as f64 * self.dt
    }

    pub fn noise_levels(&self) -> usize {
        self.d_values.len()
    }
}

/// Checks that a noise sweep is non-empty, positive, finite and free of
/// duplicates.
pub fn validate_noise_levels(d_values: &[f64]) -> Result<(), EscapeError> {
    if d_values.is_empty() {
        return Err(EscapeError::InvalidConfig(
            "d_values must contain at least one noise strength".to_string(),
        ));
    }

    if let Some(bad) = d_values.iter().find(|d| !d.is_finite() || **d <= 0.0) {
        return Err(EscapeError::InvalidConfig(format!(
            "noise strengths must be finite and positive, got {bad}"
        )));
    }

    let mut sorted = d_values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    if let Some(pair) = sorted.windows(2).find(|pair| pair[0] == pair[1]) {
        return Err(EscapeError::InvalidConfig(format!(
            "noise strengths must be distinct, {} appears more than once",
            pair[0]
        )));
    }

    Ok(())
}

/// Evenly spaced noise strengths between `d_min` and `d_max` inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseSweep {
    pub d_min: f64,
    pub d_max: f64,
    pub num_d: usize,
}

impl Default for NoiseSweep {
    fn default() -> Self {
        Self {
            d_min: 0.1,
            d_max: 4.0,
            num_d: 300,
        }
    }
}

impl NoiseSweep {
    pub fn grid(&self) -> Vec<f64> {
        match self.num_d {
            0 => Vec::new(),
            1 => vec![self.d_min],
            n => {
                let span = self.d_max - self.d_min;
                let denom = (n - 1) as f64;
                (0..n)
                    .map(|idx| self.d_min + span * idx as f64 / denom)
                    .collect()
            }
        }
    }
}
