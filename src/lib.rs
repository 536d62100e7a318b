//! Kramers escape - Brownian barrier crossing rates
//!
//! Integrates an ensemble of overdamped Langevin particles with a fixed-step
//! Euler-Maruyama scheme, records first-passage times over an absorbing
//! threshold for a sweep of noise strengths, and reduces them to escape
//! rates that can be compared against Kramers' formula and a quadrature
//! exact rate.

pub mod config;
pub mod ensemble;
pub mod exact;
pub mod kramers;
pub mod potential;
pub mod rate;
pub mod sim;

use thiserror::Error;

// Re-export main types
pub use config::{NoiseSweep, SimulationConfig};
pub use ensemble::{EnsembleState, Particle};
pub use exact::{exact_rate, exact_rates, QuadratureSettings};
pub use kramers::{kramers_prefactor, kramers_rate, kramers_rates, BarrierGeometry};
pub use potential::{refine_extremum, Drift, Polynomial, Potential};
pub use rate::{aggregate, ComparisonRow, RateComparison, RatePoint, RateSeries};
pub use sim::{simulate, simulate_seeded, EscapeTimeTable, NOT_ESCAPED};

#[derive(Debug, Error)]
pub enum EscapeError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("{context} length mismatch: expected {expected}, got {got}")]
    LengthMismatch {
        context: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("quadrature failed: {0}")]
    Quadrature(String),
}
