//! Trajectory ensemble simulator
//!
//! Integrates `N` independent realizations of `dx = F(x) dt + sqrt(2D) dW`
//! with the fixed-step Euler-Maruyama scheme for each noise strength `D`,
//! and records when each realization first crosses the absorbing threshold.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::SimulationConfig;
use crate::ensemble::{EnsembleState, StepParams};
use crate::potential::Drift;
use crate::EscapeError;

/// Table entry for a particle that did not escape within the horizon.
pub const NOT_ESCAPED: f64 = 0.0;

/// Steps each particle takes between checks for a fully escaped ensemble.
const STEP_BLOCK: usize = 256;

/// Escape times indexed by (noise level, particle), stored row-major.
///
/// Entries are either [`NOT_ESCAPED`] or an escape time in `(0, horizon]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EscapeTimeTable {
    n_levels: usize,
    n_particles: usize,
    horizon: f64,
    times: Vec<f64>,
}

impl EscapeTimeTable {
    /// All-sentinel table.
    pub fn new(n_levels: usize, n_particles: usize, horizon: f64) -> Self {
        Self {
            n_levels,
            n_particles,
            horizon,
            times: vec![NOT_ESCAPED; n_levels * n_particles],
        }
    }

    /// Builds a table from explicit rows, which must all have the same length.
    pub fn from_rows(rows: &[Vec<f64>], horizon: f64) -> Result<Self, EscapeError> {
        let n_particles = rows.first().map_or(0, Vec::len);
        let mut times = Vec::with_capacity(rows.len() * n_particles);

        for row in rows {
            if row.len() != n_particles {
                return Err(EscapeError::LengthMismatch {
                    context: "escape-time row",
                    expected: n_particles,
                    got: row.len(),
                });
            }
            times.extend_from_slice(row);
        }

        Ok(Self {
            n_levels: rows.len(),
            n_particles,
            horizon,
            times,
        })
    }

    /// `(noise levels, particles)`
    pub fn shape(&self) -> (usize, usize) {
        (self.n_levels, self.n_particles)
    }

    pub fn n_levels(&self) -> usize {
        self.n_levels
    }

    /// Censoring horizon `n_steps * dt`.
    pub fn horizon(&self) -> f64 {
        self.horizon
    }

    pub fn row(&self, level: usize) -> &[f64] {
        let start = level * self.n_particles;
        &self.times[start..start + self.n_particles]
    }

    fn row_mut(&mut self, level: usize) -> &mut [f64] {
        let start = level * self.n_particles;
        &mut self.times[start..start + self.n_particles]
    }

    pub fn get(&self, level: usize, particle: usize) -> f64 {
        self.row(level)[particle]
    }

    /// One slice per noise level, empty when the table has no particles.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        (0..self.n_levels).map(move |level| self.row(level))
    }

    pub fn escaped_count(&self, level: usize) -> usize {
        self.row(level).iter().filter(|&&t| t > NOT_ESCAPED).count()
    }

    /// Fraction of particles at `level` that escaped within the horizon.
    pub fn escaped_fraction(&self, level: usize) -> f64 {
        if self.n_particles == 0 {
            return 0.0;
        }
        self.escaped_count(level) as f64 / self.n_particles as f64
    }
}

/// Runs the ensemble for every noise level in `config.d_values`.
///
/// `rng` supplies one seed per noise level; particle `i` then draws its noise
/// from its own stream of that seed, so every particle's increments are
/// independent of every other particle's and of its own earlier steps.
///
/// # Errors
/// `InvalidConfig` if the configuration does not validate. A noise level at
/// which no particle escapes is not an error; its row is all sentinels.
pub fn simulate<F, R>(
    config: &SimulationConfig,
    drift: &F,
    rng: &mut R,
) -> Result<EscapeTimeTable, EscapeError>
where
    F: Drift + ?Sized,
    R: Rng + ?Sized,
{
    config.validate()?;

    let mut table = EscapeTimeTable::new(
        config.d_values.len(),
        config.n_particles,
        config.horizon(),
    );
    let mut ensemble = EnsembleState::new(config.n_particles);

    for (level, &d) in config.d_values.iter().enumerate() {
        let level_seed: u64 = rng.gen();
        ensemble.reset(config.q0, level_seed);
        let params = StepParams::new(config.dt, d, config.x_thresh);

        let mut step = 0;
        while step < config.n_steps {
            let block = STEP_BLOCK.min(config.n_steps - step);
            let active = ensemble.advance_block(drift, params, step, block);
            step += block;
            if active == 0 {
                break;
            }
        }

        ensemble.write_escape_times(table.row_mut(level));
        debug!(
            level,
            d,
            steps = step,
            escaped = table.escaped_count(level),
            particles = config.n_particles,
            "noise level finished"
        );
    }

    info!(
        levels = config.d_values.len(),
        particles = config.n_particles,
        n_steps = config.n_steps,
        "ensemble sweep finished"
    );
    Ok(table)
}

/// [`simulate`] with a ChaCha generator seeded from `config.seed`, or from
/// OS entropy when no seed is set.
pub fn simulate_seeded<F>(
    config: &SimulationConfig,
    drift: &F,
) -> Result<EscapeTimeTable, EscapeError>
where
    F: Drift + ?Sized,
{
    let mut rng = match config.seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };
    simulate(config, drift, &mut rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::potential::Polynomial;

    fn quartic_config(n_particles: usize, n_steps: usize, d_values: Vec<f64>) -> SimulationConfig {
        SimulationConfig {
            n_particles,
            n_steps,
            d_values,
            seed: Some(42),
            ..Default::default()
        }
    }

    #[test]
    fn table_has_one_row_per_level() {
        let config = quartic_config(20, 200, vec![0.5, 1.0, 2.0]);
        let table = simulate_seeded(&config, &Polynomial::tilted_quartic()).unwrap();

        assert_eq!(table.shape(), (3, 20));
        assert_eq!(table.rows().count(), 3);
        for row in table.rows() {
            for &t in row {
                assert!(t == NOT_ESCAPED || (t > 0.0 && t <= table.horizon() + 1e-12));
            }
        }
    }

    #[test]
    fn single_particle_single_step() {
        let config = quartic_config(1, 1, vec![4.0]);
        let table = simulate_seeded(&config, &Polynomial::tilted_quartic()).unwrap();

        assert_eq!(table.shape(), (1, 1));
        let t = table.get(0, 0);
        assert!(t == NOT_ESCAPED || (t > 0.0 && t <= config.dt));
    }

    #[test]
    fn same_seed_reproduces_table() {
        let config = quartic_config(70, 300, vec![1.0, 3.0]);
        let v = Polynomial::tilted_quartic();
        let a = simulate_seeded(&config, &v).unwrap();
        let b = simulate_seeded(&config, &v).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn unreachable_threshold_gives_sentinel_row() {
        let config = SimulationConfig {
            x_thresh: 50.0,
            ..quartic_config(10, 100, vec![0.1, 0.2])
        };
        let table = simulate_seeded(&config, &Polynomial::tilted_quartic()).unwrap();
        for level in 0..2 {
            assert_eq!(table.escaped_count(level), 0);
            assert_eq!(table.escaped_fraction(level), 0.0);
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = quartic_config(10, 100, vec![0.5, -0.5]);
        let result = simulate_seeded(&config, &Polynomial::tilted_quartic());
        assert!(matches!(result, Err(EscapeError::InvalidConfig(_))));
    }

    #[test]
    fn constant_push_escape_time_is_deterministic() {
        // With negligible noise and unit drift, x(t) = t; threshold 1.05 at dt
        // 0.01 is first exceeded at the end of step 105 (0-based 104) or 106
        // depending on rounding of the accumulated sum.
        let config = SimulationConfig {
            q0: 0.0,
            x_thresh: 1.05,
            ..quartic_config(5, 500, vec![1e-14])
        };
        let table = simulate_seeded(&config, &|_: f64| 1.0).unwrap();
        for &t in table.row(0) {
            assert!((t - 1.05).abs() <= 0.011, "escape time {t}");
        }
    }

    #[test]
    fn from_rows_checks_lengths() {
        let table = EscapeTimeTable::from_rows(&[vec![1.0, 0.0], vec![0.0, 0.0]], 10.0).unwrap();
        assert_eq!(table.shape(), (2, 2));
        assert_eq!(table.escaped_fraction(0), 0.5);

        let ragged = EscapeTimeTable::from_rows(&[vec![1.0, 0.0], vec![0.0]], 10.0);
        assert!(matches!(ragged, Err(EscapeError::LengthMismatch { .. })));
    }

    #[test]
    fn zero_particle_table_yields_empty_rows() {
        let table = EscapeTimeTable::new(3, 0, 5.0);
        let rows: Vec<&[f64]> = table.rows().collect();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|row| row.is_empty()));
        assert_eq!(table.escaped_fraction(1), 0.0);
    }
}
