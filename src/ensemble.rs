//! Particle ensemble for one noise level
//!
//! Each particle carries its own ChaCha stream, so particles can be advanced
//! on any thread in any order and still reproduce the same trajectories for
//! a given seed.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use rayon::prelude::*;

use crate::potential::Drift;
use crate::sim::NOT_ESCAPED;

/// Below this many particles the step loop stays on the calling thread.
pub const PARALLEL_MIN_PARTICLES: usize = 64;

/// State of one particle: still inside the well, or escaped at a fixed time.
///
/// An escaped particle keeps no position and is never advanced again, so its
/// escape time cannot be overwritten.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Particle {
    Active { x: f64 },
    Escaped { time: f64 },
}

impl Particle {
    pub fn position(&self) -> Option<f64> {
        match *self {
            Particle::Active { x } => Some(x),
            Particle::Escaped { .. } => None,
        }
    }

    pub fn escape_time(&self) -> Option<f64> {
        match *self {
            Particle::Active { .. } => None,
            Particle::Escaped { time } => Some(time),
        }
    }
}

/// Per-step constants of the Euler-Maruyama update at one noise level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepParams {
    pub dt: f64,
    /// `sqrt(2 D dt)`
    pub noise_scale: f64,
    pub x_thresh: f64,
}

impl StepParams {
    pub fn new(dt: f64, d: f64, x_thresh: f64) -> Self {
        Self {
            dt,
            noise_scale: (2.0 * d * dt).sqrt(),
            x_thresh,
        }
    }
}

/// Ensemble buffer, allocated once per sweep and reset for each noise level.
pub struct EnsembleState {
    particles: Vec<Particle>,
    streams: Vec<ChaCha8Rng>,
    active: usize,
}

impl EnsembleState {
    pub fn new(n_particles: usize) -> Self {
        let base = ChaCha8Rng::seed_from_u64(0);
        Self {
            particles: vec![Particle::Active { x: 0.0 }; n_particles],
            streams: vec![base; n_particles],
            active: n_particles,
        }
    }

    /// Puts every particle back at `q0` and gives particle `i` stream `i` of
    /// a generator seeded with `level_seed`.
    pub fn reset(&mut self, q0: f64, level_seed: u64) {
        let base = ChaCha8Rng::seed_from_u64(level_seed);
        for (idx, (particle, stream)) in self
            .particles
            .iter_mut()
            .zip(self.streams.iter_mut())
            .enumerate()
        {
            *particle = Particle::Active { x: q0 };
            *stream = base.clone();
            stream.set_stream(idx as u64);
        }
        self.active = self.particles.len();
    }

    pub fn active_count(&self) -> usize {
        self.active
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Advances every active particle through steps `first_step..first_step + steps`
    /// and returns the number still active afterwards.
    ///
    /// Each particle runs its steps in order; particles are independent, so
    /// the block is split across threads by particle.
    pub fn advance_block<F>(
        &mut self,
        drift: &F,
        params: StepParams,
        first_step: usize,
        steps: usize,
    ) -> usize
    where
        F: Drift + ?Sized,
    {
        let escaped = if self.particles.len() >= PARALLEL_MIN_PARTICLES {
            self.particles
                .par_iter_mut()
                .zip(self.streams.par_iter_mut())
                .map(|(particle, stream)| {
                    advance_particle(particle, stream, drift, params, first_step, steps)
                })
                .filter(|&crossed| crossed)
                .count()
        } else {
            self.particles
                .iter_mut()
                .zip(self.streams.iter_mut())
                .map(|(particle, stream)| {
                    advance_particle(particle, stream, drift, params, first_step, steps)
                })
                .filter(|&crossed| crossed)
                .count()
        };

        self.active -= escaped;
        self.active
    }

    /// Writes one escape-time row: the escape time for escaped particles and
    /// `NOT_ESCAPED` for the rest.
    pub fn write_escape_times(&self, row: &mut [f64]) {
        for (slot, particle) in row.iter_mut().zip(&self.particles) {
            *slot = particle.escape_time().unwrap_or(NOT_ESCAPED);
        }
    }
}

/// Returns true if the particle crossed the threshold during this block.
fn advance_particle<F>(
    particle: &mut Particle,
    stream: &mut ChaCha8Rng,
    drift: &F,
    params: StepParams,
    first_step: usize,
    steps: usize,
) -> bool
where
    F: Drift + ?Sized,
{
    let Particle::Active { mut x } = *particle else {
        return false;
    };

    for step in first_step..first_step + steps {
        let xi: f64 = stream.sample(StandardNormal);
        x += params.dt * drift.drift(x) + params.noise_scale * xi;

        if x > params.x_thresh {
            // Crossing is observed at the end of step `step`.
            *particle = Particle::Escaped {
                time: (step + 1) as f64 * params.dt,
            };
            return true;
        }
    }

    *particle = Particle::Active { x };
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zero_drift(_: f64) -> f64 {
        0.0
    }

    #[test]
    fn reset_puts_everything_back_at_start() {
        let mut ensemble = EnsembleState::new(5);
        ensemble.reset(0.25, 7);
        assert_eq!(ensemble.active_count(), 5);
        assert!(ensemble
            .particles()
            .iter()
            .all(|p| p.position() == Some(0.25)));
    }

    #[test]
    fn strong_drift_escapes_on_first_step() {
        let mut ensemble = EnsembleState::new(3);
        ensemble.reset(0.0, 1);
        let params = StepParams::new(0.1, 1e-12, 1.0);

        let remaining = ensemble.advance_block(&|_: f64| 100.0, params, 0, 4);
        assert_eq!(remaining, 0);
        for particle in ensemble.particles() {
            assert_eq!(particle.escape_time(), Some(0.1));
        }
    }

    #[test]
    fn escape_time_is_latched() {
        let mut ensemble = EnsembleState::new(2);
        ensemble.reset(0.0, 3);
        let params = StepParams::new(0.5, 1e-12, 1.0);

        // Pushes right, crosses at the end of the third step, then would
        // come back if it were still integrated.
        ensemble.advance_block(&|_: f64| 0.8, params, 0, 3);
        let first: Vec<_> = ensemble.particles().to_vec();
        ensemble.advance_block(&|_: f64| -50.0, params, 3, 10);

        assert_eq!(ensemble.particles(), first.as_slice());
        assert!(first.iter().all(|p| p.escape_time() == Some(1.5)));
    }

    #[test]
    fn same_seed_same_trajectories() {
        let params = StepParams::new(0.01, 0.5, 10.0);
        let mut a = EnsembleState::new(PARALLEL_MIN_PARTICLES + 3);
        let mut b = EnsembleState::new(PARALLEL_MIN_PARTICLES + 3);
        a.reset(0.0, 99);
        b.reset(0.0, 99);

        a.advance_block(&zero_drift, params, 0, 50);
        for block in 0..5 {
            b.advance_block(&zero_drift, params, block * 10, 10);
        }
        assert_eq!(a.particles(), b.particles());
    }

    #[test]
    fn particles_get_independent_noise() {
        let mut ensemble = EnsembleState::new(8);
        ensemble.reset(0.0, 11);
        ensemble.advance_block(&zero_drift, StepParams::new(0.01, 1.0, 1e9), 0, 1);

        let mut positions: Vec<f64> = ensemble
            .particles()
            .iter()
            .filter_map(Particle::position)
            .collect();
        positions.sort_by(|a, b| a.total_cmp(b));
        positions.dedup();
        assert_eq!(positions.len(), 8);
    }

    #[test]
    fn active_particles_write_sentinel() {
        let mut ensemble = EnsembleState::new(4);
        ensemble.reset(0.0, 5);
        let mut row = vec![-1.0; 4];
        ensemble.write_escape_times(&mut row);
        assert!(row.iter().all(|&t| t == NOT_ESCAPED));
    }
}
