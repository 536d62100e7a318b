//! End-to-end sweeps on the tilted quartic.

use kramers_escape::{
    aggregate, exact_rate, simulate, simulate_seeded, Polynomial, QuadratureSettings,
    SimulationConfig,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn quartic_config(
    n_particles: usize,
    n_steps: usize,
    d_values: Vec<f64>,
    seed: u64,
) -> SimulationConfig {
    SimulationConfig {
        n_particles,
        n_steps,
        dt: 0.01,
        d_values,
        q0: 0.0857,
        x_thresh: 1.05,
        seed: Some(seed),
    }
}

#[test]
fn low_noise_rate_is_far_below_high_noise_rate() {
    let config = quartic_config(500, 50_000, vec![0.1, 4.0], 2024);
    let v = Polynomial::tilted_quartic();

    let table = simulate_seeded(&config, &v).unwrap();
    assert_eq!(table.shape(), (2, 500));

    let rates = aggregate(&table, &config.d_values).unwrap();
    let low = rates.points[0];
    let high = rates.points[1];

    assert!(low.escaped > 0, "no escapes at D = 0.1");
    assert!(low.rate.is_finite() && low.rate > 0.0);
    assert!(high.escaped as f64 >= 0.99 * 500.0);
    assert!(low.rate * 10.0 < high.rate, "low {} high {}", low.rate, high.rate);
}

#[test]
fn simulated_rate_tracks_quadrature_rate() {
    let config = quartic_config(400, 5_000, vec![1.0], 7);
    let v = Polynomial::tilted_quartic();

    let table = simulate_seeded(&config, &v).unwrap();
    let numerical = aggregate(&table, &config.d_values).unwrap().points[0];
    let exact = exact_rate(&v, &QuadratureSettings::default(), config.q0, config.x_thresh, 1.0)
        .unwrap();

    let relative = (numerical.rate - exact).abs() / exact;
    assert!(relative < 0.25, "numerical {} exact {exact}", numerical.rate);
}

#[test]
fn mean_passage_time_falls_as_noise_grows() {
    let d_values = vec![0.3, 0.6, 1.2];
    let v = Polynomial::tilted_quartic();
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    let mut mean_times = vec![0.0; d_values.len()];
    let trials = 5;

    for _ in 0..trials {
        let config = quartic_config(200, 20_000, d_values.clone(), 0);
        let table = simulate(&config, &v, &mut rng).unwrap();
        let series = aggregate(&table, &d_values).unwrap();
        for (acc, point) in mean_times.iter_mut().zip(series.iter()) {
            *acc += point.mean_first_passage_time / trials as f64;
        }
    }

    assert!(mean_times.iter().all(|t| t.is_finite()));
    assert!(
        mean_times.windows(2).all(|pair| pair[0] > pair[1]),
        "mean times {mean_times:?}"
    );
}

#[test]
fn escaped_fraction_settles_with_more_particles() {
    let v = Polynomial::tilted_quartic();
    let fractions: Vec<f64> = [11, 12]
        .into_iter()
        .map(|seed| {
            let config = quartic_config(2_000, 400, vec![0.8], seed);
            simulate_seeded(&config, &v).unwrap().escaped_fraction(0)
        })
        .collect();

    assert!(fractions.iter().all(|f| *f > 0.0 && *f < 1.0), "{fractions:?}");
    assert!((fractions[0] - fractions[1]).abs() < 0.06, "{fractions:?}");
}
