use kramers_escape::{aggregate, simulate_seeded, Polynomial, SimulationConfig, NOT_ESCAPED};
use proptest::prelude::*;

fn noise_levels() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::btree_set(50_u32..5_000, 1..4)
        .prop_map(|set| set.into_iter().map(|milli| milli as f64 / 1_000.0).collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn table_shape_and_bounds(
        n_particles in 1_usize..24,
        n_steps in 1_usize..400,
        dt in 0.001_f64..0.05,
        d_values in noise_levels(),
        seed in any::<u64>(),
    ) {
        let config = SimulationConfig {
            n_particles,
            n_steps,
            dt,
            d_values: d_values.clone(),
            seed: Some(seed),
            ..Default::default()
        };
        let table = simulate_seeded(&config, &Polynomial::tilted_quartic()).unwrap();
        let horizon = config.horizon();

        prop_assert_eq!(table.shape(), (d_values.len(), n_particles));
        for row in table.rows() {
            for &t in row {
                prop_assert!(t == NOT_ESCAPED || (t > 0.0 && t <= horizon * (1.0 + 1e-12)));
            }
        }

        let series = aggregate(&table, &d_values).unwrap();
        prop_assert_eq!(series.d_values(), d_values);
        for point in series.iter() {
            if point.escaped == 0 {
                prop_assert!(point.rate.is_nan());
            } else {
                prop_assert!((point.rate * point.mean_first_passage_time - 1.0).abs() < 1e-12);
            }
        }
    }
}
