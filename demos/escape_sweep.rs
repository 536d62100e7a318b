//! Escape-Rate Sweep Example
//!
//! Simulates the tilted quartic at a handful of noise strengths and prints
//! the numerical rate next to Kramers' rate and the quadrature exact rate

use kramers_escape::{
    aggregate, exact_rates, kramers_prefactor, kramers_rates, simulate_seeded, BarrierGeometry,
    Polynomial, QuadratureSettings, RateComparison, SimulationConfig,
};
use std::error::Error;
use std::fs::{self, File};
use std::io::Write;

fn main() -> Result<(), Box<dyn Error>> {
    println!("Running Kramers Escape-Rate Sweep...\n");

    fs::create_dir_all("out")?;

    let potential = Polynomial::tilted_quartic();
    let config = SimulationConfig {
        n_particles: 300,
        n_steps: 20_000,
        dt: 0.01,
        d_values: vec![0.15, 0.25, 0.4, 0.7, 1.0, 2.0, 4.0],
        q0: 0.0857,
        x_thresh: 1.05,
        seed: Some(42),
    };
    let geometry = BarrierGeometry::locate(&potential, 0.086, 0.846)?;

    println!("Configuration:");
    println!("  Particles: {}", config.n_particles);
    println!("  Time step: {}", config.dt);
    println!("  Total steps: {} (horizon t={:.1})", config.n_steps, config.horizon());
    println!("  Well / barrier: {:.4} / {:.4}", geometry.well, geometry.barrier);
    println!("  Barrier height: {:.4}", geometry.barrier_height);
    println!("  Kramers prefactor: {:.4}", kramers_prefactor(&geometry));
    println!();

    let table = simulate_seeded(&config, &potential)?;
    let numerical = aggregate(&table, &config.d_values)?;
    let kramers = kramers_rates(&geometry, &config.d_values);
    let exact = exact_rates(
        &potential,
        &QuadratureSettings::default(),
        0.0,
        config.x_thresh,
        &config.d_values,
    )?;
    let comparison = RateComparison::new(numerical, kramers, exact)?;

    println!("RATE SUMMARY");
    println!("============");
    println!(
        "{:>6} {:>8} {:>12} {:>12} {:>12}",
        "D", "escaped", "numerical", "kramers", "exact"
    );
    for row in comparison.rows() {
        println!(
            "{:>6.2} {:>8.3} {:>12.6} {:>12.6} {:>12.6}",
            row.d, row.escaped_fraction, row.numerical_rate, row.kramers_rate, row.exact_rate
        );
    }

    let csv_path = "out/escape_rates.csv";
    let mut file = File::create(csv_path)?;
    writeln!(file, "d,inv_d,log_numerical,log_kramers,log_exact")?;
    for row in comparison.rows() {
        writeln!(
            file,
            "{:.6},{:.6},{:.6},{:.6},{:.6}",
            row.d, row.inv_d, row.log_numerical, row.log_kramers, row.log_exact
        )?;
    }

    println!("\nCSV output written to: {}", csv_path);
    println!("Done!");

    Ok(())
}
