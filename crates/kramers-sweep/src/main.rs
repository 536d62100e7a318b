use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use kramers_escape::{
    aggregate, exact_rates, kramers_prefactor, kramers_rates, simulate_seeded, RateComparison,
    RatePoint, RateSeries,
};
use kramers_sweep::config::SweepConfig;
use kramers_sweep::io::{
    resolve_run_output_dir, write_escape_times_csv, write_manifest_json, write_rates_csv,
    Manifest, OUTPUT_SCHEMA_VERSION,
};

#[derive(Debug, Parser)]
#[command(name = "kramers-sweep")]
#[command(about = "Simulated versus Kramers versus exact escape rates over a noise sweep")]
struct Cli {
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "output-kramers-sweep")]
    outdir: PathBuf,

    #[arg(long)]
    seed: Option<u64>,

    /// Override the number of particles per noise level
    #[arg(long)]
    particles: Option<usize>,

    /// Override the number of time steps per noise level
    #[arg(long)]
    steps: Option<usize>,

    /// Skip the quadrature exact rate
    #[arg(long, default_value_t = false)]
    no_exact: bool,

    /// Skip the per-particle escape time dump
    #[arg(long, default_value_t = false)]
    no_escape_times: bool,
}

fn resolve_default_config_path() -> PathBuf {
    let local = PathBuf::from("configs").join("default.toml");
    if local.exists() {
        return local;
    }

    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("configs")
        .join("default.toml")
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to build log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

fn undefined_series(d_values: &[f64]) -> RateSeries {
    d_values
        .iter()
        .map(|&d| RatePoint::analytic(d, f64::NAN))
        .collect()
}

fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(resolve_default_config_path);
    let mut cfg = SweepConfig::from_toml_file(&config_path)?;
    if cfg.schema_version != OUTPUT_SCHEMA_VERSION {
        bail!(
            "config schema_version {} does not match output schema {}",
            cfg.schema_version,
            OUTPUT_SCHEMA_VERSION
        );
    }

    if let Some(particles) = cli.particles {
        cfg.simulation.n_particles = particles;
    }
    if let Some(steps) = cli.steps {
        cfg.simulation.n_steps = steps;
    }
    let seed = cli
        .seed
        .or(cfg.simulation.seed)
        .unwrap_or_else(rand::random);
    cfg.simulation.seed = Some(seed);
    cfg.validate()?;

    let run_outdir = resolve_run_output_dir(&cli.outdir)?;
    let sim = &cfg.simulation;
    info!(
        config = %config_path.display(),
        levels = sim.d_values.len(),
        particles = sim.n_particles,
        n_steps = sim.n_steps,
        seed,
        "starting sweep"
    );

    let started = Instant::now();
    let table = simulate_seeded(sim, &cfg.potential).context("ensemble simulation failed")?;
    let numerical = aggregate(&table, &sim.d_values)?;
    let levels_without_escape = numerical.iter().filter(|p| p.escaped == 0).count();
    if levels_without_escape > 0 {
        warn!(
            levels_without_escape,
            "some noise levels produced no escapes; their rates are NA"
        );
    }

    let geometry = cfg.geometry.resolve(&cfg.potential)?;
    let kramers = kramers_rates(&geometry, &sim.d_values);
    let exact = if cli.no_exact {
        undefined_series(&sim.d_values)
    } else {
        exact_rates(
            &cfg.potential,
            &cfg.quadrature,
            cfg.quadrature_lower,
            sim.x_thresh,
            &sim.d_values,
        )
        .context("exact rate quadrature failed")?
    };
    let comparison = RateComparison::new(numerical, kramers, exact)?;
    let runtime_secs = started.elapsed().as_secs_f64();

    write_rates_csv(&run_outdir.join("rates.csv"), &comparison.rows())?;
    if !cli.no_escape_times {
        write_escape_times_csv(&run_outdir.join("escape_times.csv"), &table, &sim.d_values)?;
    }
    write_manifest_json(
        &run_outdir,
        &Manifest {
            schema_version: OUTPUT_SCHEMA_VERSION.to_string(),
            seed,
            simulation: sim.clone(),
            potential_coefficients: cfg.potential.coefficients.clone(),
            geometry,
            kramers_prefactor: kramers_prefactor(&geometry),
            quadrature_lower: cfg.quadrature_lower,
            exact_rates: !cli.no_exact,
            levels_without_escape,
            runtime_secs,
            note: "Euler-Maruyama escape rates with Kramers and quadrature references".to_string(),
        },
    )?;

    info!(runtime_secs, "sweep finished");
    println!("wrote outputs to {}", run_outdir.display());
    Ok(())
}
