use anyhow::{bail, Context, Result};
use chrono::Utc;
use csv::WriterBuilder;
use kramers_escape::{BarrierGeometry, ComparisonRow, EscapeTimeTable, SimulationConfig};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const OUTPUT_SCHEMA_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub schema_version: String,
    pub seed: u64,
    pub simulation: SimulationConfig,
    pub potential_coefficients: Vec<f64>,
    pub geometry: BarrierGeometry,
    pub kramers_prefactor: f64,
    pub quadrature_lower: f64,
    pub exact_rates: bool,
    pub levels_without_escape: usize,
    pub runtime_secs: f64,
    pub note: String,
}

fn fmt_f64(v: f64) -> String {
    if v.is_finite() {
        format!("{v:.10}")
    } else {
        "NA".to_string()
    }
}

pub fn ensure_outdir(outdir: &Path) -> Result<()> {
    fs::create_dir_all(outdir)
        .with_context(|| format!("failed to create output directory: {}", outdir.display()))
}

/// Creates `<base>/<UTC timestamp>`, adding a numeric suffix if that run
/// directory already exists.
pub fn resolve_run_output_dir(base_outdir: &Path) -> Result<PathBuf> {
    ensure_outdir(base_outdir)?;

    let stamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
    let mut candidate = base_outdir.join(&stamp);
    let mut suffix = 1usize;
    while candidate.exists() {
        if suffix > 999 {
            bail!(
                "failed to allocate unique run output directory under {}",
                base_outdir.display()
            );
        }
        candidate = base_outdir.join(format!("{stamp}_{suffix:03}"));
        suffix += 1;
    }

    ensure_outdir(&candidate)?;
    Ok(candidate)
}

pub fn write_rates_csv(path: &Path, rows: &[ComparisonRow]) -> Result<()> {
    let mut wtr = WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("failed to open rates.csv for writing: {}", path.display()))?;

    wtr.write_record([
        "d",
        "inv_d",
        "escaped_fraction",
        "numerical_rate",
        "kramers_rate",
        "exact_rate",
        "log_numerical",
        "log_kramers",
        "log_exact",
        "schema_version",
    ])?;

    for row in rows {
        wtr.write_record([
            fmt_f64(row.d).as_str(),
            &fmt_f64(row.inv_d),
            &fmt_f64(row.escaped_fraction),
            &fmt_f64(row.numerical_rate),
            &fmt_f64(row.kramers_rate),
            &fmt_f64(row.exact_rate),
            &fmt_f64(row.log_numerical),
            &fmt_f64(row.log_kramers),
            &fmt_f64(row.log_exact),
            OUTPUT_SCHEMA_VERSION,
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Long-format escape times, escaped particles only.
pub fn write_escape_times_csv(
    path: &Path,
    table: &EscapeTimeTable,
    d_values: &[f64],
) -> Result<()> {
    if d_values.len() != table.n_levels() {
        bail!(
            "escape table has {} rows but {} noise levels were given",
            table.n_levels(),
            d_values.len()
        );
    }

    let mut wtr = WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| {
            format!(
                "failed to open escape_times.csv for writing: {}",
                path.display()
            )
        })?;

    wtr.write_record(["d_index", "d", "particle", "escape_time"])?;

    for (level, (row, &d)) in table.rows().zip(d_values).enumerate() {
        for (particle, &t) in row.iter().enumerate() {
            if t <= 0.0 {
                continue;
            }
            wtr.write_record([
                level.to_string(),
                fmt_f64(d),
                particle.to_string(),
                fmt_f64(t),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}

pub fn write_manifest_json(outdir: &Path, manifest: &Manifest) -> Result<PathBuf> {
    let path = outdir.join("manifest.json");
    let payload = serde_json::to_string_pretty(manifest).context("failed to serialize manifest")?;
    fs::write(&path, payload)
        .with_context(|| format!("failed to write manifest: {}", path.display()))?;
    Ok(path)
}
