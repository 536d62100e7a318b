use anyhow::{bail, Context, Result};
use kramers_escape::{
    BarrierGeometry, NoiseSweep, Polynomial, QuadratureSettings, SimulationConfig,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Well and barrier locations of the potential, either used as given or
/// refined to the nearest stationary points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeometryGuess {
    pub well: f64,
    pub barrier: f64,
    #[serde(default)]
    pub refine: bool,
}

impl Default for GeometryGuess {
    fn default() -> Self {
        Self {
            well: 0.086,
            barrier: 0.846,
            refine: false,
        }
    }
}

impl GeometryGuess {
    pub fn resolve(&self, potential: &Polynomial) -> Result<BarrierGeometry> {
        if self.refine {
            BarrierGeometry::locate(potential, self.well, self.barrier)
                .context("failed to refine well/barrier locations")
        } else {
            Ok(BarrierGeometry::at(potential, self.well, self.barrier))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    pub schema_version: String,
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Replaces `simulation.d_values` with an evenly spaced grid when set
    #[serde(default)]
    pub sweep: Option<NoiseSweep>,
    #[serde(default)]
    pub potential: Polynomial,
    #[serde(default)]
    pub geometry: GeometryGuess,
    #[serde(default)]
    pub quadrature: QuadratureSettings,
    /// Start point of the exact-rate double integral
    #[serde(default)]
    pub quadrature_lower: f64,
}

impl SweepConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&raw)
            .with_context(|| format!("failed to load TOML config: {}", path.display()))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut cfg: SweepConfig = toml::from_str(raw).context("failed to parse TOML config")?;
        if let Some(sweep) = cfg.sweep {
            cfg.simulation.d_values = sweep.grid();
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        self.simulation
            .validate()
            .context("invalid [simulation] section")?;
        self.quadrature
            .validate()
            .context("invalid [quadrature] section")?;
        if self.potential.coefficients.len() < 3 {
            bail!("potential must be at least quadratic to have a well");
        }
        if self.geometry.barrier <= self.geometry.well {
            bail!("geometry.barrier must lie to the right of geometry.well");
        }
        if self.simulation.x_thresh <= self.geometry.barrier {
            bail!("x_thresh must lie beyond the barrier");
        }
        if self.quadrature_lower >= self.simulation.x_thresh {
            bail!("quadrature_lower must lie below x_thresh");
        }
        Ok(())
    }
}
