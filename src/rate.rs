//! Rate aggregation
//!
//! Reduces escape-time rows to a mean first-passage time and an escape rate
//! per noise level, and lines the simulated rates up with the analytic and
//! quadrature rates on the same `D` axis.
//!
//! The rate is the reciprocal of the mean over escaped particles only.
//! Particles still inside the well at the horizon are censored observations
//! and are dropped rather than corrected for, so the estimate is biased
//! upwards when a large share of the ensemble is censored.

use serde::Serialize;
use tracing::warn;

use crate::sim::{EscapeTimeTable, NOT_ESCAPED};
use crate::EscapeError;

/// Rate estimate at one noise strength.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatePoint {
    pub d: f64,
    /// Mean first-passage time, NaN when nothing escaped
    pub mean_first_passage_time: f64,
    /// `1 / mean_first_passage_time`, NaN when nothing escaped
    pub rate: f64,
    /// Particles that contributed to the mean
    pub escaped: usize,
    /// Particles simulated; zero for analytic series
    pub total: usize,
}

impl RatePoint {
    /// Point for a rate computed in closed form or by quadrature.
    pub fn analytic(d: f64, rate: f64) -> Self {
        Self {
            d,
            mean_first_passage_time: rate.recip(),
            rate,
            escaped: 0,
            total: 0,
        }
    }

    pub fn is_defined(&self) -> bool {
        self.rate.is_finite()
    }

    /// `ln(rate)`; NaN stays NaN.
    pub fn log_rate(&self) -> f64 {
        self.rate.ln()
    }
}

/// Rates ordered exactly as the noise sweep they were computed for.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RateSeries {
    pub points: Vec<RatePoint>,
}

impl RateSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn d_values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.d).collect()
    }

    pub fn rates(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.rate).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RatePoint> {
        self.points.iter()
    }
}

impl FromIterator<RatePoint> for RateSeries {
    fn from_iter<I: IntoIterator<Item = RatePoint>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

/// Mean of the strictly positive entries of one row and its reciprocal.
pub fn row_rate(d: f64, row: &[f64]) -> RatePoint {
    let (sum, escaped) = row
        .iter()
        .filter(|&&t| t > NOT_ESCAPED)
        .fold((0.0, 0_usize), |(sum, count), &t| (sum + t, count + 1));

    let mean = if escaped == 0 {
        f64::NAN
    } else {
        sum / escaped as f64
    };

    RatePoint {
        d,
        mean_first_passage_time: mean,
        rate: mean.recip(),
        escaped,
        total: row.len(),
    }
}

/// Reduces every row of `table` to a [`RatePoint`], index-aligned with
/// `d_values`.
///
/// # Errors
/// `InvalidConfig` if `d_values` does not have one entry per table row.
pub fn aggregate(table: &EscapeTimeTable, d_values: &[f64]) -> Result<RateSeries, EscapeError> {
    if table.n_levels() != d_values.len() {
        return Err(EscapeError::InvalidConfig(format!(
            "escape table has {} noise levels but {} D values were given",
            table.n_levels(),
            d_values.len()
        )));
    }

    let series: RateSeries = table
        .rows()
        .zip(d_values)
        .map(|(row, &d)| row_rate(d, row))
        .collect();

    for point in series.iter().filter(|p| p.escaped == 0) {
        warn!(d = point.d, "no particle escaped, rate undefined");
    }

    Ok(series)
}

fn ensure_len(context: &'static str, expected: usize, got: usize) -> Result<(), EscapeError> {
    if expected == got {
        return Ok(());
    }

    Err(EscapeError::LengthMismatch {
        context,
        expected,
        got,
    })
}

/// One row of an Arrhenius comparison: `ln(rate)` against `1/D`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub d: f64,
    pub inv_d: f64,
    pub numerical_rate: f64,
    pub kramers_rate: f64,
    pub exact_rate: f64,
    pub log_numerical: f64,
    pub log_kramers: f64,
    pub log_exact: f64,
    pub escaped_fraction: f64,
}

/// Simulated, Kramers and quadrature rates on one shared noise axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateComparison {
    pub numerical: RateSeries,
    pub kramers: RateSeries,
    pub exact: RateSeries,
}

impl RateComparison {
    pub fn new(
        numerical: RateSeries,
        kramers: RateSeries,
        exact: RateSeries,
    ) -> Result<Self, EscapeError> {
        ensure_len("kramers series", numerical.len(), kramers.len())?;
        ensure_len("exact series", numerical.len(), exact.len())?;

        let axes_agree = numerical
            .iter()
            .zip(kramers.iter())
            .zip(exact.iter())
            .all(|((n, k), e)| n.d == k.d && n.d == e.d);
        if !axes_agree {
            return Err(EscapeError::InvalidConfig(
                "rate series were computed on different noise sweeps".to_string(),
            ));
        }

        Ok(Self {
            numerical,
            kramers,
            exact,
        })
    }

    pub fn rows(&self) -> Vec<ComparisonRow> {
        self.numerical
            .iter()
            .zip(self.kramers.iter())
            .zip(self.exact.iter())
            .map(|((n, k), e)| ComparisonRow {
                d: n.d,
                inv_d: n.d.recip(),
                numerical_rate: n.rate,
                kramers_rate: k.rate,
                exact_rate: e.rate,
                log_numerical: n.log_rate(),
                log_kramers: k.log_rate(),
                log_exact: e.log_rate(),
                escaped_fraction: if n.total == 0 {
                    f64::NAN
                } else {
                    n.escaped as f64 / n.total as f64
                },
            })
            .collect()
    }
}
