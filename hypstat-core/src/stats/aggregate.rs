use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

use super::{mean, sample_variance, CompareError};
use crate::normalize::NormalizedSeries;

/// Normal-approximation critical value for a two-sided 95% interval.
pub const Z_95: f64 = 1.96;

/// Summary of one index point or one scalar metric across a group's runs.
///
/// `n` counts only contributing (non-missing) runs. `ci` is the half-width
/// of the confidence interval and is undefined when `n <= 1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateStat {
    pub mean: Option<f64>,
    pub stdev: Option<f64>,
    pub n: usize,
    pub ci: Option<f64>,
}

impl AggregateStat {
    /// Standard error of the mean.
    pub fn sem(&self) -> Option<f64> {
        Some(self.stdev? / (self.n as f64).sqrt())
    }
}

/// How the confidence half-width is derived from `stdev` and `n`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CiMethod {
    /// `z * stdev / sqrt(n)`.
    Normal { z: f64 },
    /// `t_{(1+level)/2, n-1} * stdev / sqrt(n)`.
    StudentT { level: f64 },
}

impl Default for CiMethod {
    fn default() -> Self {
        CiMethod::StudentT { level: 0.95 }
    }
}

impl CiMethod {
    pub fn half_width(&self, stdev: f64, n: usize) -> Option<f64> {
        if n <= 1 {
            return None;
        }
        let critical = match *self {
            CiMethod::Normal { z } => z,
            CiMethod::StudentT { level } => t_critical(level, (n - 1) as f64)?,
        };
        Some(critical * stdev / (n as f64).sqrt())
    }
}

/// Two-sided critical value of Student's t at `level` confidence.
pub fn t_critical(level: f64, df: f64) -> Option<f64> {
    if !(level > 0.0 && level < 1.0) {
        return None;
    }
    let dist = StudentsT::new(0.0, 1.0, df).ok()?;
    Some(dist.inverse_cdf(1.0 - (1.0 - level) / 2.0))
}

/// Aggregate scalar values, skipping missing and non-finite entries.
///
/// Accepts plain `f64`s or `Option<f64>`s.
pub fn aggregate_scalars<I>(values: I, method: CiMethod) -> AggregateStat
where
    I: IntoIterator,
    I::Item: Into<Option<f64>>,
{
    let present: Vec<f64> = values
        .into_iter()
        .filter_map(Into::<Option<f64>>::into)
        .filter(|v| v.is_finite())
        .collect();

    let n = present.len();
    let Some(m) = mean(&present) else {
        return AggregateStat::default();
    };
    let stdev = sample_variance(&present, m).map(f64::sqrt);
    let ci = stdev.and_then(|s| method.half_width(s, n));

    AggregateStat {
        mean: Some(m),
        stdev,
        n,
        ci,
    }
}

/// Aggregate every index point across a group's normalized series.
///
/// All series must have exactly `points` entries.
pub fn aggregate_series(
    series: &[NormalizedSeries],
    points: usize,
    method: CiMethod,
) -> Result<Vec<AggregateStat>, CompareError> {
    check_lengths(series, points)?;
    Ok((0..points)
        .map(|i| aggregate_scalars(series.iter().map(|s| s.get(i)), method))
        .collect())
}

pub(super) fn check_lengths(series: &[NormalizedSeries], points: usize) -> Result<(), CompareError> {
    match series.iter().find(|s| s.len() != points) {
        Some(bad) => Err(CompareError::SeriesLength {
            expected: points,
            actual: bad.len(),
        }),
        None => Ok(()),
    }
}
