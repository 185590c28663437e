//! Aggregation across runs and comparisons between groups.

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod aggregate;
mod compare;
mod ttest;

pub use aggregate::{aggregate_scalars, aggregate_series, t_critical, AggregateStat, CiMethod, Z_95};
pub use compare::{
    align_runs, degradation, event_ratio, pair_by_key, pearson, phase_summary, ratio_difference,
    relative_overhead, significance_series, AlignPolicy, Degradation, Phase, PhaseSummary,
    Polarity,
};
pub use ttest::WelchTTest;

/// Errors raised while comparing groups.
#[derive(Debug, Error)]
pub enum CompareError {
    #[error("run count mismatch: baseline has {baseline} runs, treatment has {treatment}")]
    StructuralMismatch { baseline: usize, treatment: usize },

    #[error("normalized series has {actual} points, expected {expected}")]
    SeriesLength { expected: usize, actual: usize },

    #[error("no {event} count for benchmark {bench} under {condition}")]
    MissingDenominator {
        condition: String,
        bench: String,
        event: String,
    },

    #[error("unknown event: {0}")]
    UnknownEvent(String),

    #[error("invalid alignment policy: {0} (expected truncate or strict)")]
    InvalidAlignment(String),
}

/// Outcome of testing one index point (or one scalar metric) between two groups.
///
/// Every field is undefined when either side has fewer than two values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// `baseline_mean - treatment_mean`.
    pub mean_diff: Option<f64>,
    pub p_value: Option<f64>,
    pub significant: bool,
}

impl ComparisonResult {
    pub fn undefined() -> Self {
        Self::default()
    }
}

/// A two-sample test over the raw per-run values of two groups.
pub trait StatisticalTest: Send + Sync {
    fn analyze(&self, baseline: &[f64], treatment: &[f64]) -> ComparisonResult;
}

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Unbiased (n-1) sample variance, `None` below two values.
pub fn sample_variance(values: &[f64], mean: f64) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let sum_sq_diff: f64 = values
        .iter()
        .map(|v| {
            let diff = v - mean;
            diff * diff
        })
        .sum();
    Some(sum_sq_diff / (values.len() - 1) as f64)
}
