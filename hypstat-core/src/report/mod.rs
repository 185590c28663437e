//! Result tables handed to exporters and the terminal reporter.
//!
//! Tables are built once per analysis and never altered by a sink.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stats::{AggregateStat, ComparisonResult, Degradation, PhaseSummary};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Per index point, per group, per channel aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    pub index: usize,
    pub progress: f64,
    pub group: String,
    pub channel: String,
    pub mean: Option<f64>,
    pub stdev: Option<f64>,
    pub n: usize,
    pub ci: Option<f64>,
}

impl AggregateRow {
    pub fn new(index: usize, progress: f64, group: &str, channel: &str, stat: &AggregateStat) -> Self {
        Self {
            index,
            progress,
            group: group.to_string(),
            channel: channel.to_string(),
            mean: stat.mean,
            stdev: stat.stdev,
            n: stat.n,
            ci: stat.ci,
        }
    }
}

/// Per index point, per treatment, per channel significance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub index: usize,
    pub progress: f64,
    pub treatment: String,
    pub channel: String,
    pub mean_diff: Option<f64>,
    pub p_value: Option<f64>,
    pub significant: bool,
}

impl ComparisonRow {
    pub fn new(
        index: usize,
        progress: f64,
        treatment: &str,
        channel: &str,
        result: &ComparisonResult,
    ) -> Self {
        Self {
            index,
            progress,
            treatment: treatment.to_string(),
            channel: channel.to_string(),
            mean_diff: result.mean_diff,
            p_value: result.p_value,
            significant: result.significant,
        }
    }
}

/// One scalar comparison: a run, a benchmark or a task against the baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarRow {
    /// Run number, benchmark or task name.
    pub key: String,
    pub baseline: String,
    pub treatment: String,
    pub channel: String,
    pub baseline_stat: AggregateStat,
    pub treatment_stat: AggregateStat,
    pub degradation_pct: Option<f64>,
    pub ci_pct: Option<f64>,
    pub p_value: Option<f64>,
    pub significant: bool,
}

impl ScalarRow {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        key: impl Into<String>,
        baseline: &str,
        treatment: &str,
        channel: &str,
        baseline_stat: AggregateStat,
        treatment_stat: AggregateStat,
        degradation: Option<Degradation>,
        test: ComparisonResult,
    ) -> Self {
        Self {
            key: key.into(),
            baseline: baseline.to_string(),
            treatment: treatment.to_string(),
            channel: channel.to_string(),
            baseline_stat,
            treatment_stat,
            degradation_pct: degradation.map(|d| d.pct),
            ci_pct: degradation.and_then(|d| d.ci_pct),
            p_value: test.p_value,
            significant: test.significant,
        }
    }
}

/// An event ratio for one benchmark under one condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioRow {
    pub condition: String,
    pub bench: String,
    pub event: String,
    pub normalizer: String,
    pub ratio: Option<f64>,
    /// `ratio - baseline ratio`, absent for the baseline itself.
    pub difference: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationRow {
    pub condition: String,
    pub x: String,
    pub y: String,
    pub pairs: usize,
    pub r: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRow {
    pub treatment: String,
    pub channel: String,
    #[serde(flatten)]
    pub summary: PhaseSummary,
}

/// How much valid data each group contributed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub group: String,
    pub files_found: usize,
    pub files_parsed: usize,
    pub files_failed: usize,
    pub runs: usize,
    /// Runs with any valid data, per channel.
    pub channels: BTreeMap<String, usize>,
}

impl Contribution {
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            ..Self::default()
        }
    }
}

/// Everything one analysis produces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tables {
    pub aggregates: Vec<AggregateRow>,
    pub comparisons: Vec<ComparisonRow>,
    pub scalars: Vec<ScalarRow>,
    pub ratios: Vec<RatioRow>,
    pub correlations: Vec<CorrelationRow>,
    pub phases: Vec<PhaseRow>,
    pub contributions: Vec<Contribution>,
}

impl Tables {
    /// Whether any per-index-point table is populated.
    pub fn has_series(&self) -> bool {
        !self.aggregates.is_empty() || !self.comparisons.is_empty()
    }
}

pub trait Reporter: Send + Sync {
    fn report(&self, tables: &Tables) -> Result<(), ReportError>;
}

mod csv;
mod json;
mod terminal;
pub use csv::{scalar_csv_path, write_csv, write_csv_files, write_scalar_csv, write_series_csv};
pub use json::write_json;
pub use terminal::TerminalReporter;
