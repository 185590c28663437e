//! Places irregularly sampled runs onto a shared progress index.
//!
//! Native positions are rescaled to mission progress
//! `(t - t0) / (t_last - t0) * 100` using the run's own span, then each
//! channel is linearly interpolated onto `N` evenly spaced points over
//! `[0, 100]`, extrapolating linearly past the observed range. A channel
//! with fewer than two native samples yields an all-missing series.
//!
//! Native positions are assumed non-decreasing. Samples are never
//! reordered; out-of-order input gives unspecified (but finite) output.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::sample::{Channel, Run};

pub const DEFAULT_POINTS: usize = 1000;
pub const PROGRESS_MAX: f64 = 100.0;

/// First and last native position of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSpan {
    pub start: f64,
    pub end: f64,
}

impl TimeSpan {
    pub fn of(positions: &[f64]) -> Option<Self> {
        Some(Self {
            start: *positions.first()?,
            end: *positions.last()?,
        })
    }

    /// Span of one channel of a run.
    pub fn of_channel(run: &Run, channel: &Channel) -> Option<Self> {
        let mut positions = run
            .samples
            .iter()
            .filter(|s| &s.channel == channel)
            .map(|s| s.position);
        let start = positions.next()?;
        let end = positions.last().unwrap_or(start);
        Some(Self { start, end })
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Rescale native positions to `[0, 100]` progress. `None` for a zero-length span.
pub fn normalize_progress(positions: &[f64], span: TimeSpan) -> Option<Vec<f64>> {
    let duration = span.duration();
    if !(duration > 0.0) {
        return None;
    }
    Some(
        positions
            .iter()
            .map(|t| (t - span.start) / duration * PROGRESS_MAX)
            .collect(),
    )
}

/// `points` evenly spaced values from 0 to 100 inclusive.
pub fn common_index(points: usize) -> Vec<f64> {
    match points {
        0 => Vec::new(),
        1 => vec![0.0],
        n => (0..n)
            .map(|i| i as f64 * PROGRESS_MAX / (n - 1) as f64)
            .collect(),
    }
}

/// Linear interpolation of `(xs, ys)` at every grid point.
///
/// Returns `None` when fewer than two points are available.
pub fn resample(xs: &[f64], ys: &[f64], grid: &[f64]) -> Option<Vec<f64>> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return None;
    }
    let (xs, ys) = (&xs[..n], &ys[..n]);
    Some(grid.iter().map(|&x| interpolate(xs, ys, x)).collect())
}

fn interpolate(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    let n = xs.len();
    // First index whose x is greater than the target; clamping to [1, n-1]
    // reuses the boundary segments for extrapolation.
    let hi = xs.partition_point(|&v| v <= x).clamp(1, n - 1);
    let lo = hi - 1;

    let dx = xs[hi] - xs[lo];
    if dx == 0.0 {
        return ys[hi];
    }
    ys[lo] + (x - xs[lo]) * (ys[hi] - ys[lo]) / dx
}

/// A run's channel on the shared index. Always exactly `N` entries;
/// `None` where the run has no data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedSeries {
    values: Vec<Option<f64>>,
}

impl NormalizedSeries {
    pub fn missing(points: usize) -> Self {
        Self {
            values: vec![None; points],
        }
    }

    pub fn from_values(values: Vec<f64>) -> Self {
        Self {
            values: values
                .into_iter()
                .map(|v| v.is_finite().then_some(v))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied().flatten()
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    /// Whether the run contributed any data at all.
    pub fn has_data(&self) -> bool {
        self.values.iter().any(Option::is_some)
    }
}

/// All requested channels of one run on the shared index.
pub type NormalizedRun = BTreeMap<Channel, NormalizedSeries>;

/// Resamples runs onto a fixed-length common index.
#[derive(Debug, Clone)]
pub struct Normalizer {
    grid: Vec<f64>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_POINTS)
    }
}

impl Normalizer {
    pub fn new(points: usize) -> Self {
        Self {
            grid: common_index(points),
        }
    }

    pub fn points(&self) -> usize {
        self.grid.len()
    }

    /// Progress value (0..=100) of every index point.
    pub fn grid(&self) -> &[f64] {
        &self.grid
    }

    /// Resample one channel of `run` against `span`.
    pub fn channel(&self, run: &Run, channel: &Channel, span: TimeSpan) -> NormalizedSeries {
        let (positions, values): (Vec<f64>, Vec<f64>) = run
            .samples
            .iter()
            .filter(|s| &s.channel == channel)
            .map(|s| (s.position, s.value))
            .unzip();

        normalize_progress(&positions, span)
            .and_then(|xs| resample(&xs, &values, &self.grid))
            .map(NormalizedSeries::from_values)
            .unwrap_or_else(|| NormalizedSeries::missing(self.points()))
    }

    /// Resample every channel in `channels` against the span of `reference`.
    ///
    /// When the reference channel itself has no usable span every channel
    /// is missing.
    pub fn series(&self, run: &Run, reference: &Channel, channels: &[Channel]) -> NormalizedRun {
        let span = TimeSpan::of_channel(run, reference);
        channels
            .iter()
            .map(|channel| {
                let series = match span {
                    Some(span) => self.channel(run, channel, span),
                    None => NormalizedSeries::missing(self.points()),
                };
                (channel.clone(), series)
            })
            .collect()
    }

    /// Resample a channel against its own span, e.g. index-positioned samples.
    pub fn by_own_span(&self, run: &Run, channel: &Channel) -> NormalizedSeries {
        match TimeSpan::of_channel(run, channel) {
            Some(span) => self.channel(run, channel, span),
            None => NormalizedSeries::missing(self.points()),
        }
    }
}
