//! Relative metrics between a baseline group and a treatment group.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::aggregate::check_lengths;
use super::{AggregateStat, CompareError, ComparisonResult, StatisticalTest};
use crate::grammar::event_table;
use crate::grammar::perf_counter::EventCount;
use crate::normalize::NormalizedSeries;
use crate::sample::EventKey;

/// Which direction of a metric counts as an improvement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// Frame rate and similar throughput figures.
    HigherIsBetter,
    /// Intervals, elapsed times, energy.
    LowerIsBetter,
}

/// Signed percentage degradation of a treatment relative to a baseline.
///
/// Positive means the treatment is worse.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Degradation {
    pub pct: f64,
    /// Normal-approximation half-width, as a percentage of the baseline mean.
    pub ci_pct: Option<f64>,
}

/// Percentage degradation between two aggregated groups.
///
/// Undefined when either mean is missing or the baseline mean is zero. The
/// interval adds both standard errors in quadrature and needs `n > 1` on
/// both sides.
pub fn degradation(
    baseline: &AggregateStat,
    treatment: &AggregateStat,
    polarity: Polarity,
    z: f64,
) -> Option<Degradation> {
    let b = baseline.mean?;
    let t = treatment.mean?;
    if b == 0.0 {
        return None;
    }

    let pct = match polarity {
        Polarity::HigherIsBetter => (b - t) / b * 100.0,
        Polarity::LowerIsBetter => (t - b) / b * 100.0,
    };

    let ci_pct = match (baseline.sem(), treatment.sem()) {
        (Some(sb), Some(st)) if baseline.n > 1 && treatment.n > 1 => {
            Some(z * (sb * sb + st * st).sqrt() * 100.0 / b.abs())
        }
        _ => None,
    };

    Some(Degradation { pct, ci_pct })
}

/// Each value's overhead relative to `baseline_mean`: `(v / mean - 1) * 100`.
pub fn relative_overhead(values: &[f64], baseline_mean: f64) -> Option<Vec<f64>> {
    if baseline_mean == 0.0 || !baseline_mean.is_finite() {
        return None;
    }
    Some(
        values
            .iter()
            .map(|v| (v / baseline_mean - 1.0) * 100.0)
            .collect(),
    )
}

/// Run `test` at every index point over the runs present on each side.
pub fn significance_series(
    baseline: &[NormalizedSeries],
    treatment: &[NormalizedSeries],
    points: usize,
    test: &dyn StatisticalTest,
) -> Result<Vec<ComparisonResult>, CompareError> {
    check_lengths(baseline, points)?;
    check_lengths(treatment, points)?;

    Ok((0..points)
        .map(|i| {
            let b: Vec<f64> = baseline.iter().filter_map(|s| s.get(i)).collect();
            let t: Vec<f64> = treatment.iter().filter_map(|s| s.get(i)).collect();
            test.analyze(&b, &t)
        })
        .collect())
}

fn mean_count(counts: &[EventCount], condition: &str, bench: &str, event: &EventKey) -> Option<f64> {
    let matching: Vec<f64> = counts
        .iter()
        .filter(|c| c.condition == condition && c.bench == bench && &c.event == event)
        .map(|c| c.count as f64)
        .collect();
    super::mean(&matching)
}

fn check_known(event: &EventKey) -> Result<(), CompareError> {
    if event_table::names().any(|name| name == event.name) {
        Ok(())
    } else {
        Err(CompareError::UnknownEvent(event.to_string()))
    }
}

/// `numerator / denominator` for one `{condition, bench}`.
///
/// A benchmark without the numerator event yields `Ok(None)`. A missing
/// denominator is an error; a zero denominator makes the ratio undefined.
pub fn event_ratio(
    counts: &[EventCount],
    condition: &str,
    bench: &str,
    numerator: &EventKey,
    denominator: &EventKey,
) -> Result<Option<f64>, CompareError> {
    check_known(numerator)?;
    check_known(denominator)?;

    let Some(num) = mean_count(counts, condition, bench, numerator) else {
        return Ok(None);
    };
    let den = mean_count(counts, condition, bench, denominator).ok_or_else(|| {
        CompareError::MissingDenominator {
            condition: condition.to_string(),
            bench: bench.to_string(),
            event: denominator.to_string(),
        }
    })?;

    if den == 0.0 {
        return Ok(None);
    }
    Ok(Some(num / den))
}

/// `ratio(condition) - ratio(baseline)` for one benchmark.
pub fn ratio_difference(
    counts: &[EventCount],
    baseline: &str,
    condition: &str,
    bench: &str,
    numerator: &EventKey,
    denominator: &EventKey,
) -> Result<Option<f64>, CompareError> {
    let base = event_ratio(counts, baseline, bench, numerator, denominator)?;
    let cond = event_ratio(counts, condition, bench, numerator, denominator)?;
    Ok(base.zip(cond).map(|(b, c)| c - b))
}

/// Pearson correlation coefficient of two equally long series.
///
/// Undefined for mismatched lengths, fewer than two pairs or a constant series.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let mx = super::mean(xs)?;
    let my = super::mean(ys)?;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let (dx, dy) = (x - mx, y - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    let denom = (sxx * syy).sqrt();
    if denom == 0.0 {
        return None;
    }
    Some(sxy / denom)
}

/// Pair two keyed series on their common keys, in key order.
pub fn pair_by_key(a: &BTreeMap<String, f64>, b: &BTreeMap<String, f64>) -> (Vec<f64>, Vec<f64>) {
    a.iter()
        .filter_map(|(key, x)| b.get(key).map(|y| (*x, *y)))
        .unzip()
}

/// How per-run comparisons handle groups with different run counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignPolicy {
    /// Compare the first `min(n_b, n_t)` runs and warn.
    #[default]
    Truncate,
    /// Refuse to compare.
    Strict,
}

impl FromStr for AlignPolicy {
    type Err = CompareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "truncate" => Ok(AlignPolicy::Truncate),
            "strict" => Ok(AlignPolicy::Strict),
            _ => Err(CompareError::InvalidAlignment(s.to_string())),
        }
    }
}

impl fmt::Display for AlignPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlignPolicy::Truncate => f.write_str("truncate"),
            AlignPolicy::Strict => f.write_str("strict"),
        }
    }
}

/// Pair runs positionally according to `policy`. Runs are never padded or duplicated.
pub fn align_runs<'a, T>(
    baseline: &'a [T],
    treatment: &'a [T],
    policy: AlignPolicy,
) -> Result<(&'a [T], &'a [T]), CompareError> {
    let (nb, nt) = (baseline.len(), treatment.len());
    if nb == nt {
        return Ok((baseline, treatment));
    }
    match policy {
        AlignPolicy::Strict => Err(CompareError::StructuralMismatch {
            baseline: nb,
            treatment: nt,
        }),
        AlignPolicy::Truncate => {
            let n = nb.min(nt);
            warn!(
                baseline = nb,
                treatment = nt,
                compared = n,
                "run counts differ, comparing the common prefix"
            );
            Ok((&baseline[..n], &treatment[..n]))
        }
    }
}

/// A named slice of mission progress, `[start, end)` in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub name: String,
    pub start: f64,
    pub end: f64,
}

impl Phase {
    pub fn new(name: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            name: name.into(),
            start,
            end,
        }
    }

    /// Takeoff, cruise and landing.
    pub fn defaults() -> Vec<Phase> {
        vec![
            Phase::new("Takeoff", 0.0, 15.0),
            Phase::new("Cruise", 15.0, 85.0),
            Phase::new("Landing", 85.0, 100.0),
        ]
    }
}

/// Significance over one phase of a comparison series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSummary {
    pub phase: String,
    pub points: usize,
    /// Fraction of the phase's index points with a significant difference.
    pub significant_fraction: f64,
    /// Mean `mean_diff` over the points where it is defined.
    pub mean_diff: Option<f64>,
}

/// Summarize `results` (aligned with `grid`) per phase. The last phase includes its end.
pub fn phase_summary(
    phases: &[Phase],
    grid: &[f64],
    results: &[ComparisonResult],
) -> Vec<PhaseSummary> {
    phases
        .iter()
        .enumerate()
        .map(|(idx, phase)| {
            let is_last = idx + 1 == phases.len();
            let in_phase: Vec<&ComparisonResult> = grid
                .iter()
                .zip(results)
                .filter(|&(&p, _)| p >= phase.start && (p < phase.end || (is_last && p == phase.end)))
                .map(|(_, r)| r)
                .collect();

            let points = in_phase.len();
            let significant = in_phase.iter().filter(|r| r.significant).count();
            let diffs: Vec<f64> = in_phase.iter().filter_map(|r| r.mean_diff).collect();

            PhaseSummary {
                phase: phase.name.clone(),
                points,
                significant_fraction: if points == 0 {
                    0.0
                } else {
                    significant as f64 / points as f64
                },
                mean_diff: super::mean(&diffs),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{aggregate_scalars, CiMethod, WelchTTest};

    fn stat(values: &[f64]) -> AggregateStat {
        aggregate_scalars(values.iter().copied(), CiMethod::Normal { z: 1.96 })
    }

    fn count(condition: &str, bench: &str, event: &str, value: u64) -> EventCount {
        EventCount {
            condition: condition.to_string(),
            bench: bench.to_string(),
            event: EventKey::parse(event).unwrap(),
            count: value,
        }
    }

    #[test]
    fn test_degradation_sign_convention() {
        let baseline = stat(&[10.0]);
        let slower = degradation(&baseline, &stat(&[9.0]), Polarity::HigherIsBetter, 1.96).unwrap();
        assert!((slower.pct - 10.0).abs() < 1e-12);
        let faster = degradation(&baseline, &stat(&[11.0]), Polarity::HigherIsBetter, 1.96).unwrap();
        assert!((faster.pct + 10.0).abs() < 1e-12);
        assert_eq!(slower.ci_pct, None);

        let longer = degradation(&baseline, &stat(&[11.0]), Polarity::LowerIsBetter, 1.96).unwrap();
        assert!((longer.pct - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_degradation_interval() {
        let baseline = stat(&[9.0, 11.0]);
        let treatment = stat(&[8.0, 10.0]);
        let d = degradation(&baseline, &treatment, Polarity::HigherIsBetter, 1.96).unwrap();
        assert!((d.pct - 10.0).abs() < 1e-12);

        // stdev = sqrt(2) on both sides, n = 2, so each sem = 1.
        let expected = 1.96 * 2f64.sqrt() * 100.0 / 10.0;
        assert!((d.ci_pct.unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_degradation_zero_baseline_is_undefined() {
        assert!(degradation(&stat(&[0.0, 0.0]), &stat(&[1.0]), Polarity::HigherIsBetter, 1.96).is_none());
        assert!(degradation(&stat(&[]), &stat(&[1.0]), Polarity::HigherIsBetter, 1.96).is_none());
    }

    #[test]
    fn test_relative_overhead() {
        assert_eq!(relative_overhead(&[2.0, 3.0], 2.0).unwrap(), vec![0.0, 50.0]);
        assert!(relative_overhead(&[1.0], 0.0).is_none());
    }

    #[test]
    fn test_significance_series() {
        let baseline: Vec<_> = (0..4)
            .map(|_| NormalizedSeries::from_values(vec![10.0, 1.0]))
            .collect();
        let mut treatment: Vec<_> = (0..4)
            .map(|_| NormalizedSeries::from_values(vec![5.0, 1.0]))
            .collect();
        treatment.push(NormalizedSeries::missing(2));

        let results = significance_series(&baseline, &treatment, 2, &WelchTTest::default()).unwrap();
        assert!(results[0].significant);
        assert_eq!(results[0].mean_diff, Some(5.0));
        assert!(!results[1].significant);
        assert_eq!(results[1].p_value, None);
    }

    #[test]
    fn test_significance_needs_two_runs_per_side() {
        let baseline = vec![NormalizedSeries::from_values(vec![1.0])];
        let treatment = vec![
            NormalizedSeries::from_values(vec![2.0]),
            NormalizedSeries::from_values(vec![3.0]),
        ];
        let results = significance_series(&baseline, &treatment, 1, &WelchTTest::default()).unwrap();
        assert_eq!(results[0], ComparisonResult::undefined());
    }

    #[test]
    fn test_event_ratio() {
        let counts = vec![
            count("bao", "qsort-small", "inst_ret:h", 1_000_000),
            count("bao", "qsort-small", "inst_ret:uk", 500_000),
        ];
        let ratio = event_ratio(
            &counts,
            "bao",
            "qsort-small",
            &EventKey::new("inst_ret", "h"),
            &EventKey::new("inst_ret", "uk"),
        )
        .unwrap();
        assert_eq!(ratio, Some(2.0));
    }

    #[test]
    fn test_event_ratio_missing_and_zero_denominator() {
        let counts = vec![
            count("bao", "a", "exc_taken:h", 10),
            count("bao", "b", "exc_taken:h", 10),
            count("bao", "b", "inst_ret:uk", 0),
        ];
        let num = EventKey::new("exc_taken", "h");
        let den = EventKey::new("inst_ret", "uk");

        assert!(matches!(
            event_ratio(&counts, "bao", "a", &num, &den),
            Err(CompareError::MissingDenominator { .. })
        ));
        assert_eq!(event_ratio(&counts, "bao", "b", &num, &den).unwrap(), None);
        assert_eq!(event_ratio(&counts, "bao", "c", &num, &den).unwrap(), None);
        assert!(matches!(
            event_ratio(&counts, "bao", "b", &EventKey::new("bogus", "h"), &den),
            Err(CompareError::UnknownEvent(_))
        ));
    }

    #[test]
    fn test_ratio_difference() {
        let counts = vec![
            count("solo", "a", "exc_taken:h", 10),
            count("solo", "a", "inst_ret:uk", 100),
            count("interf", "a", "exc_taken:h", 30),
            count("interf", "a", "inst_ret:uk", 100),
        ];
        let diff = ratio_difference(
            &counts,
            "solo",
            "interf",
            "a",
            &EventKey::new("exc_taken", "h"),
            &EventKey::new("inst_ret", "uk"),
        )
        .unwrap()
        .unwrap();
        assert!((diff - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_pearson() {
        let r = pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).unwrap();
        assert!((r - 1.0).abs() < 1e-12);
        let r = pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]).unwrap();
        assert!((r + 1.0).abs() < 1e-12);
        assert!(pearson(&[1.0, 1.0], &[2.0, 3.0]).is_none());
        assert!(pearson(&[1.0], &[2.0]).is_none());
    }

    #[test]
    fn test_pair_by_key() {
        let a: BTreeMap<String, f64> = [("x".to_string(), 1.0), ("y".to_string(), 2.0)].into();
        let b: BTreeMap<String, f64> = [("y".to_string(), 20.0), ("z".to_string(), 30.0)].into();
        assert_eq!(pair_by_key(&a, &b), (vec![2.0], vec![20.0]));
    }

    #[test]
    fn test_align_runs() {
        let b = [1, 2, 3];
        let t = [4, 5];
        let (ab, at) = align_runs(&b, &t, AlignPolicy::Truncate).unwrap();
        assert_eq!(ab, &[1, 2]);
        assert_eq!(at, &[4, 5]);

        assert!(matches!(
            align_runs(&b, &t, AlignPolicy::Strict),
            Err(CompareError::StructuralMismatch { baseline: 3, treatment: 2 })
        ));
        assert!(align_runs(&t, &t, AlignPolicy::Strict).is_ok());
    }

    #[test]
    fn test_align_policy_from_str() {
        assert_eq!("Strict".parse::<AlignPolicy>().unwrap(), AlignPolicy::Strict);
        assert_eq!("truncate".parse::<AlignPolicy>().unwrap(), AlignPolicy::Truncate);
        assert!("pad".parse::<AlignPolicy>().is_err());
    }

    #[test]
    fn test_phase_summary() {
        let grid = [0.0, 10.0, 50.0, 90.0, 100.0];
        let sig = ComparisonResult {
            mean_diff: Some(2.0),
            p_value: Some(0.01),
            significant: true,
        };
        let results = [sig, ComparisonResult::undefined(), sig, sig, ComparisonResult {
            mean_diff: Some(4.0),
            p_value: Some(0.5),
            significant: false,
        }];

        let summary = phase_summary(&Phase::defaults(), &grid, &results);
        assert_eq!(summary.len(), 3);

        assert_eq!(summary[0].phase, "Takeoff");
        assert_eq!(summary[0].points, 2);
        assert!((summary[0].significant_fraction - 0.5).abs() < 1e-12);
        assert_eq!(summary[0].mean_diff, Some(2.0));

        assert_eq!(summary[1].points, 1);
        assert_eq!(summary[2].points, 2);
        assert_eq!(summary[2].mean_diff, Some(3.0));
    }
}
