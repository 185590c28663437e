//! Loading groups of input files and running the four analyses.
//!
//! Files are parsed one after another. A file that fails to parse is logged
//! and dropped from its group; the rest of the batch carries on. Each
//! analysis returns the full set of [`Tables`], including the per-group
//! contribution summary so dropped data stays visible.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;
use std::iter;
use std::path::Path;

use hypstat_core::grammar::perf_counter::{self, EventCount, PerfDump};
use hypstat_core::grammar::Grammar;
use hypstat_core::normalize::{NormalizedRun, NormalizedSeries, Normalizer, TimeSpan};
use hypstat_core::report::{
    AggregateRow, ComparisonRow, Contribution, CorrelationRow, PhaseRow, RatioRow, ScalarRow,
    Tables,
};
use hypstat_core::sample::{Axis, Channel, Group, Run};
use hypstat_core::stats::{
    self, aggregate_scalars, aggregate_series, align_runs, degradation, event_ratio, pair_by_key,
    pearson, phase_summary, ratio_difference, relative_overhead, significance_series,
    AggregateStat, CiMethod, CompareError, ComparisonResult, Polarity, StatisticalTest,
    WelchTTest,
};
use hypstat_core::telemetry::{BatteryModel, FlightLog, ULog};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::cli::GroupArgs;
use crate::config::Config;
use crate::source::{self, GroupSpec, SourceError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Compare(#[from] CompareError),

    #[error("Baseline group {0} has no parsable input")]
    EmptyBaseline(String),

    #[error("Group name {0} is used more than once")]
    DuplicateGroup(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// One group's parsed inputs and how many files contributed.
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    pub name: String,
    pub data: T,
    pub contribution: Contribution,
}

/// Parse every file of `spec`, isolating failures per file.
fn load_each<T, E: Display>(
    spec: &GroupSpec,
    mut parse: impl FnMut(&Path) -> Result<T, E>,
) -> Result<(Vec<T>, Contribution), SourceError> {
    let files = source::discover(&spec.path)?;
    let mut contribution = Contribution::new(&spec.name);
    contribution.files_found = files.len();

    let mut parsed = Vec::with_capacity(files.len());
    for file in &files {
        match parse(file) {
            Ok(item) => {
                contribution.files_parsed += 1;
                info!(group = %spec.name, file = %file.display(), "parsed");
                parsed.push(item);
            }
            Err(err) => {
                contribution.files_failed += 1;
                error!(group = %spec.name, file = %file.display(), error = %err, "skipping file");
            }
        }
    }
    Ok((parsed, contribution))
}

fn load_runs(spec: &GroupSpec, grammar: Grammar) -> Result<Loaded<Group>, PipelineError> {
    let (files, mut contribution) = load_each(spec, |path| {
        let text = std::fs::read_to_string(path)?;
        let runs = grammar.parse_runs(&text)?;
        if runs.is_empty() {
            warn!(group = %spec.name, file = %path.display(), %grammar, "no runs found");
        }
        Ok::<Vec<Run>, hypstat_core::ParseError>(runs)
    })?;

    let mut group = Group::new(&spec.name);
    for runs in files {
        group.extend_from_file(runs);
    }
    contribution.runs = group.runs.len();

    Ok(Loaded {
        name: spec.name.clone(),
        data: group,
        contribution,
    })
}

pub fn load_fps(spec: &GroupSpec) -> Result<Loaded<Group>, PipelineError> {
    load_runs(spec, Grammar::FrameRate)
}

pub fn load_workqueue(spec: &GroupSpec) -> Result<Loaded<Group>, PipelineError> {
    load_runs(spec, Grammar::WorkQueue)
}

pub fn load_flight(
    spec: &GroupSpec,
    battery: &BatteryModel,
) -> Result<Loaded<Vec<FlightLog>>, PipelineError> {
    let (flights, mut contribution) = load_each(spec, |path| {
        let log = ULog::from_path(path)?;
        let flight = FlightLog::from_ulog(&log, battery)?;
        for missing in &flight.missing {
            warn!(
                group = %spec.name,
                file = %path.display(),
                channel = %missing.channel,
                reason = %missing.reason,
                "channel missing"
            );
        }
        Ok::<FlightLog, hypstat_core::TelemetryError>(flight)
    })?;
    contribution.runs = flights.len();

    Ok(Loaded {
        name: spec.name.clone(),
        data: flights,
        contribution,
    })
}

pub fn load_perf(spec: &GroupSpec) -> Result<Loaded<Vec<PerfDump>>, PipelineError> {
    let (dumps, mut contribution) = load_each(spec, |path| {
        let text = std::fs::read_to_string(path)?;
        let dump = perf_counter::parse_dump(&spec.name, &text)?;
        debug!(
            group = %spec.name,
            file = %path.display(),
            events = dump.events.len(),
            elapsed = dump.elapsed.len(),
            "perf dump"
        );
        Ok::<PerfDump, hypstat_core::ParseError>(dump)
    })?;
    contribution.runs = dumps.len();

    Ok(Loaded {
        name: spec.name.clone(),
        data: dumps,
        contribution,
    })
}

fn student_t(config: &Config) -> CiMethod {
    CiMethod::StudentT {
        level: config.analysis.confidence_level,
    }
}

fn normal(config: &Config) -> CiMethod {
    CiMethod::Normal {
        z: config.analysis.z_score,
    }
}

fn push_aggregates(
    tables: &mut Tables,
    grid: &[f64],
    group: &str,
    channel: &str,
    stats: &[AggregateStat],
) {
    for (index, (progress, stat)) in grid.iter().zip(stats).enumerate() {
        tables
            .aggregates
            .push(AggregateRow::new(index, *progress, group, channel, stat));
    }
}

fn push_comparisons(
    tables: &mut Tables,
    grid: &[f64],
    treatment: &str,
    channel: &str,
    results: &[ComparisonResult],
) {
    for (index, (progress, result)) in grid.iter().zip(results).enumerate() {
        tables
            .comparisons
            .push(ComparisonRow::new(index, *progress, treatment, channel, result));
    }
}

/// Scalar comparison of two raw value sets.
#[allow(clippy::too_many_arguments)]
fn scalar_row(
    key: impl Into<String>,
    baseline: &str,
    treatment: &str,
    channel: &str,
    b: &[f64],
    t: &[f64],
    polarity: Polarity,
    test: &WelchTTest,
    config: &Config,
) -> ScalarRow {
    let b_stat = aggregate_scalars(b.iter().copied(), normal(config));
    let t_stat = aggregate_scalars(t.iter().copied(), normal(config));
    ScalarRow::new(
        key,
        baseline,
        treatment,
        channel,
        b_stat,
        t_stat,
        degradation(&b_stat, &t_stat, polarity, config.analysis.z_score),
        test.analyze(b, t),
    )
}

/// Frame rate: per-index aggregates and significance, then per-run and
/// whole-group degradation of the mean frame rate.
pub fn analyze_fps(
    baseline: &Loaded<Group>,
    treatments: &[Loaded<Group>],
    config: &Config,
) -> Result<Tables, PipelineError> {
    let points = config.analysis.points;
    let normalizer = Normalizer::new(points);
    let test = WelchTTest::new(config.analysis.alpha);
    let channel = Channel::FrameRate;
    let col = channel.column_name();

    let series_of = |group: &Group| -> Vec<NormalizedSeries> {
        group
            .runs
            .iter()
            .map(|run| normalizer.by_own_span(run, &channel))
            .collect()
    };

    let mut tables = Tables::default();
    let mut series = Vec::with_capacity(treatments.len() + 1);
    for loaded in iter::once(baseline).chain(treatments) {
        let group_series = series_of(&loaded.data);
        let stats = aggregate_series(&group_series, points, student_t(config))?;
        push_aggregates(&mut tables, normalizer.grid(), &loaded.name, &col, &stats);

        let mut contribution = loaded.contribution.clone();
        contribution
            .channels
            .insert(col.clone(), group_series.iter().filter(|s| s.has_data()).count());
        tables.contributions.push(contribution);
        series.push(group_series);
    }

    let base_means: Vec<f64> = baseline.data.run_means(&channel).into_iter().flatten().collect();
    for (treatment, t_series) in treatments.iter().zip(&series[1..]) {
        let results = significance_series(&series[0], t_series, points, &test)?;
        push_comparisons(&mut tables, normalizer.grid(), &treatment.name, &col, &results);

        let t_means: Vec<f64> = treatment.data.run_means(&channel).into_iter().flatten().collect();
        tables.scalars.push(scalar_row(
            "all runs",
            &baseline.name,
            &treatment.name,
            &col,
            &base_means,
            &t_means,
            Polarity::HigherIsBetter,
            &test,
            config,
        ));

        let (b_runs, t_runs) = align_runs(
            &baseline.data.runs,
            &treatment.data.runs,
            config.analysis.alignment,
        )?;
        for (i, (b_run, t_run)) in b_runs.iter().zip(t_runs).enumerate() {
            tables.scalars.push(scalar_row(
                format!("run {}", i + 1),
                &baseline.name,
                &treatment.name,
                &col,
                &b_run.values(&channel),
                &t_run.values(&channel),
                Polarity::HigherIsBetter,
                &test,
                config,
            ));
        }
    }

    Ok(tables)
}

/// Work queue: pooled intervals of each configured task, lower is better.
pub fn analyze_workqueue(
    baseline: &Loaded<Group>,
    treatments: &[Loaded<Group>],
    config: &Config,
) -> Result<Tables, PipelineError> {
    let test = WelchTTest::new(config.analysis.alpha);
    let col = Channel::TaskInterval.column_name();
    let tasks = &config.workqueue.tasks;

    let intervals = |group: &Group, task: &str| -> Vec<f64> {
        group
            .runs
            .iter()
            .flat_map(Run::children)
            .filter(|child| child.name == task)
            .map(|child| child.interval as f64)
            .collect()
    };

    let mut tables = Tables::default();
    for loaded in iter::once(baseline).chain(treatments) {
        let mut contribution = loaded.contribution.clone();
        for task in tasks {
            let runs = loaded
                .data
                .runs
                .iter()
                .filter(|run| run.children().any(|child| child.name == *task))
                .count();
            contribution.channels.insert(task.clone(), runs);
        }
        let ignored = loaded
            .data
            .runs
            .iter()
            .flat_map(Run::children)
            .filter(|child| !tasks.contains(&child.name))
            .count();
        debug!(group = %loaded.name, ignored, "child records of unconfigured tasks");
        tables.contributions.push(contribution);
    }

    for treatment in treatments {
        for task in tasks {
            let b = intervals(&baseline.data, task);
            let t = intervals(&treatment.data, task);
            if b.is_empty() || t.is_empty() {
                warn!(task = %task, treatment = %treatment.name, "task missing from a group");
            }
            tables.scalars.push(scalar_row(
                task.as_str(),
                &baseline.name,
                &treatment.name,
                &col,
                &b,
                &t,
                Polarity::LowerIsBetter,
                &test,
                config,
            ));
        }
    }

    Ok(tables)
}

/// Flight: every channel on the mission-progress index, significance per
/// point and per phase, plus energy and duration per flight.
pub fn analyze_flight(
    baseline: &Loaded<Vec<FlightLog>>,
    treatments: &[Loaded<Vec<FlightLog>>],
    config: &Config,
) -> Result<Tables, PipelineError> {
    let points = config.analysis.points;
    let normalizer = Normalizer::new(points);
    let test = WelchTTest::new(config.analysis.alpha);
    let channels = Channel::flight_channels();
    let reference = Channel::Position(Axis::X);

    let normalized = |flights: &[FlightLog]| -> Vec<NormalizedRun> {
        flights
            .iter()
            .map(|flight| normalizer.series(&flight.run, &reference, &channels))
            .collect()
    };
    let channel_series = |runs: &[NormalizedRun], channel: &Channel| -> Vec<NormalizedSeries> {
        runs.iter().filter_map(|run| run.get(channel).cloned()).collect()
    };

    let mut tables = Tables::default();
    let mut groups = Vec::with_capacity(treatments.len() + 1);
    for loaded in iter::once(baseline).chain(treatments) {
        let runs = normalized(&loaded.data);
        let mut contribution = loaded.contribution.clone();
        for channel in &channels {
            let series = channel_series(&runs, channel);
            let stats = aggregate_series(&series, points, student_t(config))?;
            let col = channel.column_name();
            push_aggregates(&mut tables, normalizer.grid(), &loaded.name, &col, &stats);
            contribution
                .channels
                .insert(col, series.iter().filter(|s| s.has_data()).count());
        }
        tables.contributions.push(contribution);
        groups.push(runs);
    }

    for (treatment, t_runs) in treatments.iter().zip(&groups[1..]) {
        for channel in &channels {
            let col = channel.column_name();
            let results = significance_series(
                &channel_series(&groups[0], channel),
                &channel_series(t_runs, channel),
                points,
                &test,
            )?;
            push_comparisons(&mut tables, normalizer.grid(), &treatment.name, &col, &results);

            for summary in phase_summary(&config.flight.phases, normalizer.grid(), &results) {
                tables.phases.push(PhaseRow {
                    treatment: treatment.name.clone(),
                    channel: col.clone(),
                    summary,
                });
            }
        }

        let energy = |flights: &[FlightLog]| -> Vec<f64> {
            flights.iter().filter_map(FlightLog::energy_consumed_wh).collect()
        };
        tables.scalars.push(scalar_row(
            "flight",
            &baseline.name,
            &treatment.name,
            &Channel::Energy.column_name(),
            &energy(&baseline.data),
            &energy(&treatment.data),
            Polarity::LowerIsBetter,
            &test,
            config,
        ));

        let duration = |flights: &[FlightLog]| -> Vec<f64> {
            flights
                .iter()
                .filter_map(|f| TimeSpan::of_channel(&f.run, &reference))
                .map(|span| span.duration() / 1e6)
                .collect()
        };
        tables.scalars.push(scalar_row(
            "flight",
            &baseline.name,
            &treatment.name,
            "duration_s",
            &duration(&baseline.data),
            &duration(&treatment.data),
            Polarity::LowerIsBetter,
            &test,
            config,
        ));
    }

    Ok(tables)
}

/// A missing denominator makes that one ratio undefined; anything else is fatal.
fn ratio_point(result: Result<Option<f64>, CompareError>) -> Result<Option<f64>, PipelineError> {
    match result {
        Ok(ratio) => Ok(ratio),
        Err(err @ CompareError::MissingDenominator { .. }) => {
            error!(error = %err, "ratio undefined");
            Ok(None)
        }
        Err(err) => Err(err.into()),
    }
}

/// Perf counters: elapsed-time overhead per benchmark, event ratios per
/// condition and their correlation with the overhead.
pub fn analyze_perf(
    baseline: &Loaded<Vec<PerfDump>>,
    treatments: &[Loaded<Vec<PerfDump>>],
    config: &Config,
) -> Result<Tables, PipelineError> {
    let test = WelchTTest::new(config.analysis.alpha);
    let elapsed_col = Channel::ElapsedTime.column_name();
    let benchmarks = &config.perf.benchmarks;
    let wanted = |bench: &str| benchmarks.is_empty() || benchmarks.iter().any(|b| b == bench);

    let ratios = config
        .perf
        .ratios
        .iter()
        .map(|spec| spec.keys().map(|(num, den)| (spec.label(), num, den)))
        .collect::<anyhow::Result<Vec<_>>>()
        .map_err(|e| PipelineError::Config(format!("{e:#}")))?;

    let elapsed = |dumps: &[PerfDump]| -> BTreeMap<String, Vec<f64>> {
        let mut by_bench: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for sample in dumps.iter().flat_map(|d| &d.elapsed) {
            if wanted(sample.bench.as_str()) {
                by_bench
                    .entry(sample.bench.clone())
                    .or_default()
                    .push(sample.seconds);
            }
        }
        by_bench
    };

    let mut tables = Tables::default();
    for loaded in iter::once(baseline).chain(treatments) {
        let mut contribution = loaded.contribution.clone();
        contribution.channels.insert(
            elapsed_col.clone(),
            loaded.data.iter().filter(|d| !d.elapsed.is_empty()).count(),
        );
        contribution.channels.insert(
            "events".to_string(),
            loaded.data.iter().filter(|d| !d.events.is_empty()).count(),
        );
        tables.contributions.push(contribution);
    }

    // Elapsed time against the baseline's per-benchmark mean.
    let base_elapsed = elapsed(&baseline.data);
    let mut overheads: BTreeMap<&str, BTreeMap<String, f64>> = BTreeMap::new();
    for treatment in treatments {
        let t_elapsed = elapsed(&treatment.data);
        for (bench, b_values) in &base_elapsed {
            let Some(t_values) = t_elapsed.get(bench) else {
                warn!(bench = %bench, treatment = %treatment.name, "no elapsed samples");
                continue;
            };
            let row = scalar_row(
                bench.as_str(),
                &baseline.name,
                &treatment.name,
                &elapsed_col,
                b_values,
                t_values,
                Polarity::LowerIsBetter,
                &test,
                config,
            );
            let overhead = row
                .baseline_stat
                .mean
                .and_then(|m| relative_overhead(t_values, m))
                .and_then(|values| stats::mean(&values));
            if let Some(overhead) = overhead {
                overheads
                    .entry(treatment.name.as_str())
                    .or_default()
                    .insert(bench.clone(), overhead);
            }
            tables.scalars.push(row);
        }
    }

    // Event ratios per condition, and their difference to the baseline.
    let counts: Vec<EventCount> = iter::once(baseline)
        .chain(treatments)
        .flat_map(|loaded| loaded.data.iter().flat_map(|d| d.events.iter().cloned()))
        .collect();
    let mut ratio_series: BTreeMap<(&str, &str), BTreeMap<String, f64>> = BTreeMap::new();

    for (idx, loaded) in iter::once(baseline).chain(treatments).enumerate() {
        let benches: BTreeSet<&str> = loaded
            .data
            .iter()
            .flat_map(|d| &d.events)
            .map(|e| e.bench.as_str())
            .filter(|bench| wanted(*bench))
            .collect();

        for (label, num, den) in &ratios {
            for bench in &benches {
                let ratio = ratio_point(event_ratio(&counts, &loaded.name, bench, num, den))?;
                let difference = if idx == 0 {
                    None
                } else {
                    ratio_point(ratio_difference(
                        &counts,
                        &baseline.name,
                        &loaded.name,
                        bench,
                        num,
                        den,
                    ))?
                };
                if let Some(ratio) = ratio {
                    ratio_series
                        .entry((loaded.name.as_str(), label.as_str()))
                        .or_default()
                        .insert(bench.to_string(), ratio);
                }
                tables.ratios.push(RatioRow {
                    condition: loaded.name.clone(),
                    bench: bench.to_string(),
                    event: num.to_string(),
                    normalizer: den.to_string(),
                    ratio,
                    difference,
                });
            }
        }
    }

    for treatment in treatments {
        let Some(x) = overheads.get(treatment.name.as_str()) else {
            continue;
        };
        for (label, _, _) in &ratios {
            let Some(y) = ratio_series.get(&(treatment.name.as_str(), label.as_str())) else {
                continue;
            };
            let (xs, ys) = pair_by_key(x, y);
            tables.correlations.push(CorrelationRow {
                condition: treatment.name.clone(),
                x: "elapsed_overhead_pct".to_string(),
                y: label.clone(),
                pairs: xs.len(),
                r: pearson(&xs, &ys),
            });
        }
    }

    Ok(tables)
}

fn check_names(args: &GroupArgs) -> Result<(), PipelineError> {
    let mut seen = BTreeSet::new();
    for spec in iter::once(&args.baseline).chain(&args.treatments) {
        if !seen.insert(spec.name.as_str()) {
            return Err(PipelineError::DuplicateGroup(spec.name.clone()));
        }
    }
    Ok(())
}

fn load_all<T>(
    args: &GroupArgs,
    load: impl Fn(&GroupSpec) -> Result<Loaded<T>, PipelineError>,
) -> Result<(Loaded<T>, Vec<Loaded<T>>), PipelineError> {
    let baseline = load(&args.baseline)?;
    if baseline.contribution.files_parsed == 0 {
        return Err(PipelineError::EmptyBaseline(baseline.name));
    }

    let treatments = args
        .treatments
        .iter()
        .map(&load)
        .collect::<Result<Vec<_>, _>>()?;
    for treatment in &treatments {
        if treatment.contribution.files_parsed == 0 {
            warn!(group = %treatment.name, "no file of this group could be parsed");
        }
    }
    Ok((baseline, treatments))
}

/// Load every group named in `args` with `grammar` and run its analysis.
pub fn run(grammar: Grammar, args: &GroupArgs, config: &Config) -> Result<Tables, PipelineError> {
    check_names(args)?;
    info!(%grammar, baseline = %args.baseline, treatments = args.treatments.len(), "loading groups");

    match grammar {
        Grammar::FrameRate => {
            let (baseline, treatments) = load_all(args, load_fps)?;
            analyze_fps(&baseline, &treatments, config)
        }
        Grammar::WorkQueue => {
            let (baseline, treatments) = load_all(args, load_workqueue)?;
            analyze_workqueue(&baseline, &treatments, config)
        }
        Grammar::FlightTelemetry => {
            let battery = config.flight.battery_model();
            let (baseline, treatments) = load_all(args, |spec| load_flight(spec, &battery))?;
            analyze_flight(&baseline, &treatments, config)
        }
        Grammar::PerfCounter => {
            let (baseline, treatments) = load_all(args, load_perf)?;
            analyze_perf(&baseline, &treatments, config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hypstat_core::sample::{Block, ChildRecord, Sample};

    fn fps_run(run_id: usize, values: &[f64]) -> Run {
        Run {
            run_id,
            log_run_number: None,
            samples: values
                .iter()
                .enumerate()
                .map(|(i, v)| Sample::new(Channel::FrameRate, i as f64, *v))
                .collect(),
            blocks: vec![],
        }
    }

    fn loaded<T>(name: &str, data: T, runs: usize) -> Loaded<T> {
        let mut contribution = Contribution::new(name);
        contribution.files_found = 1;
        contribution.files_parsed = 1;
        contribution.runs = runs;
        Loaded {
            name: name.to_string(),
            data,
            contribution,
        }
    }

    fn small_config() -> Config {
        let mut config = Config::default();
        config.analysis.points = 5;
        config
    }

    #[test]
    fn test_analyze_fps() {
        let mut native = Group::new("native");
        native.extend_from_file(vec![
            fps_run(1, &[30.0, 30.0, 30.0]),
            fps_run(2, &[31.0, 30.0, 29.0]),
        ]);
        let mut bao = Group::new("bao");
        bao.extend_from_file(vec![
            fps_run(1, &[27.0, 27.0, 27.0]),
            fps_run(2, &[28.0, 27.0, 26.0]),
            fps_run(3, &[27.0]),
        ]);

        let config = small_config();
        let tables = analyze_fps(&loaded("native", native, 2), &[loaded("bao", bao, 3)], &config)
            .unwrap();

        assert_eq!(tables.aggregates.len(), 10);
        assert_eq!(tables.comparisons.len(), 5);
        assert_eq!(tables.contributions.len(), 2);
        // The single-sample run cannot be normalized.
        assert_eq!(tables.contributions[1].channels["fps"], 2);

        let all = &tables.scalars[0];
        assert_eq!(all.key, "all runs");
        assert!((all.degradation_pct.unwrap() - 10.0).abs() < 1e-9);

        // Truncated to the two common runs.
        let keys: Vec<_> = tables.scalars.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["all runs", "run 1", "run 2"]);
    }

    #[test]
    fn test_analyze_fps_strict_alignment() {
        let mut native = Group::new("native");
        native.extend_from_file(vec![fps_run(1, &[30.0, 30.0])]);
        let mut bao = Group::new("bao");
        bao.extend_from_file(vec![fps_run(1, &[27.0, 27.0]), fps_run(2, &[27.0, 28.0])]);

        let mut config = small_config();
        config.analysis.alignment = stats::AlignPolicy::Strict;
        let result = analyze_fps(&loaded("native", native, 1), &[loaded("bao", bao, 2)], &config);
        assert!(matches!(
            result,
            Err(PipelineError::Compare(CompareError::StructuralMismatch { .. }))
        ));
    }

    #[test]
    fn test_analyze_workqueue() {
        let queue = |interval: u64| Run {
            run_id: 1,
            log_run_number: Some(1),
            samples: vec![],
            blocks: vec![Block {
                name: "wq:main".to_string(),
                children: vec![
                    ChildRecord {
                        name: "mc_pos_control".to_string(),
                        interval,
                        expected_interval: 20000,
                    },
                    ChildRecord {
                        name: "other_task".to_string(),
                        interval: 1,
                        expected_interval: 1,
                    },
                ],
            }],
        };
        let mut native = Group::new("native");
        native.extend_from_file(vec![queue(20000), queue(20000)]);
        let mut bao = Group::new("bao");
        bao.extend_from_file(vec![queue(22000), queue(22000)]);

        let mut config = small_config();
        config.workqueue.tasks = vec!["mc_pos_control".to_string()];
        let tables = analyze_workqueue(
            &loaded("native", native, 2),
            &[loaded("bao", bao, 2)],
            &config,
        )
        .unwrap();

        assert_eq!(tables.scalars.len(), 1);
        let row = &tables.scalars[0];
        assert_eq!(row.key, "mc_pos_control");
        assert!((row.degradation_pct.unwrap() - 10.0).abs() < 1e-9);
        assert!(row.significant);
        assert_eq!(tables.contributions[0].channels["mc_pos_control"], 2);
    }

    #[test]
    fn test_analyze_perf() {
        let native = perf_counter::parse_dump(
            "native",
            "-> mibench/automotive/qsort-small\n 500000 r08:uk\n 1.0 (+- 1%)\n 1.0 (+- 1%)\n",
        )
        .unwrap();
        let bao = perf_counter::parse_dump(
            "bao",
            "-> mibench/automotive/qsort-small\n 1000000 r08:h\n 500000 r08:uk\n 1.1 (+- 1%)\n 1.1 (+- 1%)\n",
        )
        .unwrap();

        let mut config = small_config();
        config.perf.ratios = vec![crate::config::RatioSpec {
            event: "inst_ret:h".to_string(),
            normalizer: "inst_ret:uk".to_string(),
        }];
        let tables = analyze_perf(
            &loaded("native", vec![native], 1),
            &[loaded("bao", vec![bao], 1)],
            &config,
        )
        .unwrap();

        let row = &tables.scalars[0];
        assert_eq!(row.key, "qsort-small");
        assert!((row.degradation_pct.unwrap() - 10.0).abs() < 1e-9);

        let bao_ratio = tables.ratios.iter().find(|r| r.condition == "bao").unwrap();
        assert_eq!(bao_ratio.ratio, Some(2.0));
        // The native dump has no hypervisor-level count.
        assert_eq!(bao_ratio.difference, None);
        let native_ratio = tables.ratios.iter().find(|r| r.condition == "native").unwrap();
        assert_eq!(native_ratio.ratio, None);

        assert_eq!(tables.correlations.len(), 1);
        assert_eq!(tables.correlations[0].pairs, 1);
        assert_eq!(tables.correlations[0].r, None);
    }

    #[test]
    fn test_duplicate_group_names() {
        let args = GroupArgs {
            baseline: "a=x".parse().unwrap(),
            treatments: vec!["b=y".parse().unwrap(), "a=z".parse().unwrap()],
            csv: None,
            json: None,
            no_color: false,
        };
        assert!(matches!(check_names(&args), Err(PipelineError::DuplicateGroup(name)) if name == "a"));
    }
}
