//! Command-line interface for hypstat.

use crate::config::Config;
use crate::source::GroupSpec;
use clap::{Args, Parser, Subcommand};
use hypstat_core::stats::AlignPolicy;
use hypstat_core::Grammar;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "hypstat")]
#[command(about = "Statistically sound comparison of workloads run natively and under a hypervisor")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to config file (defaults to .hypstat.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Confidence level of the t-distribution intervals (0.0-1.0)
    #[arg(long, global = true)]
    pub confidence_level: Option<f64>,

    /// Significance threshold of the Welch tests
    #[arg(long, global = true)]
    pub alpha: Option<f64>,

    /// Length of the shared progress index
    #[arg(long, global = true)]
    pub points: Option<usize>,

    /// Run alignment when run counts differ: truncate or strict
    #[arg(long, global = true)]
    pub alignment: Option<AlignPolicy>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// One subcommand per log grammar; the format is never guessed.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Frame-rate logs
    Fps(GroupArgs),
    /// Scheduler work-queue dumps
    Workqueue(GroupArgs),
    /// PX4 flight logs (ULog)
    Flight(GroupArgs),
    /// Performance-counter dumps
    Perf(GroupArgs),
}

impl Command {
    pub fn grammar(&self) -> Grammar {
        match self {
            Command::Fps(_) => Grammar::FrameRate,
            Command::Workqueue(_) => Grammar::WorkQueue,
            Command::Flight(_) => Grammar::FlightTelemetry,
            Command::Perf(_) => Grammar::PerfCounter,
        }
    }

    pub fn args(&self) -> &GroupArgs {
        match self {
            Command::Fps(args)
            | Command::Workqueue(args)
            | Command::Flight(args)
            | Command::Perf(args) => args,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct GroupArgs {
    /// Baseline group, a file or a directory of files
    #[arg(long, value_name = "NAME=PATH")]
    pub baseline: GroupSpec,

    /// Treatment group compared against the baseline (repeatable)
    #[arg(long = "treatment", value_name = "NAME=PATH", required = true)]
    pub treatments: Vec<GroupSpec>,

    /// Write the result tables as CSV; scalars land in `<stem>.scalars.csv` when series exist
    #[arg(long, value_name = "FILE")]
    pub csv: Option<PathBuf>,

    /// Write the result tables as JSON
    #[arg(long, value_name = "FILE")]
    pub json: Option<PathBuf>,

    /// Disable colored terminal output
    #[arg(long)]
    pub no_color: bool,
}

impl Cli {
    /// Apply CLI overrides to the configuration.
    ///
    /// CLI arguments take precedence over config file values.
    /// Only non-None optional values will override the config.
    pub fn apply_to_config(&self, config: &mut Config) {
        if let Some(confidence_level) = self.confidence_level {
            config.analysis.confidence_level = confidence_level;
        }

        if let Some(alpha) = self.alpha {
            config.analysis.alpha = alpha;
        }

        if let Some(points) = self.points {
            config.analysis.points = points;
        }

        if let Some(alignment) = self.alignment {
            config.analysis.alignment = alignment;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_to_config_with_overrides() {
        let cli = Cli::parse_from([
            "hypstat",
            "fps",
            "--baseline",
            "native=logs/native",
            "--treatment",
            "bao=logs/bao",
            "--confidence-level",
            "0.99",
            "--alpha",
            "0.01",
            "--points",
            "200",
            "--alignment",
            "strict",
        ]);

        let mut config = Config::default();
        cli.apply_to_config(&mut config);

        assert_eq!(config.analysis.confidence_level, 0.99);
        assert_eq!(config.analysis.alpha, 0.01);
        assert_eq!(config.analysis.points, 200);
        assert_eq!(config.analysis.alignment, AlignPolicy::Strict);
    }

    #[test]
    fn test_apply_to_config_without_overrides() {
        let cli = Cli::parse_from([
            "hypstat",
            "perf",
            "--baseline",
            "native=dumps/native",
            "--treatment",
            "bao=dumps/bao",
        ]);

        let mut config = Config::default();
        cli.apply_to_config(&mut config);

        assert_eq!(config.analysis.confidence_level, 0.95);
        assert_eq!(config.analysis.alpha, 0.05);
        assert_eq!(config.analysis.points, 1000);
        assert_eq!(config.analysis.alignment, AlignPolicy::Truncate);
    }

    #[test]
    fn test_cli_parse_groups() {
        let cli = Cli::parse_from([
            "hypstat",
            "workqueue",
            "--baseline",
            "native=logs/native.txt",
            "--treatment",
            "bao=logs/bao.txt",
            "--treatment",
            "bao-interf=logs/interf.txt",
            "--csv",
            "out.csv",
            "--no-color",
            "--verbose",
        ]);

        assert_eq!(cli.command.grammar(), Grammar::WorkQueue);
        let args = cli.command.args();
        assert_eq!(args.baseline.name, "native");
        assert_eq!(args.baseline.path, PathBuf::from("logs/native.txt"));
        let names: Vec<_> = args.treatments.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["bao", "bao-interf"]);
        assert_eq!(args.csv, Some(PathBuf::from("out.csv")));
        assert!(args.json.is_none());
        assert!(args.no_color);
        assert!(cli.verbose);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_cli_requires_a_treatment() {
        let result = Cli::try_parse_from(["hypstat", "flight", "--baseline", "native=a"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_rejects_malformed_group() {
        let result = Cli::try_parse_from([
            "hypstat",
            "fps",
            "--baseline",
            "native",
            "--treatment",
            "bao=b",
        ]);
        assert!(result.is_err());

        let result = Cli::try_parse_from([
            "hypstat",
            "fps",
            "--baseline",
            "native=a",
            "--treatment",
            "bao=b",
            "--alignment",
            "pad",
        ]);
        assert!(result.is_err());
    }
}
