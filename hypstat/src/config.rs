//! Configuration loading for hypstat.
//!
//! Supports loading configuration from TOML files, with sensible defaults
//! for all settings.

use anyhow::{bail, Context, Result};
use hypstat_core::grammar::event_table;
use hypstat_core::sample::EventKey;
use hypstat_core::stats::{AlignPolicy, Phase};
use hypstat_core::telemetry::BatteryModel;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration for hypstat.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Statistics shared by every analysis.
    pub analysis: AnalysisConfig,
    /// Flight telemetry settings.
    pub flight: FlightConfig,
    /// Scheduler work-queue settings.
    pub workqueue: WorkQueueConfig,
    /// Performance-counter settings.
    pub perf: PerfConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Confidence level of the t-distribution intervals (e.g., 0.95).
    pub confidence_level: f64,
    /// Significance threshold of the per-point Welch tests.
    pub alpha: f64,
    /// Length of the shared progress index.
    pub points: usize,
    /// Critical value of the normal-approximation intervals.
    pub z_score: f64,
    /// Handling of groups with different run counts.
    pub alignment: AlignPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightConfig {
    /// Battery pack capacity in watt-hours.
    pub total_energy_wh: f64,
    /// Flights consuming less energy than this have invalid battery data.
    pub min_energy_wh: f64,
    /// Minimum change of the remaining battery fraction over a flight.
    pub battery_change_threshold: f64,
    /// Mission phases summarized after the per-point comparison.
    pub phases: Vec<Phase>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkQueueConfig {
    /// Tasks whose intervals are compared; others are ignored.
    pub tasks: Vec<String>,
}

/// An event ratio, both sides written `name:levels`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatioSpec {
    pub event: String,
    pub normalizer: String,
}

impl RatioSpec {
    fn new(event: &str, normalizer: &str) -> Self {
        Self {
            event: event.to_string(),
            normalizer: normalizer.to_string(),
        }
    }

    /// Numerator and denominator keys.
    pub fn keys(&self) -> Result<(EventKey, EventKey)> {
        let parse = |s: &str| {
            EventKey::parse(s).with_context(|| format!("Invalid event '{s}': expected name:levels"))
        };
        Ok((parse(&self.event)?, parse(&self.normalizer)?))
    }

    pub fn label(&self) -> String {
        format!("{}/{}", self.event, self.normalizer)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerfConfig {
    /// Benchmarks included in the tables; empty keeps every benchmark.
    pub benchmarks: Vec<String>,
    /// Event ratios reported per benchmark and condition.
    pub ratios: Vec<RatioSpec>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            confidence_level: 0.95,
            alpha: 0.05,
            points: 1000,
            z_score: 1.96,
            alignment: AlignPolicy::Truncate,
        }
    }
}

impl Default for FlightConfig {
    fn default() -> Self {
        let battery = BatteryModel::default();
        Self {
            total_energy_wh: battery.total_energy_wh,
            min_energy_wh: battery.min_energy_wh,
            battery_change_threshold: battery.change_threshold,
            phases: Phase::defaults(),
        }
    }
}

impl FlightConfig {
    pub fn battery_model(&self) -> BatteryModel {
        BatteryModel {
            total_energy_wh: self.total_energy_wh,
            min_energy_wh: self.min_energy_wh,
            change_threshold: self.battery_change_threshold,
        }
    }
}

impl Default for WorkQueueConfig {
    fn default() -> Self {
        Self {
            tasks: [
                "control_allocator",
                "mc_rate_control",
                "pca9685_pwm_out",
                "flight_mode_manager",
                "mc_pos_control",
                "sensors",
            ]
            .map(String::from)
            .to_vec(),
        }
    }
}

impl Default for PerfConfig {
    fn default() -> Self {
        Self {
            benchmarks: [
                "qsort-small",
                "qsort-large",
                "susanc-small",
                "susanc-large",
                "susane-small",
                "susane-large",
                "susans-small",
                "susans-large",
                "bitcount-small",
                "bitcount-large",
                "basicmath-small",
                "basicmath-large",
            ]
            .map(String::from)
            .to_vec(),
            ratios: vec![
                RatioSpec::new("inst_ret:h", "inst_ret:uk"),
                RatioSpec::new("exc_taken:h", "inst_ret:uk"),
                RatioSpec::new("dcache_l2_refill:h", "inst_ret:uk"),
                RatioSpec::new("itlb_l1_refill:uk", "inst_ret:uk"),
            ],
        }
    }
}

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = ".hypstat.toml";

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Config> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load configuration from the default file (`.hypstat.toml`) or use defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be parsed.
    pub fn load_or_default() -> Result<Config> {
        let path = Path::new(DEFAULT_CONFIG_FILE);

        if path.exists() {
            Self::load(path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load configuration from the specified path, or try the default location.
    pub fn load_from(path: Option<&Path>) -> Result<Config> {
        match path {
            Some(p) => Self::load(p),
            None => Self::load_or_default(),
        }
    }

    /// Reject settings no analysis could run with.
    pub fn validate(&self) -> Result<()> {
        let analysis = &self.analysis;
        if !(analysis.confidence_level > 0.0 && analysis.confidence_level < 1.0) {
            bail!(
                "confidence_level must be between 0 and 1, got {}",
                analysis.confidence_level
            );
        }
        if !(analysis.alpha > 0.0 && analysis.alpha < 1.0) {
            bail!("alpha must be between 0 and 1, got {}", analysis.alpha);
        }
        if analysis.points < 2 {
            bail!("points must be at least 2, got {}", analysis.points);
        }
        if !(analysis.z_score > 0.0) {
            bail!("z_score must be positive, got {}", analysis.z_score);
        }

        for phase in &self.flight.phases {
            if !(phase.start < phase.end) {
                bail!(
                    "phase {} must start before it ends ({}..{})",
                    phase.name,
                    phase.start,
                    phase.end
                );
            }
        }

        for ratio in &self.perf.ratios {
            let (event, normalizer) = ratio.keys()?;
            for key in [event, normalizer] {
                if !event_table::names().any(|name| name == key.name) {
                    bail!("Unknown event '{}' in ratio {}", key.name, ratio.label());
                }
            }
        }
        Ok(())
    }
}
