//! Flight telemetry: ULog files turned into one run of flight channels.
//!
//! The position dataset is mandatory; without it the file is unusable.
//! Setpoints, CPU/RAM load and battery state are secondary: when absent or
//! invalid the corresponding channels are reported as missing and the run
//! carries on without them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sample::{Axis, Channel, Run, Sample};

pub mod ulog;

pub use ulog::{Dataset, ULog, UlogReader};

pub const POSITION_DATASET: &str = "vehicle_local_position";
pub const SETPOINT_DATASET: &str = "vehicle_local_position_setpoint";
pub const CPU_DATASET: &str = "cpuload";
pub const BATTERY_DATASET: &str = "battery_status";

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("not a ULog file (bad magic)")]
    BadMagic,

    #[error("truncated {what} at byte {offset}")]
    Truncated { what: &'static str, offset: usize },

    #[error("invalid format definition {0:?}")]
    BadFormat(String),

    #[error("subscription to undefined format {0:?}")]
    UnknownFormat(String),

    #[error("dataset {0:?} not found or empty")]
    MissingDataset(String),

    #[error("dataset {dataset:?} has no field {field:?}")]
    MissingField { dataset: String, field: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// How battery state is turned into consumed energy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatteryModel {
    /// Pack capacity in watt-hours.
    pub total_energy_wh: f64,
    /// Flights consuming less than this are treated as invalid battery data.
    pub min_energy_wh: f64,
    /// Minimum change of the remaining fraction over a flight.
    pub change_threshold: f64,
}

impl Default for BatteryModel {
    fn default() -> Self {
        Self {
            total_energy_wh: 55.5,
            min_energy_wh: 0.1,
            change_threshold: 0.01,
        }
    }
}

/// A secondary channel that could not be extracted, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingChannel {
    pub channel: Channel,
    pub reason: String,
}

/// One flight: a single run whose sample positions are native timestamps (µs).
#[derive(Debug, Clone, PartialEq)]
pub struct FlightLog {
    pub run: Run,
    pub missing: Vec<MissingChannel>,
}

impl FlightLog {
    pub fn from_ulog(log: &ULog, battery: &BatteryModel) -> Result<Self, TelemetryError> {
        let position = log
            .dataset(POSITION_DATASET)
            .filter(|d| !d.is_empty())
            .ok_or_else(|| TelemetryError::MissingDataset(POSITION_DATASET.to_string()))?;
        let timestamps = required_field(position, "timestamp")?;

        let mut samples = Vec::new();
        for axis in Axis::ALL {
            let values = required_field(position, axis.as_str())?;
            push_samples(&mut samples, Channel::Position(axis), timestamps, values, 1.0);
        }

        let mut missing = Vec::new();

        let setpoint_fields: Vec<_> = Axis::ALL
            .iter()
            .map(|axis| (axis.as_str(), Channel::PositionSetpoint(*axis), 1.0))
            .collect();
        extract_secondary(log, SETPOINT_DATASET, &setpoint_fields, &mut samples, &mut missing);

        extract_secondary(
            log,
            CPU_DATASET,
            &[
                ("load", Channel::CpuLoad, 100.0),
                ("ram_usage", Channel::RamUsage, 1.0),
            ],
            &mut samples,
            &mut missing,
        );

        extract_battery(log, battery, &mut samples, &mut missing);

        Ok(Self {
            run: Run {
                run_id: 1,
                log_run_number: None,
                samples,
                blocks: Vec::new(),
            },
            missing,
        })
    }

    /// Energy consumed over the whole flight, when battery data was valid.
    pub fn energy_consumed_wh(&self) -> Option<f64> {
        self.run.values(&Channel::Energy).last().copied()
    }
}

fn required_field<'a>(dataset: &'a Dataset, field: &str) -> Result<&'a [f64], TelemetryError> {
    dataset
        .field(field)
        .ok_or_else(|| TelemetryError::MissingField {
            dataset: dataset.name.clone(),
            field: field.to_string(),
        })
}

/// Non-finite native values (PX4 logs NaN setpoints outside position control) are dropped.
fn push_samples(
    samples: &mut Vec<Sample>,
    channel: Channel,
    timestamps: &[f64],
    values: &[f64],
    scale: f64,
) {
    for (&t, &v) in timestamps.iter().zip(values) {
        if v.is_finite() {
            samples.push(Sample::new(channel.clone(), t, v * scale));
        }
    }
}

fn extract_secondary(
    log: &ULog,
    dataset: &str,
    fields: &[(&str, Channel, f64)],
    samples: &mut Vec<Sample>,
    missing: &mut Vec<MissingChannel>,
) {
    let found = log.dataset(dataset).filter(|d| !d.is_empty());
    let timestamps = found.and_then(Dataset::timestamps);

    for (field, channel, scale) in fields {
        match (found, timestamps) {
            (Some(data), Some(ts)) => match data.field(field) {
                Some(values) => push_samples(samples, channel.clone(), ts, values, *scale),
                None => missing.push(MissingChannel {
                    channel: channel.clone(),
                    reason: format!("{dataset} has no field {field}"),
                }),
            },
            _ => missing.push(MissingChannel {
                channel: channel.clone(),
                reason: format!("no {dataset} data"),
            }),
        }
    }
}

fn extract_battery(
    log: &ULog,
    model: &BatteryModel,
    samples: &mut Vec<Sample>,
    missing: &mut Vec<MissingChannel>,
) {
    let mut reject = |channels: &[Channel], reason: String| {
        for channel in channels {
            missing.push(MissingChannel {
                channel: channel.clone(),
                reason: reason.clone(),
            });
        }
    };

    let battery = log.dataset(BATTERY_DATASET).filter(|d| !d.is_empty());
    let (Some(ts), Some(remaining)) = (
        battery.and_then(Dataset::timestamps),
        battery.and_then(|d| d.field("remaining")),
    ) else {
        reject(
            &[Channel::BatteryRemaining, Channel::Energy],
            format!("no {BATTERY_DATASET} remaining data"),
        );
        return;
    };

    push_samples(samples, Channel::BatteryRemaining, ts, remaining, 1.0);

    if ts.len() < 2 {
        reject(&[Channel::Energy], "insufficient battery data".to_string());
        return;
    }

    let (lo, hi) = remaining
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = hi - lo;
    if !(range >= model.change_threshold) {
        reject(
            &[Channel::Energy],
            format!("battery percentage unchanged (delta {range:.3})"),
        );
        return;
    }

    let energy: Vec<f64> = remaining
        .iter()
        .map(|r| (1.0 - r) * model.total_energy_wh)
        .collect();
    let consumed = energy.iter().rev().find(|e| e.is_finite()).copied();
    match consumed {
        Some(wh) if wh >= model.min_energy_wh => {
            push_samples(samples, Channel::Energy, ts, &energy, 1.0);
        }
        _ => reject(
            &[Channel::Energy],
            format!(
                "low energy consumption ({:.4} Wh)",
                consumed.unwrap_or(f64::NAN)
            ),
        ),
    }
}
