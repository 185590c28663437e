//! Data model shared by every grammar and analysis stage.
//!
//! Samples, runs and blocks are produced by the parsers and never mutated
//! once the parser has moved past the lines that defined them. Everything
//! downstream (normalized series, aggregates, comparisons) is derived.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A spatial axis of the flight telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn as_str(&self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }
}

/// A hardware event name with its privilege-level filter, e.g. `inst_ret:uk`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventKey {
    pub name: String,
    pub levels: String,
}

impl EventKey {
    pub fn new(name: impl Into<String>, levels: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            levels: levels.into(),
        }
    }

    /// Parse the `name:levels` form used in configuration files.
    pub fn parse(s: &str) -> Option<Self> {
        let (name, levels) = s.split_once(':')?;
        if name.is_empty() || levels.is_empty() {
            return None;
        }
        Some(Self::new(name, levels))
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.levels)
    }
}

/// The measured quantity a sample belongs to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Channel {
    FrameRate,
    TaskInterval,
    Position(Axis),
    PositionSetpoint(Axis),
    CpuLoad,
    RamUsage,
    BatteryRemaining,
    Energy,
    ElapsedTime,
    Event(EventKey),
}

impl Channel {
    /// Channels produced from one flight log, in output order.
    pub fn flight_channels() -> Vec<Channel> {
        let mut out = Vec::with_capacity(10);
        for axis in Axis::ALL {
            out.push(Channel::Position(axis));
        }
        for axis in Axis::ALL {
            out.push(Channel::PositionSetpoint(axis));
        }
        out.push(Channel::CpuLoad);
        out.push(Channel::RamUsage);
        out.push(Channel::BatteryRemaining);
        out.push(Channel::Energy);
        out
    }

    /// Column-friendly name, used as the `<channel>` prefix in exports.
    pub fn column_name(&self) -> String {
        match self {
            Channel::FrameRate => "fps".to_string(),
            Channel::TaskInterval => "interval_us".to_string(),
            Channel::Position(axis) => format!("{}_actual", axis.as_str()),
            Channel::PositionSetpoint(axis) => format!("{}_setpoint", axis.as_str()),
            Channel::CpuLoad => "cpu".to_string(),
            Channel::RamUsage => "ram".to_string(),
            Channel::BatteryRemaining => "battery".to_string(),
            Channel::Energy => "energy_wh".to_string(),
            Channel::ElapsedTime => "elapsed_s".to_string(),
            Channel::Event(key) => format!("{}_{}", key.name, key.levels),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.column_name())
    }
}

/// A single scalar observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub value: f64,
    /// Native timestamp, or the sample's position when the log has none.
    pub position: f64,
    pub channel: Channel,
}

impl Sample {
    pub fn new(channel: Channel, position: f64, value: f64) -> Self {
        Self {
            value,
            position,
            channel,
        }
    }
}

/// One child entry of a work-queue block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildRecord {
    pub name: String,
    /// Observed interval in microseconds.
    pub interval: u64,
    /// Expected interval in microseconds; equals `interval` when the log omits it.
    pub expected_interval: u64,
}

/// A named nested scope inside a run, e.g. one scheduler work queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub name: String,
    pub children: Vec<ChildRecord>,
}

impl Block {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
        }
    }
}

/// One execution of the monitored workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    /// 1-based position of the run in its file.
    pub run_id: usize,
    /// Run number printed in the log itself, kept as metadata only.
    pub log_run_number: Option<u32>,
    pub samples: Vec<Sample>,
    pub blocks: Vec<Block>,
}

impl Run {
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty() && self.blocks.is_empty()
    }

    /// Values of one channel in file order.
    pub fn values(&self, channel: &Channel) -> Vec<f64> {
        self.samples
            .iter()
            .filter(|s| &s.channel == channel)
            .map(|s| s.value)
            .collect()
    }

    /// Every child record of every block, in file order.
    pub fn children(&self) -> impl Iterator<Item = &ChildRecord> {
        self.blocks.iter().flat_map(|b| b.children.iter())
    }
}

/// Runs collected under one environment/condition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    pub runs: Vec<Run>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            runs: Vec::new(),
        }
    }

    /// Append the runs of one parsed file. `run_id`s stay as numbered within the file.
    pub fn extend_from_file(&mut self, runs: Vec<Run>) {
        self.runs.extend(runs);
    }

    /// One value per run: the mean of `channel`, `None` for runs without data.
    pub fn run_means(&self, channel: &Channel) -> Vec<Option<f64>> {
        self.runs
            .iter()
            .map(|run| {
                let values = run.values(channel);
                if values.is_empty() {
                    None
                } else {
                    Some(values.iter().sum::<f64>() / values.len() as f64)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_key_parse() {
        let key = EventKey::parse("inst_ret:uk").unwrap();
        assert_eq!(key.name, "inst_ret");
        assert_eq!(key.levels, "uk");
        assert_eq!(key.to_string(), "inst_ret:uk");

        assert!(EventKey::parse("inst_ret").is_none());
        assert!(EventKey::parse(":uk").is_none());
    }

    #[test]
    fn test_channel_column_names() {
        assert_eq!(Channel::Position(Axis::Z).column_name(), "z_actual");
        assert_eq!(Channel::PositionSetpoint(Axis::X).column_name(), "x_setpoint");
        assert_eq!(Channel::Energy.column_name(), "energy_wh");
        assert_eq!(
            Channel::Event(EventKey::new("exc_taken", "h")).column_name(),
            "exc_taken_h"
        );
        assert_eq!(Channel::flight_channels().len(), 10);
    }

    #[test]
    fn test_group_run_means_skip_empty_runs() {
        let mut group = Group::new("bao");
        group.extend_from_file(vec![
            Run {
                run_id: 1,
                log_run_number: None,
                samples: vec![
                    Sample::new(Channel::FrameRate, 0.0, 10.0),
                    Sample::new(Channel::FrameRate, 1.0, 20.0),
                ],
                blocks: vec![],
            },
            Run {
                run_id: 2,
                log_run_number: None,
                samples: vec![],
                blocks: vec![Block::new("wq:main")],
            },
        ]);

        assert_eq!(group.run_means(&Channel::FrameRate), vec![Some(15.0), None]);
    }
}
