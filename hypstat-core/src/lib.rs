//! Core of hypstat: log grammars, run segmentation, flight telemetry,
//! normalization onto a shared progress index, and the statistics that
//! compare a baseline environment against its treatments.
//!
//! Data flows one way: raw log text → classified lines → runs and blocks →
//! normalized series → aggregate statistics → comparisons → [`report::Tables`].

pub mod grammar;
pub mod normalize;
pub mod report;
pub mod sample;
pub mod segment;
pub mod stats;
pub mod telemetry;

// Re-export main types for convenience
pub use grammar::{Grammar, LineEvent, ParseError};
pub use normalize::{NormalizedSeries, Normalizer};
pub use report::{ReportError, Reporter, Tables, TerminalReporter};
pub use sample::{Block, Channel, ChildRecord, Group, Run, Sample};
pub use segment::Segmenter;
pub use stats::{AggregateStat, CompareError, ComparisonResult, StatisticalTest, WelchTTest};
pub use telemetry::{FlightLog, TelemetryError};
