//! Line grammars for the supported log formats.
//!
//! Each grammar is selected explicitly by the caller; logs are never sniffed.
//! Line-oriented run grammars (frame rate, work queue) classify a line into a
//! [`LineEvent`] which the [`crate::segment::Segmenter`] folds into runs.
//! The perf-counter grammar produces benchmark-keyed records instead, and the
//! flight-telemetry grammar is binary and lives in [`crate::telemetry`].

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::sample::{Channel, ChildRecord, Run};
use crate::segment::Segmenter;

pub mod event_table;
pub mod frame_rate;
pub mod perf_counter;
pub mod work_queue;

/// Errors that abort parsing of a single file.
#[derive(Debug, Error)]
pub enum ParseError {
    /// A line matched a grammar but one of its fields could not be coerced.
    #[error("line {line}: invalid {field} value {value:?}")]
    InvalidNumber {
        line: usize,
        field: &'static str,
        value: String,
    },

    /// A raw performance-counter code is absent from the event table.
    #[error("line {line}: unknown event code {code:?}")]
    UnknownEventCode { line: usize, code: String },

    /// A record appeared before the context it belongs to.
    #[error("line {line}: {what} outside of any context")]
    MissingContext { line: usize, what: &'static str },

    /// The grammar cannot be parsed line by line.
    #[error("grammar {0} is not line-oriented")]
    NotLineOriented(Grammar),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ParseError {
    pub(crate) fn invalid(line: usize, field: &'static str, value: &str) -> Self {
        ParseError::InvalidNumber {
            line,
            field,
            value: value.to_string(),
        }
    }
}

/// The closed set of supported log formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Grammar {
    FrameRate,
    WorkQueue,
    FlightTelemetry,
    PerfCounter,
}

impl Grammar {
    pub const ALL: [Grammar; 4] = [
        Grammar::FrameRate,
        Grammar::WorkQueue,
        Grammar::FlightTelemetry,
        Grammar::PerfCounter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Grammar::FrameRate => "fps",
            Grammar::WorkQueue => "workqueue",
            Grammar::FlightTelemetry => "flight",
            Grammar::PerfCounter => "perf",
        }
    }

    /// Whether lines before the first run marker open an implicit run.
    fn implicit_runs(&self) -> bool {
        matches!(self, Grammar::FrameRate)
    }

    /// Classify one line. Only defined for the run grammars.
    pub fn classify(&self, line_no: usize, line: &str) -> Result<LineEvent, ParseError> {
        match self {
            Grammar::FrameRate => frame_rate::classify(line_no, line),
            Grammar::WorkQueue => work_queue::classify(line_no, line),
            Grammar::FlightTelemetry | Grammar::PerfCounter => {
                Err(ParseError::NotLineOriented(*self))
            }
        }
    }

    /// Parse a whole log into runs, numbered from 1 in file order.
    ///
    /// Single pass, no backtracking: the first malformed line aborts the file.
    pub fn parse_runs(&self, text: &str) -> Result<Vec<Run>, ParseError> {
        if matches!(self, Grammar::FlightTelemetry | Grammar::PerfCounter) {
            return Err(ParseError::NotLineOriented(*self));
        }
        let mut segmenter = Segmenter::new(self.implicit_runs());
        for (idx, line) in text.lines().enumerate() {
            let event = self.classify(idx + 1, line)?;
            segmenter.feed(event);
        }
        Ok(segmenter.finish())
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A grammar name that is not one of [`Grammar::ALL`].
#[derive(Debug, Error)]
#[error("unknown grammar {0:?} (expected one of fps, workqueue, flight, perf)")]
pub struct UnknownGrammar(pub String);

impl FromStr for Grammar {
    type Err = UnknownGrammar;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Grammar::ALL
            .into_iter()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| UnknownGrammar(s.to_string()))
    }
}

/// What a single classified line means for run segmentation.
#[derive(Debug, Clone, PartialEq)]
pub enum LineEvent {
    /// Seals the current run and starts the next one.
    RunBoundary { log_run_number: Option<u32> },
    /// A value for the current run.
    Value { channel: Channel, value: f64 },
    /// Opens a scope in which blocks may appear.
    ScopeOpen,
    /// Opens a named block inside the current scope.
    BlockOpen(String),
    /// A child record for the innermost open block.
    Child(ChildRecord),
    /// Closes the current scope (and its open block).
    ScopeClose,
    Ignored,
}
