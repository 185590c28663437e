//! Frame-rate logs: a run marker line followed by periodic FPS reports.
//!
//! ```text
//! >> TEST -> run 1
//! [cam] frames: 300, current: 29.97, avg: 29.90
//! ```

use super::{LineEvent, ParseError};
use crate::sample::Channel;

/// Lines starting with this marker terminate the current run.
pub const RUN_MARKER: &str = ">> TEST ->";

const CURRENT_FIELD: &str = "current: ";

pub fn classify(line_no: usize, line: &str) -> Result<LineEvent, ParseError> {
    if line.starts_with(RUN_MARKER) {
        return Ok(LineEvent::RunBoundary {
            log_run_number: None,
        });
    }

    let Some(start) = line.find(CURRENT_FIELD) else {
        return Ok(LineEvent::Ignored);
    };
    let rest = &line[start + CURRENT_FIELD.len()..];
    let raw = rest.split(',').next().unwrap_or_default().trim();
    let value: f64 = raw
        .parse()
        .map_err(|_| ParseError::invalid(line_no, "frame rate", raw))?;

    Ok(LineEvent::Value {
        channel: Channel::FrameRate,
        value,
    })
}
