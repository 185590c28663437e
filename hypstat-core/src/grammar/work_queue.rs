//! Scheduler work-queue dumps (`work_queue status` output on a PX4 shell).
//!
//! ```text
//! >> Run 1
//! Work Queue: 8  threads                          RATE        INTERVAL
//! |__ 1) wq:main
//! |   |__ 1) mc_pos_control                    50.00 Hz   20000 us  (20000 us)
//! |   \__ 2) sensors                          250.00 Hz    4000 us
//!
//! pxh>
//! ```

use std::sync::LazyLock;

use regex::Regex;

use super::{LineEvent, ParseError};
use crate::sample::ChildRecord;

static RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^>> Run (\S+)").expect("run pattern is valid"));

static SCOPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Work Queue:\s+\d+\s+threads").expect("scope pattern is valid"));

static QUEUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\|__ \d+\) (wq:\w+)").expect("queue pattern is valid"));

// name, rate, interval, expected interval (optional)
static CHILD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\|\s+[|\\]__ \d+\) (\w+)\s+(\S+) Hz\s+(\S+) us(?:\s+\((\S+) us\))?")
        .expect("child pattern is valid")
});

/// Shell prompt that ends a dump.
pub const PROMPT: &str = "pxh>";

pub fn classify(line_no: usize, line: &str) -> Result<LineEvent, ParseError> {
    let line = line.trim_end();

    if let Some(caps) = RUN_RE.captures(line) {
        let raw = &caps[1];
        let number = raw
            .parse::<u32>()
            .map_err(|_| ParseError::invalid(line_no, "run number", raw))?;
        return Ok(LineEvent::RunBoundary {
            log_run_number: Some(number),
        });
    }

    if SCOPE_RE.is_match(line) {
        return Ok(LineEvent::ScopeOpen);
    }

    if let Some(caps) = QUEUE_RE.captures(line) {
        return Ok(LineEvent::BlockOpen(caps[1].to_string()));
    }

    if let Some(caps) = CHILD_RE.captures(line) {
        let rate = &caps[2];
        rate.parse::<f64>()
            .map_err(|_| ParseError::invalid(line_no, "rate", rate))?;

        let raw_interval = &caps[3];
        let interval = raw_interval
            .parse::<u64>()
            .map_err(|_| ParseError::invalid(line_no, "interval", raw_interval))?;

        let expected_interval = match caps.get(4) {
            Some(m) => m
                .as_str()
                .parse::<u64>()
                .map_err(|_| ParseError::invalid(line_no, "expected interval", m.as_str()))?,
            None => interval,
        };

        return Ok(LineEvent::Child(ChildRecord {
            name: caps[1].to_string(),
            interval,
            expected_interval,
        }));
    }

    if line.is_empty() || line.starts_with(PROMPT) {
        return Ok(LineEvent::ScopeClose);
    }

    Ok(LineEvent::Ignored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Grammar;
    use crate::sample::Block;

    #[test]
    fn test_classify_child_with_expected_interval() {
        let event = classify(
            4,
            "|   |__ 1) mc_pos_control   50.00 Hz   20000 us  (20000 us)",
        )
        .unwrap();
        assert_eq!(
            event,
            LineEvent::Child(ChildRecord {
                name: "mc_pos_control".to_string(),
                interval: 20000,
                expected_interval: 20000,
            })
        );
    }

    #[test]
    fn test_expected_interval_defaults_to_observed() {
        let event = classify(5, r"|   \__ 2) sensors  250.00 Hz  4012 us").unwrap();
        assert_eq!(
            event,
            LineEvent::Child(ChildRecord {
                name: "sensors".to_string(),
                interval: 4012,
                expected_interval: 4012,
            })
        );
    }

    #[test]
    fn test_classify_structure_lines() {
        assert_eq!(
            classify(1, ">> Run 12").unwrap(),
            LineEvent::RunBoundary {
                log_run_number: Some(12)
            }
        );
        assert_eq!(
            classify(2, "Work Queue: 8  threads   RATE   INTERVAL").unwrap(),
            LineEvent::ScopeOpen
        );
        assert_eq!(
            classify(3, "|__ 1) wq:rate_ctrl").unwrap(),
            LineEvent::BlockOpen("wq:rate_ctrl".to_string())
        );
        assert_eq!(classify(4, "").unwrap(), LineEvent::ScopeClose);
        assert_eq!(classify(5, "pxh> work_queue status").unwrap(), LineEvent::ScopeClose);
        assert_eq!(classify(6, "INFO  [commander] ready").unwrap(), LineEvent::Ignored);
    }

    #[test]
    fn test_malformed_fields_are_errors() {
        assert!(matches!(
            classify(9, ">> Run one"),
            Err(ParseError::InvalidNumber { line: 9, field: "run number", .. })
        ));
        assert!(matches!(
            classify(10, "|   |__ 1) sensors  250.00 Hz  4x12 us"),
            Err(ParseError::InvalidNumber { line: 10, field: "interval", .. })
        ));
        assert!(matches!(
            classify(11, "|   |__ 1) sensors  fast Hz  4012 us"),
            Err(ParseError::InvalidNumber { line: 11, field: "rate", .. })
        ));
    }

    #[test]
    fn test_scheduler_dump_scenario() {
        let log = "\
>> Run 1
Work Queue: 8  threads
|__ 1) wq:main
|   |__ 1) mc_pos_control   50.00 Hz   20000 us  (20000 us)
";
        let runs = Grammar::WorkQueue.parse_runs(log).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].run_id, 1);
        assert_eq!(runs[0].log_run_number, Some(1));
        assert_eq!(
            runs[0].blocks,
            vec![Block {
                name: "wq:main".to_string(),
                children: vec![ChildRecord {
                    name: "mc_pos_control".to_string(),
                    interval: 20000,
                    expected_interval: 20000,
                }],
            }]
        );
    }

    #[test]
    fn test_multiple_queues_and_runs() {
        let log = "\
boot noise before any run
|   |__ 1) ignored_task   50.00 Hz   20000 us
>> Run 7
Work Queue: 8  threads
|__ 1) wq:rate_ctrl
|   |__ 1) mc_rate_control  400.00 Hz  2500 us  (2500 us)
|__ 2) wq:nav_and_controllers
|   |__ 1) mc_pos_control   50.00 Hz   20010 us  (20000 us)
|   \\__ 2) flight_mode_manager   50.00 Hz   20100 us  (20000 us)

|   |__ 9) after_close   1.00 Hz   1 us
>> Run 8
Work Queue: 8  threads
|__ 1) wq:rate_ctrl
|   |__ 1) mc_rate_control  400.00 Hz  2600 us  (2500 us)
pxh>
";
        let runs = Grammar::WorkQueue.parse_runs(log).unwrap();
        assert_eq!(runs.len(), 2);

        assert_eq!(runs[0].run_id, 1);
        assert_eq!(runs[0].log_run_number, Some(7));
        let names: Vec<_> = runs[0].blocks.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["wq:rate_ctrl", "wq:nav_and_controllers"]);
        assert_eq!(runs[0].blocks[1].children.len(), 2);
        assert_eq!(runs[0].children().count(), 3);

        assert_eq!(runs[1].run_id, 2);
        assert_eq!(runs[1].blocks.len(), 1);
        assert_eq!(runs[1].blocks[0].children[0].interval, 2600);
    }
}
