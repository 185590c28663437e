//! Performance-counter dumps from MiBench runs under `perf stat`.
//!
//! A dump holds one condition (native or a hypervisor configuration). Each
//! benchmark section starts with a path line and is followed by raw event
//! counts and elapsed-time lines:
//!
//! ```text
//! -> mibench/automotive/qsort-small
//!     1000000  r08:h
//!      500000  r08:uk
//!  0.0123 (+- 0.20%)
//! ```

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{event_table, ParseError};
use crate::sample::EventKey;

static BENCH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^->\s*[^/\s]+/[^/\s]+/(\S+)").expect("benchmark pattern is valid")
});

// count, raw code, levels; then end of line, a `#` comment or a `(` annotation
static EVENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([\d,]+)\s+(r[0-9A-Fa-f]+)(?::([ukh]+))?(?:\s*$|\s+[#(])")
        .expect("event pattern is valid")
});

static ELAPSED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\S*\.\S*) \(").expect("elapsed pattern is valid"));

/// Levels assumed when a raw event carries no `:levels` suffix.
pub const DEFAULT_LEVELS: &str = "ukh";

/// One classified line of a perf dump.
#[derive(Debug, Clone, PartialEq)]
pub enum PerfLine {
    Benchmark(String),
    Event { key: EventKey, count: u64 },
    Elapsed(f64),
    Ignored,
}

/// An event count observed for one benchmark under one condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCount {
    pub condition: String,
    pub bench: String,
    pub event: EventKey,
    pub count: u64,
}

/// An elapsed-time sample (seconds) for one benchmark under one condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElapsedSample {
    pub condition: String,
    pub bench: String,
    pub seconds: f64,
}

/// Everything extracted from one dump file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerfDump {
    pub condition: String,
    pub events: Vec<EventCount>,
    pub elapsed: Vec<ElapsedSample>,
}

pub fn classify(line_no: usize, line: &str) -> Result<PerfLine, ParseError> {
    let line = line.trim();

    if let Some(caps) = BENCH_RE.captures(line) {
        return Ok(PerfLine::Benchmark(caps[1].to_string()));
    }

    if let Some(caps) = EVENT_RE.captures(line) {
        let raw_count = &caps[1];
        let count = raw_count
            .replace(',', "")
            .parse::<u64>()
            .map_err(|_| ParseError::invalid(line_no, "event count", raw_count))?;
        let code = &caps[2];
        let name = event_table::lookup(code).ok_or_else(|| ParseError::UnknownEventCode {
            line: line_no,
            code: code.to_string(),
        })?;
        let levels = caps.get(3).map_or(DEFAULT_LEVELS, |m| m.as_str());
        return Ok(PerfLine::Event {
            key: EventKey::new(name, levels),
            count,
        });
    }

    if let Some(caps) = ELAPSED_RE.captures(line) {
        let raw = &caps[1];
        if raw.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
            let seconds = raw
                .parse::<f64>()
                .map_err(|_| ParseError::invalid(line_no, "elapsed time", raw))?;
            return Ok(PerfLine::Elapsed(seconds));
        }
    }

    Ok(PerfLine::Ignored)
}

/// Parse one dump in a single pass.
pub fn parse_dump(condition: &str, text: &str) -> Result<PerfDump, ParseError> {
    let mut dump = PerfDump {
        condition: condition.to_string(),
        ..PerfDump::default()
    };
    let mut bench: Option<String> = None;

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        match classify(line_no, line)? {
            PerfLine::Benchmark(name) => bench = Some(name),
            PerfLine::Event { key, count } => {
                let bench = bench.as_ref().ok_or(ParseError::MissingContext {
                    line: line_no,
                    what: "event count",
                })?;
                dump.events.push(EventCount {
                    condition: condition.to_string(),
                    bench: bench.clone(),
                    event: key,
                    count,
                });
            }
            PerfLine::Elapsed(seconds) => {
                let bench = bench.as_ref().ok_or(ParseError::MissingContext {
                    line: line_no,
                    what: "elapsed time",
                })?;
                dump.elapsed.push(ElapsedSample {
                    condition: condition.to_string(),
                    bench: bench.clone(),
                    seconds,
                });
            }
            PerfLine::Ignored => {}
        }
    }

    Ok(dump)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP: &str = "\
Performance counter stats:
-> mibench/automotive/qsort-small
   1000000  r08:h
    500000  r08:uk
      1234  r09
 0.0123 (+- 0.20%)
 0.0125 (+- 0.10%)
-> mibench/network/dijkstra-large
      4200  rE7:uk
";

    #[test]
    fn test_classify_lines() {
        assert_eq!(
            classify(1, "-> mibench/automotive/qsort-small").unwrap(),
            PerfLine::Benchmark("qsort-small".to_string())
        );
        assert_eq!(
            classify(2, "  42 r17:h").unwrap(),
            PerfLine::Event {
                key: EventKey::new("dcache_l2_refill", "h"),
                count: 42
            }
        );
        assert_eq!(classify(3, "0.5 (+- 1%)").unwrap(), PerfLine::Elapsed(0.5));
        assert_eq!(classify(4, "some header text").unwrap(), PerfLine::Ignored);
    }

    #[test]
    fn test_parse_dump() {
        let dump = parse_dump("bao", DUMP).unwrap();
        assert_eq!(dump.condition, "bao");
        assert_eq!(dump.events.len(), 4);
        assert_eq!(dump.events[0].bench, "qsort-small");
        assert_eq!(dump.events[0].event, EventKey::new("inst_ret", "h"));
        assert_eq!(dump.events[2].event, EventKey::new("exc_taken", DEFAULT_LEVELS));
        assert_eq!(dump.events[3].bench, "dijkstra-large");
        assert_eq!(dump.events[3].event.name, "stall_ldmiss");

        let times: Vec<_> = dump.elapsed.iter().map(|e| e.seconds).collect();
        assert_eq!(times, vec![0.0123, 0.0125]);
    }

    #[test]
    fn test_prose_lines_are_not_events() {
        assert_eq!(classify(1, "12 read operations completed").unwrap(), PerfLine::Ignored);
        assert_eq!(classify(2, "run 3 r08 reported twice").unwrap(), PerfLine::Ignored);
        assert_eq!(classify(3, "see r08:h 12").unwrap(), PerfLine::Ignored);

        let dump = parse_dump("bao", "-> mibench/a/qsort-small\n12 read operations completed\n")
            .unwrap();
        assert!(dump.events.is_empty());
    }

    #[test]
    fn test_event_line_variants() {
        let inst = |levels: &str| EventKey::new("inst_ret", levels);
        assert_eq!(
            classify(1, "  1,000,000      r08:uk").unwrap(),
            PerfLine::Event {
                key: inst("uk"),
                count: 1_000_000
            }
        );
        assert_eq!(
            classify(2, "   500  r08:h   # 1.2 per insn").unwrap(),
            PerfLine::Event {
                key: inst("h"),
                count: 500
            }
        );
        assert_eq!(
            classify(3, "   7  r08:h  ( 99.98% )").unwrap(),
            PerfLine::Event {
                key: inst("h"),
                count: 7
            }
        );
    }

    #[test]
    fn test_unknown_event_code_fails_the_file() {
        let text = "-> mibench/a/b\n  12 r99:h\n";
        match parse_dump("bao", text) {
            Err(ParseError::UnknownEventCode { line, code }) => {
                assert_eq!(line, 2);
                assert_eq!(code, "r99");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_samples_need_a_benchmark_context() {
        assert!(matches!(
            parse_dump("bao", "  12 r08:h\n"),
            Err(ParseError::MissingContext { line: 1, .. })
        ));
        assert!(matches!(
            parse_dump("bao", "0.25 (+- 1%)\n"),
            Err(ParseError::MissingContext { line: 1, .. })
        ));
    }

    #[test]
    fn test_malformed_numbers_fail_the_file() {
        assert!(matches!(
            parse_dump("bao", "-> a/b/c\n 99999999999999999999999 r08:h\n"),
            Err(ParseError::InvalidNumber { line: 2, field: "event count", .. })
        ));
        assert!(matches!(
            parse_dump("bao", "-> a/b/c\n 0.1.2 (+- 1%)\n"),
            Err(ParseError::InvalidNumber { line: 2, field: "elapsed time", .. })
        ));
    }
}
