//! Raw ARMv8 PMU event codes used in the perf-counter dumps.
//!
//! The table is built once per process and never modified. It must cover
//! every code the target logs use: an unknown code fails the file.

use std::collections::HashMap;
use std::sync::LazyLock;

const EVENT_CODES: &[(&str, &str)] = &[
    ("r08", "inst_ret"),
    ("r02", "itlb_l1_refill"),
    ("r05", "dtlb_l1_refill"),
    ("r14", "icache_l1"),
    ("r01", "icache_l1_refill"),
    ("r04", "dcache_l1"),
    ("r03", "dcache_l1_refill"),
    ("r15", "dcache_l1_wb"),
    ("r16", "dcache_l2"),
    ("r17", "dcache_l2_refill"),
    ("r18", "dcache_l2_wb"),
    ("r13", "mem_access"),
    ("r19", "bus_access"),
    ("r1d", "bus_cyles"),
    ("re7", "stall_ldmiss"),
    ("re8", "stall_wrmiss"),
    ("r09", "exc_taken"),
    ("r86", "exc_irq"),
    ("r87", "exc_fiq"),
];

static TABLE: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| EVENT_CODES.iter().copied().collect());

/// Map a raw code such as `r08` (any hex case) to its event name.
pub fn lookup(code: &str) -> Option<&'static str> {
    TABLE.get(code.to_ascii_lowercase().as_str()).copied()
}

/// Every known event name.
pub fn names() -> impl Iterator<Item = &'static str> {
    EVENT_CODES.iter().map(|(_, name)| *name)
}
