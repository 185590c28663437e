//! hypstat: statistically sound comparison of workloads run natively and
//! under a hypervisor.
//!
//! Groups of log files are parsed with one of the supported grammars,
//! normalized onto a shared progress index and compared against a baseline
//! group. The resulting [`Tables`] are rendered to the terminal, CSV or JSON.

pub mod cli;
pub mod config;
pub mod pipeline;
pub mod source;

// Re-export core types for convenience
pub use hypstat_core::report::{
    write_csv, write_csv_files, write_json, ReportError, Reporter, Tables, TerminalReporter,
};
pub use hypstat_core::stats::{AlignPolicy, StatisticalTest, WelchTTest};
pub use hypstat_core::Grammar;

// Re-export main types from this crate
pub use cli::{Cli, Command, GroupArgs};
pub use config::Config;
pub use pipeline::{run, Loaded, PipelineError};
pub use source::{discover, GroupSpec, SourceError};
