use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use hypstat::{
    pipeline, write_csv_files, write_json, Cli, Config, Reporter, Tables, TerminalReporter,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    // Load config and apply CLI overrides
    let mut config = Config::load_from(cli.config.as_deref())?;
    cli.apply_to_config(&mut config);
    config.validate().context("Invalid configuration")?;
    debug!(?config, "configuration");

    let grammar = cli.command.grammar();
    let args = cli.command.args();
    let tables = pipeline::run(grammar, args, &config)
        .with_context(|| format!("{grammar} analysis failed"))?;

    let reporter = if args.no_color {
        TerminalReporter::without_colors()
    } else {
        TerminalReporter::new()
    };
    reporter.report(&tables)?;

    if let Some(path) = &args.csv {
        let written = write_csv_files(&tables, path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        for path in written {
            info!(path = %path.display(), "results written");
        }
    }
    if let Some(path) = &args.json {
        export(path, &tables, |tables, writer| write_json(tables, writer))?;
    }

    Ok(())
}

fn export<F, E>(path: &Path, tables: &Tables, write: F) -> Result<()>
where
    F: FnOnce(&Tables, &mut BufWriter<File>) -> Result<(), E>,
    E: std::error::Error + Send + Sync + 'static,
{
    let file = File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    write(tables, &mut writer).with_context(|| format!("Failed to write {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), "results written");
    Ok(())
}
