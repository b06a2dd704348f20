//! Shared CLI helpers: configuration loading and logging setup

use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use webfiles_core::WatcherConfig;

/// Pattern options shared by commands that build a matcher
#[derive(Args, Debug, Clone, Default)]
pub struct PatternArgs {
    /// Configuration file (TOML)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Include-file pattern; replaces the configured list (repeatable)
    #[arg(long = "include", value_name = "GLOB")]
    pub include: Vec<String>,

    /// Exclude-directory pattern; replaces the configured list (repeatable)
    #[arg(long = "exclude", value_name = "GLOB")]
    pub exclude: Vec<String>,
}

/// Load the configuration file, or the defaults when none is given
pub fn load_config(path: Option<&Path>) -> Result<WatcherConfig> {
    match path {
        Some(path) => WatcherConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(WatcherConfig::default()),
    }
}

/// Configuration with command-line patterns applied
pub fn effective_config(patterns: &PatternArgs) -> Result<WatcherConfig> {
    let mut config = load_config(patterns.config.as_deref())?;

    if !patterns.include.is_empty() {
        config.include_files = patterns.include.clone();
    }
    if !patterns.exclude.is_empty() {
        config.exclude_directories = patterns.exclude.clone();
    }

    Ok(config)
}

fn default_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber: stderr always, a log file when requested
///
/// The returned guard must be kept alive for file logs to be flushed.
pub fn init_logging(verbose: u8, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let Some(log_file) = log_file else {
        tracing_subscriber::registry()
            .with(filter)
            .with(console_layer)
            .init();
        return Ok(None);
    };

    let file_name = log_file
        .file_name()
        .with_context(|| format!("Invalid log file path: {}", log_file.display()))?;
    let directory = match log_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(directory)
        .with_context(|| format!("Failed to create log directory {}", directory.display()))?;

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(
        directory, file_name,
    ));

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false) // No color codes in file
        .with_thread_ids(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    tracing::info!("Logging to {}", log_file.display());
    Ok(Some(guard))
}
