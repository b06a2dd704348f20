//! Web files watcher CLI - wfw command

use anyhow::Result;
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use std::path::PathBuf;

mod cmd;
mod util;

use util::PatternArgs;

/// wfw - Watch a web files tree and print coalesced changes
#[derive(Parser)]
#[command(name = "wfw")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log more (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Also write logs to this file
    #[arg(long, global = true, value_name = "FILE")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a directory tree and print every batch of changed paths
    Watch {
        /// Root of the tree to watch
        dir: PathBuf,

        #[command(flatten)]
        patterns: PatternArgs,

        /// Quiet period in milliseconds before a batch is delivered
        #[arg(long, value_name = "MS")]
        quiet_ms: Option<u64>,

        /// Poll the file system instead of using native notifications
        #[arg(long)]
        poll: bool,

        /// Print one JSON object per batch
        #[arg(long)]
        json: bool,

        /// Exit after this many batches
        #[arg(long, value_name = "N")]
        max_batches: Option<usize>,
    },
    /// Show whether paths match as watched files and as watched directories
    Match {
        #[command(flatten)]
        patterns: PatternArgs,

        /// Paths to check (only the last segment is matched)
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Print the effective configuration as TOML
    Config {
        /// Configuration file (TOML)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    // Held until exit so buffered file logs are flushed
    let _log_guard = match util::init_logging(cli.verbose, cli.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            std::process::exit(2);
        }
    };

    let result: Result<()> = match cli.command {
        Commands::Watch { dir, patterns, quiet_ms, poll, json, max_batches } => {
            cmd::watch::run(cmd::watch::WatchOptions {
                dir,
                patterns,
                quiet_ms,
                poll,
                json,
                max_batches,
            })
        }
        Commands::Match { patterns, paths } => cmd::matches::run(&patterns, &paths),
        Commands::Config { config } => cmd::config::run(config.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}
