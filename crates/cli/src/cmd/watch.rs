//! Watch a directory tree and print change batches

use crate::util::{self, PatternArgs};
use anyhow::{Context, Result};
use chrono::Local;
use owo_colors::OwoColorize;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use webfiles_core::WatchBackend;
use webfiles_watcher::{ChangeBatch, FileSystemObserver, FileSystemWatcher, SubDirectoriesWatcher};

pub struct WatchOptions {
    pub dir: PathBuf,
    pub patterns: PatternArgs,
    pub quiet_ms: Option<u64>,
    pub poll: bool,
    pub json: bool,
    pub max_batches: Option<usize>,
}

/// One line of `--json` output
#[derive(Serialize)]
struct BatchLine<'a> {
    timestamp: String,
    #[serde(flatten)]
    batch: &'a ChangeBatch,
}

pub fn run(options: WatchOptions) -> Result<()> {
    let mut config = util::effective_config(&options.patterns)?;
    if let Some(quiet_ms) = options.quiet_ms {
        config.quiet_period_ms = quiet_ms;
    }
    if options.poll {
        config.backend = WatchBackend::Poll;
    }

    let observer: Arc<dyn FileSystemObserver> = Arc::new(
        FileSystemWatcher::from_config(&config).context("Failed to start file system watcher")?,
    );

    let (tx, rx) = crossbeam_channel::unbounded::<ChangeBatch>();
    let watcher = SubDirectoriesWatcher::new(&options.dir, observer, tx)
        .with_context(|| format!("Failed to watch {}", options.dir.display()))?;

    eprintln!(
        "{} {} ({} directories, quiet period {}ms)",
        "Watching".green().bold(),
        watcher.root().display(),
        watcher.registered_directories().len(),
        config.quiet_period_ms
    );

    let stdout = std::io::stdout();
    let mut delivered = 0usize;

    for batch in rx.iter() {
        let mut out = stdout.lock();
        if options.json {
            print_json(&mut out, &batch)?;
        } else {
            print_human(&mut out, &batch)?;
        }
        out.flush()?;

        delivered += 1;
        if options.max_batches.map_or(false, |max| delivered >= max) {
            info!("Delivered {} batches, exiting", delivered);
            break;
        }
    }

    watcher.shutdown();
    Ok(())
}

fn print_json(out: &mut impl Write, batch: &ChangeBatch) -> Result<()> {
    let line = BatchLine {
        timestamp: Local::now().to_rfc3339(),
        batch,
    };
    serde_json::to_writer(&mut *out, &line)?;
    writeln!(out)?;
    Ok(())
}

fn print_human(out: &mut impl Write, batch: &ChangeBatch) -> Result<()> {
    writeln!(
        out,
        "{} {} changed",
        Local::now().format("%H:%M:%S").dimmed(),
        batch.paths.len().bold()
    )?;

    for (absolute, relative) in batch.paths.iter().zip(batch.relative_paths()) {
        if absolute.is_dir() {
            writeln!(out, "  {}/", relative.display().to_string().blue())?;
        } else {
            writeln!(out, "  {}", relative.display().to_string().cyan())?;
        }
    }
    Ok(())
}
