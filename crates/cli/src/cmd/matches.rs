//! Check paths against the configured name patterns

use crate::util::{self, PatternArgs};
use anyhow::Result;
use owo_colors::OwoColorize;
use std::path::PathBuf;

fn verdict(matched: bool) -> String {
    if matched {
        "yes".green().to_string()
    } else {
        "no".red().to_string()
    }
}

pub fn run(patterns: &PatternArgs, paths: &[PathBuf]) -> Result<()> {
    let matcher = util::effective_config(patterns)?.matcher();

    println!(
        "{} {}",
        "Include files:".dimmed(),
        matcher.included_files().join(", ")
    );
    println!(
        "{} {}\n",
        "Exclude directories:".dimmed(),
        matcher.excluded_directories().join(", ")
    );

    for path in paths {
        println!(
            "{}  file: {}  directory: {}",
            path.display().to_string().cyan(),
            verdict(matcher.matches_file(path)),
            verdict(matcher.matches_directory(path)),
        );
    }

    Ok(())
}
