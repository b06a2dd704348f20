//! Shared building blocks for the web files watcher
//!
//! - Glob name matching for included files and excluded directories
//! - Configuration loading
//! - Path helpers used by change reduction

pub mod config;
pub mod glob;
pub mod path;

pub use config::{ConfigError, WatchBackend, WatchSettings, WatcherConfig};
pub use glob::GlobNameMatcher;
