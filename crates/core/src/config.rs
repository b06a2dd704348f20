//! Watcher configuration
//!
//! Loaded from TOML; every key is optional:
//! ```toml
//! include_files = ["*.css", "*.js"]
//! exclude_directories = [".git", "node_modules"]
//! quiet_period_ms = 500
//! backend = "native"        # or "poll"
//! poll_interval_ms = 1000
//! reconcile_interval_ms = 30000
//! queue_capacity = 4096
//! ```

use crate::glob::GlobNameMatcher;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),
}

/// Which notification mechanism feeds the observer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchBackend {
    /// OS notifications (inotify, FSEvents, ReadDirectoryChangesW)
    #[default]
    Native,
    /// Periodic directory scans, for mounts without reliable notifications
    Poll,
}

/// Watcher configuration as written in a config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Glob patterns for file names to watch
    pub include_files: Vec<String>,

    /// Glob patterns for directory names to skip
    pub exclude_directories: Vec<String>,

    /// Quiet period after the last raw event before a batch is delivered
    pub quiet_period_ms: u64,

    /// Notification backend
    pub backend: WatchBackend,

    /// Scan interval of the poll backend
    pub poll_interval_ms: u64,

    /// Interval of the stale registration sweep
    pub reconcile_interval_ms: u64,

    /// Capacity of the raw event queue between the OS callback and the worker
    pub queue_capacity: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            include_files: default_include_files(),
            exclude_directories: default_exclude_directories(),
            quiet_period_ms: 500,
            backend: WatchBackend::Native,
            poll_interval_ms: 1000,
            reconcile_interval_ms: 30_000,
            queue_capacity: 4096,
        }
    }
}

impl WatcherConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Render configuration as TOML text
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Build the name matcher for the configured patterns
    pub fn matcher(&self) -> GlobNameMatcher {
        let mut matcher = GlobNameMatcher::new();
        matcher
            .include_files(&self.include_files)
            .exclude_directories(&self.exclude_directories);
        matcher
    }

    /// Runtime settings for the observer
    pub fn settings(&self) -> WatchSettings {
        WatchSettings {
            quiet_period: Duration::from_millis(self.quiet_period_ms),
            backend: self.backend,
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            reconcile_interval: Duration::from_millis(self.reconcile_interval_ms.max(1)),
            queue_capacity: self.queue_capacity.max(1),
        }
    }
}

/// Observer runtime settings derived from [`WatcherConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchSettings {
    pub quiet_period: Duration,
    pub backend: WatchBackend,
    pub poll_interval: Duration,
    pub reconcile_interval: Duration,
    pub queue_capacity: usize,
}

impl Default for WatchSettings {
    fn default() -> Self {
        WatcherConfig::default().settings()
    }
}

impl WatchSettings {
    /// Override the quiet period
    pub fn with_quiet_period(mut self, quiet_period: Duration) -> Self {
        self.quiet_period = quiet_period;
        self
    }

    /// Override the backend
    pub fn with_backend(mut self, backend: WatchBackend) -> Self {
        self.backend = backend;
        self
    }

    /// Override the poll interval
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Override the stale registration sweep interval
    pub fn with_reconcile_interval(mut self, reconcile_interval: Duration) -> Self {
        self.reconcile_interval = reconcile_interval;
        self
    }

    /// Override the raw event queue capacity
    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity.max(1);
        self
    }
}

fn default_include_files() -> Vec<String> {
    [
        "*.css", "*.js", "*.json", "*.ftl", "*.html", "*.htm", "*.svg", "*.png", "*.jpg",
        "*.jpeg", "*.gif", "*.ico", "*.woff", "*.woff2", "*.ttf", "*.eot", "*.otf", "*.map",
        "*.txt", "*.xml",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_exclude_directories() -> Vec<String> {
    [".git", ".svn", ".hg", ".idea", "node_modules", "target"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
