//! Error types for directory registration and watching

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for watcher operations
pub type Result<T> = std::result::Result<T, WatchError>;

/// Errors surfaced synchronously by observers and watchers
#[derive(Error, Debug)]
pub enum WatchError {
    /// The path exists but is not a directory
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// The directory is already registered with this observer
    #[error("directory already registered: {}", .0.display())]
    AlreadyRegistered(PathBuf),

    /// The observer has been shut down
    #[error("observer is shut down")]
    ShutDown,

    /// The worker thread could not be started
    #[error("failed to start watcher thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// Notification backend error
    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
