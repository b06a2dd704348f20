//! Directory tree watching for web files live reload
//!
//! This crate provides:
//! - A per-directory file system observer with one worker thread
//! - Recursive subdirectory tracking with include/exclude rules
//! - Path reduction and per-listener quiet periods
//! - Overflow recovery and a periodic sweep of stale registrations

mod classify;
mod debounce;
pub mod error;
pub mod listener;
pub mod observer;
mod platform;
mod reconcile;
pub mod reduce;
mod registry;
pub mod subdirs;
mod worker;

pub use error::{Result, WatchError};
pub use listener::{ChangeBatch, FileSystemListener, PathChangesListener};
pub use observer::{FileSystemObserver, FileSystemWatcher, WatchHandle};
pub use reduce::ChangeSet;
pub use subdirs::SubDirectoriesWatcher;
pub use webfiles_core::{GlobNameMatcher, WatchBackend, WatchSettings, WatcherConfig};
