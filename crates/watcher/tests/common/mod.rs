//! Common utilities for watcher integration tests

pub mod fixtures;
pub mod scripted;

// Re-export commonly used items
#[allow(unused_imports)]
pub use fixtures::{expected_directories, web_matcher, BatchLog, SiteFixture};
#[allow(unused_imports)]
pub use scripted::{Scripted, ScriptedObserver};
