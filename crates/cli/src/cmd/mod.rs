//! Command implementations

pub mod config;
pub mod matches;
pub mod watch;
