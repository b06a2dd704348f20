//! Periodic sweep of stale registrations
//!
//! A directory can disappear without its removal ever being classified
//! (dropped events, a rename out of the watched tree on a backend that
//! reports only one side). The sweep finds registered directories that no
//! longer exist, tells the owning listener they were deleted, and releases
//! whatever registrations the listener left behind.

use crate::registry::ListenerKey;
use crate::worker::Worker;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// Schedule of the stale registration sweep
pub(crate) struct Reconciler {
    interval: Duration,
    next_run: Instant,
}

impl Reconciler {
    pub(crate) fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            next_run: now + interval,
        }
    }

    pub(crate) fn next_run(&self) -> Instant {
        self.next_run
    }

    /// True once per interval; schedules the following run
    pub(crate) fn is_due(&mut self, now: Instant) -> bool {
        if now < self.next_run {
            return false;
        }
        self.next_run = now + self.interval;
        true
    }
}

/// Group stale directories by owning listener, keeping parents first
pub(crate) fn group_by_listener(
    stale: Vec<(ListenerKey, PathBuf)>,
) -> BTreeMap<ListenerKey, Vec<PathBuf>> {
    let mut grouped: BTreeMap<ListenerKey, Vec<PathBuf>> = BTreeMap::new();
    for (key, path) in stale {
        grouped.entry(key).or_default().push(path);
    }
    grouped
}

impl Worker {
    pub(crate) fn reconcile(&mut self) {
        let stale = self.shared.registry.lock().stale_directories();
        if stale.is_empty() {
            trace!("Reconciliation: no stale registrations");
            return;
        }

        info!("Reconciliation found {} stale registrations", stale.len());

        for (key, directories) in group_by_listener(stale) {
            if self.shared.is_stopped() {
                return;
            }

            let Some(listener) = self.shared.registry.lock().listener(key) else {
                continue;
            };

            listener.file_system_changes_started();
            for directory in &directories {
                if self.shared.is_stopped() {
                    return;
                }
                // An earlier deletion in this cycle may have released it already
                if self.shared.registry.lock().is_registered(directory) {
                    listener.directory_deleted(directory);
                }
            }
            if self.shared.is_stopped() {
                return;
            }
            listener.file_system_changes_stopped();
        }

        let leftovers = self.shared.registry.lock().stale_directories();
        for (_, directory) in leftovers {
            debug!("Force releasing stale registration {}", directory.display());
            self.shared.release_directory(&directory, None);
        }
    }
}
