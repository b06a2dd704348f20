//! The observer's worker thread
//!
//! Single consumer of the raw event queue and single caller of listener
//! callbacks. Each loop iteration waits for the next raw event, the next
//! quiet-period deadline or the next stale registration sweep, whichever
//! comes first.

use crate::classify::{self, Classified, RawChange};
use crate::debounce::{PendingCycle, QuietPeriods};
use crate::listener::FileSystemListener;
use crate::observer::Shared;
use crate::platform::RawEvent;
use crate::reconcile::Reconciler;
use crate::registry::ListenerKey;
use crossbeam_channel::{select, Receiver};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, trace, warn};
use webfiles_core::WatchSettings;

enum Step {
    Event(RawEvent),
    Tick,
    Stop,
}

pub(crate) struct Worker {
    pub(crate) shared: Arc<Shared>,
    events: Receiver<RawEvent>,
    shutdown: Receiver<()>,
    pending: QuietPeriods<ListenerKey>,
    pub(crate) reconciler: Reconciler,
}

impl Worker {
    pub(crate) fn new(
        shared: Arc<Shared>,
        settings: &WatchSettings,
        events: Receiver<RawEvent>,
        shutdown: Receiver<()>,
    ) -> Self {
        Self {
            shared,
            events,
            shutdown,
            pending: QuietPeriods::new(settings.quiet_period),
            reconciler: Reconciler::new(settings.reconcile_interval, Instant::now()),
        }
    }

    pub(crate) fn run(mut self) {
        info!("Watcher thread started");

        while !self.shared.is_stopped() {
            let now = Instant::now();
            let wake_at = match self.pending.next_deadline() {
                Some(deadline) => deadline.min(self.reconciler.next_run()),
                None => self.reconciler.next_run(),
            };
            let timeout = wake_at.saturating_duration_since(now);

            let step = select! {
                recv(self.shutdown) -> _ => Step::Stop,
                recv(self.events) -> event => match event {
                    Ok(event) => Step::Event(event),
                    Err(_) => Step::Stop,
                },
                default(timeout) => Step::Tick,
            };

            match step {
                Step::Stop => break,
                Step::Event(event) => self.accept(event),
                Step::Tick => {}
            }

            if self.shared.overflowed.swap(false, Ordering::AcqRel) {
                warn!("Raw event queue overflowed; listeners will re-list their directories");
                self.mark_all_lost();
            }

            self.dispatch_due(Instant::now());

            if self.reconciler.is_due(Instant::now()) {
                self.reconcile();
            }
        }

        info!("Watcher thread stopped");
    }

    fn accept(&mut self, event: RawEvent) {
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                warn!("Watch error: {}", e);
                return;
            }
        };

        let now = Instant::now();
        if event.need_rescan() {
            warn!("Backend requested a rescan; listeners will re-list their directories");
            self.mark_all_lost();
        }

        let registry = self.shared.registry.lock();
        for change in classify::raw_changes(&event) {
            match registry.owner_of(&change.path) {
                Some(key) => self.pending.push(key, change, now),
                None => trace!(
                    "Ignoring event outside registered directories: {}",
                    change.path.display()
                ),
            }
        }
    }

    fn mark_all_lost(&mut self) {
        let now = Instant::now();
        let keys = self.shared.registry.lock().listener_keys();
        for key in keys {
            self.pending.mark_lost(key, now);
        }
    }

    fn dispatch_due(&mut self, now: Instant) {
        for (key, cycle) in self.pending.take_due(now) {
            if self.shared.is_stopped() {
                return;
            }

            let listener = self.shared.registry.lock().listener(key);
            match listener {
                Some(listener) => self.dispatch(listener.as_ref(), cycle),
                None => trace!("Dropping changes for a released listener"),
            }
        }
    }

    /// Run one processing cycle for one listener
    fn dispatch(&self, listener: &dyn FileSystemListener, cycle: PendingCycle) {
        let started = Instant::now();
        listener.file_system_changes_started();

        if cycle.events_lost && !self.shared.is_stopped() {
            listener.events_lost();
        }

        for change in &cycle.changes {
            if self.shared.is_stopped() {
                return;
            }
            self.deliver(listener, change);
        }

        if self.shared.is_stopped() {
            return;
        }
        listener.file_system_changes_stopped();

        let elapsed = started.elapsed();
        if elapsed > Duration::from_secs(1) {
            warn!(
                "Listener took {:?} to process {} changes",
                elapsed,
                cycle.changes.len()
            );
        }
    }

    fn deliver(&self, listener: &dyn FileSystemListener, change: &RawChange) {
        let registered = self.shared.registry.lock().is_registered(&change.path);

        let classified = match classify::classify(change, registered, &self.shared.matcher) {
            Ok(Some(classified)) => classified,
            Ok(None) => {
                trace!("Skipping {:?} {}", change.kind, change.path.display());
                return;
            }
            Err(e) => {
                warn!(
                    "Failed to classify {:?} {}: {}",
                    change.kind,
                    change.path.display(),
                    e
                );
                return;
            }
        };

        let path = change.path.as_path();
        match classified {
            Classified::DirectoryCreated => listener.directory_created(path),
            Classified::DirectoryModified => listener.directory_modified(path),
            Classified::DirectoryDeleted => listener.directory_deleted(path),
            Classified::FileCreated => listener.file_created(path),
            Classified::FileModified => listener.file_modified(path),
            Classified::FileDeleted => listener.file_deleted(path),
        }
    }
}
