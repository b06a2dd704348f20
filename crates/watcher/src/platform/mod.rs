//! Notification backends
//!
//! Both backends feed the same bounded queue. The OS callback never blocks:
//! when the queue is full the event is dropped and the overflow flag set, so
//! the worker can ask listeners to re-list what they watch.

use crate::error::Result;
use crossbeam_channel::{Sender, TrySendError};
use notify::{Config, PollWatcher, RecommendedWatcher, Watcher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use webfiles_core::{WatchBackend, WatchSettings};

/// Raw result as produced by `notify`
pub(crate) type RawEvent = notify::Result<notify::Event>;

/// Type-erased notification backend
pub(crate) type Backend = Box<dyn Watcher + Send>;

pub(crate) fn create_backend(
    settings: &WatchSettings,
    events: Sender<RawEvent>,
    overflowed: Arc<AtomicBool>,
) -> Result<Backend> {
    let handler = move |event: RawEvent| {
        if let Err(TrySendError::Full(_)) = events.try_send(event) {
            overflowed.store(true, Ordering::Release);
        }
    };

    let backend: Backend = match settings.backend {
        WatchBackend::Native => Box::new(RecommendedWatcher::new(handler, Config::default())?),
        WatchBackend::Poll => Box::new(PollWatcher::new(
            handler,
            Config::default().with_poll_interval(settings.poll_interval),
        )?),
    };

    Ok(backend)
}
