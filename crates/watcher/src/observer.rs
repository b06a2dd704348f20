//! File system observer: per-directory registration and event delivery
//!
//! [`FileSystemObserver`] is the seam between OS notifications and the
//! listeners that make sense of them. [`FileSystemWatcher`] is the OS-backed
//! implementation: one `notify` backend, one bounded raw-event queue and one
//! worker thread that classifies events and calls listeners in order.

use crate::error::{Result, WatchError};
use crate::listener::FileSystemListener;
use crate::platform::{self, Backend};
use crate::registry::Registry;
use crate::worker::Worker;
use notify::RecursiveMode;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};
use webfiles_core::{GlobNameMatcher, WatchSettings, WatcherConfig};

/// Registers single directories for change notification
pub trait FileSystemObserver: Send + Sync {
    /// Start observing exactly `directory` (not its subdirectories)
    ///
    /// Fails with an I/O error if the directory does not exist, and with
    /// [`WatchError::NotADirectory`] if it is something else.
    ///
    /// A directory has at most one listener. Registering it again, even for
    /// a different listener, fails with [`WatchError::AlreadyRegistered`],
    /// so trees sharing one observer must not overlap.
    fn register_directory(
        &self,
        directory: &Path,
        listener: Arc<dyn FileSystemListener>,
    ) -> Result<WatchHandle>;

    /// Stop observing the directory behind `handle`
    fn release(&self, handle: WatchHandle);

    /// Patterns deciding which files and directories are observed
    fn name_matcher(&self) -> &GlobNameMatcher;

    /// Stop delivering events; idempotent
    ///
    /// Once this returns no listener callback runs again.
    fn shutdown(&self);
}

/// Proof of one directory registration
#[derive(Debug, PartialEq, Eq)]
pub struct WatchHandle {
    id: u64,
    directory: PathBuf,
}

impl WatchHandle {
    pub fn new(id: u64, directory: PathBuf) -> Self {
        Self { id, directory }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

/// State shared between the public handle and the worker thread
pub(crate) struct Shared {
    pub(crate) matcher: GlobNameMatcher,
    pub(crate) registry: Mutex<Registry>,
    pub(crate) backend: Mutex<Option<Backend>>,
    pub(crate) stopped: AtomicBool,
    pub(crate) overflowed: Arc<AtomicBool>,
}

impl Shared {
    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Drop the registration for `directory` if `id` still owns it
    /// (any id when `None`) and stop the OS watch
    pub(crate) fn release_directory(&self, directory: &Path, id: Option<u64>) {
        let removed = self.registry.lock().remove(directory, id);
        if !removed {
            return;
        }

        if let Some(backend) = self.backend.lock().as_mut() {
            // The OS drops watches of deleted directories on its own
            if let Err(e) = backend.unwatch(directory) {
                debug!("Unwatch {} failed: {}", directory.display(), e);
            }
        }
        debug!("Released {}", directory.display());
    }
}

/// OS-backed [`FileSystemObserver`] with a dedicated worker thread
pub struct FileSystemWatcher {
    shared: Arc<Shared>,
    shutdown_tx: crossbeam_channel::Sender<()>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl FileSystemWatcher {
    /// Create an observer and start its worker thread
    pub fn new(matcher: GlobNameMatcher, settings: WatchSettings) -> Result<Self> {
        let (event_tx, event_rx) = crossbeam_channel::bounded(settings.queue_capacity);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
        let overflowed = Arc::new(AtomicBool::new(false));

        let backend = platform::create_backend(&settings, event_tx, overflowed.clone())?;

        let shared = Arc::new(Shared {
            matcher,
            registry: Mutex::new(Registry::default()),
            backend: Mutex::new(Some(backend)),
            stopped: AtomicBool::new(false),
            overflowed,
        });

        let worker = Worker::new(shared.clone(), &settings, event_rx, shutdown_rx);
        let handle = thread::Builder::new()
            .name("webfiles-watcher".to_string())
            .spawn(move || worker.run())
            .map_err(WatchError::Spawn)?;

        info!(
            "File system watcher started ({:?} backend, quiet period {:?})",
            settings.backend, settings.quiet_period
        );

        Ok(Self {
            shared,
            shutdown_tx,
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Create an observer from a loaded configuration
    pub fn from_config(config: &WatcherConfig) -> Result<Self> {
        Self::new(config.matcher(), config.settings())
    }

    /// Number of currently registered directories
    pub fn registered_count(&self) -> usize {
        self.shared.registry.lock().len()
    }

    /// True if `directory` is currently registered
    pub fn is_registered(&self, directory: &Path) -> bool {
        self.shared.registry.lock().is_registered(directory)
    }
}

impl FileSystemObserver for FileSystemWatcher {
    fn register_directory(
        &self,
        directory: &Path,
        listener: Arc<dyn FileSystemListener>,
    ) -> Result<WatchHandle> {
        if self.shared.is_stopped() {
            return Err(WatchError::ShutDown);
        }

        let metadata = std::fs::metadata(directory)?;
        if !metadata.is_dir() {
            return Err(WatchError::NotADirectory(directory.to_path_buf()));
        }

        // Held across the OS call so the worker cannot see events for a
        // directory it does not know the owner of yet
        let mut registry = self.shared.registry.lock();
        if registry.is_registered(directory) {
            return Err(WatchError::AlreadyRegistered(directory.to_path_buf()));
        }

        {
            let mut backend = self.shared.backend.lock();
            let backend = backend.as_mut().ok_or(WatchError::ShutDown)?;
            backend.watch(directory, RecursiveMode::NonRecursive)?;
        }

        let handle = registry.insert(directory.to_path_buf(), listener);
        debug!("Registered {}", directory.display());
        Ok(handle)
    }

    fn release(&self, handle: WatchHandle) {
        self.shared
            .release_directory(handle.directory(), Some(handle.id()));
    }

    fn name_matcher(&self) -> &GlobNameMatcher {
        &self.shared.matcher
    }

    fn shutdown(&self) {
        if self.shared.stopped.swap(true, Ordering::AcqRel) {
            return;
        }

        // No OS events are produced once the backend is gone
        self.shared.backend.lock().take();
        let _ = self.shutdown_tx.try_send(());

        if let Some(handle) = self.worker.lock().take() {
            if handle.thread().id() == thread::current().id() {
                // Called from a listener callback; the worker checks the
                // stopped flag before every further callback and exits.
                debug!("Shutdown requested from the watcher thread");
            } else if handle.join().is_err() {
                error!("File system watcher thread panicked");
            }
        }

        let released = self.shared.registry.lock().clear();
        info!(
            "File system watcher stopped ({} registrations released)",
            released
        );
    }
}

impl Drop for FileSystemWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}
