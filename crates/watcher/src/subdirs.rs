//! Recursive watching of one directory tree
//!
//! [`SubDirectoriesWatcher`] keeps every existing, non-excluded directory
//! below its root registered with a [`FileSystemObserver`] and turns the
//! observer's per-entry callbacks into one coalesced batch of changed paths
//! per processing cycle.
//!
//! Registration state lives in a map from directory to [`WatchHandle`] that
//! only two operations mutate: registering a discovered directory (with
//! everything below it) and releasing a deleted one (with everything below
//! it). Discovery always lists the file system afresh, so a registration
//! that went wrong heals on the next create, delete or modify of its parent.

use crate::error::{Result, WatchError};
use crate::listener::{FileSystemListener, PathChangesListener};
use crate::observer::{FileSystemObserver, WatchHandle};
use crate::reduce::ChangeSet;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, trace, warn};
use walkdir::WalkDir;
use webfiles_core::path::reachable_through;
use webfiles_core::GlobNameMatcher;

/// Watches a directory and all its subdirectories, delivering coalesced
/// changed paths to a [`PathChangesListener`]
pub struct SubDirectoriesWatcher {
    tree: Arc<WatchedTree>,
    observer: Arc<dyn FileSystemObserver>,
}

impl SubDirectoriesWatcher {
    /// Register `root` and every non-excluded directory below it
    ///
    /// Fails if the root cannot be canonicalized or registered; nothing is
    /// left registered in that case. Subdirectories that vanish while being
    /// discovered are skipped.
    pub fn new(
        root: impl AsRef<Path>,
        observer: Arc<dyn FileSystemObserver>,
        listener: impl PathChangesListener + 'static,
    ) -> Result<Self> {
        let root = fs::canonicalize(root.as_ref())?;
        if !fs::metadata(&root)?.is_dir() {
            return Err(WatchError::NotADirectory(root));
        }

        let consumer: Box<dyn PathChangesListener> = Box::new(listener);
        let tree = Arc::new_cyclic(|me| WatchedTree {
            root: root.clone(),
            matcher: observer.name_matcher().clone(),
            observer: Arc::downgrade(&observer),
            me: me.clone(),
            stopped: AtomicBool::new(false),
            state: Mutex::new(TreeState {
                handles: BTreeMap::new(),
                changes: ChangeSet::new(root.clone()),
            }),
            consumer: Mutex::new(consumer),
        });

        let registered = {
            // Callbacks for already registered directories wait until
            // discovery is complete
            let mut state = tree.state.lock();
            tree.register_tree(&mut state, observer.as_ref(), &root)?;
            state.handles.len()
        };

        info!(
            "Watching {} ({} directories registered)",
            root.display(),
            registered
        );

        Ok(Self { tree, observer })
    }

    /// Canonical root of the watched tree
    pub fn root(&self) -> &Path {
        &self.tree.root
    }

    /// Snapshot of the currently registered directories, sorted
    pub fn registered_directories(&self) -> Vec<PathBuf> {
        self.tree.state.lock().handles.keys().cloned().collect()
    }

    /// Stop watching and shut the underlying observer down; idempotent
    pub fn shutdown(&self) {
        if self.tree.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        // Not under the tree lock: the observer joins its worker, which may
        // be waiting for that lock
        self.observer.shutdown();
        debug!("Stopped watching {}", self.tree.root.display());
    }
}

impl Drop for SubDirectoriesWatcher {
    fn drop(&mut self) {
        self.tree.stopped.store(true, Ordering::Release);

        let handles = std::mem::take(&mut self.tree.state.lock().handles);
        for (_, handle) in handles {
            self.observer.release(handle);
        }
    }
}

struct TreeState {
    handles: BTreeMap<PathBuf, WatchHandle>,
    changes: ChangeSet,
}

/// The listener half of a [`SubDirectoriesWatcher`], registered for every
/// directory of the tree
struct WatchedTree {
    root: PathBuf,
    matcher: GlobNameMatcher,
    observer: Weak<dyn FileSystemObserver>,
    me: Weak<WatchedTree>,
    stopped: AtomicBool,
    state: Mutex<TreeState>,
    consumer: Mutex<Box<dyn PathChangesListener>>,
}

impl WatchedTree {
    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// True if `path` lies below the root and no directory on the way is excluded
    fn is_reachable(&self, path: &Path) -> bool {
        reachable_through(&self.root, path, |dir| self.matcher.matches_directory(dir))
    }

    fn is_watched_directory(&self, path: &Path) -> bool {
        path == self.root || (self.is_reachable(path) && self.matcher.matches_directory(path))
    }

    fn is_watched_file(&self, path: &Path) -> bool {
        self.is_reachable(path) && self.matcher.matches_file(path)
    }

    fn register(
        &self,
        state: &mut TreeState,
        observer: &dyn FileSystemObserver,
        directory: &Path,
    ) -> Result<()> {
        if state.handles.contains_key(directory) {
            return Ok(());
        }

        let listener: Arc<dyn FileSystemListener> = match self.me.upgrade() {
            Some(tree) => tree as Arc<dyn FileSystemListener>,
            None => return Err(WatchError::ShutDown),
        };

        let handle = observer.register_directory(directory, listener)?;
        state.handles.insert(directory.to_path_buf(), handle);
        Ok(())
    }

    /// Register `directory` and every non-excluded directory below it,
    /// returning how many new registrations were made
    ///
    /// Only a failure to register `directory` itself is returned.
    fn register_tree(
        &self,
        state: &mut TreeState,
        observer: &dyn FileSystemObserver,
        directory: &Path,
    ) -> Result<usize> {
        let before = state.handles.len();
        self.register(state, observer, directory)?;

        let walker = WalkDir::new(directory)
            .min_depth(1)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                entry.file_type().is_dir() && self.matcher.matches_directory(entry.path())
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping unreadable entry below {}: {}", directory.display(), e);
                    continue;
                }
            };

            if let Err(e) = self.register(state, observer, entry.path()) {
                log_registration_failure(entry.path(), &e);
            }
        }

        Ok(state.handles.len() - before)
    }

    /// Release `directory` and every registered directory below it
    fn release_tree(
        &self,
        state: &mut TreeState,
        observer: &dyn FileSystemObserver,
        directory: &Path,
    ) -> usize {
        let doomed: Vec<PathBuf> = state
            .handles
            .range::<Path, _>((Bound::Included(directory), Bound::Unbounded))
            .take_while(|(path, _)| path.starts_with(directory))
            .map(|(path, _)| path.clone())
            .collect();

        for path in &doomed {
            if let Some(handle) = state.handles.remove(path) {
                observer.release(handle);
            }
        }

        if !doomed.is_empty() {
            debug!(
                "Released {} ({} registrations)",
                directory.display(),
                doomed.len()
            );
        }
        doomed.len()
    }

    /// A directory appeared: register it with its content and report it
    fn discover(&self, state: &mut TreeState, observer: &dyn FileSystemObserver, directory: &Path) {
        if let Err(e) = self.register_tree(state, observer, directory) {
            log_registration_failure(directory, &e);
        }
        state.changes.directory_created(directory);
    }

    /// A directory disappeared: release it with its content and report it
    fn forget(&self, state: &mut TreeState, observer: &dyn FileSystemObserver, directory: &Path) {
        self.release_tree(state, observer, directory);
        state.changes.entry_deleted(directory);
    }

    /// Compare the registered children of `directory` against a fresh listing
    fn resync_directory(
        &self,
        state: &mut TreeState,
        observer: &dyn FileSystemObserver,
        directory: &Path,
    ) {
        if !state.handles.contains_key(directory) {
            if is_real_directory(directory) {
                self.discover(state, observer, directory);
            }
            return;
        }

        let vanished: Vec<PathBuf> = state
            .handles
            .range::<Path, _>((Bound::Excluded(directory), Bound::Unbounded))
            .take_while(|(path, _)| path.starts_with(directory))
            .filter(|(path, _)| path.parent() == Some(directory))
            .filter(|(path, _)| !is_real_directory(path))
            .map(|(path, _)| path.clone())
            .collect();
        for child in vanished {
            self.forget(state, observer, &child);
        }

        let entries = match fs::read_dir(directory) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Cannot list {}: {}", directory.display(), e);
                return;
            }
        };

        for entry in entries.flatten() {
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            let path = entry.path();
            if is_dir && self.matcher.matches_directory(&path) && !state.handles.contains_key(&path) {
                self.discover(state, observer, &path);
            }
        }
    }

    /// Rebuild the registration set from a full listing of the tree
    fn resync_all(&self, state: &mut TreeState, observer: &dyn FileSystemObserver) {
        let stale: Vec<PathBuf> = state
            .handles
            .keys()
            .filter(|path| !is_real_directory(path))
            .cloned()
            .collect();
        for directory in &stale {
            self.release_tree(state, observer, directory);
        }

        if is_real_directory(&self.root) {
            if let Err(e) = self.register_tree(state, observer, &self.root) {
                log_registration_failure(&self.root, &e);
            }
        }

        info!(
            "Resynchronized {} ({} stale, {} registered)",
            self.root.display(),
            stale.len(),
            state.handles.len()
        );
        state.changes.whole_tree();
    }

    /// Run `f` with the tree state and a live observer unless stopped
    fn with_state<F>(&self, f: F)
    where
        F: FnOnce(&mut TreeState, &dyn FileSystemObserver),
    {
        if self.is_stopped() {
            return;
        }
        let Some(observer) = self.observer.upgrade() else {
            return;
        };
        let mut state = self.state.lock();
        f(&mut state, observer.as_ref());
    }

    fn deliver(&self) {
        let changed_paths = {
            let mut state = self.state.lock();
            if state.changes.is_empty() {
                return;
            }
            state.changes.take()
        };

        if self.is_stopped() {
            return;
        }

        trace!(
            "Delivering {} changed paths under {}",
            changed_paths.len(),
            self.root.display()
        );

        let mut consumer = self.consumer.lock();
        consumer.on_start();
        consumer.on_paths_changed(&self.root, changed_paths);
        consumer.on_stop();
    }
}

impl FileSystemListener for WatchedTree {
    fn file_system_changes_started(&self) {
        trace!("Changes started under {}", self.root.display());
    }

    fn directory_created(&self, path: &Path) {
        if !self.is_watched_directory(path) {
            trace!("Ignoring excluded directory {}", path.display());
            return;
        }
        self.with_state(|state, observer| self.discover(state, observer, path));
    }

    fn directory_modified(&self, path: &Path) {
        if !self.is_watched_directory(path) {
            return;
        }
        self.with_state(|state, observer| self.resync_directory(state, observer, path));
    }

    fn directory_deleted(&self, path: &Path) {
        if !path.starts_with(&self.root) {
            return;
        }
        self.with_state(|state, observer| {
            // A registered directory is always released, even one that
            // became excluded
            let registered = state.handles.contains_key(path);
            if registered || self.is_watched_directory(path) {
                self.forget(state, observer, path);
            }
        });
    }

    fn file_created(&self, path: &Path) {
        self.file_modified(path);
    }

    fn file_modified(&self, path: &Path) {
        if !self.is_watched_file(path) {
            trace!("Ignoring unwatched file {}", path.display());
            return;
        }
        self.with_state(|state, _| state.changes.file_changed(path));
    }

    fn file_deleted(&self, path: &Path) {
        if !self.is_watched_file(path) {
            return;
        }
        self.with_state(|state, _| state.changes.entry_deleted(path));
    }

    fn events_lost(&self) {
        warn!(
            "Events lost under {}; re-listing the whole tree",
            self.root.display()
        );
        self.with_state(|state, observer| self.resync_all(state, observer));
    }

    fn file_system_changes_stopped(&self) {
        self.deliver();
    }
}

fn is_real_directory(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|metadata| metadata.is_dir())
        .unwrap_or(false)
}

fn log_registration_failure(directory: &Path, error: &WatchError) {
    match error {
        // Deleted again before it could be registered; its removal is reported separately
        WatchError::Io(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("{} vanished before registration", directory.display())
        }
        WatchError::AlreadyRegistered(_) => warn!(
            "{} is already watched through another listener; its changes are not reported here",
            directory.display()
        ),
        WatchError::NotADirectory(_) | WatchError::ShutDown => {
            debug!("Not registering {}: {}", directory.display(), error)
        }
        _ => warn!("Failed to register {}: {}", directory.display(), error),
    }
}
