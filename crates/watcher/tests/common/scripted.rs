//! In-memory observer driven by scripted callbacks
//!
//! Registrations are checked against the real file system like the OS-backed
//! observer does, but events only happen when a test emits them, so cycles
//! are deterministic.

use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use webfiles_watcher::{
    FileSystemListener, FileSystemObserver, GlobNameMatcher, WatchError, WatchHandle,
};

/// One already classified change
#[derive(Debug, Clone)]
pub enum Scripted {
    DirectoryCreated(PathBuf),
    DirectoryModified(PathBuf),
    DirectoryDeleted(PathBuf),
    FileCreated(PathBuf),
    FileModified(PathBuf),
    FileDeleted(PathBuf),
}

impl Scripted {
    fn path(&self) -> &Path {
        match self {
            Scripted::DirectoryCreated(p)
            | Scripted::DirectoryModified(p)
            | Scripted::DirectoryDeleted(p)
            | Scripted::FileCreated(p)
            | Scripted::FileModified(p)
            | Scripted::FileDeleted(p) => p,
        }
    }
}

struct Registration {
    id: u64,
    listener: Arc<dyn FileSystemListener>,
}

pub struct ScriptedObserver {
    matcher: GlobNameMatcher,
    registrations: Mutex<BTreeMap<PathBuf, Registration>>,
    next_id: AtomicU64,
    stopped: AtomicBool,
    shutdowns: AtomicU64,
}

impl ScriptedObserver {
    pub fn new(matcher: GlobNameMatcher) -> Arc<Self> {
        Arc::new(Self {
            matcher,
            registrations: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(0),
            stopped: AtomicBool::new(false),
            shutdowns: AtomicU64::new(0),
        })
    }

    pub fn registered(&self) -> BTreeSet<PathBuf> {
        self.registrations.lock().keys().cloned().collect()
    }

    pub fn shutdown_calls(&self) -> u64 {
        self.shutdowns.load(Ordering::SeqCst)
    }

    /// Run one processing cycle
    ///
    /// Changes are delivered only when the path itself or its parent is
    /// registered, as an OS would only report those.
    pub fn emit(&self, changes: &[Scripted]) {
        if self.stopped.load(Ordering::SeqCst) {
            return;
        }

        let listener = {
            let registrations = self.registrations.lock();
            match registrations.values().next() {
                Some(registration) => registration.listener.clone(),
                None => return,
            }
        };

        listener.file_system_changes_started();
        for change in changes {
            if !self.is_observed(change.path()) {
                continue;
            }
            match change {
                Scripted::DirectoryCreated(p) => listener.directory_created(p),
                Scripted::DirectoryModified(p) => listener.directory_modified(p),
                Scripted::DirectoryDeleted(p) => listener.directory_deleted(p),
                Scripted::FileCreated(p) => listener.file_created(p),
                Scripted::FileModified(p) => listener.file_modified(p),
                Scripted::FileDeleted(p) => listener.file_deleted(p),
            }
        }
        listener.file_system_changes_stopped();
    }

    /// Run a cycle that only reports lost events
    pub fn lose_events(&self) {
        let listener = self
            .registrations
            .lock()
            .values()
            .next()
            .map(|registration| registration.listener.clone());

        if let Some(listener) = listener {
            listener.file_system_changes_started();
            listener.events_lost();
            listener.file_system_changes_stopped();
        }
    }

    fn is_observed(&self, path: &Path) -> bool {
        let registrations = self.registrations.lock();
        registrations.contains_key(path)
            || path
                .parent()
                .map_or(false, |parent| registrations.contains_key(parent))
    }
}

impl FileSystemObserver for ScriptedObserver {
    fn register_directory(
        &self,
        directory: &Path,
        listener: Arc<dyn FileSystemListener>,
    ) -> webfiles_watcher::Result<WatchHandle> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(WatchError::ShutDown);
        }
        if !std::fs::metadata(directory)?.is_dir() {
            return Err(WatchError::NotADirectory(directory.to_path_buf()));
        }

        let mut registrations = self.registrations.lock();
        if registrations.contains_key(directory) {
            return Err(WatchError::AlreadyRegistered(directory.to_path_buf()));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        registrations.insert(directory.to_path_buf(), Registration { id, listener });
        Ok(WatchHandle::new(id, directory.to_path_buf()))
    }

    fn release(&self, handle: WatchHandle) {
        let mut registrations = self.registrations.lock();
        if registrations
            .get(handle.directory())
            .map_or(false, |registration| registration.id == handle.id())
        {
            registrations.remove(handle.directory());
        }
    }

    fn name_matcher(&self) -> &GlobNameMatcher {
        &self.matcher
    }

    fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        self.stopped.store(true, Ordering::SeqCst);
        self.registrations.lock().clear();
    }
}
