//! Registered directories and the listeners that own them

use crate::listener::FileSystemListener;
use crate::observer::WatchHandle;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Identity of a registered listener (address of its allocation)
pub(crate) type ListenerKey = usize;

pub(crate) fn listener_key(listener: &Arc<dyn FileSystemListener>) -> ListenerKey {
    Arc::as_ptr(listener) as *const () as usize
}

struct Registration {
    id: u64,
    listener: ListenerKey,
}

struct ListenerEntry {
    listener: Arc<dyn FileSystemListener>,
    directories: usize,
}

/// Directory -> owning listener table of one observer
#[derive(Default)]
pub(crate) struct Registry {
    next_id: u64,
    directories: HashMap<PathBuf, Registration>,
    listeners: HashMap<ListenerKey, ListenerEntry>,
}

impl Registry {
    pub(crate) fn insert(
        &mut self,
        directory: PathBuf,
        listener: Arc<dyn FileSystemListener>,
    ) -> WatchHandle {
        self.next_id += 1;
        let id = self.next_id;
        let key = listener_key(&listener);

        self.listeners
            .entry(key)
            .or_insert_with(|| ListenerEntry {
                listener,
                directories: 0,
            })
            .directories += 1;

        self.directories.insert(
            directory.clone(),
            Registration { id, listener: key },
        );

        WatchHandle::new(id, directory)
    }

    /// Remove the registration of `directory`; with `Some(id)` only if that
    /// registration is still the current one
    pub(crate) fn remove(&mut self, directory: &Path, id: Option<u64>) -> bool {
        match self.directories.get(directory) {
            Some(registration) if id.map_or(true, |id| id == registration.id) => {}
            _ => return false,
        }

        if let Some(registration) = self.directories.remove(directory) {
            if let Some(entry) = self.listeners.get_mut(&registration.listener) {
                entry.directories -= 1;
                if entry.directories == 0 {
                    self.listeners.remove(&registration.listener);
                }
            }
        }
        true
    }

    pub(crate) fn is_registered(&self, directory: &Path) -> bool {
        self.directories.contains_key(directory)
    }

    /// Listener responsible for events on `path`: the registration of the
    /// path itself, otherwise the one of its parent directory
    pub(crate) fn owner_of(&self, path: &Path) -> Option<ListenerKey> {
        self.directories
            .get(path)
            .or_else(|| path.parent().and_then(|parent| self.directories.get(parent)))
            .map(|registration| registration.listener)
    }

    pub(crate) fn listener(&self, key: ListenerKey) -> Option<Arc<dyn FileSystemListener>> {
        self.listeners.get(&key).map(|entry| entry.listener.clone())
    }

    pub(crate) fn listener_keys(&self) -> Vec<ListenerKey> {
        self.listeners.keys().copied().collect()
    }

    /// Registered directories that no longer exist, parents first
    pub(crate) fn stale_directories(&self) -> Vec<(ListenerKey, PathBuf)> {
        let mut stale: Vec<(ListenerKey, PathBuf)> = self
            .directories
            .iter()
            .filter(|(path, _)| !path.is_dir())
            .map(|(path, registration)| (registration.listener, path.clone()))
            .collect();
        stale.sort_by(|a, b| a.1.cmp(&b.1));
        stale
    }

    pub(crate) fn len(&self) -> usize {
        self.directories.len()
    }

    /// Drop every registration, returning how many there were
    pub(crate) fn clear(&mut self) -> usize {
        let count = self.directories.len();
        self.directories.clear();
        self.listeners.clear();
        count
    }
}
