//! Listener interfaces between observers, watchers and consumers

use crossbeam_channel::Sender;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Receives classified changes for the directories it registered
///
/// All callbacks of one observer run sequentially on its worker thread.
/// Every processing cycle is bracketed by
/// [`file_system_changes_started`](Self::file_system_changes_started) and
/// [`file_system_changes_stopped`](Self::file_system_changes_stopped).
/// Implementations must return quickly: the same thread classifies the
/// next events.
pub trait FileSystemListener: Send + Sync {
    fn file_system_changes_started(&self);

    fn directory_created(&self, path: &Path);

    fn directory_modified(&self, path: &Path);

    fn directory_deleted(&self, path: &Path);

    fn file_created(&self, path: &Path);

    fn file_modified(&self, path: &Path);

    fn file_deleted(&self, path: &Path);

    /// Raw events were dropped before classification (queue overflow or an
    /// OS-side rescan request); anything below the registered directories
    /// may have changed.
    fn events_lost(&self) {}

    fn file_system_changes_stopped(&self);
}

/// Consumer of coalesced change batches
pub trait PathChangesListener: Send {
    /// Called before a batch is delivered
    fn on_start(&mut self) {}

    /// Everything that changed under `root` during one quiet period
    fn on_paths_changed(&mut self, root: &Path, changed_paths: BTreeSet<PathBuf>);

    /// Called after a batch is delivered
    fn on_stop(&mut self) {}
}

/// One delivered set of changed paths
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeBatch {
    pub root: PathBuf,
    pub paths: BTreeSet<PathBuf>,
}

impl ChangeBatch {
    /// Changed paths relative to the root, for display
    pub fn relative_paths(&self) -> Vec<PathBuf> {
        self.paths
            .iter()
            .map(|p| match p.strip_prefix(&self.root) {
                Ok(rel) if rel.as_os_str().is_empty() => PathBuf::from("."),
                Ok(rel) => rel.to_path_buf(),
                Err(_) => p.clone(),
            })
            .collect()
    }
}

impl PathChangesListener for Sender<ChangeBatch> {
    fn on_paths_changed(&mut self, root: &Path, changed_paths: BTreeSet<PathBuf>) {
        let batch = ChangeBatch {
            root: root.to_path_buf(),
            paths: changed_paths,
        };

        if self.send(batch).is_err() {
            debug!("Change batch receiver dropped for {}", root.display());
        }
    }
}
