//! Path reduction: from classified changes to the paths a consumer re-reads
//!
//! | Change | Reported path |
//! |--------|---------------|
//! | file created / modified | the file |
//! | file deleted | nearest existing ancestor directory |
//! | directory created | the directory |
//! | directory deleted | nearest existing ancestor directory |
//!
//! A move is a deletion plus a creation; both halves are reduced on their
//! own. When the batch is taken, paths that vanished in the meantime are
//! replaced by their nearest existing ancestor and paths covered by an
//! ancestor in the same batch are dropped.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use webfiles_core::path::{nearest_existing, prune_descendants};

type ExistsProbe = Box<dyn Fn(&Path) -> bool + Send + Sync>;

/// Changed paths collected under one root during one quiet period
pub struct ChangeSet {
    root: PathBuf,
    paths: BTreeSet<PathBuf>,
    exists: ExistsProbe,
}

impl ChangeSet {
    /// Collect changes under `root`, probing the real file system
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_probe(root, |path: &Path| path.exists())
    }

    /// Collect changes under `root` with a custom existence check
    pub fn with_probe<F>(root: impl Into<PathBuf>, exists: F) -> Self
    where
        F: Fn(&Path) -> bool + Send + Sync + 'static,
    {
        Self {
            root: root.into(),
            paths: BTreeSet::new(),
            exists: Box::new(exists),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// A file was created or modified
    pub fn file_changed(&mut self, path: &Path) {
        self.paths.insert(path.to_path_buf());
    }

    /// A directory was created
    pub fn directory_created(&mut self, path: &Path) {
        self.paths.insert(path.to_path_buf());
    }

    /// A file or directory was deleted
    pub fn entry_deleted(&mut self, path: &Path) {
        let parent = match path.parent() {
            Some(parent) if path != self.root => parent,
            _ => self.root.as_path(),
        };
        let reported = nearest_existing(&self.root, parent, &self.exists);
        self.paths.insert(reported);
    }

    /// Anything under the root may have changed
    pub fn whole_tree(&mut self) {
        self.paths.insert(self.root.clone());
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Take the reduced batch, leaving the set empty
    pub fn take(&mut self) -> BTreeSet<PathBuf> {
        let collected = std::mem::take(&mut self.paths);

        let settled: BTreeSet<PathBuf> = collected
            .into_iter()
            .map(|path| {
                if (self.exists)(&path) {
                    path
                } else {
                    nearest_existing(&self.root, &path, &self.exists)
                }
            })
            .collect();

        prune_descendants(settled)
    }

    /// Forget everything collected so far
    pub fn clear(&mut self) {
        self.paths.clear();
    }
}

impl fmt::Debug for ChangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeSet")
            .field("root", &self.root)
            .field("paths", &self.paths)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// In-memory tree standing in for the file system
    #[derive(Clone, Default)]
    struct Tree(Arc<Mutex<BTreeSet<PathBuf>>>);

    impl Tree {
        fn with(paths: &[&str]) -> Self {
            let tree = Self::default();
            for path in paths {
                tree.add(path);
            }
            tree
        }

        fn add(&self, path: &str) {
            self.0.lock().insert(PathBuf::from(path));
        }

        fn remove(&self, path: &str) {
            let path = PathBuf::from(path);
            self.0.lock().retain(|p| !p.starts_with(&path));
        }

        fn change_set(&self) -> ChangeSet {
            let tree = self.clone();
            ChangeSet::with_probe("/site", move |p| tree.0.lock().contains(p))
        }
    }

    fn paths(paths: &[&str]) -> BTreeSet<PathBuf> {
        paths.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_modified_twice_reported_once() {
        let tree = Tree::with(&["/site", "/site/css", "/site/css/style.css"]);
        let mut changes = tree.change_set();

        changes.file_changed(Path::new("/site/css/style.css"));
        changes.file_changed(Path::new("/site/css/style.css"));

        assert_eq!(changes.len(), 1);
        assert_eq!(changes.take(), paths(&["/site/css/style.css"]));
        assert!(changes.is_empty());
    }

    #[test]
    fn test_file_deleted_reports_parent() {
        let tree = Tree::with(&["/site", "/site/js"]);
        let mut changes = tree.change_set();

        changes.entry_deleted(Path::new("/site/js/script.js"));
        assert_eq!(changes.take(), paths(&["/site/js"]));
    }

    #[test]
    fn test_rename_in_same_directory() {
        let tree = Tree::with(&["/site", "/site/js", "/site/js/b.js"]);
        let mut changes = tree.change_set();

        changes.entry_deleted(Path::new("/site/js/a.js"));
        changes.file_changed(Path::new("/site/js/b.js"));

        assert_eq!(changes.take(), paths(&["/site/js"]));
    }

    #[test]
    fn test_move_across_directories() {
        let tree = Tree::with(&["/site", "/site/js", "/site/css", "/site/css/foo.js"]);
        let mut changes = tree.change_set();

        changes.file_changed(Path::new("/site/css/foo.js"));
        changes.entry_deleted(Path::new("/site/js/script.js"));

        assert_eq!(changes.take(), paths(&["/site/css/foo.js", "/site/js"]));
    }

    #[test]
    fn test_sibling_directories_deleted() {
        let tree = Tree::with(&["/site", "/site/lib"]);
        let mut changes = tree.change_set();

        for name in ["a", "b", "c"] {
            changes.entry_deleted(&Path::new("/site/lib").join(name));
        }

        assert_eq!(changes.take(), paths(&["/site/lib"]));
    }

    #[test]
    fn test_bulk_delete_walks_up_to_existing_ancestor() {
        let tree = Tree::with(&["/site", "/site/a", "/site/a/b", "/site/a/b/c"]);
        let mut changes = tree.change_set();

        tree.remove("/site/a");
        changes.entry_deleted(Path::new("/site/a/b/c/x.css"));
        changes.entry_deleted(Path::new("/site/a/b/c"));
        changes.entry_deleted(Path::new("/site/a/b"));

        assert_eq!(changes.take(), paths(&["/site"]));
    }

    #[test]
    fn test_deleting_root_reports_root() {
        let tree = Tree::default();
        let mut changes = tree.change_set();

        changes.entry_deleted(Path::new("/site"));
        assert_eq!(changes.take(), paths(&["/site"]));
    }

    #[test]
    fn test_created_directory_covers_its_content() {
        let tree = Tree::with(&["/site", "/site/newDir", "/site/newDir/x.css"]);
        let mut changes = tree.change_set();

        changes.directory_created(Path::new("/site/newDir"));
        changes.file_changed(Path::new("/site/newDir/x.css"));

        assert_eq!(changes.take(), paths(&["/site/newDir"]));
    }

    #[test]
    fn test_vanished_path_settles_on_ancestor() {
        let tree = Tree::with(&["/site", "/site/css"]);
        let mut changes = tree.change_set();

        // Created and deleted again before delivery
        changes.file_changed(Path::new("/site/css/tmp.css"));
        assert_eq!(changes.take(), paths(&["/site/css"]));
    }

    #[test]
    fn test_whole_tree_covers_everything() {
        let tree = Tree::with(&["/site", "/site/css", "/site/css/a.css"]);
        let mut changes = tree.change_set();

        changes.file_changed(Path::new("/site/css/a.css"));
        changes.whole_tree();

        assert_eq!(changes.take(), paths(&["/site"]));
    }

    #[test]
    fn test_clear() {
        let tree = Tree::with(&["/site"]);
        let mut changes = tree.change_set();

        changes.whole_tree();
        changes.clear();
        assert!(changes.take().is_empty());
    }
}
