//! Path helpers shared by discovery and change reduction

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Nearest ancestor of `path` (inclusive) accepted by `exists`, never above `root`
///
/// Returns `root` when nothing below it qualifies, including when `path`
/// lies outside `root` altogether.
pub fn nearest_existing<F>(root: &Path, path: &Path, exists: F) -> PathBuf
where
    F: Fn(&Path) -> bool,
{
    if !path.starts_with(root) {
        return root.to_path_buf();
    }

    path.ancestors()
        .take_while(|candidate| *candidate != root)
        .find(|candidate| exists(candidate))
        .unwrap_or(root)
        .to_path_buf()
}

/// Drop every path that has an ancestor in the same set
///
/// The result is the minimal set covering the same subtrees.
pub fn prune_descendants(paths: BTreeSet<PathBuf>) -> BTreeSet<PathBuf> {
    let mut kept = BTreeSet::new();

    // Components sort ancestors before their descendants
    for path in paths {
        let covered = path.ancestors().skip(1).any(|ancestor| kept.contains(ancestor));
        if !covered {
            kept.insert(path);
        }
    }

    kept
}

/// True if every directory strictly between `root` and `path` satisfies `accept`
///
/// Paths outside `root` are never reachable.
pub fn reachable_through<F>(root: &Path, path: &Path, accept: F) -> bool
where
    F: Fn(&Path) -> bool,
{
    let Ok(relative) = path.strip_prefix(root) else {
        return false;
    };

    let mut current = root.to_path_buf();
    let mut components = relative.components().peekable();
    while let Some(component) = components.next() {
        if components.peek().is_none() {
            break;
        }
        current.push(component);
        if !accept(&current) {
            return false;
        }
    }

    true
}
