//! Raw event normalization and classification
//!
//! `notify` events are first flattened into per-path [`RawChange`]s when they
//! arrive. Classification into file/directory create/modify/delete happens
//! later, when the quiet period is over and the tree has settled.

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind};
use std::io;
use std::path::{Path, PathBuf};
use webfiles_core::GlobNameMatcher;

/// What the OS said happened to a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RawKind {
    Created,
    Modified,
    Removed,
    /// Renamed without saying which side this path is on
    Renamed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawChange {
    pub(crate) kind: RawKind,
    pub(crate) path: PathBuf,
}

impl RawChange {
    pub(crate) fn new(kind: RawKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// A change as listeners see it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Classified {
    DirectoryCreated,
    DirectoryModified,
    DirectoryDeleted,
    FileCreated,
    FileModified,
    FileDeleted,
}

/// Flatten one `notify` event into per-path raw changes
pub(crate) fn raw_changes(event: &Event) -> Vec<RawChange> {
    let kind = match event.kind {
        EventKind::Create(_) => RawKind::Created,
        EventKind::Remove(_) => RawKind::Removed,
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::From => RawKind::Removed,
            RenameMode::To => RawKind::Created,
            RenameMode::Both => return rename_both(&event.paths),
            _ => RawKind::Renamed,
        },
        EventKind::Modify(_) | EventKind::Any => RawKind::Modified,
        EventKind::Access(_) | EventKind::Other => return Vec::new(),
    };

    event
        .paths
        .iter()
        .map(|path| RawChange::new(kind, path.clone()))
        .collect()
}

fn rename_both(paths: &[PathBuf]) -> Vec<RawChange> {
    match paths {
        [from, to, ..] => vec![
            RawChange::new(RawKind::Removed, from.clone()),
            RawChange::new(RawKind::Created, to.clone()),
        ],
        [single] => vec![RawChange::new(RawKind::Renamed, single.clone())],
        [] => Vec::new(),
    }
}

/// Decide what a raw change means now
///
/// `registered` tells whether the path is a directory currently registered
/// with the observer; for removals that is the only way to know a directory
/// went away. Returns `Ok(None)` for changes nobody is interested in.
pub(crate) fn classify(
    change: &RawChange,
    registered: bool,
    matcher: &GlobNameMatcher,
) -> io::Result<Option<Classified>> {
    match change.kind {
        RawKind::Removed => Ok(classify_removal(&change.path, registered, matcher)),
        RawKind::Created => classify_existing(&change.path, matcher, Classified::DirectoryCreated, Classified::FileCreated),
        RawKind::Modified => classify_existing(&change.path, matcher, Classified::DirectoryModified, Classified::FileModified),
        RawKind::Renamed => match std::fs::symlink_metadata(&change.path) {
            Ok(_) => classify_existing(&change.path, matcher, Classified::DirectoryCreated, Classified::FileCreated),
            // Unresolvable now (gone, or a parent turned into a file): the source side
            Err(_) => Ok(classify_removal(&change.path, registered, matcher)),
        },
    }
}

fn classify_removal(path: &Path, registered: bool, matcher: &GlobNameMatcher) -> Option<Classified> {
    if registered {
        Some(Classified::DirectoryDeleted)
    } else if matcher.matches_file(path) {
        Some(Classified::FileDeleted)
    } else {
        None
    }
}

fn classify_existing(
    path: &Path,
    matcher: &GlobNameMatcher,
    directory: Classified,
    file: Classified,
) -> io::Result<Option<Classified>> {
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        // Gone again before the quiet period ended; its removal is queued too
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    let classified = if metadata.is_dir() {
        matcher.matches_directory(path).then_some(directory)
    } else {
        matcher.matches_file(path).then_some(file)
    };
    Ok(classified)
}
