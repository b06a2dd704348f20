//! Site trees on disk and a recording change listener

use anyhow::{bail, Context, Result};
use crossbeam_channel::{Receiver, Sender};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use walkdir::WalkDir;
use webfiles_watcher::{GlobNameMatcher, PathChangesListener};

/// Include `*.css` and `*.js`, exclude `.git`
pub fn web_matcher() -> GlobNameMatcher {
    let mut matcher = GlobNameMatcher::new();
    matcher
        .include_files(["*.css", "*.js"])
        .exclude_directories([".git"]);
    matcher
}

/// Every existing directory under `root` that a watcher must have registered
pub fn expected_directories(root: &Path, matcher: &GlobNameMatcher) -> BTreeSet<PathBuf> {
    WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || (entry.file_type().is_dir() && matcher.matches_directory(entry.path()))
        })
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.into_path())
        .collect()
}

/// A small web site in a temporary directory
///
/// Starts out as `css/style.css` and `js/script.js` below a canonical root.
pub struct SiteFixture {
    _temp_dir: TempDir,
    root: PathBuf,
}

impl SiteFixture {
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let root = fs::canonicalize(temp_dir.path())?;
        let site = Self {
            _temp_dir: temp_dir,
            root,
        };

        site.write("css/style.css", "body { color: black; }")?;
        site.write("js/script.js", "console.log('hi');")?;
        Ok(site)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of `relative`; `.` is the root itself
    pub fn path(&self, relative: &str) -> PathBuf {
        if relative == "." {
            self.root.clone()
        } else {
            self.root.join(relative)
        }
    }

    /// Absolute paths for a list of relative ones
    pub fn paths(&self, relative: &[&str]) -> BTreeSet<PathBuf> {
        relative.iter().map(|rel| self.path(rel)).collect()
    }

    pub fn mkdir(&self, relative: &str) -> Result<PathBuf> {
        let path = self.path(relative);
        fs::create_dir_all(&path).with_context(|| format!("mkdir {}", path.display()))?;
        Ok(path)
    }

    pub fn write(&self, relative: &str, content: &str) -> Result<PathBuf> {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }

    pub fn remove(&self, relative: &str) -> Result<PathBuf> {
        let path = self.path(relative);
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
        Ok(path)
    }

    pub fn rename(&self, from: &str, to: &str) -> Result<(PathBuf, PathBuf)> {
        let (from, to) = (self.path(from), self.path(to));
        fs::rename(&from, &to)
            .with_context(|| format!("rename {} -> {}", from.display(), to.display()))?;
        Ok((from, to))
    }
}

/// What a consumer saw, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Start,
    Paths(PathBuf, BTreeSet<PathBuf>),
    Stop,
}

/// [`PathChangesListener`] half of a [`BatchLog`]
pub struct Recorder {
    tx: Sender<Delivery>,
}

impl PathChangesListener for Recorder {
    fn on_start(&mut self) {
        let _ = self.tx.send(Delivery::Start);
    }

    fn on_paths_changed(&mut self, root: &Path, changed_paths: BTreeSet<PathBuf>) {
        let _ = self.tx.send(Delivery::Paths(root.to_path_buf(), changed_paths));
    }

    fn on_stop(&mut self) {
        let _ = self.tx.send(Delivery::Stop);
    }
}

/// Everything delivered to a [`Recorder`]
pub struct BatchLog {
    rx: Receiver<Delivery>,
}

impl BatchLog {
    pub fn new() -> (Recorder, Self) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Recorder { tx }, Self { rx })
    }

    /// Batches delivered so far, checking each is bracketed by start/stop
    pub fn batches(&self) -> Result<Vec<BTreeSet<PathBuf>>> {
        let deliveries: Vec<Delivery> = self.rx.try_iter().collect();
        let mut batches = Vec::new();

        for chunk in deliveries.chunks(3) {
            match chunk {
                [Delivery::Start, Delivery::Paths(_, paths), Delivery::Stop] => {
                    batches.push(paths.clone())
                }
                other => bail!("malformed delivery sequence: {:?}", other),
            }
        }
        Ok(batches)
    }

    /// Wait for the next complete batch
    pub fn next_batch(&self, timeout: Duration) -> Result<BTreeSet<PathBuf>> {
        let deadline = Instant::now() + timeout;
        let expect = |wanted: &str| -> Result<Delivery> {
            let remaining = deadline.saturating_duration_since(Instant::now());
            self.rx
                .recv_timeout(remaining)
                .with_context(|| format!("no {} delivered within {:?}", wanted, timeout))
        };

        match expect("start")? {
            Delivery::Start => {}
            other => bail!("expected start, got {:?}", other),
        }
        let paths = match expect("paths")? {
            Delivery::Paths(_, paths) => paths,
            other => bail!("expected paths, got {:?}", other),
        };
        match expect("stop")? {
            Delivery::Stop => {}
            other => bail!("expected stop, got {:?}", other),
        }
        Ok(paths)
    }

    /// Fail if anything at all is delivered within `period`
    pub fn assert_quiet(&self, period: Duration) -> Result<()> {
        match self.rx.recv_timeout(period) {
            Ok(delivery) => bail!("unexpected delivery: {:?}", delivery),
            Err(_) => Ok(()),
        }
    }
}
