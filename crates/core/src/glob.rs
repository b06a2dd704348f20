//! Include/exclude name patterns for watched web files
//!
//! Patterns are shell-style globs (`*`, `?`, `[a-c]`) matched case-sensitively
//! against the last segment of a path only. Two independent sets exist:
//! - include-file patterns: a file is watched when its name matches one of them
//! - exclude-directory patterns: a directory is watched unless its name matches one of them

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use std::fmt;
use std::path::Path;
use tracing::warn;

/// Matches file and directory names against include/exclude glob patterns
///
/// Invalid patterns never fail the whole configuration: they are logged and
/// left out, and the remaining patterns stay active.
#[derive(Clone, Default)]
pub struct GlobNameMatcher {
    include_files: PatternSet,
    exclude_directories: PatternSet,
}

impl GlobNameMatcher {
    /// Create a matcher that includes no files and excludes no directories
    pub fn new() -> Self {
        Self::default()
    }

    /// Add patterns for file names that should be watched
    pub fn include_files<I, S>(&mut self, patterns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.include_files.extend(patterns, "include");
        self
    }

    /// Add patterns for directory names that should not be watched
    pub fn exclude_directories<I, S>(&mut self, patterns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.exclude_directories.extend(patterns, "exclude");
        self
    }

    /// True if the last segment of `path` matches an include-file pattern
    ///
    /// A path without a last segment (`/`, `..`, empty) never matches.
    pub fn matches_file(&self, path: &Path) -> bool {
        match path.file_name() {
            Some(name) => self.include_files.is_match(name),
            None => false,
        }
    }

    /// True if the last segment of `path` matches none of the exclude-directory patterns
    ///
    /// A path without a last segment (`/`, `..`, empty) never matches.
    pub fn matches_directory(&self, path: &Path) -> bool {
        match path.file_name() {
            Some(name) => !self.exclude_directories.is_match(name),
            None => false,
        }
    }

    /// Active include-file patterns, in registration order
    pub fn included_files(&self) -> &[String] {
        &self.include_files.patterns
    }

    /// Active exclude-directory patterns, in registration order
    pub fn excluded_directories(&self) -> &[String] {
        &self.exclude_directories.patterns
    }
}

impl fmt::Debug for GlobNameMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobNameMatcher")
            .field("include_files", &self.include_files.patterns)
            .field("exclude_directories", &self.exclude_directories.patterns)
            .finish()
    }
}

/// One compiled list of single-segment patterns
#[derive(Clone)]
struct PatternSet {
    patterns: Vec<String>,
    globs: Vec<Glob>,
    set: GlobSet,
}

impl Default for PatternSet {
    fn default() -> Self {
        Self {
            patterns: Vec::new(),
            globs: Vec::new(),
            set: GlobSet::empty(),
        }
    }
}

impl PatternSet {
    fn extend<I, S>(&mut self, patterns: I, kind: &str)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let before = self.globs.len();

        for pattern in patterns {
            let pattern = pattern.as_ref();
            match compile(pattern) {
                Ok(glob) => {
                    self.patterns.push(pattern.to_string());
                    self.globs.push(glob);
                }
                Err(reason) => {
                    warn!("Ignoring {} pattern '{}': {}", kind, pattern, reason);
                }
            }
        }

        if self.globs.len() != before {
            self.rebuild();
        }
    }

    fn rebuild(&mut self) {
        let mut builder = GlobSetBuilder::new();
        for glob in &self.globs {
            builder.add(glob.clone());
        }

        // Every glob compiled on its own already, so building the set only
        // fails on resource limits; keep the previous set in that case.
        match builder.build() {
            Ok(set) => self.set = set,
            Err(e) => warn!("Failed to rebuild pattern set: {}", e),
        }
    }

    fn is_match(&self, name: &std::ffi::OsStr) -> bool {
        self.set.is_match(Path::new(name))
    }
}

fn compile(pattern: &str) -> Result<Glob, String> {
    if pattern.contains('/') || pattern.contains(std::path::MAIN_SEPARATOR) {
        return Err("patterns match a single path segment and cannot contain a separator".into());
    }

    GlobBuilder::new(pattern)
        .literal_separator(true)
        .case_insensitive(false)
        .build()
        .map_err(|e| e.to_string())
}
