//! Lazy expansion of patterns against an on-disk file tree.

use std::collections::VecDeque;
use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use globset::{GlobSet, GlobSetBuilder};
use tracing::debug;

use crate::{Pattern, PatternError};

/// A directory listing or stat failed mid-expansion.
#[derive(Debug, thiserror::Error)]
#[error("failed to read {path}: {source}")]
pub struct WalkError {
    /// Path relative to the walker's root.
    pub path: Utf8PathBuf,
    #[source]
    pub source: io::Error,
}

/// Read-only view of the file tree under a root directory.
///
/// The walker carries service-wide policy that applies to every request:
/// the ignore set (paths invisible to all patterns, include and exclude
/// alike) and the symlink stance. Symlinks are skipped by default;
/// [`follow_file_symlinks`](Self::follow_file_symlinks) opts into resolving
/// symlinks that point at regular files. Symlinked directories are never
/// traversed, so a walk cannot cycle or escape the root.
#[derive(Debug)]
pub struct TreeWalker {
    root: Utf8PathBuf,
    ignore: GlobSet,
    follow_file_symlinks: bool,
}

impl TreeWalker {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            root: root.into(),
            ignore: GlobSet::empty(),
            follow_file_symlinks: false,
        }
    }

    /// Install the ignore set.
    ///
    /// # Errors
    ///
    /// Returns a [`PatternError`] if the combined set fails to compile.
    pub fn with_ignore(mut self, patterns: &[Pattern]) -> Result<Self, PatternError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(pattern.compiled().clone());
        }
        self.ignore = builder.build().map_err(|e| PatternError::Syntax {
            pattern: patterns
                .iter()
                .map(Pattern::as_str)
                .collect::<Vec<_>>()
                .join(", "),
            reason: e.kind().to_string(),
        })?;
        Ok(self)
    }

    #[must_use]
    pub fn follow_file_symlinks(mut self, follow: bool) -> Self {
        self.follow_file_symlinks = follow;
        self
    }

    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Whether a root-relative path is hidden from all requests.
    #[must_use]
    pub fn is_ignored(&self, path: impl AsRef<Utf8Path>) -> bool {
        self.ignore.is_match(path.as_ref().as_str())
    }

    /// Lazily enumerate the files under the root that match `pattern`.
    ///
    /// Each call starts a fresh traversal, so expansions are restartable and
    /// never share state. Directory entries are visited in name order, making
    /// the yielded sequence independent of filesystem iteration order.
    /// Directories are traversed but never yielded; only files can satisfy a
    /// pattern.
    pub fn expand<'a>(&'a self, pattern: &'a Pattern) -> Expansion<'a> {
        Expansion::new(self, pattern)
    }

    /// Read the full contents of a root-relative file.
    ///
    /// # Errors
    ///
    /// Propagates the underlying I/O error (missing file, permissions).
    pub fn read_file(&self, path: impl AsRef<Utf8Path>) -> io::Result<Vec<u8>> {
        fs::read(self.root.join(path.as_ref()))
    }
}

struct Entry {
    path: Utf8PathBuf,
    is_dir: bool,
}

/// Iterator over the files matching one pattern. See [`TreeWalker::expand`].
pub struct Expansion<'a> {
    walker: &'a TreeWalker,
    pattern: &'a Pattern,
    pending: VecDeque<Utf8PathBuf>,
    entries: std::vec::IntoIter<Entry>,
    initial_error: Option<WalkError>,
    done: bool,
}

impl<'a> Expansion<'a> {
    fn new(walker: &'a TreeWalker, pattern: &'a Pattern) -> Self {
        let mut expansion = Self {
            walker,
            pattern,
            pending: VecDeque::new(),
            entries: Vec::new().into_iter(),
            initial_error: None,
            done: false,
        };

        let start = pattern.literal_prefix();
        let ancestor_ignored = start
            .ancestors()
            .filter(|p| !p.as_str().is_empty())
            .any(|p| walker.is_ignored(p));
        if ancestor_ignored {
            expansion.done = true;
            return expansion;
        }

        match fs::metadata(walker.root.join(start)) {
            Ok(meta) if meta.is_dir() => expansion.pending.push_back(start.to_owned()),
            // A missing or non-directory prefix simply matches nothing.
            Ok(_) => expansion.done = true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => expansion.done = true,
            Err(source) => {
                expansion.initial_error = Some(WalkError {
                    path: start.to_owned(),
                    source,
                });
            }
        }
        expansion
    }

    fn scan(&self, dir: &Utf8Path) -> Result<Vec<Entry>, WalkError> {
        let abs = self.walker.root.join(dir);
        let mk_err = |source| WalkError {
            path: dir.to_owned(),
            source,
        };

        let mut entries = Vec::new();
        for dir_entry in fs::read_dir(&abs).map_err(mk_err)? {
            let dir_entry = dir_entry.map_err(mk_err)?;
            let name = dir_entry.file_name();
            let Some(name) = name.to_str() else {
                debug!(dir = %dir, "skipping non-UTF-8 entry");
                continue;
            };
            let rel = dir.join(name);
            let file_type = dir_entry.file_type().map_err(mk_err)?;

            let is_dir = if file_type.is_dir() {
                true
            } else if file_type.is_file() {
                false
            } else if file_type.is_symlink() {
                if !self.walker.follow_file_symlinks {
                    debug!(path = %rel, "skipping symlink");
                    continue;
                }
                match fs::metadata(abs.join(name)) {
                    Ok(meta) if meta.is_file() => false,
                    // Symlinked directories are never traversed; broken
                    // links match nothing.
                    Ok(_) | Err(_) => {
                        debug!(path = %rel, "skipping non-file symlink");
                        continue;
                    }
                }
            } else {
                // Sockets, fifos, devices: not files, not traversable.
                continue;
            };

            if self.walker.is_ignored(&rel) {
                continue;
            }
            entries.push(Entry { path: rel, is_dir });
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }
}

impl Iterator for Expansion<'_> {
    type Item = Result<Utf8PathBuf, WalkError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(err) = self.initial_error.take() {
            self.done = true;
            return Some(Err(err));
        }
        loop {
            if let Some(entry) = self.entries.next() {
                if entry.is_dir {
                    let depth = entry.path.components().count();
                    if self.pattern.can_descend_below(depth) {
                        self.pending.push_back(entry.path);
                    }
                    continue;
                }
                if self.pattern.matches(&entry.path) {
                    return Some(Ok(entry.path));
                }
                continue;
            }

            let Some(dir) = self.pending.pop_front() else {
                self.done = true;
                return None;
            };
            match Expansion::scan(self, &dir) {
                Ok(scanned) => self.entries = scanned.into_iter(),
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
    }
}
