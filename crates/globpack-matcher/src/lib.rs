//! Glob pattern matching and file-tree expansion.
//!
//! This crate owns the pattern dialect of the glob-expansion service:
//! `*` and `?` match within a single path segment (never crossing `/`),
//! `**` as a whole segment matches zero or more segments, and bracket
//! classes support negation with `!` or `^`. Patterns are matched against
//! forward-slash, UTF-8 paths relative to a configured root.
//!
//! [`Pattern`] is a pure, stateless value — parse once, match from any
//! thread. [`TreeWalker`] pairs a root directory with a service-wide ignore
//! set and expands patterns lazily against the tree.

mod walk;

pub use walk::{Expansion, TreeWalker, WalkError};

use camino::{Utf8Path, Utf8PathBuf};
use globset::{Glob, GlobBuilder, GlobMatcher};

/// A pattern the service refuses to accept.
///
/// Malformed patterns are a caller error regardless of strictness: they are
/// rejected up front, never treated as "matched nothing".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("empty glob pattern")]
    Empty,

    #[error("absolute glob patterns are not supported: {pattern:?}")]
    Absolute { pattern: String },

    #[error("glob pattern {pattern:?} traverses outside the root")]
    ParentTraversal { pattern: String },

    #[error("could not parse {pattern:?} as a glob: {reason}")]
    Syntax { pattern: String, reason: String },
}

/// A parsed, normalized, compiled glob pattern.
///
/// Normalization collapses adjacent `**` segments, drops `.` segments, and
/// rewrites a trailing `/` into a trailing `**` ("everything under"). The
/// original text is retained for error reporting.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    normalized: String,
    glob: Glob,
    matcher: GlobMatcher,
    /// Leading segments with no glob metacharacters; where expansion starts.
    prefix: Utf8PathBuf,
    /// Exact component count a match must have, when the pattern has no `**`.
    exact_depth: Option<usize>,
}

impl Pattern {
    /// Parse and compile a single pattern.
    ///
    /// # Errors
    ///
    /// Returns a [`PatternError`] for empty patterns, absolute paths, `..`
    /// components, or glob syntax the dialect rejects (e.g. an unclosed `[`).
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        if pattern.is_empty() {
            return Err(PatternError::Empty);
        }
        if pattern.starts_with('/') {
            return Err(PatternError::Absolute {
                pattern: pattern.to_string(),
            });
        }

        let trailing_slash = pattern.ends_with('/');
        let mut segments: Vec<String> = Vec::new();
        for raw in pattern.split('/') {
            match raw {
                "" | "." => continue,
                ".." => {
                    return Err(PatternError::ParentTraversal {
                        pattern: pattern.to_string(),
                    });
                }
                // Adjacent recursive segments are redundant; collapse them.
                "**" if segments.last().is_some_and(|s| s == "**") => continue,
                _ => segments.push(normalize_class_negation(raw)),
            }
        }
        // A trailing slash means "everything under this directory".
        if trailing_slash && segments.last().is_none_or(|s| s != "**") {
            segments.push("**".to_string());
        }
        if segments.is_empty() {
            return Err(PatternError::Empty);
        }

        let normalized = segments.join("/");
        let glob = GlobBuilder::new(&normalized)
            .literal_separator(true)
            .backslash_escape(true)
            .build()
            .map_err(|e| PatternError::Syntax {
                pattern: pattern.to_string(),
                reason: e.kind().to_string(),
            })?;
        let matcher = glob.compile_matcher();

        let mut literal = segments
            .iter()
            .take_while(|s| !has_meta(s))
            .count();
        // A fully literal pattern names a file; expansion starts at its parent.
        if literal == segments.len() {
            literal -= 1;
        }
        let prefix: Utf8PathBuf = segments[..literal].iter().map(String::as_str).collect();
        let exact_depth = if segments.iter().any(|s| s == "**" || s.contains('{')) {
            None
        } else {
            Some(segments.len())
        };

        Ok(Self {
            source: pattern.to_string(),
            normalized,
            glob,
            matcher,
            prefix,
            exact_depth,
        })
    }

    /// Parse a batch of patterns, failing on the first malformed one.
    ///
    /// # Errors
    ///
    /// Returns the [`PatternError`] of the first pattern that fails to parse.
    pub fn parse_all<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<Self>, PatternError> {
        patterns.iter().map(|p| Self::parse(p.as_ref())).collect()
    }

    /// The pattern text as the caller wrote it.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The normalized form the matcher was compiled from.
    #[must_use]
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    /// Decide whether a root-relative, forward-slash path matches.
    #[must_use]
    pub fn matches(&self, path: impl AsRef<Utf8Path>) -> bool {
        self.matcher.is_match(path.as_ref().as_str())
    }

    pub(crate) fn compiled(&self) -> &Glob {
        &self.glob
    }

    pub(crate) fn literal_prefix(&self) -> &Utf8Path {
        &self.prefix
    }

    /// Whether a directory at `depth` components can still contain matches.
    pub(crate) fn can_descend_below(&self, depth: usize) -> bool {
        self.exact_depth.is_none_or(|d| depth < d)
    }
}

/// Rewrite `[^...]` class negation to the `[!...]` form globset compiles,
/// leaving escaped brackets alone.
fn normalize_class_negation(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut chars = segment.chars().peekable();
    let mut escaped = false;
    while let Some(c) = chars.next() {
        out.push(c);
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '[' => {
                if chars.peek() == Some(&'^') {
                    chars.next();
                    out.push('!');
                }
            }
            _ => {}
        }
    }
    out
}

fn has_meta(segment: &str) -> bool {
    segment.contains(['*', '?', '[', '{', '\\'])
}
