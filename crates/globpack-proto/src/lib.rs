//! Wire contract for the glob-expansion service.
//!
//! This crate defines the request/response value types exchanged with callers:
//! a correlated [`ExpandGlobsRequest`] carrying [`PathGlobs`] (include/exclude
//! patterns plus matching policy), and a terminal [`GlobExpansionComplete`]
//! response whose [`FileSpan`] entries index into a packed content buffer.
//!
//! Field names and enum spellings are fixed by the wire contract; the serde
//! derives here are the single source of truth for them. Transport and framing
//! are deliberately out of scope — these are plain values.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque correlation token pairing a response to its originating request.
///
/// Ids are caller-supplied, or assigned by the dispatcher when absent. They
/// must be unique among in-flight requests; reuse after completion is allowed.
/// No ordering is implied between distinct ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for MessageId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Policy for an include pattern that matches zero files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Strictness {
    /// An unmatched include pattern fails the whole resolution.
    Error,
    /// An unmatched include pattern is logged and reported, but not fatal.
    Warn,
    /// An unmatched include pattern contributes nothing, silently.
    Ignore,
}

/// Policy combining multiple include patterns' match outcomes into one
/// pass/fail decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Conjunction {
    /// Every include pattern must match at least one file.
    AllMatch,
    /// At least one include pattern must match at least one file.
    AnyMatch,
}

/// An immutable glob request value: what to match, and under which policy.
///
/// Pattern order is preserved for error reporting only; it never affects
/// output ordering. `include_patterns` must be non-empty — an empty include
/// set is a malformed request, not something strictness resolves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathGlobs {
    pub include_patterns: Vec<String>,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    pub strictness: Strictness,
    pub conjunction: Conjunction,
}

impl PathGlobs {
    pub fn new(
        include_patterns: Vec<String>,
        exclude_patterns: Vec<String>,
        strictness: Strictness,
        conjunction: Conjunction,
    ) -> Self {
        Self {
            include_patterns,
            exclude_patterns,
            strictness,
            conjunction,
        }
    }

    /// Check the request-level invariant: at least one include pattern.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::EmptyIncludePatterns`] when the include set is
    /// empty.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.include_patterns.is_empty() {
            return Err(RequestError::EmptyIncludePatterns);
        }
        Ok(())
    }
}

/// A correlated glob-expansion request.
///
/// Both fields are optional on the wire (a permissive serialization default
/// inherited from the original contract), but only `message_id` is logically
/// optional: absence means "dispatcher assigns one". An absent `path_globs`
/// is a malformed request and is rejected rather than propagated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpandGlobsRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<MessageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_globs: Option<PathGlobs>,
}

impl ExpandGlobsRequest {
    #[must_use]
    pub fn new(path_globs: PathGlobs) -> Self {
        Self {
            message_id: None,
            path_globs: Some(path_globs),
        }
    }

    /// Attach an explicit correlation id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<MessageId>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    /// Validate the nominally-required fields and return the glob payload.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::MissingPathGlobs`] when `path_globs` is absent,
    /// or the payload's own validation error.
    pub fn validate(&self) -> Result<&PathGlobs, RequestError> {
        let globs = self
            .path_globs
            .as_ref()
            .ok_or(RequestError::MissingPathGlobs)?;
        globs.validate()?;
        Ok(globs)
    }
}

/// Request-shape errors: the caller sent something the contract forbids.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("request is missing path_globs")]
    MissingPathGlobs,

    #[error("include_patterns must not be empty")]
    EmptyIncludePatterns,

    #[error("message id {id} is already in flight")]
    DuplicateMessageId { id: MessageId },
}

/// Terminal outcome of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultCode {
    Ok,
    Error,
}

/// One matched file and the half-open byte range of its contents within the
/// response's packed buffer.
///
/// Invariant: `contents_start <= contents_end <= buffer.len()`, and spans of
/// distinct descriptors in one response never overlap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSpan {
    /// Path relative to the service root, forward-slash separated.
    pub path: String,
    pub contents_start: u64,
    pub contents_end: u64,
}

impl FileSpan {
    pub fn new(path: impl Into<String>, contents_start: u64, contents_end: u64) -> Self {
        Self {
            path: path.into(),
            contents_start,
            contents_end,
        }
    }

    /// Length in bytes of the file's contents.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.contents_end - self.contents_start
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.contents_start == self.contents_end
    }
}

/// The single terminal response emitted for every request.
///
/// `status == Ok` implies `error_text` is absent and `all_files` is populated
/// (possibly empty, when exclusion legitimately removes every match).
/// `status == Error` implies `all_files` is empty and `error_text` names the
/// cause. The packed content buffer travels as a side channel; the spans here
/// are meaningless without it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobExpansionComplete {
    pub message_id: MessageId,
    pub status: ResultCode,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub all_files: Vec<FileSpan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_text: Option<String>,
}

impl GlobExpansionComplete {
    /// Build a successful response.
    #[must_use]
    pub fn ok(message_id: MessageId, all_files: Vec<FileSpan>) -> Self {
        Self {
            message_id,
            status: ResultCode::Ok,
            all_files,
            error_text: None,
        }
    }

    /// Build a failed response with a human-readable cause.
    #[must_use]
    pub fn error(message_id: MessageId, error_text: impl Into<String>) -> Self {
        Self {
            message_id,
            status: ResultCode::Error,
            all_files: Vec::new(),
            error_text: Some(error_text.into()),
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == ResultCode::Ok
    }
}
