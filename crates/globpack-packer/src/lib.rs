//! Content packing: many files, one buffer.
//!
//! Shipping one wire message per matched file would dominate latency when a
//! request matches thousands of small sources. Instead the packer reads each
//! file in resolved order, appends the raw bytes to a single growing buffer,
//! and records a half-open `[start, end)` span per file — one bulk payload
//! per request regardless of match-set size.

use camino::Utf8PathBuf;
use tracing::debug;

use globpack_matcher::TreeWalker;
use globpack_proto::FileSpan;

/// Packing failed; no partial buffer is ever returned.
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error("failed to read contents of {path}: {source}")]
    ContentRead {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The packed result: a contiguous buffer and the spans indexing into it.
///
/// Spans appear in the same order as the input paths, never overlap, and
/// together tile `buffer` exactly from 0 to `buffer.len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedContents {
    pub buffer: Vec<u8>,
    pub files: Vec<FileSpan>,
}

impl PackedContents {
    /// The bytes a span points at, or `None` if the span does not lie within
    /// this buffer.
    #[must_use]
    pub fn span_bytes(&self, span: &FileSpan) -> Option<&[u8]> {
        let start = usize::try_from(span.contents_start).ok()?;
        let end = usize::try_from(span.contents_end).ok()?;
        self.buffer.get(start..end)
    }
}

/// Read every path under `walker`'s root, in order, into one buffer.
///
/// Fail-fast: a file that resolved but can no longer be read (deleted or
/// made unreadable between resolution and packing) aborts the whole pack.
/// A response must never carry descriptors that do not all index valid
/// ranges.
///
/// # Errors
///
/// Returns [`PackError::ContentRead`] naming the first unreadable path.
pub fn pack(paths: &[Utf8PathBuf], walker: &TreeWalker) -> Result<PackedContents, PackError> {
    let mut buffer = Vec::new();
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = walker
            .read_file(path)
            .map_err(|source| PackError::ContentRead {
                path: path.clone(),
                source,
            })?;
        let contents_start = buffer.len() as u64;
        buffer.extend_from_slice(&bytes);
        files.push(FileSpan::new(path.as_str(), contents_start, buffer.len() as u64));
    }
    debug!(
        files = files.len(),
        bytes = buffer.len(),
        "packed file contents"
    );
    Ok(PackedContents { buffer, files })
}
