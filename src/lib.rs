//! globpack - glob expansion with packed content delivery
//!
//! globpack is a request/response service core: given include/exclude
//! path-glob patterns and a matching policy, it resolves them against a file
//! tree and returns the matched files together with their contents, packed
//! into one contiguous buffer for efficient bulk transfer.
//!
//! The work is split across focused crates, re-exported here:
//!
//! - [`globpack_proto`]: the wire contract — requests, responses, policy
//!   enums, field validation.
//! - [`globpack_matcher`]: pattern parsing and matching, plus lazy expansion
//!   against a rooted file tree.
//! - [`globpack_resolver`]: strictness/conjunction policy over include sets,
//!   exclusion, and deterministic ordering.
//! - [`globpack_packer`]: one buffer, one span per file.
//! - [`globpack_dispatcher`]: correlated async dispatch with an in-flight
//!   table and always-terminal responses.
//!
//! # Quick start
//!
//! ```no_run
//! use globpack::{
//!     Conjunction, Dispatcher, ExpandGlobsRequest, PathGlobs, ServiceConfig, Strictness,
//! };
//!
//! # async fn demo() -> Result<(), globpack::ConfigError> {
//! let dispatcher = Dispatcher::new(&ServiceConfig::new("/path/to/tree"))?;
//! let request = ExpandGlobsRequest::new(PathGlobs::new(
//!     vec!["src/**/*.rs".to_string()],
//!     vec!["src/generated/**".to_string()],
//!     Strictness::Error,
//!     Conjunction::AllMatch,
//! ));
//! let completed = dispatcher.dispatch(request).await;
//! for span in &completed.response.all_files {
//!     let bytes = &completed.contents[span.contents_start as usize..span.contents_end as usize];
//!     println!("{}: {} bytes", span.path, bytes.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Transport, framing, hashing, and the build graph consuming the results
//! all live outside this crate; callers layer cancellation by discarding
//! late responses keyed by message id.

mod logging;

pub use logging::init_tracing;

pub use globpack_dispatcher::{
    CompletedExpansion, ConfigError, Dispatcher, RequestPhase, ServiceConfig,
};
pub use globpack_matcher::{Expansion, Pattern, PatternError, TreeWalker, WalkError};
pub use globpack_packer::{PackError, PackedContents, pack};
pub use globpack_proto::{
    Conjunction, ExpandGlobsRequest, FileSpan, GlobExpansionComplete, MessageId, PathGlobs,
    RequestError, ResultCode, Strictness,
};
pub use globpack_resolver::{ExpansionError, Resolution, resolve};
