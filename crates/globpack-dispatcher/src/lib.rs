//! Correlated request dispatch for the glob-expansion service.
//!
//! Each request advances through its own state machine —
//! `Received -> Resolving -> Packing -> Completed` — independently of every
//! other in-flight request. Filesystem-bound work (resolution, packing) runs
//! on the blocking pool so slow traversals never stall unrelated requests.
//!
//! The dispatcher emits exactly one terminal [`GlobExpansionComplete`] per
//! request, echoing its message id, and never drops a request silently.
//! There is no cancellation in the contract: once dispatched, a request runs
//! to its terminal response, and a caller that has lost interest simply
//! disregards the late response by id.

mod config;

pub use config::{ConfigError, ServiceConfig};

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use globpack_matcher::TreeWalker;
use globpack_packer::{PackError, PackedContents, pack};
use globpack_proto::{ExpandGlobsRequest, GlobExpansionComplete, MessageId, RequestError};
use globpack_resolver::{ExpansionError, resolve};

/// Where an in-flight request currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Received,
    Resolving,
    Packing,
}

/// A terminal response paired with the packed content buffer it indexes.
///
/// The buffer is the side channel the wire contract refers to: the spans in
/// `response.all_files` are meaningless without it. It is empty for error
/// responses. How the pair travels to the caller is the transport layer's
/// concern.
#[derive(Debug, Clone)]
pub struct CompletedExpansion {
    pub response: GlobExpansionComplete,
    pub contents: Vec<u8>,
}

impl CompletedExpansion {
    fn ok(id: MessageId, packed: PackedContents) -> Self {
        Self {
            response: GlobExpansionComplete::ok(id, packed.files),
            contents: packed.buffer,
        }
    }

    fn error(id: MessageId, error_text: impl Into<String>) -> Self {
        Self {
            response: GlobExpansionComplete::error(id, error_text),
            contents: Vec::new(),
        }
    }
}

/// Everything that can fail a request after it was admitted. Funnelled into
/// `error_text` at the boundary; none of these are retried internally.
#[derive(Debug, thiserror::Error)]
enum DispatchError {
    #[error(transparent)]
    Expansion(#[from] ExpansionError),
    #[error(transparent)]
    Pack(#[from] PackError),
}

struct Inner {
    walker: TreeWalker,
    in_flight: Mutex<HashMap<MessageId, RequestPhase>>,
    next_id: AtomicI64,
}

impl Inner {
    fn set_phase(&self, id: MessageId, phase: RequestPhase) {
        let mut table = self.in_flight.lock().expect("in-flight table poisoned");
        if let Some(slot) = table.get_mut(&id) {
            *slot = phase;
        }
    }
}

/// The glob-expansion service front door.
///
/// Cheap to clone; clones share the in-flight table and id counter, so a
/// multi-connection embedder can hand one dispatcher to every connection
/// task.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    /// Validate `config` and build a dispatcher over its root.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the root is not an existing directory
    /// or an ignore pattern is malformed.
    pub fn new(config: &ServiceConfig) -> Result<Self, ConfigError> {
        let walker = config.build_walker()?;
        Ok(Self {
            inner: Arc::new(Inner {
                walker,
                in_flight: Mutex::new(HashMap::new()),
                next_id: AtomicI64::new(0),
            }),
        })
    }

    /// Number of requests currently between admission and terminal response.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner
            .in_flight
            .lock()
            .expect("in-flight table poisoned")
            .len()
    }

    /// The lifecycle phase of an in-flight request, if `id` is in flight.
    #[must_use]
    pub fn phase(&self, id: MessageId) -> Option<RequestPhase> {
        self.inner
            .in_flight
            .lock()
            .expect("in-flight table poisoned")
            .get(&id)
            .copied()
    }

    /// Run one request to its terminal response.
    ///
    /// Always returns a [`CompletedExpansion`]; failures of any kind
    /// (malformed request, policy violation, unreadable file) become
    /// `status=ERROR` with a descriptive `error_text`, never a missing
    /// response.
    pub async fn dispatch(&self, request: ExpandGlobsRequest) -> CompletedExpansion {
        let id = request
            .message_id
            .unwrap_or_else(|| MessageId(self.inner.next_id.fetch_add(1, Ordering::Relaxed)));

        {
            let mut table = self.inner.in_flight.lock().expect("in-flight table poisoned");
            if table.contains_key(&id) {
                warn!(%id, "rejecting duplicate in-flight message id");
                return CompletedExpansion::error(
                    id,
                    RequestError::DuplicateMessageId { id }.to_string(),
                );
            }
            table.insert(id, RequestPhase::Received);
        }
        debug!(%id, "request received");

        let outcome = self.run(id, request).await;
        self.inner
            .in_flight
            .lock()
            .expect("in-flight table poisoned")
            .remove(&id);

        match outcome {
            Ok(packed) => {
                debug!(%id, files = packed.files.len(), "request completed");
                CompletedExpansion::ok(id, packed)
            }
            Err(error_text) => {
                warn!(%id, error = %error_text, "request failed");
                CompletedExpansion::error(id, error_text)
            }
        }
    }

    async fn run(&self, id: MessageId, request: ExpandGlobsRequest) -> Result<PackedContents, String> {
        let globs = match request.validate() {
            Ok(globs) => globs.clone(),
            Err(e) => return Err(e.to_string()),
        };

        self.inner.set_phase(id, RequestPhase::Resolving);
        let inner = Arc::clone(&self.inner);
        let outcome = tokio::task::spawn_blocking(move || -> Result<PackedContents, DispatchError> {
            let resolution = resolve(&globs, &inner.walker)?;
            inner.set_phase(id, RequestPhase::Packing);
            Ok(pack(&resolution.paths, &inner.walker)?)
        })
        .await;

        match outcome {
            Ok(Ok(packed)) => Ok(packed),
            Ok(Err(e)) => Err(e.to_string()),
            // The blocking task died; the request still gets its response.
            Err(join_error) => Err(format!("internal expansion failure: {join_error}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use globpack_proto::{Conjunction, PathGlobs, ResultCode, Strictness};
    use std::fs;

    fn service(files: &[&str]) -> (tempfile::TempDir, Dispatcher) {
        let dir = tempfile::TempDir::new().unwrap();
        for rel in files {
            let path = dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, rel.as_bytes()).unwrap();
        }
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let dispatcher = Dispatcher::new(&ServiceConfig::new(root)).unwrap();
        (dir, dispatcher)
    }

    fn txt_request(id: i64) -> ExpandGlobsRequest {
        ExpandGlobsRequest::new(PathGlobs::new(
            vec!["src/*.txt".to_string()],
            Vec::new(),
            Strictness::Error,
            Conjunction::AllMatch,
        ))
        .with_id(id)
    }

    #[tokio::test]
    async fn echoes_the_caller_supplied_id() {
        let (_dir, dispatcher) = service(&["src/a.txt"]);
        let completed = dispatcher.dispatch(txt_request(42)).await;
        assert_eq!(completed.response.message_id, MessageId(42));
        assert_eq!(completed.response.status, ResultCode::Ok);
        assert_eq!(dispatcher.in_flight(), 0);
    }

    #[tokio::test]
    async fn assigns_distinct_ids_when_absent() {
        let (_dir, dispatcher) = service(&["src/a.txt"]);
        let mut request = txt_request(0);
        request.message_id = None;
        let first = dispatcher.dispatch(request.clone()).await;
        let second = dispatcher.dispatch(request).await;
        assert_ne!(first.response.message_id, second.response.message_id);
    }

    #[tokio::test]
    async fn missing_path_globs_yields_an_error_response() {
        let (_dir, dispatcher) = service(&[]);
        let request = ExpandGlobsRequest {
            message_id: Some(MessageId(5)),
            path_globs: None,
        };
        let completed = dispatcher.dispatch(request).await;
        assert_eq!(completed.response.status, ResultCode::Error);
        assert!(
            completed
                .response
                .error_text
                .as_deref()
                .unwrap()
                .contains("path_globs")
        );
        assert!(completed.contents.is_empty());
        assert_eq!(dispatcher.in_flight(), 0);
    }

    #[tokio::test]
    async fn duplicate_in_flight_id_is_rejected_without_harming_the_first() {
        let (_dir, dispatcher) = service(&["src/a.txt"]);

        // Occupy the id by hand to model a still-running first request.
        dispatcher
            .inner
            .in_flight
            .lock()
            .unwrap()
            .insert(MessageId(7), RequestPhase::Resolving);

        let completed = dispatcher.dispatch(txt_request(7)).await;
        assert_eq!(completed.response.status, ResultCode::Error);
        assert!(
            completed
                .response
                .error_text
                .as_deref()
                .unwrap()
                .contains("already in flight")
        );
        // The original entry must survive the rejection.
        assert_eq!(dispatcher.phase(MessageId(7)), Some(RequestPhase::Resolving));
    }

    #[tokio::test]
    async fn reusing_an_id_after_completion_is_allowed() {
        let (_dir, dispatcher) = service(&["src/a.txt"]);
        let first = dispatcher.dispatch(txt_request(11)).await;
        let second = dispatcher.dispatch(txt_request(11)).await;
        assert_eq!(first.response.status, ResultCode::Ok);
        assert_eq!(second.response.status, ResultCode::Ok);
    }

    #[tokio::test]
    async fn concurrent_requests_each_get_exactly_one_response() {
        let (_dir, dispatcher) = service(&["src/a.txt", "src/b.txt"]);
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move { dispatcher.dispatch(txt_request(i)).await })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            let completed = handle.await.unwrap();
            assert_eq!(completed.response.message_id, MessageId(i as i64));
            assert_eq!(completed.response.status, ResultCode::Ok);
            assert_eq!(completed.response.all_files.len(), 2);
        }
        assert_eq!(dispatcher.in_flight(), 0);
    }
}
