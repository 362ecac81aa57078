//! A publisher (writer) for broadcast messaging over a queue.
//!
//! Wraps [`QueueEngine`] with the subscriber-id list captured once at
//! construction, so call sites only ever say "send this payload" instead
//! of repeating the broadcast list on every call.

use std::sync::Arc;

use crate::engine::QueueEngine;
use crate::error::Result;
use crate::store::Environment;

/// Publishes payloads to a fixed set of subscribers.
///
/// # Autosync
///
/// `autosync = true` (the default) commits a write transaction per call to
/// `send`/`send_many`. Setting it to `false` is a placeholder for a future
/// caller-controlled batching mode; today every `Publisher` commits
/// per-call regardless, since the Queue Engine does not yet expose a way
/// to hold a write transaction open across multiple façade calls. This
/// matches the reference behavior spec.md §4.5 describes as the default.
pub struct Publisher {
    engine: QueueEngine,
    subscriber_ids: Vec<String>,
    autosync: bool,
}

impl Publisher {
    /// Opens a publisher writing into `store`, broadcasting to exactly
    /// `subscriber_ids` on every `send`/`send_many` call.
    pub fn new(store: Arc<Environment>, subscriber_ids: impl IntoIterator<Item = String>) -> Self {
        Publisher {
            engine: QueueEngine::new(store),
            subscriber_ids: subscriber_ids.into_iter().collect(),
            autosync: true,
        }
    }

    /// Toggles per-call commit (`true`, default) vs. caller-controlled
    /// batching (`false`). See the `autosync` note above.
    pub fn set_autosync(&mut self, autosync: bool) {
        self.autosync = autosync;
    }

    fn subscriber_refs(&self) -> Vec<&str> {
        self.subscriber_ids.iter().map(String::as_str).collect()
    }

    /// Publishes one payload to every subscriber captured at construction.
    /// Returns the assigned `msg_id`.
    pub fn send(&self, payload: &[u8]) -> Result<String> {
        self.warn_if_batching_requested();
        self.engine.put(payload, &self.subscriber_refs())
    }

    /// Publishes a batch of payloads within a single write transaction, as
    /// `QueueEngine::put_many` (no ordering promise across the batch).
    pub fn send_many(&self, payloads: &[&[u8]]) -> Result<Vec<String>> {
        self.warn_if_batching_requested();
        self.engine.put_many(payloads, &self.subscriber_refs())
    }

    fn warn_if_batching_requested(&self) {
        if !self.autosync {
            log::warn!("autosync=false requested but caller-controlled batching is not yet implemented; committing per-call");
        }
    }
}
