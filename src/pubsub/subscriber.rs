//! A subscriber (reader) performing scoped receive-and-ack over a queue.

use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use crate::engine::QueueEngine;
use crate::error::{Error, Result};
use crate::store::Environment;

/// An in-flight received message. `pop` (the ack) runs automatically when
/// this handle is dropped at the end of its scope — on normal exit only.
///
/// # At-least-once, not exactly-once
///
/// If the holding thread panics while a `ReceivedMessage` is alive, `Drop`
/// detects the unwind (`std::thread::panicking()`) and skips the `pop`, so
/// the message remains queued for redelivery (spec.md §4.5, §9). This is
/// the idiomatic replacement for the source's context-managed scope: Rust's
/// ownership model ties the ack to the handle's lifetime without any
/// explicit "commit or abort" call from the caller.
pub struct ReceivedMessage<'a> {
    engine: &'a QueueEngine,
    subscriber_id: String,
    payload: Vec<u8>,
}

impl<'a> ReceivedMessage<'a> {
    fn new(engine: &'a QueueEngine, subscriber_id: String, payload: Vec<u8>) -> Self {
        ReceivedMessage {
            engine,
            subscriber_id,
            payload,
        }
    }

    /// The received payload. Borrowed for the lifetime of this handle; per
    /// spec.md §1 Non-goals, there is no zero-copy access once the handle
    /// (and the read transaction it was built from) is gone.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

impl Deref for ReceivedMessage<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.payload
    }
}

impl Drop for ReceivedMessage<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }
        if let Err(err) = self.engine.pop(&self.subscriber_id) {
            log::warn!("failed to ack message for subscriber {:?}: {err}", self.subscriber_id);
        }
    }
}

/// Reads and acknowledges messages for one subscriber identity.
pub struct Subscriber {
    engine: QueueEngine,
    subscriber_id: String,
    strict: bool,
}

impl Subscriber {
    /// Opens a subscriber. `subscriber_id` must already have been added to
    /// the queue (via `ControlPlane::initialize`/`add_subscriber`).
    pub fn new(store: Arc<Environment>, subscriber_id: impl Into<String>) -> Self {
        Subscriber {
            engine: QueueEngine::new(store),
            subscriber_id: subscriber_id.into(),
            strict: false,
        }
    }

    /// Enables strict mode: `front`/`receive` on an empty sub-database
    /// returns `Error::Empty` instead of `Ok(None)`. `pop` never errors in
    /// either mode (spec.md §7, §9 Open Question 3).
    pub fn with_strict_mode(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    fn empty_result<T>(&self) -> Result<Option<T>> {
        if self.strict {
            Err(Error::Empty(self.subscriber_id.clone()))
        } else {
            Ok(None)
        }
    }

    /// Returns the oldest undelivered payload without consuming it.
    pub fn front(&self) -> Result<Option<Vec<u8>>> {
        match self.engine.front(&self.subscriber_id)? {
            Some(payload) => Ok(Some(payload)),
            None => self.empty_result(),
        }
    }

    /// Receives the oldest undelivered message as a guarded handle. The
    /// message is acked (popped) when the handle is dropped, unless the
    /// holding thread panics first.
    pub fn receive(&self) -> Result<Option<ReceivedMessage<'_>>> {
        match self.engine.front(&self.subscriber_id)? {
            Some(payload) => Ok(Some(ReceivedMessage::new(
                &self.engine,
                self.subscriber_id.clone(),
                payload,
            ))),
            None => self.empty_result(),
        }
    }

    /// Polls `front` up to `retries` times, spaced so the total wait does
    /// not exceed `timeout`. Returns `None` (never `Error::Timeout`, even in
    /// strict mode — timeout is always a typed result per spec.md §7) if no
    /// message arrives in time.
    pub fn receive_timeout(&self, timeout: Duration, retries: u32) -> Result<Option<ReceivedMessage<'_>>> {
        let attempts = retries.max(1);
        let interval = timeout / attempts;
        for attempt in 0..attempts {
            if let Some(payload) = self.engine.front(&self.subscriber_id)? {
                return Ok(Some(ReceivedMessage::new(
                    &self.engine,
                    self.subscriber_id.clone(),
                    payload,
                )));
            }
            if attempt + 1 < attempts {
                std::thread::sleep(interval);
            }
        }
        Ok(None)
    }

    /// Pops messages until only the newest remains, returning it.
    pub fn receive_to_top(&self) -> Result<Option<Vec<u8>>> {
        self.engine.receive_to_top(&self.subscriber_id)
    }
}
