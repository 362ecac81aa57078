//! A persistent, process-safe publish/subscribe message queue for local IPC,
//! backed by an embedded ordered key-value store.
//!
//! # Layout
//!
//! - [`store`] — the Store Adapter: a thin safe wrapper over the KVS.
//! - [`schema`] — on-disk names, key layout, and value encodings.
//! - [`engine`] — the Queue Engine: `put`/`front`/`pop`/vacuum.
//! - [`control`] — the Control Plane: initialize/add/remove subscribers.
//! - [`pubsub`] — [`Publisher`]/[`Subscriber`] façades over the engine.
//! - [`registry`] — the process-wide Environment Factory.
//! - [`config`] — JSON deployment configuration.
//!
//! Most applications only need [`registry::open`], [`control::ControlPlane`],
//! and the [`pubsub`] façades; [`engine`] and [`store`] are exposed for
//! callers that need lower-level access (administrative tooling, the
//! `queue-ctl` binary).

pub mod config;
pub mod control;
pub mod engine;
pub mod error;
pub mod pubsub;
pub mod registry;
pub mod schema;
pub mod store;

pub use control::ControlPlane;
pub use error::{Error, Result};
pub use pubsub::{Publisher, ReceivedMessage, Subscriber};
pub use schema::{HighWaterMark, Strategy};
pub use store::{Environment, StoreConfig};
