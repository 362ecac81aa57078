//! Publisher / Subscriber façades over the Queue Engine (spec.md §4.5).
//!
//! These are thin, intent-revealing wrappers: `Publisher` only writes,
//! `Subscriber` only reads-and-acks. Neither holds any state the Queue
//! Engine doesn't already own — they exist so application code reads as
//! "publish this" / "receive one" rather than juggling subscriber-id lists
//! and `front`/`pop` pairs by hand.

mod publisher;
mod subscriber;

pub use publisher::Publisher;
pub use subscriber::{ReceivedMessage, Subscriber};
