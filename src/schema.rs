//! On-disk names, key layout, and value encodings.
//!
//! Everything in this module is a constant or a pure encode/decode function;
//! none of it opens a transaction. Keeping the wire format isolated here
//! means the `engine` and `control` modules never hand-roll byte layout.

use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

use crate::error::{Error, Result};

/// Name of the sub-database mapping `msg_id -> payload bytes`.
pub const DATA_DB: &str = "data_db";
/// Name of the sub-database mapping `msg_id -> creation timestamp`.
pub const META_DB: &str = "meta_db";
/// Name of the sub-database mapping `msg_id -> pending-count`.
pub const PENDING_DB: &str = "pending_db";
/// Name of the sub-database holding the five queue parameter records.
pub const QUEUE_DB: &str = "queue_db";

/// Parameter-record keys inside `queue_db`. Fixed ASCII strings, process
/// lifetime, never runtime-tunable (the module-level constants the
/// reference implementation mutates at import time become this table).
pub const KEY_MSG_TIMEOUT_SECS: &str = "msg_timeout_secs";
pub const KEY_MAX_MSGS_NUM: &str = "max_msgs_num";
pub const KEY_HWM_DB_SIZE_BYTES: &str = "hwm_db_size_bytes";
pub const KEY_STRATEGY: &str = "strategy";
pub const KEY_SUBSCRIBER_IDS: &str = "subscriber_ids";

/// All five parameter-record keys, for membership/completeness checks.
pub const PARAMETER_KEYS: [&str; 5] = [
    KEY_MSG_TIMEOUT_SECS,
    KEY_MAX_MSGS_NUM,
    KEY_HWM_DB_SIZE_BYTES,
    KEY_STRATEGY,
    KEY_SUBSCRIBER_IDS,
];

/// Default `max_reader_num`, per spec.md §6.
pub const DEFAULT_MAX_READER_NUM: u32 = 1024;
/// Default `max_db_num`, per spec.md §6.
pub const DEFAULT_MAX_DB_NUM: u32 = 1024;
/// Default `max_db_size_bytes` (32 GiB), per spec.md §6.
pub const DEFAULT_MAX_DB_SIZE_BYTES: u64 = 32 * (1 << 30);
/// Default `msg_timeout_secs`, per spec.md §6.
pub const DEFAULT_MSG_TIMEOUT_SECS: u64 = 500;
/// Default `max_msgs_num`, per spec.md §6.
pub const DEFAULT_MAX_MSGS_NUM: u64 = 65536;
/// Default `hwm_db_size_bytes` (30 GiB), per spec.md §6.
pub const DEFAULT_HWM_DB_SIZE_BYTES: u64 = 30 * (1 << 30);

/// Width, in ASCII digits, of the zero-padded timestamp prefix of a
/// `msg_id`. `u64::MAX` is 20 digits; fixing the width makes byte-order
/// comparison agree with temporal order (see SPEC_FULL.md §3).
const TIMESTAMP_WIDTH: usize = 20;

/// Overflow-pruning strategy, selected by the `strategy` parameter record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Delete the lexicographically smallest (oldest) half on overflow.
    PruneFirst,
    /// Delete the lexicographically largest (newest) half on overflow.
    PruneLast,
}

impl Strategy {
    pub const PRUNE_FIRST: &'static str = "prune_first";
    pub const PRUNE_LAST: &'static str = "prune_last";

    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::PruneFirst => Self::PRUNE_FIRST,
            Strategy::PruneLast => Self::PRUNE_LAST,
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            Self::PRUNE_FIRST => Ok(Strategy::PruneFirst),
            Self::PRUNE_LAST => Ok(Strategy::PruneLast),
            other => Err(Error::UnknownStrategy(other.to_string())),
        }
    }
}

/// The high-water-mark triple governing vacuum, read from `queue_db` on
/// every open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighWaterMark {
    pub msg_timeout_secs: u64,
    pub max_msgs_num: u64,
    pub hwm_db_size_bytes: u64,
}

impl Default for HighWaterMark {
    fn default() -> Self {
        HighWaterMark {
            msg_timeout_secs: DEFAULT_MSG_TIMEOUT_SECS,
            max_msgs_num: DEFAULT_MAX_MSGS_NUM,
            hwm_db_size_bytes: DEFAULT_HWM_DB_SIZE_BYTES,
        }
    }
}

/// Returns the current Unix timestamp in whole seconds.
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_secs()
}

/// Builds a fresh, lexicographically-ordered `msg_id` for the given
/// creation timestamp. Each call gets its own UUID, so a `put_many` batch
/// sharing one timestamp still produces distinct, unordered-within-the-batch
/// ids (spec.md §4.3 "no ordering promise across a batch").
pub fn new_msg_id(timestamp_secs: u64) -> String {
    format!("{timestamp_secs:0width$}-{}", Uuid::new_v4(), width = TIMESTAMP_WIDTH)
}

/// Extracts the creation timestamp encoded in a `msg_id`.
///
/// This is a convenience used by tests and diagnostics; the authoritative
/// timestamp for vacuum purposes always comes from `meta_db`, never by
/// re-parsing the id.
pub fn timestamp_of(msg_id: &str) -> Option<u64> {
    msg_id.get(..TIMESTAMP_WIDTH)?.parse().ok()
}

/// Encodes a `u64` as the ASCII decimal format used for `meta_db` and
/// `pending_db` values.
pub fn encode_u64(value: u64) -> Vec<u8> {
    value.to_string().into_bytes()
}

/// Decodes a `meta_db`/`pending_db` value previously written by
/// [`encode_u64`].
pub fn decode_u64(raw: &[u8]) -> Result<u64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::Config("corrupt ASCII-decimal record".to_string()))
}

/// Validates that a subscriber id is safe to store in the space-separated
/// `subscriber_ids` token list: non-empty and free of whitespace, since
/// whitespace is the separator the on-disk encoding relies on (SPEC_FULL.md
/// §4.2). A whitespace-containing id would silently split into two bogus
/// ids on the next decode, corrupting invariant I5.
pub fn validate_subscriber_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::Config("subscriber id must not be empty".to_string()));
    }
    if id.chars().any(char::is_whitespace) {
        return Err(Error::Config(format!(
            "subscriber id {id:?} must not contain whitespace"
        )));
    }
    Ok(())
}

/// Encodes the in-memory subscriber-id set as the on-disk space-separated
/// token list (spec.md §9: on-disk stays space-separated for compatibility).
pub fn encode_subscriber_ids<'a>(ids: impl IntoIterator<Item = &'a str>) -> Vec<u8> {
    let mut ids: Vec<&str> = ids.into_iter().collect();
    ids.sort_unstable();
    ids.join(" ").into_bytes()
}

/// Decodes the on-disk space-separated subscriber-id list into a sorted
/// set. A `BTreeSet` gives both deterministic iteration order and
/// membership testing, so no separate `HashSet` is kept alongside it.
pub fn decode_subscriber_ids(raw: &[u8]) -> Result<std::collections::BTreeSet<String>> {
    let text = std::str::from_utf8(raw)
        .map_err(|_| Error::Config("subscriber_ids is not valid UTF-8".to_string()))?;
    Ok(text.split_whitespace().map(str::to_string).collect())
}
