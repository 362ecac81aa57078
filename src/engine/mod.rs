//! Queue Engine: `put`, `put_many`, `front`, `pop`, pending-count
//! bookkeeping, and vacuum. This is the hard engineering core spec.md
//! assigns the largest budget share to — everything else in this crate is
//! a façade or collaborator around it.

mod vacuum;

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::schema::{self, HighWaterMark, Strategy};
use crate::store::Environment;

pub use vacuum::VacuumReport;

/// Parameters read from `queue_db` at the start of an operation. Unlike
/// `HighWaterMark`/`Strategy`, the subscriber set can change between calls
/// (another process may `add_subscriber`/`remove_subscriber`), so this is
/// re-read per transaction rather than cached for the engine's lifetime.
struct Parameters {
    hwm: HighWaterMark,
    strategy: Strategy,
    subscriber_ids: BTreeSet<String>,
}

fn load_parameters(store: &Environment, rtxn: &heed::RoTxn<'_>) -> Result<Parameters> {
    let queue_db = store
        .open_database(rtxn, schema::QUEUE_DB)?
        .ok_or_else(|| Error::NotInitialized("queue_db".to_string()))?;

    let read_u64 = |key: &str| -> Result<u64> {
        let raw = queue_db
            .get(rtxn, key.as_bytes())?
            .ok_or_else(|| Error::NotInitialized(key.to_string()))?;
        schema::decode_u64(raw)
    };

    let hwm = HighWaterMark {
        msg_timeout_secs: read_u64(schema::KEY_MSG_TIMEOUT_SECS)?,
        max_msgs_num: read_u64(schema::KEY_MAX_MSGS_NUM)?,
        hwm_db_size_bytes: read_u64(schema::KEY_HWM_DB_SIZE_BYTES)?,
    };

    let strategy_raw = queue_db
        .get(rtxn, schema::KEY_STRATEGY.as_bytes())?
        .ok_or_else(|| Error::NotInitialized(schema::KEY_STRATEGY.to_string()))?;
    let strategy = Strategy::parse(std::str::from_utf8(strategy_raw).unwrap_or(""))?;

    let subscriber_ids_raw = queue_db
        .get(rtxn, schema::KEY_SUBSCRIBER_IDS.as_bytes())?
        .ok_or_else(|| Error::NotInitialized(schema::KEY_SUBSCRIBER_IDS.to_string()))?;
    let subscriber_ids = schema::decode_subscriber_ids(subscriber_ids_raw)?;

    Ok(Parameters {
        hwm,
        strategy,
        subscriber_ids,
    })
}

/// The Queue Engine: owns no state beyond a handle to the Store Adapter.
/// All durable state lives in the KVS; this type is cheap to clone-by-`Arc`
/// and safe to share across threads of one process.
pub struct QueueEngine {
    store: Arc<Environment>,
}

impl QueueEngine {
    pub fn new(store: Arc<Environment>) -> Self {
        QueueEngine { store }
    }

    /// Publishes one message to the given subscribers, running vacuum
    /// first in the same write transaction (spec.md §4.3). Returns the
    /// freshly assigned `msg_id`.
    pub fn put(&self, payload: &[u8], subscriber_ids: &[&str]) -> Result<String> {
        let mut ids = self.put_many(&[payload], subscriber_ids)?;
        Ok(ids.pop().expect("put_many returns exactly one id per payload"))
    }

    /// Publishes a batch of messages sharing one creation timestamp, each
    /// with its own UUID, all within a single write transaction (spec.md
    /// §4.3). No ordering is promised across the batch.
    pub fn put_many(&self, payloads: &[&[u8]], subscriber_ids: &[&str]) -> Result<Vec<String>> {
        let mut wtxn = self.store.write_txn()?;
        let params = load_parameters(&self.store, &wtxn)?;

        let report = vacuum::vacuum(&self.store, &mut wtxn, &params.hwm, params.strategy, &params.subscriber_ids)?;
        if report.reclaimed > 0 || report.pruned > 0 {
            log::info!(
                "vacuum reclaimed {} dangling and pruned {} overflow messages before put",
                report.reclaimed,
                report.pruned
            );
        }

        let data_db = self.store.create_database(&mut wtxn, schema::DATA_DB)?;
        let meta_db = self.store.create_database(&mut wtxn, schema::META_DB)?;
        let pending_db = self.store.create_database(&mut wtxn, schema::PENDING_DB)?;

        let timestamp = schema::now_secs();
        let mut msg_ids = Vec::with_capacity(payloads.len());

        for payload in payloads {
            let msg_id = schema::new_msg_id(timestamp);

            data_db.put(&mut wtxn, msg_id.as_bytes(), payload)?;
            meta_db.put(&mut wtxn, msg_id.as_bytes(), &schema::encode_u64(timestamp))?;
            pending_db.put(
                &mut wtxn,
                msg_id.as_bytes(),
                &schema::encode_u64(subscriber_ids.len() as u64),
            )?;
            for subscriber_id in subscriber_ids {
                let sub_db = self.store.create_database(&mut wtxn, subscriber_id)?;
                sub_db.put(&mut wtxn, msg_id.as_bytes(), b"")?;
            }

            log::debug!("published {msg_id} to {} subscriber(s)", subscriber_ids.len());
            msg_ids.push(msg_id);
        }

        wtxn.commit()?;
        Ok(msg_ids)
    }

    /// Returns the oldest undelivered payload for `subscriber_id`, without
    /// removing it. `None` if the subscriber's sub-database is empty, or if
    /// the referenced message was already reclaimed by a concurrent vacuum
    /// (spec.md §4.3: treat as already-reclaimed, caller should retry).
    pub fn front(&self, subscriber_id: &str) -> Result<Option<Vec<u8>>> {
        let rtxn = self.store.read_txn()?;
        let sub_db = match self.store.open_database(&rtxn, subscriber_id)? {
            Some(db) => db,
            None => return Ok(None),
        };
        let msg_id = match sub_db.first(&rtxn)? {
            Some((msg_id, _)) => msg_id.to_vec(),
            None => return Ok(None),
        };
        let data_db = match self.store.open_database(&rtxn, schema::DATA_DB)? {
            Some(db) => db,
            None => return Ok(None),
        };
        Ok(data_db.get(&rtxn, &msg_id)?.map(|payload| payload.to_vec()))
    }

    /// Removes the oldest entry from `subscriber_id`'s sub-database and
    /// decrements `pending_db` for that message (floored at 0). A no-op,
    /// not an error, if the subscriber's sub-database is already empty.
    pub fn pop(&self, subscriber_id: &str) -> Result<()> {
        let mut wtxn = self.store.write_txn()?;
        let sub_db = match self.store.open_database(&wtxn, subscriber_id)? {
            Some(db) => db,
            None => return Ok(()),
        };
        let msg_id = match sub_db.first(&wtxn)? {
            Some((msg_id, _)) => msg_id.to_vec(),
            None => return Ok(()),
        };
        sub_db.delete(&mut wtxn, &msg_id)?;

        if let Some(pending_db) = self.store.open_database(&wtxn, schema::PENDING_DB)? {
            let current = match pending_db.get(&wtxn, &msg_id)? {
                Some(raw) => schema::decode_u64(raw)?,
                None => 0,
            };
            let next = current.saturating_sub(1);
            pending_db.put(&mut wtxn, &msg_id, &schema::encode_u64(next))?;
        }

        wtxn.commit()?;
        Ok(())
    }

    /// Pops messages until at most one remains queued for `subscriber_id`,
    /// then returns that last payload via `front` (spec.md §4.3/§8 scenario 6).
    pub fn receive_to_top(&self, subscriber_id: &str) -> Result<Option<Vec<u8>>> {
        loop {
            let remaining = {
                let rtxn = self.store.read_txn()?;
                match self.store.open_database(&rtxn, subscriber_id)? {
                    Some(db) => db.len(&rtxn)?,
                    None => 0,
                }
            };
            if remaining <= 1 {
                break;
            }
            self.pop(subscriber_id)?;
        }
        self.front(subscriber_id)
    }

    /// Number of live messages (entries in `meta_db`). Supplements the
    /// distilled spec's untyped "count_msgs()" reference in §8 scenario 3.
    pub fn count_msgs(&self) -> Result<u64> {
        let rtxn = self.store.read_txn()?;
        match self.store.open_database(&rtxn, schema::META_DB)? {
            Some(db) => Ok(db.len(&rtxn)?),
            None => Ok(0),
        }
    }

    /// Reads a single message's pending-count without mutating it.
    pub fn pending_count(&self, msg_id: &str) -> Result<Option<u64>> {
        let rtxn = self.store.read_txn()?;
        let pending_db = match self.store.open_database(&rtxn, schema::PENDING_DB)? {
            Some(db) => db,
            None => return Ok(None),
        };
        match pending_db.get(&rtxn, msg_id.as_bytes())? {
            Some(raw) => Ok(Some(schema::decode_u64(raw)?)),
            None => Ok(None),
        }
    }

    /// Runs both vacuum steps explicitly, outside of a `put` (used by
    /// `control::prune_dangling_messages` and by administrative tooling).
    pub fn vacuum(&self) -> Result<VacuumReport> {
        let mut wtxn = self.store.write_txn()?;
        let params = load_parameters(&self.store, &wtxn)?;
        let report = vacuum::vacuum(&self.store, &mut wtxn, &params.hwm, params.strategy, &params.subscriber_ids)?;
        wtxn.commit()?;
        Ok(report)
    }

}
