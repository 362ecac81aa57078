//! Dangling-message reclamation and high-water-mark overflow pruning.
//!
//! Both passes run inline inside the caller's write transaction — vacuum
//! has no side effects outside it, so a caller that aborts its transaction
//! (an error partway through `put`) undoes any reclamation vacuum already
//! staged. This is what spec.md §7 means by "vacuum failures inside a
//! publisher's put abort the whole put (atomic)".

use std::collections::BTreeSet;

use heed::RwTxn;

use crate::error::Result;
use crate::schema::{self, HighWaterMark, Strategy};
use crate::store::Environment;

/// Outcome of one `vacuum()` pass, surfaced to callers so overflow-pruned
/// (not-yet-delivered) messages are observable rather than silently gone
/// (SPEC_FULL.md §9, Open Question on reporting dropped messages).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VacuumReport {
    /// Messages removed because they were dangling (pending=0 or timed out).
    pub reclaimed: usize,
    /// Messages removed by high-water-mark overflow pruning.
    pub pruned: usize,
}

impl VacuumReport {
    fn merge(self, other: VacuumReport) -> VacuumReport {
        VacuumReport {
            reclaimed: self.reclaimed + other.reclaimed,
            pruned: self.pruned + other.pruned,
        }
    }
}

/// Runs both vacuum steps: dangling reclamation, then overflow pruning.
/// Idempotent (P6): running this twice with no intervening write leaves
/// state bit-identical, because the second pass finds nothing left to
/// reclaim or prune.
pub fn vacuum(
    store: &Environment,
    wtxn: &mut RwTxn<'_>,
    hwm: &HighWaterMark,
    strategy: Strategy,
    subscriber_ids: &BTreeSet<String>,
) -> Result<VacuumReport> {
    let reclaimed = reclaim_dangling(store, wtxn, hwm, subscriber_ids)?;
    let pruned = prune_overflow(store, wtxn, hwm, strategy, subscriber_ids)?;
    Ok(reclaimed.merge(pruned))
}

/// Step 1: delete every message whose `pending_db` entry is 0, union'd with
/// every message whose age (per `meta_db`, never `pending_db`) exceeds
/// `msg_timeout_secs`. spec.md §9 mandates the `meta_db` cursor for the
/// timeout scan; scanning `pending_db` for ages would reproduce the
/// reference implementation's known bug.
fn reclaim_dangling(
    store: &Environment,
    wtxn: &mut RwTxn<'_>,
    hwm: &HighWaterMark,
    subscriber_ids: &BTreeSet<String>,
) -> Result<VacuumReport> {
    let mut dangling: BTreeSet<Vec<u8>> = BTreeSet::new();

    if let Some(pending_db) = store.open_database(wtxn, schema::PENDING_DB)? {
        for entry in pending_db.iter(wtxn)? {
            let (msg_id, raw_count) = entry?;
            if schema::decode_u64(raw_count)? == 0 {
                dangling.insert(msg_id.to_vec());
            }
        }
    }

    if let Some(meta_db) = store.open_database(wtxn, schema::META_DB)? {
        let now = schema::now_secs();
        for entry in meta_db.iter(wtxn)? {
            let (msg_id, raw_ts) = entry?;
            let created_at = schema::decode_u64(raw_ts)?;
            if now.saturating_sub(created_at) > hwm.msg_timeout_secs {
                dangling.insert(msg_id.to_vec());
            }
        }
    }

    for msg_id in &dangling {
        delete_message(store, wtxn, subscriber_ids, msg_id)?;
    }

    Ok(VacuumReport {
        reclaimed: dangling.len(),
        pruned: 0,
    })
}

/// Step 2: if the live message count or approximate data size has reached
/// its high-water mark, delete the configured strategy's half of `meta_db`'s
/// keys (in key order, ties broken by KVS key order, i.e. by `msg_id`).
/// Ignores pending counts entirely — this is a backpressure release valve,
/// not a correctness mechanism (spec.md §4.3).
fn prune_overflow(
    store: &Environment,
    wtxn: &mut RwTxn<'_>,
    hwm: &HighWaterMark,
    strategy: Strategy,
    subscriber_ids: &BTreeSet<String>,
) -> Result<VacuumReport> {
    let meta_db = match store.open_database(wtxn, schema::META_DB)? {
        Some(db) => db,
        None => return Ok(VacuumReport::default()),
    };

    let count = meta_db.len(wtxn)?;
    let size = store.approximate_size_bytes(wtxn)?;
    if count < hwm.max_msgs_num && size < hwm.hwm_db_size_bytes {
        return Ok(VacuumReport::default());
    }

    let mut keys: Vec<Vec<u8>> = meta_db
        .iter(wtxn)?
        .map(|entry| entry.map(|(k, _)| k.to_vec()))
        .collect::<std::result::Result<Vec<Vec<u8>>, heed::Error>>()?;
    keys.sort();

    let half = keys.len().div_ceil(2);
    let victims: Vec<Vec<u8>> = match strategy {
        Strategy::PruneFirst => keys.into_iter().take(half).collect(),
        Strategy::PruneLast => {
            keys.reverse();
            keys.into_iter().take(half).collect()
        }
    };

    for msg_id in &victims {
        delete_message(store, wtxn, subscriber_ids, msg_id)?;
    }

    Ok(VacuumReport {
        reclaimed: 0,
        pruned: victims.len(),
    })
}

/// Removes `msg_id` from `data_db`, `meta_db`, `pending_db`, and every
/// per-subscriber sub-database that might still hold it. Missing entries
/// (already gone from a given sub-database) are not an error.
pub(super) fn delete_message(
    store: &Environment,
    wtxn: &mut RwTxn<'_>,
    subscriber_ids: &BTreeSet<String>,
    msg_id: &[u8],
) -> Result<()> {
    if let Some(db) = store.open_database(wtxn, schema::DATA_DB)? {
        db.delete(wtxn, msg_id)?;
    }
    if let Some(db) = store.open_database(wtxn, schema::META_DB)? {
        db.delete(wtxn, msg_id)?;
    }
    if let Some(db) = store.open_database(wtxn, schema::PENDING_DB)? {
        db.delete(wtxn, msg_id)?;
    }
    for subscriber_id in subscriber_ids {
        if let Some(sub_db) = store.open_database(wtxn, subscriber_id)? {
            sub_db.delete(wtxn, msg_id)?;
        }
    }
    Ok(())
}
