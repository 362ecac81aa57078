//! Control Plane: (re)initialize queue parameters, add/remove subscribers,
//! clear/prune administratively (spec.md §4.4).

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::engine::{QueueEngine, VacuumReport};
use crate::error::{Error, Result};
use crate::schema::{self, HighWaterMark, Strategy};
use crate::store::Environment;

/// Administrative operations over one queue directory. Unlike `QueueEngine`,
/// these are not hot-path operations and always run in their own write
/// transaction to completion or fail atomically (spec.md §5).
pub struct ControlPlane {
    store: Arc<Environment>,
}

impl ControlPlane {
    pub fn new(store: Arc<Environment>) -> Self {
        ControlPlane { store }
    }

    /// Creates every required sub-database and writes the five parameter
    /// records. Idempotent: calling this again against an already
    /// initialized directory re-asserts the same values rather than
    /// erroring (SPEC_FULL.md §4.4) — it does not merge with whatever is
    /// already on disk.
    pub fn initialize(
        &self,
        subscriber_ids: &[&str],
        hwm: HighWaterMark,
        strategy: Strategy,
    ) -> Result<()> {
        for subscriber_id in subscriber_ids {
            schema::validate_subscriber_id(subscriber_id)?;
        }

        let mut wtxn = self.store.write_txn()?;

        self.store.create_database(&mut wtxn, schema::DATA_DB)?;
        self.store.create_database(&mut wtxn, schema::META_DB)?;
        self.store.create_database(&mut wtxn, schema::PENDING_DB)?;
        let queue_db = self.store.create_database(&mut wtxn, schema::QUEUE_DB)?;
        for subscriber_id in subscriber_ids {
            self.store.create_database(&mut wtxn, subscriber_id)?;
        }

        queue_db.put(
            &mut wtxn,
            schema::KEY_MSG_TIMEOUT_SECS.as_bytes(),
            &schema::encode_u64(hwm.msg_timeout_secs),
        )?;
        queue_db.put(
            &mut wtxn,
            schema::KEY_MAX_MSGS_NUM.as_bytes(),
            &schema::encode_u64(hwm.max_msgs_num),
        )?;
        queue_db.put(
            &mut wtxn,
            schema::KEY_HWM_DB_SIZE_BYTES.as_bytes(),
            &schema::encode_u64(hwm.hwm_db_size_bytes),
        )?;
        queue_db.put(&mut wtxn, schema::KEY_STRATEGY.as_bytes(), strategy.as_str().as_bytes())?;
        queue_db.put(
            &mut wtxn,
            schema::KEY_SUBSCRIBER_IDS.as_bytes(),
            &schema::encode_subscriber_ids(subscriber_ids.iter().copied()),
        )?;

        wtxn.commit()?;
        log::info!("initialized queue with {} subscriber(s)", subscriber_ids.len());
        Ok(())
    }

    /// Adds a subscriber: creates its sub-database and appends it to
    /// `queue_db.subscriber_ids`. Only messages published after this call
    /// are visible to it — there is no retroactive delivery (spec.md §4.4).
    pub fn add_subscriber(&self, subscriber_id: &str) -> Result<()> {
        schema::validate_subscriber_id(subscriber_id)?;

        let mut wtxn = self.store.write_txn()?;
        let queue_db = self
            .store
            .open_database(&wtxn, schema::QUEUE_DB)?
            .ok_or_else(|| Error::NotInitialized(schema::QUEUE_DB.to_string()))?;

        let mut ids = read_subscriber_ids(&queue_db, &wtxn)?;
        ids.insert(subscriber_id.to_string());

        self.store.create_database(&mut wtxn, subscriber_id)?;
        queue_db.put(
            &mut wtxn,
            schema::KEY_SUBSCRIBER_IDS.as_bytes(),
            &schema::encode_subscriber_ids(ids.iter().map(String::as_str)),
        )?;

        wtxn.commit()?;
        log::info!("added subscriber {subscriber_id:?}");
        Ok(())
    }

    /// Removes a subscriber: drops its sub-database, decrements
    /// `pending_db` for every message it still held, and removes it from
    /// `queue_db.subscriber_ids`.
    pub fn remove_subscriber(&self, subscriber_id: &str) -> Result<()> {
        let mut wtxn = self.store.write_txn()?;
        let queue_db = self
            .store
            .open_database(&wtxn, schema::QUEUE_DB)?
            .ok_or_else(|| Error::NotInitialized(schema::QUEUE_DB.to_string()))?;

        let mut ids = read_subscriber_ids(&queue_db, &wtxn)?;
        ids.remove(subscriber_id);

        if let Some(sub_db) = self.store.open_database(&wtxn, subscriber_id)? {
            let held: Vec<Vec<u8>> = sub_db
                .iter(&wtxn)?
                .map(|entry| entry.map(|(k, _)| k.to_vec()))
                .collect::<std::result::Result<_, heed::Error>>()?;

            if let Some(pending_db) = self.store.open_database(&wtxn, schema::PENDING_DB)? {
                for msg_id in &held {
                    let current = match pending_db.get(&wtxn, msg_id)? {
                        Some(raw) => schema::decode_u64(raw)?,
                        None => 0,
                    };
                    pending_db.put(&mut wtxn, msg_id, &schema::encode_u64(current.saturating_sub(1)))?;
                }
            }
            for msg_id in &held {
                sub_db.delete(&mut wtxn, msg_id)?;
            }
        }

        queue_db.put(
            &mut wtxn,
            schema::KEY_SUBSCRIBER_IDS.as_bytes(),
            &schema::encode_subscriber_ids(ids.iter().map(String::as_str)),
        )?;

        wtxn.commit()?;
        log::info!("removed subscriber {subscriber_id:?}");
        Ok(())
    }

    /// Empties every per-subscriber sub-database and zeroes `pending_db`.
    /// Does not itself remove anything from `data_db`/`meta_db` — a
    /// subsequent vacuum reclaims the now-dangling (pending=0) messages.
    pub fn clear_all_subscribers(&self) -> Result<()> {
        let mut wtxn = self.store.write_txn()?;
        let queue_db = self
            .store
            .open_database(&wtxn, schema::QUEUE_DB)?
            .ok_or_else(|| Error::NotInitialized(schema::QUEUE_DB.to_string()))?;
        let ids = read_subscriber_ids(&queue_db, &wtxn)?;

        for subscriber_id in &ids {
            if let Some(sub_db) = self.store.open_database(&wtxn, subscriber_id)? {
                sub_db.clear(&mut wtxn)?;
            }
        }
        if let Some(pending_db) = self.store.open_database(&wtxn, schema::PENDING_DB)? {
            pending_db.clear(&mut wtxn)?;
        }

        wtxn.commit()?;
        log::info!("cleared {} subscriber sub-database(s)", ids.len());
        Ok(())
    }

    /// Runs vacuum's dangling-reclamation step explicitly (spec.md §4.4).
    pub fn prune_dangling_messages(&self) -> Result<VacuumReport> {
        QueueEngine::new(self.store.clone()).vacuum()
    }

    /// True iff all five parameter records exist in `queue_db`.
    pub fn check_queue_is_initialized(&self) -> Result<bool> {
        let rtxn = self.store.read_txn()?;
        let queue_db = match self.store.open_database(&rtxn, schema::QUEUE_DB)? {
            Some(db) => db,
            None => return Ok(false),
        };
        for key in schema::PARAMETER_KEYS {
            if queue_db.get(&rtxn, key.as_bytes())?.is_none() {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

fn read_subscriber_ids(
    queue_db: &crate::store::KvDatabase,
    rtxn: &heed::RoTxn<'_>,
) -> Result<BTreeSet<String>> {
    let raw = queue_db
        .get(rtxn, schema::KEY_SUBSCRIBER_IDS.as_bytes())?
        .ok_or_else(|| Error::NotInitialized(schema::KEY_SUBSCRIBER_IDS.to_string()))?;
    schema::decode_subscriber_ids(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> ControlPlane {
        let store = Arc::new(Environment::open(dir.path(), crate::store::StoreConfig::default()).unwrap());
        ControlPlane::new(store)
    }

    #[test]
    fn initialize_rejects_a_whitespace_subscriber_id() {
        let dir = TempDir::new().unwrap();
        let control = open(&dir);
        let err = control
            .initialize(&["worker a"], HighWaterMark::default(), Strategy::PruneFirst)
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(!control.check_queue_is_initialized().unwrap());
    }

    #[test]
    fn add_subscriber_rejects_a_whitespace_subscriber_id() {
        let dir = TempDir::new().unwrap();
        let control = open(&dir);
        control
            .initialize(&["sub"], HighWaterMark::default(), Strategy::PruneFirst)
            .unwrap();
        let err = control.add_subscriber("bad id").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn check_queue_is_initialized_reflects_state() {
        let dir = TempDir::new().unwrap();
        let control = open(&dir);
        assert!(!control.check_queue_is_initialized().unwrap());

        control
            .initialize(&["sub"], HighWaterMark::default(), Strategy::PruneFirst)
            .unwrap();
        assert!(control.check_queue_is_initialized().unwrap());
    }

    #[test]
    fn initialize_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let control = open(&dir);
        control
            .initialize(&["sub"], HighWaterMark::default(), Strategy::PruneFirst)
            .unwrap();
        control
            .initialize(&["sub"], HighWaterMark::default(), Strategy::PruneFirst)
            .unwrap();
        assert!(control.check_queue_is_initialized().unwrap());
    }

    #[test]
    fn add_subscriber_does_not_see_past_messages() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(Environment::open(dir.path(), crate::store::StoreConfig::default()).unwrap());
        let control = ControlPlane::new(store.clone());
        control
            .initialize(&["sub1"], HighWaterMark::default(), Strategy::PruneFirst)
            .unwrap();

        let engine = QueueEngine::new(store.clone());
        engine.put(b"before sub2 joined", &["sub1"]).unwrap();

        control.add_subscriber("sub2").unwrap();
        assert_eq!(engine.front("sub2").unwrap(), None);
    }

    #[test]
    fn remove_subscriber_decrements_pending_for_its_messages() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(Environment::open(dir.path(), crate::store::StoreConfig::default()).unwrap());
        let control = ControlPlane::new(store.clone());
        control
            .initialize(&["sub1", "sub2"], HighWaterMark::default(), Strategy::PruneFirst)
            .unwrap();

        let engine = QueueEngine::new(store.clone());
        let msg_id = engine.put(b"hi", &["sub1", "sub2"]).unwrap();
        assert_eq!(engine.pending_count(&msg_id).unwrap(), Some(2));

        control.remove_subscriber("sub2").unwrap();
        assert_eq!(engine.pending_count(&msg_id).unwrap(), Some(1));
    }

    #[test]
    fn clear_all_subscribers_lets_vacuum_reclaim() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(Environment::open(dir.path(), crate::store::StoreConfig::default()).unwrap());
        let control = ControlPlane::new(store.clone());
        control
            .initialize(&["sub"], HighWaterMark::default(), Strategy::PruneFirst)
            .unwrap();

        let engine = QueueEngine::new(store.clone());
        engine.put(b"hi", &["sub"]).unwrap();

        control.clear_all_subscribers().unwrap();
        let report = control.prune_dangling_messages().unwrap();
        assert_eq!(report.reclaimed, 1);
    }
}
