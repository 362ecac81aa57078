//! Store Adapter: a thin, safe abstraction over the KVS (`heed`, an LMDB
//! binding) exposing exactly what the Queue Engine needs — named
//! sub-databases, read/write transactions, get/put/delete, and ordered
//! cursor walks — and nothing else.
//!
//! # Guarantees this module relies on (and never re-implements)
//!
//! - Single writer at a time across processes (LMDB's writer lock).
//! - Readers never block writers and vice versa (MVCC).
//! - A committed write transaction is durable; an uncommitted one leaks no
//!   persistent state (heed aborts `RwTxn` on `Drop` if never committed).
//! - Cursor/iterator results borrow from their transaction and cannot
//!   outlive it — Rust's borrow checker enforces this for free, which is
//!   the idiomatic replacement for the source's "implicit transactional
//!   scoping" idiom (see SPEC_FULL.md §9).

use std::path::Path;

use heed::types::Bytes;
use heed::{Database, EnvOpenOptions};

use crate::error::Result;

pub use heed::{Env, RoTxn, RwTxn};

/// A `msg_id -> bytes` sub-database. Every sub-database in this schema
/// shares this shape: `data_db`/`meta_db`/`pending_db` store a value,
/// per-subscriber sub-databases store an empty value.
pub type KvDatabase = Database<Bytes, Bytes>;

/// Parameters used to open an [`Environment`] (spec.md §4.1/§6).
#[derive(Debug, Clone, Copy)]
pub struct StoreConfig {
    pub max_dbs: u32,
    pub max_readers: u32,
    pub map_size_bytes: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            max_dbs: crate::schema::DEFAULT_MAX_DB_NUM,
            max_readers: crate::schema::DEFAULT_MAX_READER_NUM,
            map_size_bytes: crate::schema::DEFAULT_MAX_DB_SIZE_BYTES as usize,
        }
    }
}

/// A process-local handle onto one on-disk queue directory.
///
/// Exactly one live `Environment` may exist per queue per process (the
/// `registry` module enforces this at a higher level); `Environment` itself
/// only wraps the KVS handle.
pub struct Environment {
    env: Env,
}

impl Environment {
    /// Opens (creating if absent) the KVS environment rooted at `path`.
    ///
    /// # Safety contract
    ///
    /// LMDB requires that an environment not be opened from two handles in
    /// the same process with conflicting memory maps; `heed::EnvOpenOptions::open`
    /// is `unsafe` for this reason. The `registry` module is the only
    /// sanctioned caller, and it upholds the one-environment-per-process
    /// rule before reaching here.
    pub fn open(path: impl AsRef<Path>, config: StoreConfig) -> Result<Self> {
        std::fs::create_dir_all(&path)?;
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(config.map_size_bytes)
                .max_dbs(config.max_dbs)
                .max_readers(config.max_readers)
                .open(path)?
        };
        Ok(Environment { env })
    }

    /// Begins a read-only transaction. Never blocks on a concurrent writer.
    pub fn read_txn(&self) -> Result<RoTxn<'_>> {
        Ok(self.env.read_txn()?)
    }

    /// Begins a write transaction. Blocks until any other writer (in this
    /// process or another) commits or aborts.
    pub fn write_txn(&self) -> Result<RwTxn<'_>> {
        Ok(self.env.write_txn()?)
    }

    /// Opens (creating if absent, within `wtxn`) a named sub-database.
    pub fn create_database(&self, wtxn: &mut RwTxn<'_>, name: &str) -> Result<KvDatabase> {
        Ok(self.env.create_database(wtxn, Some(name))?)
    }

    /// Opens a named sub-database for reading. Returns `Ok(None)` if it
    /// does not exist yet (e.g. a subscriber that was never added).
    pub fn open_database(&self, rtxn: &RoTxn<'_>, name: &str) -> Result<Option<KvDatabase>> {
        Ok(self.env.open_database(rtxn, Some(name))?)
    }

    /// Approximate current on-disk data size: KVS page size times the
    /// number of pages in active use (spec.md §4.3 step 2).
    pub fn approximate_size_bytes(&self, rtxn: &RoTxn<'_>) -> Result<u64> {
        let stat = self.env.stat()?;
        let pages = stat.branch_pages + stat.leaf_pages + stat.overflow_pages;
        let _ = rtxn; // stats are environment-wide, but we take rtxn to keep this call MVCC-consistent with the caller's view
        Ok((pages as u64) * (stat.page_size as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn open_create_database_and_roundtrip_a_value() {
        let dir = TempDir::new().unwrap();
        let env = Environment::open(dir.path(), StoreConfig::default()).unwrap();

        let mut wtxn = env.write_txn().unwrap();
        let db = env.create_database(&mut wtxn, "data_db").unwrap();
        db.put(&mut wtxn, b"k1", b"v1").unwrap();
        wtxn.commit().unwrap();

        let rtxn = env.read_txn().unwrap();
        let db = env.open_database(&rtxn, "data_db").unwrap().unwrap();
        assert_eq!(db.get(&rtxn, b"k1").unwrap(), Some(&b"v1"[..]));
    }

    #[test]
    fn open_database_missing_returns_none() {
        let dir = TempDir::new().unwrap();
        let env = Environment::open(dir.path(), StoreConfig::default()).unwrap();
        let rtxn = env.read_txn().unwrap();
        assert!(env.open_database(&rtxn, "nope").unwrap().is_none());
    }
}
