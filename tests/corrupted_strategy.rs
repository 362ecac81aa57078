use std::sync::Arc;

use duramq::control::ControlPlane;
use duramq::engine::QueueEngine;
use duramq::schema;
use duramq::store::{Environment, StoreConfig};
use duramq::{Error, HighWaterMark, Strategy};
use tempfile::tempdir;

/// Directly corrupts `queue_db.strategy` to a value neither `prune_first`
/// nor `prune_last`, bypassing `Strategy::parse`'s validation the way an
/// externally-edited or bit-rotted on-disk record would.
fn corrupt_strategy_record(store: &Environment) {
    let mut wtxn = store.write_txn().expect("write txn");
    let queue_db = store
        .open_database(&wtxn, schema::QUEUE_DB)
        .expect("open queue_db")
        .expect("queue_db exists");
    queue_db
        .put(&mut wtxn, schema::KEY_STRATEGY.as_bytes(), b"prune_middle")
        .expect("corrupt strategy record");
    wtxn.commit().expect("commit");
}

#[test]
fn put_surfaces_unknown_strategy_from_a_corrupted_record() {
    let dir = tempdir().expect("tempdir");
    let store = Arc::new(Environment::open(dir.path(), StoreConfig::default()).expect("open"));
    ControlPlane::new(store.clone())
        .initialize(&["sub"], HighWaterMark::default(), Strategy::PruneFirst)
        .expect("initialize");

    corrupt_strategy_record(&store);

    let engine = QueueEngine::new(store);
    let err = engine.put(b"payload", &["sub"]).unwrap_err();
    assert!(matches!(err, Error::UnknownStrategy(_)));
}

#[test]
fn vacuum_surfaces_unknown_strategy_from_a_corrupted_record() {
    let dir = tempdir().expect("tempdir");
    let store = Arc::new(Environment::open(dir.path(), StoreConfig::default()).expect("open"));
    ControlPlane::new(store.clone())
        .initialize(&["sub"], HighWaterMark::default(), Strategy::PruneFirst)
        .expect("initialize");

    corrupt_strategy_record(&store);

    let engine = QueueEngine::new(store);
    let err = engine.vacuum().unwrap_err();
    assert!(matches!(err, Error::UnknownStrategy(_)));
}
