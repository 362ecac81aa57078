use std::sync::Arc;

use duramq::control::ControlPlane;
use duramq::engine::QueueEngine;
use duramq::store::{Environment, StoreConfig};
use duramq::{HighWaterMark, Strategy};
use tempfile::tempdir;

#[test]
fn add_subscriber_then_remove_it_leaves_no_pending_debt() {
    let dir = tempdir().expect("tempdir");
    let store = Arc::new(Environment::open(dir.path(), StoreConfig::default()).expect("open"));
    let control = ControlPlane::new(store.clone());
    control
        .initialize(&["worker-a"], HighWaterMark::default(), Strategy::PruneFirst)
        .expect("initialize");

    let engine = QueueEngine::new(store.clone());
    control.add_subscriber("worker-b").expect("add subscriber");

    let msg_id = engine.put(b"fanned out", &["worker-a", "worker-b"]).expect("put");
    assert_eq!(engine.pending_count(&msg_id).expect("pending"), Some(2));

    control.remove_subscriber("worker-b").expect("remove subscriber");
    assert_eq!(engine.pending_count(&msg_id).expect("pending"), Some(1));

    engine.pop("worker-a").expect("pop");
    let report = control.prune_dangling_messages().expect("vacuum");
    assert_eq!(report.reclaimed, 1);
    assert_eq!(engine.count_msgs().expect("count"), 0);
}

#[test]
fn clear_all_subscribers_then_vacuum_reclaims_every_message() {
    let dir = tempdir().expect("tempdir");
    let store = Arc::new(Environment::open(dir.path(), StoreConfig::default()).expect("open"));
    let control = ControlPlane::new(store.clone());
    control
        .initialize(&["worker-a", "worker-b"], HighWaterMark::default(), Strategy::PruneFirst)
        .expect("initialize");

    let engine = QueueEngine::new(store);
    engine.put_many(&[b"one", b"two", b"three"], &["worker-a", "worker-b"]).expect("put_many");
    assert_eq!(engine.count_msgs().expect("count"), 3);

    control.clear_all_subscribers().expect("clear");
    let report = control.prune_dangling_messages().expect("vacuum");
    assert_eq!(report.reclaimed, 3);
    assert_eq!(engine.count_msgs().expect("count"), 0);
}
