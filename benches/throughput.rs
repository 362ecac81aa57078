use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use tempfile::tempdir;

use duramq::control::ControlPlane;
use duramq::engine::QueueEngine;
use duramq::schema::{HighWaterMark, Strategy};
use duramq::store::{Environment, StoreConfig};

const MSG_SIZE: usize = 256;
const BATCH: usize = 1_000;

fn open_engine(subscribers: &[&str]) -> (tempfile::TempDir, QueueEngine) {
    let dir = tempdir().expect("tempdir");
    let store = Arc::new(Environment::open(dir.path(), StoreConfig::default()).expect("open"));
    ControlPlane::new(store.clone())
        .initialize(subscribers, HighWaterMark::default(), Strategy::PruneFirst)
        .expect("initialize");
    (dir, QueueEngine::new(store))
}

fn bench_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("put");
    group.throughput(Throughput::Elements(BATCH as u64));

    group.bench_function("single_subscriber", |b| {
        let (_dir, engine) = open_engine(&["bench_reader"]);
        let payload = vec![0u8; MSG_SIZE];

        b.iter(|| {
            for _ in 0..BATCH {
                engine.put(black_box(&payload), &["bench_reader"]).expect("put");
            }
        });
    });
    group.finish();
}

fn bench_put_front_pop(c: &mut Criterion) {
    let mut group = c.benchmark_group("put_front_pop");
    group.measurement_time(Duration::from_secs(10));
    group.throughput(Throughput::Elements(BATCH as u64));

    group.bench_function("single_subscriber", |b| {
        let (_dir, engine) = open_engine(&["bench_reader"]);
        let payload = vec![0u8; MSG_SIZE];

        b.iter(|| {
            for _ in 0..BATCH {
                engine.put(black_box(&payload), &["bench_reader"]).expect("put");
            }
            for _ in 0..BATCH {
                black_box(engine.front("bench_reader").expect("front"));
                engine.pop("bench_reader").expect("pop");
            }
        });
    });
    group.finish();
}

fn bench_broadcast_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("broadcast_fanout");
    group.throughput(Throughput::Elements(BATCH as u64));

    let subscribers: Vec<&str> = vec!["a", "b", "c", "d", "e", "f", "g", "h"];
    group.bench_function("8_subscribers", |b| {
        let (_dir, engine) = open_engine(&subscribers);
        let payload = vec![0u8; MSG_SIZE];

        b.iter(|| {
            for _ in 0..BATCH {
                engine.put(black_box(&payload), &subscribers).expect("put");
            }
        });
    });
    group.finish();
}

criterion_group!(benches, bench_put, bench_put_front_pop, bench_broadcast_fanout);
criterion_main!(benches);
