#![forbid(unsafe_code)]

use ct_storage::{JobStore, REPLICATION_COUNTER};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(test_name: &str) -> PathBuf {
    let nonce = SystemTime::now().duration_since(UNIX_EPOCH).expect("clock").as_nanos();
    let dir = std::env::temp_dir().join(format!("ct_{}_{}_{}", test_name, std::process::id(), nonce));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

#[test]
fn counter_starts_at_zero_and_returns_pre_increment_values() {
    let dir = temp_dir("counter_basic");
    let store = JobStore::open(dir.join("agent.db")).expect("open store");

    for expected in 0..5 {
        let value = store.get_and_increment_counter(REPLICATION_COUNTER).expect("increment");
        assert_eq!(value, expected);
    }
}

#[test]
fn counters_are_independent_per_name() {
    let dir = temp_dir("counter_names");
    let store = JobStore::open(dir.join("agent.db")).expect("open store");

    assert_eq!(store.get_and_increment_counter("alpha").expect("alpha"), 0);
    assert_eq!(store.get_and_increment_counter("alpha").expect("alpha"), 1);
    assert_eq!(store.get_and_increment_counter("beta").expect("beta"), 0);
    assert_eq!(store.get_and_increment_counter("alpha").expect("alpha"), 2);
    assert_eq!(store.get_and_increment_counter("beta").expect("beta"), 1);
}

#[test]
fn concurrent_increments_are_dense_and_gapless() {
    const THREADS: usize = 8;
    const INCREMENTS_PER_THREAD: usize = 25;

    let dir = temp_dir("counter_concurrent");
    let store = Arc::new(JobStore::open(dir.join("agent.db")).expect("open store"));

    let workers: Vec<_> = (0..THREADS)
        .map(|_| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                (0..INCREMENTS_PER_THREAD)
                    .map(|_| store.get_and_increment_counter(REPLICATION_COUNTER).expect("increment"))
                    .collect::<Vec<i64>>()
            })
        })
        .collect();

    let mut observed: Vec<i64> = Vec::new();
    for worker in workers {
        observed.extend(worker.join().expect("worker panicked"));
    }
    observed.sort_unstable();

    let expected: Vec<i64> = (0..(THREADS * INCREMENTS_PER_THREAD) as i64).collect();
    assert_eq!(observed, expected);
}
