#![forbid(unsafe_code)]

use rusqlite::{Connection, params};
use sq_core::ids::SequenceName;
use sq_storage::{DocumentStore, SequenceCounter, SqliteStore, StoreConfig};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const TEST_SEQUENCE_NAME: &str = "my_sequence";

fn temp_storage_dir(label: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be monotonic enough for tests")
        .as_nanos();
    path.push(format!("sq-storage-{label}-{}-{nanos}", std::process::id()));
    std::fs::create_dir_all(&path).expect("temp storage dir must be creatable");
    path
}

fn counter(dir: &Path) -> SequenceCounter<SqliteStore> {
    SequenceCounter::new(SqliteStore::open(dir).expect("store should open"))
}

/// Reads the persisted row directly, bypassing the store API.
fn persisted_value(dir: &Path, name: &str) -> Option<i64> {
    let conn = Connection::open(dir.join("sequences.db")).expect("db must open");
    conn.query_row(
        "SELECT value FROM sequence WHERE name=?1",
        params![name],
        |row| row.get::<_, i64>(0),
    )
    .ok()
}

#[test]
fn initialized_sequence_has_value_in_database() {
    let dir = temp_storage_dir("reset-persists");
    let counter = counter(&dir);

    assert_eq!(counter.reset(TEST_SEQUENCE_NAME, 2).expect("reset"), 2);
    assert_eq!(persisted_value(&dir, TEST_SEQUENCE_NAME), Some(2));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn unseen_sequence_yields_one() {
    let dir = temp_storage_dir("unseen");
    let counter = counter(&dir);

    assert_eq!(counter.next_value(TEST_SEQUENCE_NAME).expect("next"), 1);
    assert_eq!(persisted_value(&dir, TEST_SEQUENCE_NAME), Some(1));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn repeated_access_returns_consecutive_values() {
    let dir = temp_storage_dir("consecutive");
    let counter = counter(&dir);

    for expected in 1..10 {
        assert_eq!(counter.next_value(TEST_SEQUENCE_NAME).expect("next"), expected);
    }

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn reset_then_increment_continues_from_reset_value() {
    let dir = temp_storage_dir("reset-then-next");
    let counter = counter(&dir);

    counter.reset("s", 0).expect("reset to 0");
    assert_eq!(counter.next_value("s").expect("next"), 1);

    counter.reset("s", 41).expect("reset to 41");
    assert_eq!(counter.next_value("s").expect("next"), 42);

    assert_eq!(counter.reset("s", -3).expect("reset negative"), -3);
    assert_eq!(counter.next_value("s").expect("next"), -2);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn sequences_do_not_affect_each_other() {
    let dir = temp_storage_dir("independent");
    let counter = counter(&dir);

    counter.reset("a", 10).expect("reset a");
    counter.next_value("a").expect("next a");
    assert_eq!(persisted_value(&dir, "b"), None);

    assert_eq!(counter.next_value("b").expect("next b"), 1);
    assert_eq!(persisted_value(&dir, "a"), Some(11));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn values_survive_reopen() {
    let dir = temp_storage_dir("reopen");
    {
        let counter = counter(&dir);
        for _ in 0..5 {
            counter.next_value(TEST_SEQUENCE_NAME).expect("next");
        }
    }

    let counter = counter(&dir);
    assert_eq!(counter.next_value(TEST_SEQUENCE_NAME).expect("next"), 6);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn overflow_is_reported_and_value_kept() {
    let dir = temp_storage_dir("overflow");
    let counter = counter(&dir);

    counter.reset("max", i64::MAX).expect("reset to max");
    let err = counter.next_value("max").expect_err("increment past i64::MAX");
    assert_eq!(err.code(), "OVERFLOW");
    assert_eq!(persisted_value(&dir, "max"), Some(i64::MAX));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn concurrent_connections_never_share_a_value() {
    const THREADS: usize = 8;
    const CALLS_PER_THREAD: usize = 250;

    let dir = temp_storage_dir("concurrency");
    let config = StoreConfig::new(&dir).with_busy_timeout(Duration::from_secs(30));

    // Init to 0 - next value will be 1
    SequenceCounter::new(SqliteStore::connect(&config).expect("store should open"))
        .reset(TEST_SEQUENCE_NAME, 0)
        .expect("reset");

    // One connection per worker, the same way separate processes would connect.
    let counters = (0..THREADS)
        .map(|_| SequenceCounter::new(SqliteStore::connect(&config).expect("store should open")))
        .collect::<Vec<_>>();

    let handles = counters
        .into_iter()
        .map(|counter| {
            thread::spawn(move || {
                (0..CALLS_PER_THREAD)
                    .map(|_| counter.next_value(TEST_SEQUENCE_NAME).expect("next"))
                    .collect::<Vec<_>>()
            })
        })
        .collect::<Vec<_>>();

    let mut seen = BTreeSet::new();
    for handle in handles {
        for value in handle.join().expect("worker thread") {
            assert!(seen.insert(value), "value {value} handed out twice");
        }
    }

    let total = (THREADS * CALLS_PER_THREAD) as i64;
    assert_eq!(seen, (1..=total).collect::<BTreeSet<_>>());
    assert_eq!(persisted_value(&dir, TEST_SEQUENCE_NAME), Some(total));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn counter_reads_through_store_handle() {
    let dir = temp_storage_dir("read-through");
    let counter = counter(&dir);
    let name = SequenceName::try_new("orders").expect("sequence name");

    assert!(counter.store().find_one(&name).expect("find").is_none());
    counter.next_value("orders").expect("next");
    let seq = counter
        .store()
        .find_one(&name)
        .expect("find")
        .expect("sequence exists");
    assert_eq!(seq.name, name);
    assert_eq!(seq.value, 1);

    let _ = std::fs::remove_dir_all(&dir);
}
