use super::*;
use tempfile::tempdir;

fn ngram(key: &str) -> NGram {
    NGram::parse(key).expect("valid n-gram")
}

#[test]
fn test_get_absent_is_zero() {
    let dir = tempdir().expect("create temp dir");
    let store = FrequencyStore::open(dir.path(), 1, OpenMode::ReadWrite).expect("open store");
    assert_eq!(store.get(&ngram("nothing")).unwrap(), 0);
}

#[test]
fn test_merge_add_accumulates() {
    let dir = tempdir().expect("create temp dir");
    let store = FrequencyStore::open(dir.path(), 2, OpenMode::ReadWrite).expect("open store");
    let n = ngram("over there");

    for (c1, c2) in [(1u64, 1u64), (0, 7), (123_456, 654_321)] {
        let before = store.get(&n).unwrap();
        store.merge_add(&n, c1).unwrap();
        store.merge_add(&n, c2).unwrap();
        assert_eq!(store.get(&n).unwrap(), before + c1 + c2);
    }
}

#[test]
fn test_merge_batch_counts_inserts() {
    let dir = tempdir().expect("create temp dir");
    let store = FrequencyStore::open(dir.path(), 1, OpenMode::ReadWrite).expect("open store");

    let inserted = store.merge_batch([("a", 1u64), ("b", 2)]).unwrap();
    assert_eq!(inserted, 2);
    let inserted = store.merge_batch([("a", 4u64), ("c", 1)]).unwrap();
    assert_eq!(inserted, 1);

    assert_eq!(store.get_key("a").unwrap(), 5);
    assert_eq!(store.get_key("b").unwrap(), 2);
    assert_eq!(store.get_key("c").unwrap(), 1);
    assert_eq!(store.stats().unwrap(), (3, 8));
}

#[test]
fn test_wrong_order_rejected() {
    let dir = tempdir().expect("create temp dir");
    let store = FrequencyStore::open(dir.path(), 3, OpenMode::ReadWrite).expect("open store");
    let err = store.merge_add(&ngram("just two"), 1).unwrap_err();
    assert!(matches!(err, StoreError::WrongOrder { expected: 3, got: 2, .. }));
}

#[test]
fn test_duplicate_records_are_invariant_violation() {
    let dir = tempdir().expect("create temp dir");
    let store = FrequencyStore::open(dir.path(), 1, OpenMode::ReadWrite).expect("open store");
    store.insert_raw("dup", 1).unwrap();
    store.insert_raw("dup", 2).unwrap();

    let err = store.merge_add(&ngram("dup"), 1).unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, StoreError::InvariantViolation { count: 2, .. }));

    let err = store.get(&ngram("dup")).unwrap_err();
    assert!(matches!(err, StoreError::InvariantViolation { .. }));
}

#[test]
fn test_failed_batch_keeps_nothing() {
    let dir = tempdir().expect("create temp dir");
    let store = FrequencyStore::open(dir.path(), 1, OpenMode::ReadWrite).expect("open store");
    store.insert_raw("dup", 1).unwrap();
    store.insert_raw("dup", 2).unwrap();

    assert!(store.merge_batch([("fresh", 3u64), ("dup", 1)]).is_err());
    assert_eq!(store.get_key("fresh").unwrap(), 0);
}

#[test]
fn test_total_token_count_overwritten() {
    let dir = tempdir().expect("create temp dir");
    let store = FrequencyStore::open(dir.path(), 1, OpenMode::ReadWrite).expect("open store");
    assert_eq!(store.total_token_count().unwrap(), 0);
    store.set_total_token_count(10).unwrap();
    store.set_total_token_count(4).unwrap();
    assert_eq!(store.total_token_count().unwrap(), 4);
}

#[test]
fn test_total_token_count_only_on_unigrams() {
    let dir = tempdir().expect("create temp dir");
    let store = FrequencyStore::open(dir.path(), 2, OpenMode::ReadWrite).expect("open store");
    assert!(matches!(
        store.set_total_token_count(1),
        Err(StoreError::NotUnigramStore(2))
    ));
}

#[test]
fn test_persistence_after_close() {
    let dir = tempdir().expect("create temp dir");
    {
        let store = FrequencyStore::open(dir.path(), 1, OpenMode::ReadWrite).expect("open store");
        store.merge_add(&ngram("there"), 3).unwrap();
        store.merge_add(&ngram("there"), 2).unwrap();
        store.set_total_token_count(5).unwrap();
        store.close().expect("close store");
    }

    let store = FrequencyStore::open(dir.path(), 1, OpenMode::ReadOnly).expect("reopen store");
    assert_eq!(store.get(&ngram("there")).unwrap(), 5);
    assert_eq!(store.total_token_count().unwrap(), 5);
}

#[test]
fn test_read_only_rejects_writes() {
    let dir = tempdir().expect("create temp dir");
    FrequencyStore::open(dir.path(), 1, OpenMode::ReadWrite)
        .expect("create store")
        .close()
        .expect("close store");

    let store = FrequencyStore::open(dir.path(), 1, OpenMode::ReadOnly).expect("reopen store");
    assert!(matches!(
        store.merge_add(&ngram("x"), 1),
        Err(StoreError::ReadOnly(_))
    ));
}

#[test]
fn test_missing_store_unavailable() {
    let dir = tempdir().expect("create temp dir");
    let err = FrequencyStore::open(&dir.path().join("nope"), 1, OpenMode::ReadOnly)
        .err()
        .expect("open must fail");
    assert!(matches!(err, StoreError::StoreUnavailable { .. }));
}

#[test]
fn test_locked_store_unavailable() {
    let dir = tempdir().expect("create temp dir");
    let _writer = FrequencyStore::open(dir.path(), 1, OpenMode::ReadWrite).expect("open store");
    let second = FrequencyStore::open(dir.path(), 1, OpenMode::ReadWrite);
    assert!(matches!(second, Err(StoreError::StoreUnavailable { .. })));
}

#[test]
fn test_second_read_only_handle_reports_lock() {
    let dir = tempdir().expect("create temp dir");
    FrequencyStore::open(dir.path(), 1, OpenMode::ReadWrite)
        .expect("create store")
        .close()
        .expect("close store");

    let _reader = FrequencyStore::open(dir.path(), 1, OpenMode::ReadOnly).expect("open reader");
    let err = FrequencyStore::open(dir.path(), 1, OpenMode::ReadOnly)
        .err()
        .expect("second handle must fail");
    match err {
        StoreError::StoreUnavailable { reason, .. } => assert!(reason.contains("in use"), "{}", reason),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_corrupt_file_unavailable() {
    let dir = tempdir().expect("create temp dir");
    std::fs::write(dir.path().join(DB_FILE_NAME), b"definitely not a database").unwrap();
    let err = FrequencyStore::open(dir.path(), 1, OpenMode::ReadOnly)
        .err()
        .expect("open must fail");
    assert!(matches!(err, StoreError::StoreUnavailable { .. }));
}

#[test]
fn test_index_layout_and_validation() {
    let dir = tempdir().expect("create temp dir");
    assert!(NgramIndex::open(dir.path(), OpenMode::ReadOnly).is_err());

    let index = NgramIndex::open(dir.path(), OpenMode::ReadWrite).expect("create index");
    index.store(3).unwrap().merge_add(&ngram("a b c"), 1).unwrap();
    index.close().expect("close index");

    for name in ["1grams", "2grams", "3grams"] {
        assert!(dir.path().join(name).join(DB_FILE_NAME).is_file());
    }

    let index = NgramIndex::open(dir.path(), OpenMode::ReadOnly).expect("reopen index");
    assert_eq!(index.count(&ngram("a b c")).unwrap(), 1);
    assert_eq!(index.count(&ngram("a b")).unwrap(), 0);
}

#[test]
fn test_concurrent_readers() {
    let dir = tempdir().expect("create temp dir");
    {
        let store = FrequencyStore::open(dir.path(), 1, OpenMode::ReadWrite).expect("open store");
        store.merge_batch((0..100).map(|i| (format!("w{}", i), i as u64))).unwrap();
        store.close().unwrap();
    }
    let store = FrequencyStore::open(dir.path(), 1, OpenMode::ReadOnly).expect("reopen store");

    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for i in 0..100u64 {
                    assert_eq!(store.get_key(&format!("w{}", i)).unwrap(), i);
                }
            });
        }
    });
}
