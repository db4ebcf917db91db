//! Tests for MemTable
//!
//! These tests verify:
//! - Basic get/put operations
//! - Versions and expiry travel with values
//! - Size tracking on insert and overwrite
//! - Half-open range scans
//! - Concurrent readers and writers

use std::sync::Arc;
use std::thread;

use refgate::memtable::{MemTable, VersionedValue};

// =============================================================================
// Helper Functions
// =============================================================================

fn value(version: u64, data: &str) -> VersionedValue {
    VersionedValue {
        version,
        expires_at: None,
        data: data.as_bytes().to_vec(),
    }
}

fn keys(entries: &[(Vec<u8>, VersionedValue)]) -> Vec<&[u8]> {
    entries.iter().map(|(k, _)| k.as_slice()).collect()
}

// =============================================================================
// Basic Operation Tests
// =============================================================================

#[test]
fn test_new_memtable_is_empty() {
    let table = MemTable::new();
    assert!(table.is_empty());
    assert_eq!(table.size(), 0);
    assert_eq!(table.entry_count(), 0);
    assert!(table.get(b"missing").is_none());
}

#[test]
fn test_put_and_get() {
    let table = MemTable::new();
    table.put(b"key".to_vec(), value(1, "hello"));

    let stored = table.get(b"key").unwrap();
    assert_eq!(stored.version, 1);
    assert_eq!(stored.data, b"hello");
}

#[test]
fn test_overwrite_replaces_version() {
    let table = MemTable::new();
    table.put(b"key".to_vec(), value(1, "old"));
    table.put(b"key".to_vec(), value(5, "new"));

    assert_eq!(table.entry_count(), 1);
    assert_eq!(table.get(b"key").unwrap(), value(5, "new"));
}

// =============================================================================
// Expiry Tests
// =============================================================================

#[test]
fn test_expiry_is_stored_not_enforced() {
    let table = MemTable::new();
    table.put(
        b"key".to_vec(),
        VersionedValue {
            version: 1,
            expires_at: Some(1_000),
            data: b"v".to_vec(),
        },
    );

    let stored = table.get(b"key").unwrap();
    assert!(stored.is_expired(1_000));
    assert!(!stored.is_expired(999));
    assert!(!value(1, "v").is_expired(u64::MAX));
}

// =============================================================================
// Size Tracking Tests
// =============================================================================

#[test]
fn test_size_grows_and_resets() {
    let table = MemTable::new();
    let after_first = table.put(b"a".to_vec(), value(1, "12345"));
    assert!(after_first > 0);

    let after_second = table.put(b"b".to_vec(), value(2, "12345"));
    assert_eq!(after_second, after_first * 2);
    assert_eq!(table.size(), after_second);

    table.clear();
    assert_eq!(table.size(), 0);
    assert!(table.is_empty());
}

#[test]
fn test_overwrite_adjusts_size() {
    let table = MemTable::new();
    table.put(b"a".to_vec(), value(1, "a long value here"));
    let big = table.size();

    table.put(b"a".to_vec(), value(2, "x"));
    assert!(table.size() < big);
}

// =============================================================================
// Range and Iteration Tests
// =============================================================================

#[test]
fn test_range_is_half_open() {
    let table = MemTable::new();
    for key in ["a", "b", "c", "d"] {
        table.put(key.as_bytes().to_vec(), value(1, key));
    }

    let entries = table.range(b"b", b"d");
    assert_eq!(keys(&entries), vec![b"b".as_slice(), b"c".as_slice()]);
}

#[test]
fn test_range_empty_when_start_not_before_end() {
    let table = MemTable::new();
    table.put(b"a".to_vec(), value(1, "a"));

    assert!(table.range(b"b", b"a").is_empty());
    assert!(table.range(b"a", b"a").is_empty());
}

#[test]
fn test_iter_is_sorted_snapshot() {
    let table = MemTable::new();
    for key in ["delta", "alpha", "charlie", "bravo"] {
        table.put(key.as_bytes().to_vec(), value(1, key));
    }

    let iter = table.iter();
    // Writes after the snapshot do not show up in it
    table.put(b"echo".to_vec(), value(2, "echo"));

    let collected: Vec<_> = iter.map(|(k, _)| String::from_utf8(k).unwrap()).collect();
    assert_eq!(collected, vec!["alpha", "bravo", "charlie", "delta"]);
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_readers_and_writer() {
    let table = Arc::new(MemTable::new());

    let writer = {
        let table = Arc::clone(&table);
        thread::spawn(move || {
            for i in 0..1000u64 {
                table.put(format!("key{:04}", i).into_bytes(), value(i + 1, "v"));
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let table = Arc::clone(&table);
            thread::spawn(move || {
                for _ in 0..100 {
                    let snapshot = table.range(b"key", b"kez");
                    let mut sorted = snapshot.clone();
                    sorted.sort_by(|a, b| a.0.cmp(&b.0));
                    assert_eq!(snapshot, sorted);
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(table.entry_count(), 1000);
}
