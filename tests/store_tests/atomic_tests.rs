//! Tests for Store and AtomicOp
//!
//! These tests verify:
//! - Tuple key ordering in lists and prefix scans
//! - Checked atomic commits and their outcomes
//! - insert_if_absent semantics, including expiry

use std::time::Duration;

use refgate::store::Versioned;
use refgate::{CommitOutcome, InsertOutcome, Key};
use serde::{Deserialize, Serialize};

use super::setup_temp_store;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Note {
    text: String,
}

fn note(text: &str) -> Note {
    Note {
        text: text.to_string(),
    }
}

// =============================================================================
// Read Tests
// =============================================================================

#[tokio::test]
async fn test_get_json_round_trip() {
    let (_temp, store) = setup_temp_store();
    let key = Key::new().with("notes").with(1i64);

    let outcome = store
        .atomic()
        .set_json(&key, &note("hello"), None)
        .unwrap()
        .commit()
        .await
        .unwrap();
    let CommitOutcome::Committed(version) = outcome else {
        panic!("commit should succeed");
    };

    let read: Versioned<Note> = store.get_json(&key).await.unwrap().unwrap();
    assert_eq!(read.value, note("hello"));
    assert_eq!(read.version, version);
    assert_eq!(read.key, key.encode());

    assert!(store
        .get_json::<Note>(&Key::new().with("notes").with(2i64))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_list_orders_by_tuple() {
    let (_temp, store) = setup_temp_store();

    let mut op = store.atomic();
    for n in [10i64, -3, 2, 100] {
        op = op
            .set_json(&Key::new().with("n").with(n), &n, None)
            .unwrap();
    }
    op.commit().await.unwrap();

    let all = store
        .list_prefix_json::<i64>(&Key::new().with("n"), None)
        .await
        .unwrap();
    let values: Vec<i64> = all.into_iter().map(|v| v.value).collect();
    assert_eq!(values, vec![-3, 2, 10, 100]);

    let window = store
        .list_json::<i64>(
            &Key::new().with("n").with(2i64),
            &Key::new().with("n").with(100i64),
            None,
        )
        .await
        .unwrap();
    let values: Vec<i64> = window.into_iter().map(|v| v.value).collect();
    assert_eq!(values, vec![2, 10]);
}

#[tokio::test]
async fn test_prefix_scan_stays_inside_prefix() {
    let (_temp, store) = setup_temp_store();

    store
        .atomic()
        .set(&Key::new().with("ab"), b"outside".to_vec(), None)
        .set(&Key::new().with("a").with("x"), b"inside".to_vec(), None)
        .set(&Key::new().with("a"), b"prefix itself".to_vec(), None)
        .set(&Key::new().with("b"), b"after".to_vec(), None)
        .commit()
        .await
        .unwrap();

    let entries = store
        .list_prefix(&Key::new().with("a"), None)
        .await
        .unwrap();
    let values: Vec<Vec<u8>> = entries.into_iter().map(|e| e.value).collect();
    assert_eq!(values, vec![b"prefix itself".to_vec(), b"inside".to_vec()]);
}

#[tokio::test]
async fn test_list_limit() {
    let (_temp, store) = setup_temp_store();

    let mut op = store.atomic();
    for n in 0..10i64 {
        op = op.set(&Key::new().with("n").with(n), vec![n as u8], None);
    }
    assert_eq!(op.mutation_count(), 10);
    op.commit().await.unwrap();

    let limited = store
        .list_prefix(&Key::new().with("n"), Some(3))
        .await
        .unwrap();
    assert_eq!(limited.len(), 3);
    assert_eq!(limited[2].value, vec![2u8]);
}

// =============================================================================
// Atomic Commit Tests
// =============================================================================

#[tokio::test]
async fn test_check_version_detects_concurrent_write() {
    let (_temp, store) = setup_temp_store();
    let key = Key::new().with("counter");

    store
        .atomic()
        .set_json(&key, &1u64, None)
        .unwrap()
        .commit()
        .await
        .unwrap();
    let seen = store.get_json::<u64>(&key).await.unwrap().unwrap();

    // Someone else writes in between
    store
        .atomic()
        .set_json(&key, &5u64, None)
        .unwrap()
        .commit()
        .await
        .unwrap();

    let outcome = store
        .atomic()
        .check_version(&key, seen.version)
        .set_json(&key, &(seen.value + 1), None)
        .unwrap()
        .commit()
        .await
        .unwrap();

    assert_eq!(outcome, CommitOutcome::CheckFailed);
    assert!(!outcome.is_committed());
    assert_eq!(store.get_json::<u64>(&key).await.unwrap().unwrap().value, 5);
}

#[tokio::test]
async fn test_check_none_means_absent() {
    let (_temp, store) = setup_temp_store();
    let key = Key::new().with("once");

    let first = store
        .atomic()
        .check(&key, None)
        .set(&key, b"a".to_vec(), None)
        .commit()
        .await
        .unwrap();
    assert!(first.is_committed());

    let second = store
        .atomic()
        .check(&key, None)
        .set(&key, b"b".to_vec(), None)
        .commit()
        .await
        .unwrap();
    assert_eq!(second, CommitOutcome::CheckFailed);
}

// =============================================================================
// insert_if_absent Tests
// =============================================================================

#[tokio::test]
async fn test_insert_if_absent_keeps_first_value() {
    let (_temp, store) = setup_temp_store();
    let key = Key::new().with("slot");

    let first = store
        .insert_if_absent(&key, &note("first"), None)
        .await
        .unwrap();
    assert!(matches!(first, InsertOutcome::Inserted(_)));

    let second = store
        .insert_if_absent(&key, &note("second"), None)
        .await
        .unwrap();
    assert_eq!(second, InsertOutcome::AlreadyPresent);

    let stored = store.get_json::<Note>(&key).await.unwrap().unwrap();
    assert_eq!(stored.value, note("first"));
}

#[tokio::test]
async fn test_insert_if_absent_over_expired_value() {
    let (_temp, store) = setup_temp_store();
    let key = Key::new().with("lease");

    store
        .insert_if_absent(&key, &note("short"), Some(Duration::from_millis(20)))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;

    assert!(store.get(&key).await.unwrap().is_none());
    let outcome = store
        .insert_if_absent(&key, &note("renewed"), None)
        .await
        .unwrap();
    assert!(matches!(outcome, InsertOutcome::Inserted(_)));
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[tokio::test]
async fn test_close_and_reopen() {
    let temp = tempfile::TempDir::new().unwrap();
    let key = Key::new().with("durable");

    {
        let store = refgate::Store::open(refgate::Config::builder().data_dir(temp.path()).build()).unwrap();
        store.insert_if_absent(&key, &note("kept"), None).await.unwrap();
        store.close().await.unwrap();
    }

    let store = refgate::Store::open(refgate::Config::builder().data_dir(temp.path()).build()).unwrap();
    assert_eq!(
        store.get_json::<Note>(&key).await.unwrap().unwrap().value,
        note("kept")
    );
}
