//! Tests for FindCache
//!
//! These tests verify:
//! - Stored results read back in ordinal order, windowed
//! - A second store for the same key writes nothing
//! - Empty result sets are never cached

use refgate::find_cache::{canonical_key, FindCache, StoreOutcome};

use super::setup_temp_store;

fn results(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("result {}", i)).collect()
}

// =============================================================================
// Store and Read Tests
// =============================================================================

#[tokio::test]
async fn test_store_then_read_window() {
    let (_temp, store) = setup_temp_store();
    let cache = FindCache::new(store);
    let key = canonical_key("john 3", &["john"], &[]);

    assert!(!cache.exists(&key).await.unwrap());
    assert_eq!(cache.store(&key, &results(12)).await.unwrap(), StoreOutcome::Stored);
    assert!(cache.exists(&key).await.unwrap());

    let window: Vec<String> = cache.read(&key, 0, 5).await.unwrap();
    assert_eq!(window, results(5));

    // Ordinals compare as integers, so 10 and 11 follow 9
    let tail: Vec<String> = cache.read(&key, 8, 20).await.unwrap();
    assert_eq!(tail, vec!["result 8", "result 9", "result 10", "result 11"]);

    let beyond: Vec<String> = cache.read(&key, 20, 25).await.unwrap();
    assert!(beyond.is_empty());
}

#[tokio::test]
async fn test_second_store_is_noop() {
    let (_temp, store) = setup_temp_store();
    let cache = FindCache::new(store);
    let key = canonical_key("genesis 1", &[] as &[&str], &["ot"]);

    cache.store(&key, &results(3)).await.unwrap();
    let again = cache
        .store(&key, &["different".to_string()])
        .await
        .unwrap();

    assert_eq!(again, StoreOutcome::AlreadyCached);
    let cached: Vec<String> = cache.read(&key, 0, 5).await.unwrap();
    assert_eq!(cached, results(3));
}

#[tokio::test]
async fn test_empty_results_not_cached() {
    let (_temp, store) = setup_temp_store();
    let cache = FindCache::new(store);
    let key = canonical_key("nothing", &[] as &[&str], &[]);

    let outcome = cache.store::<String>(&key, &[]).await.unwrap();

    assert_eq!(outcome, StoreOutcome::Empty);
    assert!(!cache.exists(&key).await.unwrap());
}

#[tokio::test]
async fn test_keys_do_not_collide() {
    let (_temp, store) = setup_temp_store();
    let cache = FindCache::new(store);
    let john = canonical_key("john", &["john"], &[]);
    let john_any = canonical_key("john", &[] as &[&str], &[]);

    cache.store(&john, &results(2)).await.unwrap();

    assert!(cache.exists(&john).await.unwrap());
    assert!(!cache.exists(&john_any).await.unwrap());
}
