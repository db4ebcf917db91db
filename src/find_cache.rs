//! Result Cache
//!
//! Paginated find results stored as `["find-cache", <canonical key>, <ordinal>]`.
//! Entries are written once, together, and expire after [`CACHE_TTL`]. There
//! is no update path.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::store::{CommitOutcome, Key, Store};

/// Lifetime of cached find results
pub const CACHE_TTL: Duration = Duration::from_secs(3 * 60 * 60);

const CACHE_PREFIX: &str = "find-cache";

#[derive(Serialize)]
struct CanonicalQuery<'a> {
    r#ref: &'a str,
    book: Vec<&'a str>,
    volume: Vec<&'a str>,
}

/// Deterministic cache key for a query and its filters
///
/// Filter order as supplied by the caller does not matter.
pub fn canonical_key<S: AsRef<str>>(query: &str, books: &[S], volumes: &[S]) -> String {
    let mut book: Vec<&str> = books.iter().map(AsRef::as_ref).collect();
    let mut volume: Vec<&str> = volumes.iter().map(AsRef::as_ref).collect();
    book.sort_unstable();
    volume.sort_unstable();

    let canonical = CanonicalQuery {
        r#ref: query,
        book,
        volume,
    };
    // Serializing borrowed strings into a Vec cannot fail
    serde_json::to_string(&canonical).unwrap_or_default()
}

/// What happened to a [`FindCache::store`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Stored,
    /// Another writer already cached this key; nothing was written
    AlreadyCached,
    /// No items, nothing to commit
    Empty,
}

#[derive(Clone)]
pub struct FindCache {
    store: Store,
}

impl FindCache {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    fn entry_key(key: &str, ordinal: usize) -> Key {
        Key::new().with(CACHE_PREFIX).with(key).with(ordinal)
    }

    /// True iff ordinal 0 is cached for `key`
    pub async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.store.get(&Self::entry_key(key, 0)).await?.is_some())
    }

    /// Cache `items` under `key` in one commit, each ordinal checked absent
    pub async fn store<T: Serialize>(&self, key: &str, items: &[T]) -> Result<StoreOutcome> {
        if items.is_empty() {
            return Ok(StoreOutcome::Empty);
        }

        let mut op = self.store.atomic();
        for (ordinal, item) in items.iter().enumerate() {
            let entry_key = Self::entry_key(key, ordinal);
            op = op
                .check_absent(&entry_key)
                .set_json(&entry_key, item, Some(CACHE_TTL))?;
        }

        Ok(match op.commit().await? {
            CommitOutcome::Committed(_) => StoreOutcome::Stored,
            CommitOutcome::CheckFailed => {
                tracing::debug!(key, "find results already cached");
                StoreOutcome::AlreadyCached
            }
        })
    }

    /// Cached items with ordinals in `[start, end)`, in ordinal order
    pub async fn read<T: DeserializeOwned>(&self, key: &str, start: usize, end: usize) -> Result<Vec<T>> {
        let items = self
            .store
            .list_json::<T>(&Self::entry_key(key, start), &Self::entry_key(key, end), None)
            .await?;
        Ok(items.into_iter().map(|item| item.value).collect())
    }
}
