//! Store Module
//!
//! Async, typed access to the [`Engine`].
//!
//! ## Responsibilities
//! - Encode tuple keys and JSON values
//! - Run engine I/O on the blocking pool
//! - Build atomic commits with optimistic checks and per-key expiry
//! - Make "already written by someone else" an explicit outcome
//!
//! A failed check is never an error: it means another writer got there first.

mod key;

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::Config;
use crate::engine::{now_millis, Check, CommitResult, Engine, KvEntry};
use crate::error::Result;
use crate::wal::Mutation;

pub use key::{Key, KeyPart};

/// Sequence number of the commit that last wrote a key
pub type Versionstamp = u64;

/// Result of [`AtomicOp::commit`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed(Versionstamp),
    CheckFailed,
}

impl CommitOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, CommitOutcome::Committed(_))
    }
}

/// Result of [`Store::insert_if_absent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(Versionstamp),
    /// The key was already live; the existing value was left untouched
    AlreadyPresent,
}

/// A decoded value with its key and versionstamp
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub key: Vec<u8>,
    pub value: T,
    pub version: Versionstamp,
}

impl<T: DeserializeOwned> Versioned<T> {
    fn decode(entry: KvEntry) -> Result<Self> {
        Ok(Self {
            value: serde_json::from_slice(&entry.value)?,
            key: entry.key,
            version: entry.version,
        })
    }
}

/// Shared handle to the transactional store
#[derive(Clone)]
pub struct Store {
    engine: Arc<Engine>,
}

impl Store {
    /// Open the engine described by `config`
    pub fn open(config: Config) -> Result<Self> {
        Ok(Self::new(Arc::new(Engine::open(config)?)))
    }

    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Engine) -> Result<T> + Send + 'static,
    {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || f(&engine)).await?
    }

    /// Raw read of one key
    pub async fn get(&self, key: &Key) -> Result<Option<KvEntry>> {
        let raw = key.encode();
        self.blocking(move |engine| engine.get(&raw)).await
    }

    /// Read and decode one JSON value
    pub async fn get_json<T: DeserializeOwned>(&self, key: &Key) -> Result<Option<Versioned<T>>> {
        self.get(key).await?.map(Versioned::decode).transpose()
    }

    /// Raw ranged list over `[start, end)`
    pub async fn list(&self, start: &Key, end: &Key, limit: Option<usize>) -> Result<Vec<KvEntry>> {
        let (start, end) = (start.encode(), end.encode());
        self.blocking(move |engine| engine.range(&start, &end, limit)).await
    }

    /// Ranged list over `[start, end)` decoded as JSON
    pub async fn list_json<T: DeserializeOwned>(
        &self,
        start: &Key,
        end: &Key,
        limit: Option<usize>,
    ) -> Result<Vec<Versioned<T>>> {
        self.list(start, end, limit)
            .await?
            .into_iter()
            .map(Versioned::decode)
            .collect()
    }

    /// Every live key extending `prefix`
    pub async fn list_prefix(&self, prefix: &Key, limit: Option<usize>) -> Result<Vec<KvEntry>> {
        let (start, end) = prefix.prefix_range();
        self.blocking(move |engine| engine.range(&start, &end, limit)).await
    }

    /// Every live key extending `prefix`, decoded as JSON
    pub async fn list_prefix_json<T: DeserializeOwned>(
        &self,
        prefix: &Key,
        limit: Option<usize>,
    ) -> Result<Vec<Versioned<T>>> {
        self.list_prefix(prefix, limit)
            .await?
            .into_iter()
            .map(Versioned::decode)
            .collect()
    }

    /// Start building an atomic commit
    pub fn atomic(&self) -> AtomicOp {
        AtomicOp {
            store: self.clone(),
            checks: Vec::new(),
            mutations: Vec::new(),
        }
    }

    /// Write `value` only if `key` is absent or expired
    pub async fn insert_if_absent<T: Serialize>(
        &self,
        key: &Key,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<InsertOutcome> {
        let outcome = self
            .atomic()
            .check_absent(key)
            .set_json(key, value, ttl)?
            .commit()
            .await?;

        Ok(match outcome {
            CommitOutcome::Committed(version) => InsertOutcome::Inserted(version),
            CommitOutcome::CheckFailed => InsertOutcome::AlreadyPresent,
        })
    }

    /// Flush and sync the engine
    pub async fn close(&self) -> Result<()> {
        self.blocking(|engine| engine.close()).await
    }
}

/// A batch of checks and writes applied all-or-nothing
#[must_use = "an atomic operation does nothing until committed"]
pub struct AtomicOp {
    store: Store,
    checks: Vec<Check>,
    mutations: Vec<Mutation>,
}

impl AtomicOp {
    /// Require `key` to be absent (or expired) at commit time
    pub fn check_absent(mut self, key: &Key) -> Self {
        self.checks.push(Check::absent(key.encode()));
        self
    }

    /// Require `key` to still be at `version` at commit time
    pub fn check_version(mut self, key: &Key, version: Versionstamp) -> Self {
        self.checks.push(Check::version(key.encode(), version));
        self
    }

    /// `None` requires absence, `Some(v)` requires version `v`
    pub fn check(self, key: &Key, expected: Option<Versionstamp>) -> Self {
        match expected {
            Some(version) => self.check_version(key, version),
            None => self.check_absent(key),
        }
    }

    /// Write raw bytes, expiring after `ttl` if given
    pub fn set(mut self, key: &Key, value: Vec<u8>, ttl: Option<Duration>) -> Self {
        let key = key.encode();
        self.mutations.push(match ttl {
            Some(ttl) => Mutation::put_expiring(key, value, expires_at(ttl)),
            None => Mutation::put(key, value),
        });
        self
    }

    /// Write a JSON-encoded value
    pub fn set_json<T: Serialize>(self, key: &Key, value: &T, ttl: Option<Duration>) -> Result<Self> {
        let bytes = serde_json::to_vec(value)?;
        Ok(self.set(key, bytes, ttl))
    }

    pub fn mutation_count(&self) -> usize {
        self.mutations.len()
    }

    pub async fn commit(self) -> Result<CommitOutcome> {
        let AtomicOp {
            store,
            checks,
            mutations,
        } = self;

        let result = store
            .blocking(move |engine| engine.commit(&checks, mutations))
            .await?;

        Ok(match result {
            CommitResult::Committed { version } => CommitOutcome::Committed(version),
            CommitResult::CheckFailed { .. } => CommitOutcome::CheckFailed,
        })
    }
}

fn expires_at(ttl: Duration) -> u64 {
    now_millis().saturating_add(u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX))
}
