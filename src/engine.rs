//! Engine Module
//!
//! The core storage engine that coordinates all components.
//!
//! ## Responsibilities
//! - Coordinate WAL, MemTable, and Storage
//! - Apply multi-key commits atomically, guarded by per-key version checks
//! - Hide entries past their expiry from every read
//! - Trigger flushes when MemTable is full, and compaction when SSTables pile up
//! - Manage crash recovery on startup

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use parking_lot::RwLock;

use crate::config::Config;
use crate::error::{GatewayError, Result};
use crate::memtable::{MemTable, VersionedValue};
use crate::storage::StorageManager;
use crate::wal::{Mutation, WalRecovery, WalWriter};

/// Current wall clock in unix milliseconds
pub fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// A precondition on one key, evaluated inside the commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    pub key: Vec<u8>,
    /// `None`: the key must be absent (or expired). `Some(v)`: it must still be at version `v`.
    pub expected: Option<u64>,
}

impl Check {
    pub fn absent(key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            expected: None,
        }
    }

    pub fn version(key: impl Into<Vec<u8>>, version: u64) -> Self {
        Self {
            key: key.into(),
            expected: Some(version),
        }
    }
}

/// A live key-value pair as seen by readers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvEntry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub version: u64,
    pub expires_at: Option<u64>,
}

impl KvEntry {
    fn from_stored(key: Vec<u8>, stored: VersionedValue) -> Self {
        Self {
            key,
            value: stored.data,
            version: stored.version,
            expires_at: stored.expires_at,
        }
    }
}

/// What happened to a commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitResult {
    /// Every write was applied under this versionstamp
    Committed { version: u64 },
    /// A check did not hold; nothing was written
    CheckFailed { key: Vec<u8> },
}

/// The main storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Commits** (and flush/compaction): Serialized by `write_lock`, so the
///   checks of a commit and its writes see no interleaved commit
/// - **Reads** (get/range): No write_lock; MemTable uses an internal RwLock,
///   StorageManager locks its SSTable list
/// - **Flush hand-off**: `flush_lock` makes "add SSTable, clear MemTable" one
///   step for range reads, which hold its read side across both sources
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Directory for all data files (SSTables)
    storage_dir: PathBuf,

    /// Write-ahead log for durability (exclusive access needed)
    wal: Mutex<WalWriter>,

    /// In-memory table for recent writes (internal RwLock)
    memtable: MemTable,

    /// Persistent storage manager (internal RwLock on sstables vec)
    storage: StorageManager,

    /// Serializes commits, flushes and compactions
    write_lock: Mutex<()>,

    /// Held exclusively while memtable entries move into an SSTable
    flush_lock: RwLock<()>,
}

impl Engine {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const WAL_FILENAME: &'static str = "wal.log";
    const SSTABLE_DIR: &'static str = "sstables";

    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Open/create data directory
    /// 2. Load existing SSTables
    /// 3. Replay the WAL and flush what it held
    /// 4. Resume versionstamps after the highest one seen
    pub fn open(config: Config) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;

        let storage_dir = config.data_dir.join(Self::SSTABLE_DIR);
        let wal_path = config.data_dir.join(Self::WAL_FILENAME);

        let storage = StorageManager::open(&storage_dir)?;
        let memtable = MemTable::new();

        let mut last_lsn = 0;
        if wal_path.exists() {
            let (entries, recovery) = WalRecovery::recover(&wal_path)?;

            if recovery.entries_recovered > 0 || recovery.entries_corrupted > 0 {
                tracing::info!(
                    recovered = recovery.entries_recovered,
                    corrupted = recovery.entries_corrupted,
                    last_lsn = recovery.last_lsn,
                    "WAL recovery finished"
                );
            }
            last_lsn = recovery.last_lsn;

            for entry in entries {
                for mutation in entry.mutations {
                    memtable.put(
                        mutation.key,
                        VersionedValue {
                            version: entry.lsn,
                            expires_at: mutation.expires_at,
                            data: mutation.value,
                        },
                    );
                }
            }

            // Make recovered commits durable in an SSTable before the WAL is reset
            if !memtable.is_empty() {
                tracing::info!(entries = memtable.entry_count(), "flushing recovered entries");
                storage.flush(&memtable)?;
                memtable.clear();
            }
        }

        let mut wal = WalWriter::open(&wal_path, config.wal_sync_strategy)?;
        if last_lsn > 0 {
            wal.truncate()?;
        }
        wal.advance_to(last_lsn.max(storage.max_version()) + 1);

        Ok(Self {
            config,
            storage_dir,
            wal: Mutex::new(wal),
            memtable,
            storage,
            write_lock: Mutex::new(()),
            flush_lock: RwLock::new(()),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    /// Get a live value by key
    ///
    /// Search order:
    /// 1. MemTable (most recent writes)
    /// 2. SSTables (newest to oldest)
    pub fn get(&self, key: &[u8]) -> Result<Option<KvEntry>> {
        self.get_at(key, now_millis())
    }

    fn get_at(&self, key: &[u8], now_ms: u64) -> Result<Option<KvEntry>> {
        // MemTable first: a flush adds the SSTable before clearing the MemTable
        let stored = match self.memtable.get(key) {
            Some(value) => Some(value),
            None => self.storage.get(key)?,
        };

        Ok(stored
            .filter(|value| !value.is_expired(now_ms))
            .map(|value| KvEntry::from_stored(key.to_vec(), value)))
    }

    /// Live entries with `start <= key < end`, in key order
    pub fn range(&self, start: &[u8], end: &[u8], limit: Option<usize>) -> Result<Vec<KvEntry>> {
        if start >= end {
            return Ok(Vec::new());
        }
        let now_ms = now_millis();

        let flush_guard = self.flush_lock.read();
        let mut merged: BTreeMap<Vec<u8>, VersionedValue> = self.storage.range(start, end)?;
        for (key, value) in self.memtable.range(start, end) {
            merged.insert(key, value);
        }
        drop(flush_guard);

        Ok(merged
            .into_iter()
            .filter(|(_, value)| !value.is_expired(now_ms))
            .take(limit.unwrap_or(usize::MAX))
            .map(|(key, value)| KvEntry::from_stored(key, value))
            .collect())
    }

    /// Apply `mutations` atomically if every check holds
    ///
    /// Steps:
    /// 1. Acquire write lock
    /// 2. Evaluate checks against live data
    /// 3. Write one WAL entry for the whole commit (durability)
    /// 4. Write to MemTable
    /// 5. Check if flush is needed
    pub fn commit(&self, checks: &[Check], mutations: Vec<Mutation>) -> Result<CommitResult> {
        let _write_guard = self.write_lock.lock().map_err(|e| {
            GatewayError::LockPoisoned(format!("Write lock poisoned: {}", e))
        })?;

        let now_ms = now_millis();
        for check in checks {
            let current = self.get_at(&check.key, now_ms)?.map(|entry| entry.version);
            if current != check.expected {
                return Ok(CommitResult::CheckFailed {
                    key: check.key.clone(),
                });
            }
        }

        let version = {
            let mut wal = self.wal.lock().map_err(|e| {
                GatewayError::LockPoisoned(format!("WAL lock poisoned: {}", e))
            })?;
            if mutations.is_empty() {
                return Ok(CommitResult::Committed {
                    version: wal.current_lsn() - 1,
                });
            }
            wal.append(mutations.clone())?
        };

        let mut new_size = 0;
        for mutation in mutations {
            new_size = self.memtable.put(
                mutation.key,
                VersionedValue {
                    version,
                    expires_at: mutation.expires_at,
                    data: mutation.value,
                },
            );
        }

        if new_size >= self.config.memtable_size_limit {
            self.flush_internal()?;
        }

        Ok(CommitResult::Committed { version })
    }

    /// Flush memtable to disk (public API)
    ///
    /// Forces a flush regardless of memtable size
    pub fn flush(&self) -> Result<()> {
        let _write_guard = self.write_lock.lock().map_err(|e| {
            GatewayError::LockPoisoned(format!("Write lock poisoned: {}", e))
        })?;

        self.flush_internal()
    }

    /// Merge all SSTables now, dropping expired entries
    pub fn compact(&self) -> Result<()> {
        let _write_guard = self.write_lock.lock().map_err(|e| {
            GatewayError::LockPoisoned(format!("Write lock poisoned: {}", e))
        })?;

        self.storage.compact(now_millis())?;
        Ok(())
    }

    /// Internal flush implementation (called with write lock held)
    fn flush_internal(&self) -> Result<()> {
        if self.memtable.is_empty() {
            return Ok(());
        }

        // Steps 1-2: Flush memtable to SSTable, then clear it
        {
            let _flush_guard = self.flush_lock.write();
            self.storage.flush(&self.memtable)?;
            self.memtable.clear();
        }

        // Step 3: Truncate WAL (entries are now durable in SSTable)
        {
            let mut wal = self.wal.lock().map_err(|e| {
                GatewayError::LockPoisoned(format!("WAL lock poisoned: {}", e))
            })?;

            wal.truncate()?;
        }

        // Step 4: Compact once too many SSTables accumulated
        if self.storage.sstable_count() > self.config.max_sstables {
            self.storage.compact(now_millis())?;
        }

        Ok(())
    }

    /// Close the engine gracefully
    ///
    /// Flushes any pending data and syncs to disk
    pub fn close(&self) -> Result<()> {
        self.flush()?;

        let mut wal = self.wal.lock().map_err(|e| {
            GatewayError::LockPoisoned(format!("WAL lock poisoned: {}", e))
        })?;

        wal.sync()
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the storage directory path (where SSTables are stored)
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Get the current memtable size
    pub fn memtable_size(&self) -> usize {
        self.memtable.size()
    }

    /// Get the memtable entry count
    pub fn memtable_entry_count(&self) -> usize {
        self.memtable.entry_count()
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.storage.sstable_count()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}
