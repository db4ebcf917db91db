//! Storage Manager
//!
//! Manages multiple SSTables and coordinates reads/writes.
//!
//! ## Responsibilities
//! - Discover existing SSTables on startup
//! - Search SSTables newest → oldest for reads
//! - Merge SSTables for range scans (newest version of a key wins)
//! - Create new SSTables from MemTable flushes
//! - Compact all SSTables into one, dropping expired entries

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::error::{GatewayError, Result};
use crate::memtable::{MemTable, VersionedValue};

use super::{SSTable, SSTableBuilder, SSTableReader};

/// Manages the storage layer
///
/// ## Concurrency:
/// - `sstables`: Protected by RwLock (lookups take the write side because
///   `SSTableReader` seeks its file handle)
/// - `next_sstable_id`: Atomic counter (lock-free)
pub struct StorageManager {
    /// Directory where SSTables are stored
    data_dir: PathBuf,

    /// Open SSTable readers, ordered newest → oldest
    sstables: RwLock<Vec<SSTableReader>>,

    /// Next ID for creating new SSTables
    next_sstable_id: AtomicU64,
}

impl StorageManager {
    /// Open or create storage in the given directory
    ///
    /// On startup:
    /// 1. Create directory if it doesn't exist
    /// 2. Remove leftovers of interrupted builds
    /// 3. Discover existing SSTable files and open readers
    /// 4. Order by ID descending (newest first)
    pub fn open(path: &Path) -> Result<Self> {
        fs::create_dir_all(path)?;

        let mut sstable_ids: Vec<u64> = Vec::new();
        for entry in fs::read_dir(path)? {
            let file_path = entry?.path();
            if !file_path.is_file() {
                continue;
            }
            if file_path.extension().is_some_and(|ext| ext == "tmp") {
                tracing::warn!(path = %file_path.display(), "removing unfinished SSTable");
                fs::remove_file(&file_path)?;
                continue;
            }
            if let Some(id) = Self::parse_sstable_id(&file_path) {
                sstable_ids.push(id);
            }
        }

        // Newest first (highest ID first)
        sstable_ids.sort_unstable_by(|a, b| b.cmp(a));

        let mut sstables = Vec::with_capacity(sstable_ids.len());
        for id in &sstable_ids {
            sstables.push(SSTableReader::open(&Self::sstable_path_with_dir(path, *id))?);
        }

        let next_id = sstable_ids.first().map(|&id| id + 1).unwrap_or(1);

        Ok(Self {
            data_dir: path.to_path_buf(),
            sstables: RwLock::new(sstables),
            next_sstable_id: AtomicU64::new(next_id),
        })
    }

    /// Get a value by key (searches all SSTables newest → oldest)
    ///
    /// Expiry is not evaluated here; the caller decides visibility.
    pub fn get(&self, key: &[u8]) -> Result<Option<VersionedValue>> {
        let mut sstables = self.sstables.write();

        for reader in sstables.iter_mut() {
            if !reader.might_contain(key) {
                continue;
            }
            if let Some(value) = reader.get(key)? {
                return Ok(Some(value));
            }
        }

        Ok(None)
    }

    /// Entries with `start <= key < end` across all SSTables, newest version per key
    pub fn range(&self, start: &[u8], end: &[u8]) -> Result<BTreeMap<Vec<u8>, VersionedValue>> {
        let mut merged = BTreeMap::new();
        let mut sstables = self.sstables.write();

        // Oldest first so newer tables overwrite
        for reader in sstables.iter_mut().rev() {
            if !reader.overlaps(start, end) {
                continue;
            }
            for (key, value) in reader.range(start, end)? {
                merged.insert(key, value);
            }
        }

        Ok(merged)
    }

    /// Flush a MemTable to a new SSTable
    ///
    /// Creates a new SSTable file from the MemTable's sorted entries,
    /// opens a reader for it, and adds it to the front of the list.
    pub fn flush(&self, memtable: &MemTable) -> Result<SSTable> {
        if memtable.is_empty() {
            return Err(GatewayError::Storage(
                "Cannot flush empty MemTable".to_string(),
            ));
        }

        let id = self.next_sstable_id.fetch_add(1, Ordering::SeqCst);
        let path = self.sstable_path(id);

        let mut builder = SSTableBuilder::new(&path)?;
        for (key, value) in memtable.iter() {
            builder.add(&key, &value)?;
        }
        let metadata = builder.finish()?;

        let reader = SSTableReader::open(&path)?;
        self.sstables.write().insert(0, reader);

        tracing::debug!(id, entries = metadata.entry_count, "flushed memtable to SSTable");
        Ok(metadata)
    }

    /// Merge every SSTable into one, dropping entries expired at `now_ms`
    ///
    /// Returns the new table's metadata, or `None` when nothing survived.
    /// The caller must hold off flushes while this runs.
    pub fn compact(&self, now_ms: u64) -> Result<Option<SSTable>> {
        let mut sstables = self.sstables.write();
        if sstables.len() < 2 {
            return Ok(None);
        }

        let mut merged: BTreeMap<Vec<u8>, VersionedValue> = BTreeMap::new();
        for reader in sstables.iter_mut().rev() {
            for item in reader.iter()? {
                let (key, value) = item?;
                merged.insert(key, value);
            }
        }
        let before: usize = sstables.iter().map(|r| r.entry_count() as usize).sum();
        merged.retain(|_, value| !value.is_expired(now_ms));

        let old_paths: Vec<PathBuf> = sstables.iter().map(|r| r.path().to_path_buf()).collect();

        let metadata = if merged.is_empty() {
            None
        } else {
            let id = self.next_sstable_id.fetch_add(1, Ordering::SeqCst);
            let path = self.sstable_path(id);
            let mut builder = SSTableBuilder::new(&path)?;
            for (key, value) in &merged {
                builder.add(key, value)?;
            }
            let metadata = builder.finish()?;
            *sstables = vec![SSTableReader::open(&path)?];
            Some(metadata)
        };
        if metadata.is_none() {
            sstables.clear();
        }

        for path in old_paths {
            fs::remove_file(&path)?;
        }

        tracing::info!(
            before,
            after = merged.len(),
            "compacted SSTables"
        );
        Ok(metadata)
    }

    /// Highest versionstamp across all SSTables
    pub fn max_version(&self) -> u64 {
        self.sstables
            .read()
            .iter()
            .map(|r| r.max_version())
            .max()
            .unwrap_or(0)
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.sstables.read().len()
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get the next SSTable ID (for testing/debugging)
    pub fn next_sstable_id(&self) -> u64 {
        self.next_sstable_id.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Generate the file path for an SSTable with given ID
    fn sstable_path(&self, id: u64) -> PathBuf {
        Self::sstable_path_with_dir(&self.data_dir, id)
    }

    /// Generate SSTable path given a directory and ID
    fn sstable_path_with_dir(dir: &Path, id: u64) -> PathBuf {
        dir.join(format!("sstable_{:06}.sst", id))
    }

    /// Parse SSTable ID from filename
    /// "sstable_000042.sst" → Some(42)
    fn parse_sstable_id(path: &Path) -> Option<u64> {
        if path.extension()? != "sst" {
            return None;
        }
        let name = path.file_stem()?.to_string_lossy();
        let id_str = name.strip_prefix("sstable_")?;
        id_str.parse().ok()
    }
}
