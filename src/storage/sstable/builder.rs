//! SSTable Builder
//!
//! Writes sorted entries to a new SSTable file.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{GatewayError, Result};
use crate::memtable::VersionedValue;

use super::{SSTable, HEADER_SIZE, MAGIC, NO_EXPIRY, VERSION};

/// Builder for creating new SSTables from sorted entries
///
/// Writes to `<path>.tmp` and renames into place on `finish()`, so a crash
/// mid-build never leaves a half-written table under the final name.
pub struct SSTableBuilder {
    /// Final file path
    path: PathBuf,
    /// Path being written
    tmp_path: PathBuf,
    /// Buffered writer for performance
    writer: BufWriter<File>,
    /// Number of entries written
    entry_count: u64,
    /// Current write position (for index)
    current_offset: u64,
    /// Index: key → file offset of entry
    index: Vec<(Vec<u8>, u64)>,
    /// Track min/max keys for metadata
    min_key: Option<Vec<u8>>,
    max_key: Option<Vec<u8>>,
    max_version: u64,
    /// Running CRC hasher for data section
    data_hasher: crc32fast::Hasher,
}

impl SSTableBuilder {
    /// Create a new SSTable builder
    ///
    /// Writes header immediately; call `add()` in sorted order, then
    /// `finish()` to write index and footer.
    pub fn new(path: &Path) -> Result<Self> {
        let tmp_path = path.with_extension("sst.tmp");
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;

        let mut writer = BufWriter::new(file);

        // Write header (entry_count placeholder, will be updated in finish)
        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&0u64.to_le_bytes())?;

        Ok(Self {
            path: path.to_path_buf(),
            tmp_path,
            writer,
            entry_count: 0,
            current_offset: HEADER_SIZE,
            index: Vec::new(),
            min_key: None,
            max_key: None,
            max_version: 0,
            data_hasher: crc32fast::Hasher::new(),
        })
    }

    /// Add an entry (must be called in strictly increasing key order)
    pub fn add(&mut self, key: &[u8], value: &VersionedValue) -> Result<()> {
        if let Some(last) = &self.max_key {
            if key <= last.as_slice() {
                return Err(GatewayError::Storage(
                    "SSTable keys must be added in increasing order".to_string(),
                ));
            }
        }

        self.index.push((key.to_vec(), self.current_offset));
        if self.min_key.is_none() {
            self.min_key = Some(key.to_vec());
        }
        self.max_key = Some(key.to_vec());
        self.max_version = self.max_version.max(value.version);

        // [key_len(4)][val_len(4)][version(8)][expires_at(8)][key][value]
        let mut header = Vec::with_capacity(24);
        header.extend_from_slice(&(key.len() as u32).to_le_bytes());
        header.extend_from_slice(&(value.data.len() as u32).to_le_bytes());
        header.extend_from_slice(&value.version.to_le_bytes());
        header.extend_from_slice(&value.expires_at.unwrap_or(NO_EXPIRY).to_le_bytes());

        for part in [header.as_slice(), key, value.data.as_slice()] {
            self.writer.write_all(part)?;
            self.data_hasher.update(part);
        }

        self.current_offset += (header.len() + key.len() + value.data.len()) as u64;
        self.entry_count += 1;

        Ok(())
    }

    /// Finish building: write index block, footer, and return metadata
    pub fn finish(mut self) -> Result<SSTable> {
        let index_offset = self.current_offset;

        // Index block: [key_len(4)][offset(8)][key] for each entry
        for (key, offset) in &self.index {
            self.writer.write_all(&(key.len() as u32).to_le_bytes())?;
            self.writer.write_all(&offset.to_le_bytes())?;
            self.writer.write_all(key)?;
        }

        let data_crc = self.data_hasher.finalize();

        self.writer.write_all(&index_offset.to_le_bytes())?;
        self.writer.write_all(&self.max_version.to_le_bytes())?;
        self.writer.write_all(&data_crc.to_le_bytes())?;
        self.writer.write_all(&[0u8; 4])?;
        self.writer.flush()?;

        // Seek back and update entry count in header
        let mut file = self
            .writer
            .into_inner()
            .map_err(|e| GatewayError::Storage(format!("Failed to flush SSTable: {}", e)))?;
        file.seek(SeekFrom::Start(6))?; // After magic + version
        file.write_all(&self.entry_count.to_le_bytes())?;
        file.sync_all()?;

        let file_size = file.metadata()?.len();
        drop(file);
        fs::rename(&self.tmp_path, &self.path)?;

        Ok(SSTable {
            path: self.path,
            entry_count: self.entry_count,
            min_key: self.min_key.unwrap_or_default(),
            max_key: self.max_key.unwrap_or_default(),
            max_version: self.max_version,
            file_size,
        })
    }
}
