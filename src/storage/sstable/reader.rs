//! SSTable Reader
//!
//! Opens SSTable files and provides O(log n) key lookups via in-memory index.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::ops::Bound;
use std::path::{Path, PathBuf};

use crate::error::{GatewayError, Result};
use crate::memtable::VersionedValue;

use super::iterator::SSTableIterator;
use super::{
    decode_entry_header, ENTRY_HEADER_SIZE, FOOTER_SIZE, HEADER_SIZE, MAGIC, VERSION,
};

/// Reader for SSTable files with in-memory index for O(log n) lookups
pub struct SSTableReader {
    path: PathBuf,
    /// File handle for reading entries
    pub(super) file: BufReader<File>,
    /// In-memory index: key → file offset
    index: BTreeMap<Vec<u8>, u64>,
    entry_count: u64,
    max_version: u64,
    /// Index block starting offset (end of the data block)
    pub(super) index_offset: u64,
}

fn u64_at(bytes: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(buf)
}

fn u32_at(bytes: &[u8], at: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(buf)
}

impl SSTableReader {
    /// Open an SSTable for reading
    ///
    /// Validates the data block CRC and loads the entire index into memory.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();
        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(GatewayError::Storage(format!(
                "SSTable {} is too short ({} bytes)",
                path.display(),
                file_size
            )));
        }

        // Read and validate header
        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;

        if &header[0..4] != MAGIC {
            return Err(GatewayError::Storage(format!(
                "Invalid SSTable magic: expected RGKV, got {:?}",
                &header[0..4]
            )));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != VERSION {
            return Err(GatewayError::Storage(format!(
                "Unsupported SSTable version: {}",
                version
            )));
        }

        let entry_count = u64_at(&header, 6);

        // Footer: index offset, max version, data CRC
        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer)?;

        let index_offset = u64_at(&footer, 0);
        let max_version = u64_at(&footer, 8);
        let data_crc = u32_at(&footer, 16);

        if index_offset < HEADER_SIZE || index_offset > file_size - FOOTER_SIZE {
            return Err(GatewayError::Storage(format!(
                "SSTable {} has a bad index offset {}",
                path.display(),
                index_offset
            )));
        }

        // Validate the data block
        file.seek(SeekFrom::Start(HEADER_SIZE))?;
        let mut data = vec![0u8; (index_offset - HEADER_SIZE) as usize];
        file.read_exact(&mut data)?;
        if crc32fast::hash(&data) != data_crc {
            return Err(GatewayError::Storage(format!(
                "SSTable {} failed its data checksum",
                path.display()
            )));
        }
        drop(data);

        // Load index: [key_len(4)][offset(8)][key]
        let index_block_size = file_size - FOOTER_SIZE - index_offset;
        let mut index_data = vec![0u8; index_block_size as usize];
        file.read_exact(&mut index_data)?;

        let mut index = BTreeMap::new();
        let mut pos = 0;
        while pos + 12 <= index_data.len() {
            let key_len = u32_at(&index_data, pos) as usize;
            let offset = u64_at(&index_data, pos + 4);
            pos += 12;

            if pos + key_len > index_data.len() {
                break;
            }
            index.insert(index_data[pos..pos + key_len].to_vec(), offset);
            pos += key_len;
        }

        file.seek(SeekFrom::Start(0))?;

        Ok(Self {
            path: path.to_path_buf(),
            file: BufReader::new(file),
            index,
            entry_count,
            max_version,
            index_offset,
        })
    }

    /// Get a value by key, O(log n) via the in-memory index
    pub fn get(&mut self, key: &[u8]) -> Result<Option<VersionedValue>> {
        let offset = match self.index.get(key) {
            Some(&off) => off,
            None => return Ok(None),
        };
        self.read_at(offset).map(|(_, value)| Some(value))
    }

    /// Entries with `start <= key < end`, in key order
    pub fn range(&mut self, start: &[u8], end: &[u8]) -> Result<Vec<(Vec<u8>, VersionedValue)>> {
        if start >= end {
            return Ok(Vec::new());
        }
        let offsets: Vec<u64> = self
            .index
            .range::<[u8], _>((Bound::Included(start), Bound::Excluded(end)))
            .map(|(_, &off)| off)
            .collect();

        offsets.into_iter().map(|off| self.read_at(off)).collect()
    }

    fn read_at(&mut self, offset: u64) -> Result<(Vec<u8>, VersionedValue)> {
        self.file.seek(SeekFrom::Start(offset))?;

        let mut header = [0u8; ENTRY_HEADER_SIZE];
        self.file.read_exact(&mut header)?;
        let (key_len, val_len, version, expires_at) = decode_entry_header(&header);

        let mut key = vec![0u8; key_len];
        self.file.read_exact(&mut key)?;
        let mut data = vec![0u8; val_len];
        self.file.read_exact(&mut data)?;

        Ok((
            key,
            VersionedValue {
                version,
                expires_at,
                data,
            },
        ))
    }

    /// Get entry count
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Highest versionstamp stored in this table
    pub fn max_version(&self) -> u64 {
        self.max_version
    }

    /// Path of the table file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the minimum key in this SSTable (for range filtering)
    pub fn min_key(&self) -> Option<&[u8]> {
        self.index.keys().next().map(|k| k.as_slice())
    }

    /// Get the maximum key in this SSTable (for range filtering)
    pub fn max_key(&self) -> Option<&[u8]> {
        self.index.keys().next_back().map(|k| k.as_slice())
    }

    /// Quick check if a key might be in this SSTable (range check)
    pub fn might_contain(&self, key: &[u8]) -> bool {
        match (self.min_key(), self.max_key()) {
            (Some(min), Some(max)) => key >= min && key <= max,
            _ => false,
        }
    }

    /// Whether `[start, end)` can intersect this table's key span
    pub fn overlaps(&self, start: &[u8], end: &[u8]) -> bool {
        match (self.min_key(), self.max_key()) {
            (Some(min), Some(max)) => start <= max && end > min,
            _ => false,
        }
    }

    /// Create an iterator over all entries (for compaction)
    pub fn iter(&mut self) -> Result<SSTableIterator<'_>> {
        SSTableIterator::new(&mut self.file, self.index_offset)
    }
}
