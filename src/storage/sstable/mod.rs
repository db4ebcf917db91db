//! SSTable Module
//!
//! Sorted String Table - immutable on-disk sorted key-value storage.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Header (14 bytes)                                       │
//! │   Magic: "RGKV" (4) | Version: u16 (2) | Count: u64 (8) │
//! ├─────────────────────────────────────────────────────────┤
//! │ Data Block (variable)                                   │
//! │   [KeyLen: u32][ValLen: u32][Version: u64]              │
//! │   [ExpiresAt: u64][Key][Value]                          │
//! │   ... repeated for each entry ...                       │
//! │   (ExpiresAt = u64::MAX means the entry never expires)  │
//! ├─────────────────────────────────────────────────────────┤
//! │ Index Block (variable)                                  │
//! │   [KeyLen: u32][Offset: u64][Key]                       │
//! │   ... repeated for each entry ...                       │
//! ├─────────────────────────────────────────────────────────┤
//! │ Footer (24 bytes)                                       │
//! │   IndexOffset: u64 (8) | MaxVersion: u64 (8)            │
//! │   DataCRC: u32 (4) | Padding (4)                        │
//! └─────────────────────────────────────────────────────────┘
//! ```

mod builder;
mod iterator;
mod reader;

use std::path::PathBuf;

pub use builder::SSTableBuilder;
pub use iterator::SSTableIterator;
pub use reader::SSTableReader;

// =============================================================================
// Shared Constants (used by builder, reader, iterator)
// =============================================================================

/// Magic bytes identifying a refgate SSTable file
pub(crate) const MAGIC: &[u8; 4] = b"RGKV";

/// Current SSTable format version
pub(crate) const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) + EntryCount (8) = 14 bytes
pub(crate) const HEADER_SIZE: u64 = 14;

/// Footer size: IndexOffset (8) + MaxVersion (8) + DataCRC (4) + Padding (4) = 24 bytes
pub(crate) const FOOTER_SIZE: u64 = 24;

/// Fixed part of a data entry: KeyLen (4) + ValLen (4) + Version (8) + ExpiresAt (8)
pub(crate) const ENTRY_HEADER_SIZE: usize = 24;

/// Sentinel stored in ExpiresAt for entries without expiry
pub(crate) const NO_EXPIRY: u64 = u64::MAX;

// =============================================================================
// SSTable Metadata
// =============================================================================

/// SSTable metadata returned when a table is written
#[derive(Debug, Clone)]
pub struct SSTable {
    /// Path to the SSTable file
    pub path: PathBuf,
    /// Number of entries in this SSTable
    pub entry_count: u64,
    /// Smallest key (for range filtering)
    pub min_key: Vec<u8>,
    /// Largest key (for range filtering)
    pub max_key: Vec<u8>,
    /// Highest versionstamp stored in the table
    pub max_version: u64,
    /// File size in bytes
    pub file_size: u64,
}

impl SSTable {
    /// Get the number of entries
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Quick check if a key might be in this SSTable (range check)
    /// Returns false if key is definitely outside [min_key, max_key]
    pub fn might_contain(&self, key: &[u8]) -> bool {
        key >= self.min_key.as_slice() && key <= self.max_key.as_slice()
    }
}

/// Decode the fixed entry header: (key_len, val_len, version, expires_at)
pub(crate) fn decode_entry_header(header: &[u8; ENTRY_HEADER_SIZE]) -> (usize, usize, u64, Option<u64>) {
    let mut u32buf = [0u8; 4];
    let mut u64buf = [0u8; 8];

    u32buf.copy_from_slice(&header[0..4]);
    let key_len = u32::from_le_bytes(u32buf) as usize;
    u32buf.copy_from_slice(&header[4..8]);
    let val_len = u32::from_le_bytes(u32buf) as usize;
    u64buf.copy_from_slice(&header[8..16]);
    let version = u64::from_le_bytes(u64buf);
    u64buf.copy_from_slice(&header[16..24]);
    let expires_at = match u64::from_le_bytes(u64buf) {
        NO_EXPIRY => None,
        at => Some(at),
    };

    (key_len, val_len, version, expires_at)
}
