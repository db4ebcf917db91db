//! MemTable Module
//!
//! In-memory data structure for recent commits.
//!
//! ## Responsibilities
//! - Fast reads and writes in memory
//! - Single-writer/multi-reader access pattern
//! - Track size for flush triggers
//! - Ordered iteration for SSTable creation and range scans
//!
//! ## Data Structure Choice
//! BTreeMap wrapped in RwLock:
//! - Ordered keys (required for SSTable generation and ranged lists)
//! - Simple and correct first, optimize later

mod table;

use serde::{Deserialize, Serialize};

pub use table::MemTable;

/// A stored value together with the commit that wrote it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedValue {
    /// LSN of the commit that wrote this value
    pub version: u64,

    /// Absolute expiry in unix milliseconds
    pub expires_at: Option<u64>,

    /// Raw value bytes
    pub data: Vec<u8>,
}

impl VersionedValue {
    /// Whether the value is past its expiry at `now_ms`
    pub fn is_expired(&self, now_ms: u64) -> bool {
        matches!(self.expires_at, Some(at) if at <= now_ms)
    }

    /// Approximate heap footprint, used for flush accounting
    pub fn footprint(&self) -> usize {
        self.data.len() + 16
    }
}
