//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries.

use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};

/// Header size: LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// A single key write inside a commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mutation {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    /// Absolute expiry in unix milliseconds
    pub expires_at: Option<u64>,
}

impl Mutation {
    /// A write that never expires
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            expires_at: None,
        }
    }

    /// A write that expires at the given unix millisecond
    pub fn put_expiring(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>, expires_at: u64) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            expires_at: Some(expires_at),
        }
    }
}

/// A single entry in the WAL: one atomic commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// Every write of the commit, applied together or not at all
    pub mutations: Vec<Mutation>,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// The part of an entry that lives in the data section
#[derive(Serialize, Deserialize)]
struct EntryBody {
    timestamp: u64,
    mutations: Vec<Mutation>,
}

#[derive(Serialize)]
struct EntryBodyRef<'a> {
    timestamp: u64,
    mutations: &'a [Mutation],
}

impl WalEntry {
    /// Create an entry stamped with the current time
    pub fn new(lsn: u64, mutations: Vec<Mutation>) -> Self {
        Self {
            lsn,
            mutations,
            timestamp: chrono::Utc::now().timestamp_millis().max(0) as u64,
        }
    }

    fn encode_body(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(&EntryBodyRef {
            timestamp: self.timestamp,
            mutations: &self.mutations,
        })?)
    }

    fn crc_of(lsn: u64, data: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&lsn.to_le_bytes());
        hasher.update(data);
        hasher.finalize()
    }

    /// CRC over the LSN and the encoded body
    pub fn compute_crc(&self) -> Result<u32> {
        let data = self.encode_body()?;
        Ok(Self::crc_of(self.lsn, &data))
    }

    /// Serialize to `[lsn][crc][len][data]`
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let data = self.encode_body()?;
        let crc = Self::crc_of(self.lsn, &data);

        let mut bytes = Vec::with_capacity(HEADER_SIZE + data.len());
        bytes.extend_from_slice(&self.lsn.to_le_bytes());
        bytes.extend_from_slice(&crc.to_le_bytes());
        bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&data);
        Ok(bytes)
    }

    /// Total bytes this entry occupies on disk
    pub fn serialized_size(&self) -> Result<usize> {
        Ok(HEADER_SIZE + bincode::serialized_size(&EntryBodyRef {
            timestamp: self.timestamp,
            mutations: &self.mutations,
        })? as usize)
    }

    /// Parse the fixed header: (lsn, crc, data_len)
    pub(crate) fn parse_header(header: &[u8]) -> Result<(u64, u32, usize)> {
        if header.len() < HEADER_SIZE {
            return Err(GatewayError::WalCorruption(format!(
                "Incomplete header: expected {} bytes, got {}",
                HEADER_SIZE,
                header.len()
            )));
        }
        let mut lsn = [0u8; 8];
        lsn.copy_from_slice(&header[0..8]);
        let mut crc = [0u8; 4];
        crc.copy_from_slice(&header[8..12]);
        let mut len = [0u8; 4];
        len.copy_from_slice(&header[12..16]);
        Ok((
            u64::from_le_bytes(lsn),
            u32::from_le_bytes(crc),
            u32::from_le_bytes(len) as usize,
        ))
    }

    /// Verify and decode the data section for a parsed header
    pub(crate) fn from_parts(lsn: u64, crc: u32, data: &[u8]) -> Result<Self> {
        let actual = Self::crc_of(lsn, data);
        if actual != crc {
            return Err(GatewayError::WalCorruption(format!(
                "CRC mismatch at LSN {}: expected {:08x}, got {:08x}",
                lsn, crc, actual
            )));
        }
        let body: EntryBody = bincode::deserialize(data)
            .map_err(|e| GatewayError::WalCorruption(format!("Undecodable entry {}: {}", lsn, e)))?;
        Ok(Self {
            lsn,
            mutations: body.mutations,
            timestamp: body.timestamp,
        })
    }

    /// Deserialize a complete entry from bytes
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let (lsn, crc, len) = Self::parse_header(bytes)?;
        let end = HEADER_SIZE + len;
        if bytes.len() < end {
            return Err(GatewayError::WalCorruption(format!(
                "Incomplete entry: expected {} bytes, got {}",
                end,
                bytes.len()
            )));
        }
        Self::from_parts(lsn, crc, &bytes[HEADER_SIZE..end])
    }
}
