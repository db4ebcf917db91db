//! WAL Reader
//!
//! Handles reading entries from the WAL file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::error::{GatewayError, Result};

use super::entry::{WalEntry, HEADER_SIZE};

/// Largest data section accepted before the entry is treated as garbage
const MAX_ENTRY_DATA: usize = 64 * 1024 * 1024;

/// Reads entries from the WAL file
pub struct WalReader {
    file: BufReader<File>,
    /// Offset just past the last complete, valid entry
    position: u64,
    /// Set when the file ends in the middle of an entry
    partial_tail: bool,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            file: BufReader::new(file),
            position: 0,
            partial_tail: false,
        })
    }

    /// Read the next entry from the WAL
    ///
    /// Returns `Ok(None)` at end of file, including when the tail holds a
    /// partially written entry. A CRC mismatch is a `WalCorruption` error.
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        if self.partial_tail {
            return Ok(None);
        }

        let mut header = [0u8; HEADER_SIZE];
        let read = self.read_up_to(&mut header)?;
        if read == 0 {
            return Ok(None);
        }
        if read < HEADER_SIZE {
            self.partial_tail = true;
            return Ok(None);
        }

        let (lsn, crc, len) = WalEntry::parse_header(&header)?;
        if len > MAX_ENTRY_DATA {
            return Err(GatewayError::WalCorruption(format!(
                "Entry {} claims {} bytes of data",
                lsn, len
            )));
        }

        let mut data = vec![0u8; len];
        if self.read_up_to(&mut data)? < len {
            self.partial_tail = true;
            return Ok(None);
        }

        let entry = WalEntry::from_parts(lsn, crc, &data)?;
        self.position += (HEADER_SIZE + len) as u64;
        Ok(Some(entry))
    }

    /// Iterate over all valid entries
    pub fn entries(self) -> WalIterator {
        WalIterator {
            reader: self,
            done: false,
        }
    }

    /// Offset just past the last valid entry read so far
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Whether reading stopped at an incomplete entry
    pub fn hit_partial_tail(&self) -> bool {
        self.partial_tail
    }

    /// Fill as much of `buf` as the file allows
    fn read_up_to(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }
}

/// Iterator over WAL entries
///
/// Yields the first corruption error and then stops.
pub struct WalIterator {
    reader: WalReader,
    done: bool,
}

impl Iterator for WalIterator {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
