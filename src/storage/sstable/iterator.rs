//! SSTable Iterator
//!
//! Sequential iteration over all entries in an SSTable.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};

use crate::error::Result;
use crate::memtable::VersionedValue;

use super::{decode_entry_header, ENTRY_HEADER_SIZE, HEADER_SIZE};

/// Iterator over SSTable entries in sorted key order
pub struct SSTableIterator<'a> {
    file: &'a mut BufReader<File>,
    /// Stop reading when we reach this offset (start of index block)
    end_offset: u64,
    /// Current position in file
    current_offset: u64,
}

impl<'a> SSTableIterator<'a> {
    /// Create a new iterator starting from the data block
    pub(super) fn new(file: &'a mut BufReader<File>, end_offset: u64) -> Result<Self> {
        file.seek(SeekFrom::Start(HEADER_SIZE))?;
        Ok(Self {
            file,
            end_offset,
            current_offset: HEADER_SIZE,
        })
    }

    fn read_entry(&mut self) -> Result<(Vec<u8>, VersionedValue)> {
        let mut header = [0u8; ENTRY_HEADER_SIZE];
        self.file.read_exact(&mut header)?;
        let (key_len, val_len, version, expires_at) = decode_entry_header(&header);

        let mut key = vec![0u8; key_len];
        self.file.read_exact(&mut key)?;
        let mut data = vec![0u8; val_len];
        self.file.read_exact(&mut data)?;

        self.current_offset += (ENTRY_HEADER_SIZE + key_len + val_len) as u64;

        Ok((
            key,
            VersionedValue {
                version,
                expires_at,
                data,
            },
        ))
    }
}

impl<'a> Iterator for SSTableIterator<'a> {
    type Item = Result<(Vec<u8>, VersionedValue)>;

    fn next(&mut self) -> Option<Self::Item> {
        // Stop at index block
        if self.current_offset >= self.end_offset {
            return None;
        }

        match self.read_entry() {
            Ok(entry) => Some(Ok(entry)),
            Err(e) => {
                self.current_offset = self.end_offset;
                Some(Err(e))
            }
        }
    }
}
