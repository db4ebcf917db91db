//! Tests for WAL Reader
//!
//! These tests verify:
//! - Reading entries in order
//! - Clean EOF and partial tails
//! - CRC errors surfacing through the iterator

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use refgate::config::WalSyncStrategy;
use refgate::wal::{Mutation, WalEntry, WalReader, WalWriter, HEADER_SIZE};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_wal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("test.wal");
    (temp_dir, wal_path)
}

fn write_entries(path: &PathBuf, count: usize) {
    let mut writer = WalWriter::open(path, WalSyncStrategy::EveryWrite).unwrap();
    for i in 0..count {
        writer
            .append(vec![Mutation::put(
                format!("key{}", i).into_bytes(),
                format!("value{}", i).into_bytes(),
            )])
            .unwrap();
    }
}

// =============================================================================
// Reading Tests
// =============================================================================

#[test]
fn test_read_empty_file() {
    let (_temp, wal_path) = setup_temp_wal();
    File::create(&wal_path).unwrap();

    let mut reader = WalReader::open(&wal_path).unwrap();
    assert!(reader.next_entry().unwrap().is_none());
    assert!(!reader.hit_partial_tail());
    assert_eq!(reader.position(), 0);
}

#[test]
fn test_read_in_order() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries(&wal_path, 5);

    let entries: Vec<WalEntry> = WalReader::open(&wal_path)
        .unwrap()
        .entries()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(entries.len(), 5);
    for (i, entry) in entries.iter().enumerate() {
        assert_eq!(entry.lsn, (i + 1) as u64);
        assert_eq!(entry.mutations[0].key, format!("key{}", i).into_bytes());
    }
}

#[test]
fn test_position_tracks_valid_entries() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries(&wal_path, 3);
    let file_len = std::fs::metadata(&wal_path).unwrap().len();

    let mut reader = WalReader::open(&wal_path).unwrap();
    while reader.next_entry().unwrap().is_some() {}

    assert_eq!(reader.position(), file_len);
}

// =============================================================================
// Partial and Corrupt Tail Tests
// =============================================================================

#[test]
fn test_partial_header_is_eof() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries(&wal_path, 2);

    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(&[0u8; HEADER_SIZE / 2]).unwrap();
    drop(file);

    let mut reader = WalReader::open(&wal_path).unwrap();
    assert!(reader.next_entry().unwrap().is_some());
    assert!(reader.next_entry().unwrap().is_some());
    assert!(reader.next_entry().unwrap().is_none());
    assert!(reader.hit_partial_tail());
}

#[test]
fn test_partial_data_is_eof() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries(&wal_path, 1);

    let extra = WalEntry::new(2, vec![Mutation::put(b"k".to_vec(), b"v".to_vec())])
        .serialize()
        .unwrap();
    let mut file = OpenOptions::new().append(true).open(&wal_path).unwrap();
    file.write_all(&extra[..extra.len() - 2]).unwrap();
    drop(file);

    let mut reader = WalReader::open(&wal_path).unwrap();
    assert_eq!(reader.next_entry().unwrap().unwrap().lsn, 1);
    assert!(reader.next_entry().unwrap().is_none());
    assert!(reader.hit_partial_tail());
}

#[test]
fn test_crc_mismatch_stops_iterator() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries(&wal_path, 3);

    // Flip the last byte of the last entry
    let mut bytes = std::fs::read(&wal_path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    std::fs::write(&wal_path, &bytes).unwrap();

    let results: Vec<_> = WalReader::open(&wal_path).unwrap().entries().collect();
    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(results[1].is_ok());
    assert!(results[2].is_err());
}
