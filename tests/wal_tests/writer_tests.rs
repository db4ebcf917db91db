//! Tests for WAL Writer
//!
//! These tests verify:
//! - LSN generation and sequencing
//! - Sync strategies (EveryWrite, EveryNEntries)
//! - Truncation keeps LSNs monotonic
//! - Reopening continues numbering

use std::path::PathBuf;

use refgate::config::WalSyncStrategy;
use refgate::wal::{Mutation, WalReader, WalWriter};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_wal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("test.wal");
    (temp_dir, wal_path)
}

fn put(key: &str, value: &str) -> Vec<Mutation> {
    vec![Mutation::put(key.as_bytes().to_vec(), value.as_bytes().to_vec())]
}

fn count_entries(path: &PathBuf) -> usize {
    WalReader::open(path).unwrap().entries().filter(|e| e.is_ok()).count()
}

// =============================================================================
// Basic Writing Tests
// =============================================================================

#[test]
fn test_write_single_entry() {
    let (_temp, wal_path) = setup_temp_wal();

    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    let lsn = writer.append(put("key1", "value1")).unwrap();

    assert_eq!(lsn, 1);
    assert_eq!(writer.current_lsn(), 2);
}

#[test]
fn test_lsn_sequential() {
    let (_temp, wal_path) = setup_temp_wal();

    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    for i in 0..50 {
        let lsn = writer.append(put(&format!("key{}", i), "v")).unwrap();
        assert_eq!(lsn, (i + 1) as u64);
    }
    drop(writer);

    assert_eq!(count_entries(&wal_path), 50);
}

#[test]
fn test_multi_key_commit_is_one_entry() {
    let (_temp, wal_path) = setup_temp_wal();

    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    let lsn = writer
        .append(vec![
            Mutation::put(b"a".to_vec(), b"1".to_vec()),
            Mutation::put(b"b".to_vec(), b"2".to_vec()),
            Mutation::put(b"c".to_vec(), b"3".to_vec()),
        ])
        .unwrap();
    drop(writer);

    let entries: Vec<_> = WalReader::open(&wal_path)
        .unwrap()
        .entries()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].lsn, lsn);
    assert_eq!(entries[0].mutations.len(), 3);
}

// =============================================================================
// Sync Strategy Tests
// =============================================================================

#[test]
fn test_every_n_entries_tracks_uncommitted() {
    let (_temp, wal_path) = setup_temp_wal();

    let mut writer =
        WalWriter::open(&wal_path, WalSyncStrategy::EveryNEntries { count: 3 }).unwrap();

    writer.append(put("a", "1")).unwrap();
    writer.append(put("b", "2")).unwrap();
    assert_eq!(writer.uncommitted_count(), 2);

    writer.append(put("c", "3")).unwrap();
    assert_eq!(writer.uncommitted_count(), 0);

    writer.append(put("d", "4")).unwrap();
    writer.sync().unwrap();
    assert_eq!(writer.uncommitted_count(), 0);
}

#[test]
fn test_every_write_never_leaves_uncommitted() {
    let (_temp, wal_path) = setup_temp_wal();

    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    writer.append(put("a", "1")).unwrap();
    assert_eq!(writer.uncommitted_count(), 0);
}

// =============================================================================
// Truncation and Reopen Tests
// =============================================================================

#[test]
fn test_truncate_keeps_lsn_monotonic() {
    let (_temp, wal_path) = setup_temp_wal();

    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    writer.append(put("a", "1")).unwrap();
    writer.append(put("b", "2")).unwrap();

    writer.truncate().unwrap();
    assert_eq!(std::fs::metadata(&wal_path).unwrap().len(), 0);

    let lsn = writer.append(put("c", "3")).unwrap();
    assert_eq!(lsn, 3);
    drop(writer);

    assert_eq!(count_entries(&wal_path), 1);
}

#[test]
fn test_reopen_continues_numbering() {
    let (_temp, wal_path) = setup_temp_wal();

    {
        let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
        writer.append(put("a", "1")).unwrap();
        writer.append(put("b", "2")).unwrap();
    }

    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    assert_eq!(writer.current_lsn(), 3);
    assert_eq!(writer.append(put("c", "3")).unwrap(), 3);
}

#[test]
fn test_advance_to_only_moves_forward() {
    let (_temp, wal_path) = setup_temp_wal();

    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    writer.advance_to(100);
    assert_eq!(writer.current_lsn(), 100);

    writer.advance_to(10);
    assert_eq!(writer.current_lsn(), 100);
    assert_eq!(writer.append(put("a", "1")).unwrap(), 100);
}

#[test]
fn test_reopen_cuts_torn_tail() {
    let (_temp, wal_path) = setup_temp_wal();

    {
        let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
        writer.append(put("a", "1")).unwrap();
    }
    let valid_len = std::fs::metadata(&wal_path).unwrap().len();

    // Half of a header
    {
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new().append(true).open(&wal_path).unwrap();
        file.write_all(&[0xAB; 7]).unwrap();
    }

    let mut writer = WalWriter::open(&wal_path, WalSyncStrategy::EveryWrite).unwrap();
    assert_eq!(std::fs::metadata(&wal_path).unwrap().len(), valid_len);
    writer.append(put("b", "2")).unwrap();
    drop(writer);

    assert_eq!(count_entries(&wal_path), 2);
}
