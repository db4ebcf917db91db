//! Tests for WAL Entry
//!
//! These tests verify:
//! - Serialization layout and header fields
//! - CRC detection of flipped bytes
//! - Rejection of incomplete input

use refgate::wal::{Mutation, WalEntry, HEADER_SIZE};

// =============================================================================
// Helper Functions
// =============================================================================

fn sample_entry(lsn: u64) -> WalEntry {
    WalEntry::new(
        lsn,
        vec![
            Mutation::put(b"alpha".to_vec(), b"1".to_vec()),
            Mutation::put_expiring(b"beta".to_vec(), b"2".to_vec(), 1_700_000_000_000),
        ],
    )
}

// =============================================================================
// Layout Tests
// =============================================================================

#[test]
fn test_header_fields() {
    let entry = sample_entry(42);
    let bytes = entry.serialize().unwrap();

    assert_eq!(&bytes[0..8], &42u64.to_le_bytes());
    assert_eq!(&bytes[8..12], &entry.compute_crc().unwrap().to_le_bytes());

    let len = u32::from_le_bytes(bytes[12..16].try_into().unwrap()) as usize;
    assert_eq!(bytes.len(), HEADER_SIZE + len);
    assert_eq!(bytes.len(), entry.serialized_size().unwrap());
}

#[test]
fn test_commit_survives_encoding() {
    let entry = sample_entry(7);
    let decoded = WalEntry::deserialize(&entry.serialize().unwrap()).unwrap();

    assert_eq!(decoded, entry);
    assert_eq!(decoded.mutations.len(), 2);
    assert_eq!(decoded.mutations[1].expires_at, Some(1_700_000_000_000));
}

#[test]
fn test_empty_commit() {
    let entry = WalEntry::new(1, Vec::new());
    let decoded = WalEntry::deserialize(&entry.serialize().unwrap()).unwrap();
    assert!(decoded.mutations.is_empty());
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_flipped_data_byte_detected() {
    let mut bytes = sample_entry(3).serialize().unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;

    assert!(WalEntry::deserialize(&bytes).is_err());
}

#[test]
fn test_flipped_lsn_detected() {
    let mut bytes = sample_entry(3).serialize().unwrap();
    bytes[0] ^= 0x01;

    assert!(WalEntry::deserialize(&bytes).is_err());
}

#[test]
fn test_incomplete_input_rejected() {
    let bytes = sample_entry(3).serialize().unwrap();

    assert!(WalEntry::deserialize(&bytes[..HEADER_SIZE - 1]).is_err());
    assert!(WalEntry::deserialize(&bytes[..bytes.len() - 1]).is_err());
}
