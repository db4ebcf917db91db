//! WAL test suite
//!
//! Covers entry encoding, the writer, the reader and crash recovery.

mod entry_tests;
mod reader_tests;
mod recovery_tests;
mod writer_tests;
