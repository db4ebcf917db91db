//! # refgate
//!
//! A JSON API gateway for scripture references, backed by an embedded
//! transactional key-value store:
//! - Result cache with deterministic keys and chunked pagination
//! - Block list with offense counting and stalled responses
//! - Request log with path, search and status indexes
//! - Write-Ahead Logging (WAL) and crash recovery underneath
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     HTTP (axum)                              │
//! │      router ─► block-list guard ─► handlers ─► envelope      │
//! └──────┬──────────────────┬──────────────────────┬────────────┘
//!        │                  │                      │
//!        ▼                  ▼                      ▼
//!  ┌───────────┐     ┌─────────────┐       ┌──────────────┐
//!  │ FindCache │     │  BlockList  │       │  RequestLog  │
//!  └─────┬─────┘     └──────┬──────┘       └──────┬───────┘
//!        └──────────────────┼─────────────────────┘
//!                           ▼
//!                 ┌───────────────────┐
//!                 │ Store (atomic op) │
//!                 └─────────┬─────────┘
//!                           ▼
//!          ┌────────────────┴────────────────┐
//!          ▼                ▼                ▼
//!   ┌─────────────┐  ┌─────────────┐  ┌─────────────┐
//!   │     WAL     │  │  MemTable   │  │  SSTables   │
//!   │  (Append)   │  │  (RwLock)   │  │ (compacted) │
//!   └─────────────┘  └─────────────┘  └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod wal;
pub mod memtable;
pub mod storage;
pub mod engine;
pub mod store;

pub mod blocklist;
pub mod find_cache;
pub mod request_log;
pub mod scripture;
pub mod http;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{GatewayError, Result};
pub use config::Config;
pub use engine::Engine;
pub use store::{CommitOutcome, InsertOutcome, Key, KeyPart, Store, Versionstamp};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of refgate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
