//! Configuration for refgate
//!
//! Centralized configuration with sensible defaults.

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{GatewayError, Result};

/// Upper bound for the blocked-client stall, whatever the configuration says
pub const MAX_BLOCKED_STALL: Duration = Duration::from_secs(30 * 60);

/// Main configuration for a refgate instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all store files (WAL, SSTables)
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── wal.log          (write-ahead log)
    ///     └── sstables/        (SSTable files)
    pub data_dir: PathBuf,

    /// Sync strategy: how often to fsync WAL
    pub wal_sync_strategy: WalSyncStrategy,

    /// Max size of memtable before flush (in bytes)
    pub memtable_size_limit: usize,

    /// Number of SSTables that triggers a full compaction
    pub max_sstables: usize,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// HTTP listen host
    pub listen_host: String,

    /// HTTP listen port
    pub listen_port: u16,

    // -------------------------------------------------------------------------
    // HTTP Configuration
    // -------------------------------------------------------------------------
    /// Static validator sent as `ETag` and compared against `If-None-Match`
    pub static_etag: String,

    /// Directory holding the static image assets
    pub static_dir: PathBuf,

    /// JSON corpus served by the reference endpoints
    pub corpus_path: PathBuf,

    // -------------------------------------------------------------------------
    // Throttling Configuration
    // -------------------------------------------------------------------------
    /// How long a blocked client waits before its 404 is sent
    pub blocked_stall: Duration,

    /// Reload cadence for the in-process block set (None = startup snapshot only)
    pub blocklist_refresh: Option<Duration>,

    // -------------------------------------------------------------------------
    // Request Log Configuration
    // -------------------------------------------------------------------------
    /// Capacity of the background request-log queue
    pub log_queue_capacity: usize,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./refgate_data"),
            wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
            memtable_size_limit: 16 * 1024 * 1024, // 16 MB
            max_sstables: 8,
            listen_host: "127.0.0.1".to_string(),
            listen_port: 8000,
            static_etag: "v1".to_string(),
            static_dir: PathBuf::from("./static"),
            corpus_path: PathBuf::from("./data/corpus.json"),
            blocked_stall: Duration::from_secs(10 * 60),
            blocklist_refresh: None,
            log_queue_capacity: 1024,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Resolve the HTTP listen address from host and port
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        (self.listen_host.as_str(), self.listen_port)
            .to_socket_addrs()
            .map_err(|e| {
                GatewayError::Config(format!(
                    "invalid listen address {}:{}: {}",
                    self.listen_host, self.listen_port, e
                ))
            })?
            .next()
            .ok_or_else(|| {
                GatewayError::Config(format!(
                    "listen address {}:{} did not resolve",
                    self.listen_host, self.listen_port
                ))
            })
    }

    /// Stall applied to blocked clients, clamped to [`MAX_BLOCKED_STALL`]
    pub fn effective_blocked_stall(&self) -> Duration {
        self.blocked_stall.min(MAX_BLOCKED_STALL)
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Set the memtable size limit (in bytes)
    pub fn memtable_size_limit(mut self, size: usize) -> Self {
        self.config.memtable_size_limit = size;
        self
    }

    /// Set the SSTable count that triggers compaction
    pub fn max_sstables(mut self, count: usize) -> Self {
        self.config.max_sstables = count;
        self
    }

    /// Set the HTTP listen host
    pub fn listen_host(mut self, host: impl Into<String>) -> Self {
        self.config.listen_host = host.into();
        self
    }

    /// Set the HTTP listen port
    pub fn listen_port(mut self, port: u16) -> Self {
        self.config.listen_port = port;
        self
    }

    /// Set the static ETag value
    pub fn static_etag(mut self, etag: impl Into<String>) -> Self {
        self.config.static_etag = etag.into();
        self
    }

    /// Set the static asset directory
    pub fn static_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.static_dir = path.into();
        self
    }

    /// Set the corpus file
    pub fn corpus_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.corpus_path = path.into();
        self
    }

    /// Set the blocked-client stall
    pub fn blocked_stall(mut self, stall: Duration) -> Self {
        self.config.blocked_stall = stall;
        self
    }

    /// Set the block set reload cadence (None disables reloading)
    pub fn blocklist_refresh(mut self, every: Option<Duration>) -> Self {
        self.config.blocklist_refresh = every;
        self
    }

    /// Set the request-log queue capacity
    pub fn log_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.log_queue_capacity = capacity;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
