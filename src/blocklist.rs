//! Block-List Guard
//!
//! Tracks throttled clients in the store and in an in-process set.
//!
//! ## Responsibilities
//! - Count offenses per client identifier (`["blocked", "ip", <id>]`)
//! - Answer "is this client blocked?" without touching the store
//! - Load the persisted set at startup, optionally reloading it periodically
//!
//! Enforcement only reads the in-process set. Persisting an offense can fail
//! or lose a race without affecting whether the current process throttles.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::error::{GatewayError, Result};
use crate::store::{CommitOutcome, Key, Store};

/// Attempts made by [`BlockList::record_offense`] before giving up
pub const OFFENSE_COMMIT_ATTEMPTS: u32 = 3;

/// Identifier used when a request carries no usable client address
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Persisted offense record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedClient {
    pub ip: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub requests: u64,
}

fn blocked_prefix() -> Key {
    Key::new().with("blocked")
}

fn blocked_key(ip: &str) -> Key {
    blocked_prefix().with("ip").with(ip)
}

/// Resolve the client identifier of a request
///
/// Order: first `X-Forwarded-For` entry, `CF-Connecting-IP`, socket peer.
pub fn client_id(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.split(',').next().unwrap_or("").trim().to_string())
            .filter(|value| !value.is_empty())
    };

    header("x-forwarded-for")
        .or_else(|| header("cf-connecting-ip"))
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

pub struct BlockList {
    store: Store,
    blocked: DashSet<String>,
}

impl BlockList {
    /// An empty guard; nothing is blocked until [`BlockList::refresh`] or [`BlockList::block`]
    pub fn new(store: Store) -> Self {
        Self {
            store,
            blocked: DashSet::new(),
        }
    }

    /// Build the guard from every persisted record
    pub async fn load(store: Store) -> Result<Self> {
        let list = Self::new(store);
        let loaded = list.refresh().await?;
        tracing::info!(blocked = loaded, "block list loaded");
        Ok(list)
    }

    pub fn is_blocked(&self, ip: &str) -> bool {
        self.blocked.contains(ip)
    }

    /// Add to the in-process set. Returns false if it was already there.
    pub fn block(&self, ip: &str) -> bool {
        self.blocked.insert(ip.to_string())
    }

    pub fn len(&self) -> usize {
        self.blocked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocked.is_empty()
    }

    /// The persisted record for `ip`, if any
    pub async fn get(&self, ip: &str) -> Result<Option<BlockedClient>> {
        Ok(self
            .store
            .get_json::<BlockedClient>(&blocked_key(ip))
            .await?
            .map(|record| record.value))
    }

    /// Create or bump the offense record for `ip`
    ///
    /// Read-modify-write guarded by the version just read; retried on conflict.
    pub async fn record_offense(&self, ip: &str) -> Result<BlockedClient> {
        let key = blocked_key(ip);

        for attempt in 1..=OFFENSE_COMMIT_ATTEMPTS {
            let current = self.store.get_json::<BlockedClient>(&key).await?;

            let (record, expected) = match current {
                None => (
                    BlockedClient {
                        ip: ip.to_string(),
                        created_at: Utc::now(),
                        updated_at: None,
                        requests: 1,
                    },
                    None,
                ),
                Some(existing) => (
                    BlockedClient {
                        requests: existing.value.requests + 1,
                        updated_at: Some(Utc::now()),
                        ..existing.value
                    },
                    Some(existing.version),
                ),
            };

            let outcome = self
                .store
                .atomic()
                .check(&key, expected)
                .set_json(&key, &record, None)?
                .commit()
                .await?;

            match outcome {
                CommitOutcome::Committed(_) => return Ok(record),
                CommitOutcome::CheckFailed => {
                    tracing::debug!(ip, attempt, "offense record changed underneath, retrying");
                }
            }
        }

        Err(GatewayError::CommitContention {
            key: key.to_string(),
            attempts: OFFENSE_COMMIT_ATTEMPTS,
        })
    }

    /// Union every persisted identifier into the in-process set
    ///
    /// Returns how many identifiers were newly added.
    pub async fn refresh(&self) -> Result<usize> {
        let records = self
            .store
            .list_prefix_json::<BlockedClient>(&blocked_prefix(), None)
            .await?;

        Ok(records
            .into_iter()
            .filter(|record| self.block(&record.value.ip))
            .count())
    }

    /// Reload from the store every `every` until the returned task is aborted
    pub fn spawn_refresh(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // First tick completes immediately; the startup load already ran
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match self.refresh().await {
                    Ok(0) => {}
                    Ok(added) => tracing::info!(added, "block list refreshed"),
                    Err(e) => tracing::warn!(error = %e, "block list refresh failed"),
                }
            }
        })
    }
}
