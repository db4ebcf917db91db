//! Request Log
//!
//! Request lifecycle records with secondary indexes.
//!
//! ## Key Layout
//! ```text
//! ["log", "id", id]                  -> LogRecord (JSON)
//! ["log", "path", path, id]          -> encoded primary key
//! ["log", "search", search, id]      -> encoded primary key
//! ["log", "status", status, id]      -> encoded primary key
//! ```
//!
//! ## Write Path
//! The HTTP layer never awaits log writes. It hands events to a [`LogHandle`];
//! a single [`LogWriter`] task applies them in order, so a request's begin
//! always lands before its finish.

use std::time::Duration;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use ulid::{Generator, Ulid};

use crate::error::{GatewayError, Result};
use crate::store::{CommitOutcome, InsertOutcome, Key, Store};

/// Retention of log records and their index entries
pub const LOG_TTL: Duration = Duration::from_secs(90 * 24 * 60 * 60);

/// Attempts made for a finish event that fails on a store error
pub const FINISH_ATTEMPTS: u32 = 3;

const FINISH_BACKOFF: Duration = Duration::from_millis(50);

/// One request, from arrival to response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: String,
    pub path: String,
    /// Raw query string including the leading `?`, or empty
    pub search: String,
    pub created_at: DateTime<Utc>,
    /// Processing time in milliseconds, set on finish
    pub time: Option<u64>,
    /// Response status, set on finish
    pub status: Option<u16>,
}

/// Ids generated within one millisecond increment instead of re-randomizing
static IDS: Lazy<Mutex<Generator>> = Lazy::new(|| Mutex::new(Generator::new()));

fn next_id() -> Ulid {
    IDS.lock().generate().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "monotonic id space exhausted, using a random id");
        Ulid::new()
    })
}

impl LogRecord {
    /// Open record with a fresh, strictly increasing id
    pub fn new(path: impl Into<String>, search: impl Into<String>) -> Self {
        Self {
            id: next_id().to_string(),
            path: path.into(),
            search: search.into(),
            created_at: Utc::now(),
            time: None,
            status: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_some()
    }
}

// =============================================================================
// Keys
// =============================================================================

fn log_prefix() -> Key {
    Key::new().with("log")
}

fn id_key(id: &str) -> Key {
    log_prefix().with("id").with(id)
}

fn path_key(path: &str, id: &str) -> Key {
    log_prefix().with("path").with(path).with(id)
}

fn search_key(search: &str, id: &str) -> Key {
    log_prefix().with("search").with(search).with(id)
}

fn status_key(status: u16, id: &str) -> Key {
    log_prefix().with("status").with(status).with(id)
}

// =============================================================================
// Request Log
// =============================================================================

#[derive(Clone)]
pub struct RequestLog {
    store: Store,
}

impl RequestLog {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Write the primary record and its path/search index entries
    ///
    /// First write wins: an existing id is left untouched.
    pub async fn begin(&self, record: &LogRecord) -> Result<InsertOutcome> {
        let primary = id_key(&record.id);
        let pointer = primary.encode();

        let outcome = self
            .store
            .atomic()
            .check_absent(&primary)
            .set_json(&primary, record, Some(LOG_TTL))?
            .set(&path_key(&record.path, &record.id), pointer.clone(), Some(LOG_TTL))
            .set(&search_key(&record.search, &record.id), pointer, Some(LOG_TTL))
            .commit()
            .await?;

        Ok(match outcome {
            CommitOutcome::Committed(version) => InsertOutcome::Inserted(version),
            CommitOutcome::CheckFailed => InsertOutcome::AlreadyPresent,
        })
    }

    /// Record duration and status for an open record and index it by status
    ///
    /// Fails with [`GatewayError::LogNotFound`] if `begin` never landed.
    pub async fn finish(&self, id: &str, time: u64, status: u16) -> Result<LogRecord> {
        let primary = id_key(id);
        let current = self
            .store
            .get_json::<LogRecord>(&primary)
            .await?
            .ok_or_else(|| GatewayError::LogNotFound(id.to_string()))?;

        let updated = LogRecord {
            time: Some(time),
            status: Some(status),
            ..current.value
        };

        self.store
            .atomic()
            .set_json(&primary, &updated, Some(LOG_TTL))?
            .set(&status_key(status, id), primary.encode(), Some(LOG_TTL))
            .commit()
            .await?;

        Ok(updated)
    }

    pub async fn get(&self, id: &str) -> Result<Option<LogRecord>> {
        Ok(self
            .store
            .get_json::<LogRecord>(&id_key(id))
            .await?
            .map(|record| record.value))
    }

    pub async fn by_path(&self, path: &str) -> Result<Vec<LogRecord>> {
        self.resolve_index(log_prefix().with("path").with(path)).await
    }

    pub async fn by_search(&self, search: &str) -> Result<Vec<LogRecord>> {
        self.resolve_index(log_prefix().with("search").with(search)).await
    }

    pub async fn by_status(&self, status: u16) -> Result<Vec<LogRecord>> {
        self.resolve_index(log_prefix().with("status").with(status)).await
    }

    /// Follow every pointer under `prefix`, skipping dangling ones
    async fn resolve_index(&self, prefix: Key) -> Result<Vec<LogRecord>> {
        let entries = self.store.list_prefix(&prefix, None).await?;

        let mut records = Vec::with_capacity(entries.len());
        for entry in entries {
            let primary = Key::decode(&entry.value)?;
            if let Some(record) = self.store.get_json::<LogRecord>(&primary).await? {
                records.push(record.value);
            }
        }
        Ok(records)
    }
}

// =============================================================================
// Background Writer
// =============================================================================

#[derive(Debug)]
enum LogEvent {
    Begin(LogRecord),
    Finish { id: String, time: u64, status: u16 },
}

/// Cheap, cloneable sender side of the log writer
///
/// Never blocks: when the queue is full the event is dropped with a warning.
#[derive(Clone)]
pub struct LogHandle {
    tx: mpsc::Sender<LogEvent>,
}

impl LogHandle {
    /// Queue the opening write for `record`
    pub fn begin(&self, record: LogRecord) {
        self.send(LogEvent::Begin(record));
    }

    /// Queue the closing write for `id`
    pub fn finish(&self, id: impl Into<String>, time: u64, status: u16) {
        self.send(LogEvent::Finish {
            id: id.into(),
            time,
            status,
        });
    }

    fn send(&self, event: LogEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::warn!(?event, "request log queue full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                tracing::debug!(?event, "request log writer stopped, dropping event");
            }
        }
    }
}

/// The task applying queued log events to the store
pub struct LogWriter {
    task: JoinHandle<()>,
    stop: oneshot::Sender<()>,
}

impl LogWriter {
    /// Start the writer with a queue of `capacity` events
    pub fn spawn(log: RequestLog, capacity: usize) -> (LogHandle, LogWriter) {
        let (tx, mut rx) = mpsc::channel(capacity.max(1));
        let (stop, mut stop_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    event = rx.recv() => match event {
                        Some(event) => apply(&log, event).await,
                        None => break,
                    },
                    _ = &mut stop_rx => {
                        rx.close();
                        while let Some(event) = rx.recv().await {
                            apply(&log, event).await;
                        }
                        break;
                    }
                }
            }
            tracing::debug!("request log writer stopped");
        });

        (LogHandle { tx }, LogWriter { task, stop })
    }

    /// Stop accepting events, apply everything already queued, and wait
    pub async fn shutdown(self) -> Result<()> {
        // The task may already have exited if every handle was dropped
        let _ = self.stop.send(());
        self.task.await?;
        Ok(())
    }
}

async fn apply(log: &RequestLog, event: LogEvent) {
    match event {
        LogEvent::Begin(record) => match log.begin(&record).await {
            Ok(InsertOutcome::Inserted(_)) => {}
            Ok(InsertOutcome::AlreadyPresent) => {
                tracing::warn!(id = %record.id, "request log already exists");
            }
            Err(e) => {
                tracing::warn!(id = %record.id, path = %record.path, error = %e, "failed to create request log");
            }
        },
        LogEvent::Finish { id, time, status } => {
            for attempt in 1..=FINISH_ATTEMPTS {
                match log.finish(&id, time, status).await {
                    Ok(_) => return,
                    Err(GatewayError::LogNotFound(_)) => {
                        tracing::error!(%id, "could not find request log to finish");
                        return;
                    }
                    Err(e) if attempt < FINISH_ATTEMPTS => {
                        tracing::debug!(%id, attempt, error = %e, "finishing request log failed, retrying");
                        tokio::time::sleep(FINISH_BACKOFF * attempt).await;
                    }
                    Err(e) => {
                        tracing::warn!(%id, status, error = %e, "dropping request log finish");
                    }
                }
            }
        }
    }
}
