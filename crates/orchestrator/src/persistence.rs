//! Durable storage of the coordinator's snapshot and publication of the
//! public cursor.
//!
//! Exactly one snapshot record exists per coordinator instance; it is written
//! after every state mutation so a restart resumes from the last fully
//! processed page. The cursor sink is the external publication point for the
//! public cursor: best-effort, correctness lives in the snapshot.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

use crate::cursor::CursorSnapshot;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors from snapshot storage and cursor publication.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem access failed.
    #[error("state store io error: {0}")]
    Io(#[from] std::io::Error),

    /// The snapshot could not be encoded or decoded.
    #[error("state store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The cursor sink rejected a publication.
    #[error("cursor publication failed: {reason}")]
    Publication { reason: String },
}

impl StoreError {
    /// Create a publication error.
    pub fn publication(reason: impl Into<String>) -> Self {
        Self::Publication {
            reason: reason.into(),
        }
    }
}

/// Trait for snapshot storage backends.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the persisted snapshot, `None` if nothing was ever saved.
    async fn load(&self) -> Result<Option<CursorSnapshot>>;

    /// Replace the persisted snapshot.
    async fn save(&self, snapshot: &CursorSnapshot) -> Result<()>;
}

/// In-memory state store for testing.
#[derive(Default)]
pub struct InMemoryStateStore {
    slot: RwLock<Option<CursorSnapshot>>,
    saves: AtomicUsize,
}

impl InMemoryStateStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with a snapshot, as if a previous process
    /// had saved it.
    #[must_use]
    pub fn with_snapshot(snapshot: CursorSnapshot) -> Self {
        Self {
            slot: RwLock::new(Some(snapshot)),
            saves: AtomicUsize::new(0),
        }
    }

    /// Number of saves performed so far.
    #[must_use]
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn load(&self) -> Result<Option<CursorSnapshot>> {
        Ok(self.slot.read().await.clone())
    }

    async fn save(&self, snapshot: &CursorSnapshot) -> Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.slot.write().await = Some(snapshot.clone());
        Ok(())
    }
}

/// File-backed state store: one JSON document, replaced atomically.
///
/// The snapshot is written to a sibling temp file and renamed over the target
/// so a crash mid-write never leaves a torn document behind.
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    /// Create a store persisting to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn staging_path(&self) -> PathBuf {
        let mut staging = self.path.as_os_str().to_owned();
        staging.push(".tmp");
        PathBuf::from(staging)
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self) -> Result<Option<CursorSnapshot>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn save(&self, snapshot: &CursorSnapshot) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let staging = self.staging_path();
        tokio::fs::write(&staging, &bytes).await?;
        tokio::fs::rename(&staging, &self.path).await?;
        Ok(())
    }
}

/// Trait for publishing the public cursor to downstream consumers.
///
/// Invoked whenever the public cursor advances. The core only guarantees the
/// published value is correct and monotonic, not that it was durably
/// externalized; the snapshot is the source of truth on restart.
#[async_trait]
pub trait CursorSink: Send + Sync {
    /// Publish a new public cursor value.
    async fn publish(&self, cursor: DateTime<Utc>) -> Result<()>;
}

/// Cursor sink that only logs the new value.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingCursorSink;

#[async_trait]
impl CursorSink for LoggingCursorSink {
    async fn publish(&self, cursor: DateTime<Utc>) -> Result<()> {
        info!(cursor = %cursor.to_rfc3339(), "public cursor advanced");
        Ok(())
    }
}

/// In-memory cursor sink for testing: records the publication history.
#[derive(Default)]
pub struct InMemoryCursorSink {
    history: RwLock<Vec<DateTime<Utc>>>,
}

impl InMemoryCursorSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every value published so far, in order.
    pub async fn history(&self) -> Vec<DateTime<Utc>> {
        self.history.read().await.clone()
    }

    /// The most recently published value.
    pub async fn latest(&self) -> Option<DateTime<Utc>> {
        self.history.read().await.last().copied()
    }
}

#[async_trait]
impl CursorSink for InMemoryCursorSink {
    async fn publish(&self, cursor: DateTime<Utc>) -> Result<()> {
        self.history.write().await.push(cursor);
        Ok(())
    }
}
