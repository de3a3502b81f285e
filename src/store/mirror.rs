//! Ephemeral mirror of the collection
//!
//! The display surface may run out of process, so the current masked view is
//! mirrored to a store it can read. The mirror never holds raw tokens and is
//! wiped on explicit clear and on shutdown cleanup.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::engine::CollectionView;

/// Errors that can occur during mirror operations
#[derive(Debug, Error)]
pub enum MirrorError {
    /// Filesystem error
    #[error("Mirror IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Mirror content could not be (de)serialized
    #[error("Invalid mirror data: {0}")]
    InvalidFormat(#[from] serde_json::Error),
}

/// What gets written to the mirror
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorRecord {
    pub written_at: DateTime<Utc>,
    pub collection: CollectionView,
}

/// Storage for the mirrored view
#[async_trait]
pub trait MirrorStore: Send + Sync {
    /// Replaces the mirrored view
    async fn write(&self, view: &CollectionView) -> Result<(), MirrorError>;

    /// Reads the mirrored view, if any
    async fn read(&self) -> Result<Option<MirrorRecord>, MirrorError>;

    /// Removes the mirror; returns false if there was nothing to remove
    async fn wipe(&self) -> Result<bool, MirrorError>;
}

/// Mirror kept in process memory
#[derive(Debug, Default)]
pub struct MemoryMirror {
    record: RwLock<Option<MirrorRecord>>,
}

impl MemoryMirror {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MirrorStore for MemoryMirror {
    async fn write(&self, view: &CollectionView) -> Result<(), MirrorError> {
        *self.record.write().await = Some(MirrorRecord {
            written_at: Utc::now(),
            collection: view.clone(),
        });
        Ok(())
    }

    async fn read(&self) -> Result<Option<MirrorRecord>, MirrorError> {
        Ok(self.record.read().await.clone())
    }

    async fn wipe(&self) -> Result<bool, MirrorError> {
        Ok(self.record.write().await.take().is_some())
    }
}

/// Sequence for staging file names, unique per write
static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

/// Mirror kept in a JSON file
///
/// Each write goes to its own sibling temp file and is renamed into place,
/// so a reader never sees a half-written mirror.
#[derive(Debug, Clone)]
pub struct FileMirror {
    path: PathBuf,
}

impl FileMirror {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Mirror file in the OS temp dir, named after this process
    pub fn session_scoped() -> Self {
        Self::new(
            std::env::temp_dir().join(format!("tokenscope-mirror-{}.json", std::process::id())),
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let seq = STAGING_SEQ.fetch_add(1, Ordering::Relaxed);
        self.path
            .with_extension(format!("{}.{}.tmp", std::process::id(), seq))
    }
}

async fn discard_staging(staging: &Path) {
    match tokio::fs::remove_file(staging).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove {}: {}", staging.display(), e),
    }
}

#[async_trait]
impl MirrorStore for FileMirror {
    async fn write(&self, view: &CollectionView) -> Result<(), MirrorError> {
        let record = MirrorRecord {
            written_at: Utc::now(),
            collection: view.clone(),
        };
        let content = serde_json::to_string_pretty(&record)?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let staging = self.staging_path();
        let staged = match tokio::fs::write(&staging, content).await {
            Ok(()) => tokio::fs::rename(&staging, &self.path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = staged {
            discard_staging(&staging).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn read(&self) -> Result<Option<MirrorRecord>, MirrorError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn wipe(&self) -> Result<bool, MirrorError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                tracing::debug!("Removed mirror {}", self.path.display());
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
