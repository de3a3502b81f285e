//! Snapshot source trait
//!
//! Storage and cookie state isn't pushed by the event feed; it is fetched on
//! demand through a [`SnapshotSource`]. The host environment provides the
//! real implementation.

use async_trait::async_trait;
use thiserror::Error;

use crate::detection::{ContextId, CookieItem, StorageItem};

/// Errors that can occur while fetching a snapshot
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScanError {
    /// The host refused access to the context's storage or cookies
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The context is gone or not scriptable
    #[error("Context unavailable: {0}")]
    ContextUnavailable(ContextId),

    /// A scan was requested with no monitored context
    #[error("No active context to scan")]
    NoActiveContext,

    /// Cookie scan without a URL for the active context
    #[error("Active context has no known URL")]
    MissingUrl,

    /// Any other failure reported by the source
    #[error("Snapshot source error: {0}")]
    Source(String),
}

impl ScanError {
    /// True when the scan can't run until the host reports more about the
    /// active context, rather than the fetch itself failing
    pub fn awaits_context(&self) -> bool {
        matches!(self, Self::NoActiveContext | Self::MissingUrl)
    }
}

/// Fetches storage and cookie snapshots for a context
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Returns the identifier used in logs
    fn id(&self) -> &'static str;

    /// Reads both localStorage and sessionStorage of a context
    async fn fetch_storage(&self, context_id: ContextId) -> Result<Vec<StorageItem>, ScanError>;

    /// Reads the cookies visible to `url` in a context
    async fn fetch_cookies(
        &self,
        context_id: ContextId,
        url: &str,
    ) -> Result<Vec<CookieItem>, ScanError>;
}
