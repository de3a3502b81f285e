//! In-memory snapshot source
//!
//! Holds the storage and cookie state the host last reported for each
//! context. Used by the JSON-lines host and by tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::base::{ScanError, SnapshotSource};
use crate::detection::{ContextId, CookieItem, StorageItem};

#[derive(Debug, Default, Clone)]
struct ContextState {
    storage: Vec<StorageItem>,
    cookies: Vec<CookieItem>,
    denied: bool,
}

/// Snapshot source backed by host-reported state
#[derive(Debug, Default)]
pub struct MemorySnapshotSource {
    contexts: RwLock<HashMap<ContextId, ContextState>>,
}

impl MemorySnapshotSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the storage items reported for a context
    pub async fn set_storage(&self, context_id: ContextId, items: Vec<StorageItem>) {
        self.contexts
            .write()
            .await
            .entry(context_id)
            .or_default()
            .storage = items;
    }

    /// Replaces the cookies reported for a context
    pub async fn set_cookies(&self, context_id: ContextId, cookies: Vec<CookieItem>) {
        self.contexts
            .write()
            .await
            .entry(context_id)
            .or_default()
            .cookies = cookies;
    }

    /// Makes every fetch for the context fail with `PermissionDenied`
    pub async fn deny(&self, context_id: ContextId) {
        self.contexts
            .write()
            .await
            .entry(context_id)
            .or_default()
            .denied = true;
    }

    /// Forgets a context; later fetches report it unavailable
    pub async fn remove(&self, context_id: ContextId) {
        self.contexts.write().await.remove(&context_id);
    }

    async fn state(&self, context_id: ContextId) -> Result<ContextState, ScanError> {
        let contexts = self.contexts.read().await;
        let state = contexts
            .get(&context_id)
            .ok_or(ScanError::ContextUnavailable(context_id))?;
        if state.denied {
            return Err(ScanError::PermissionDenied(context_id.to_string()));
        }
        Ok(state.clone())
    }
}

#[async_trait]
impl SnapshotSource for MemorySnapshotSource {
    fn id(&self) -> &'static str {
        "memory"
    }

    async fn fetch_storage(&self, context_id: ContextId) -> Result<Vec<StorageItem>, ScanError> {
        Ok(self.state(context_id).await?.storage)
    }

    async fn fetch_cookies(
        &self,
        context_id: ContextId,
        url: &str,
    ) -> Result<Vec<CookieItem>, ScanError> {
        let host = host_of(url).ok_or(ScanError::MissingUrl)?;
        let cookies = self.state(context_id).await?.cookies;
        Ok(cookies
            .into_iter()
            .filter(|c| c.domain.as_deref().map_or(true, |d| domain_matches(&host, d)))
            .collect())
    }
}

/// Extracts the lowercased host of an absolute URL
fn host_of(url: &str) -> Option<String> {
    let (_, rest) = url.split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next()?;
    let host_port = authority.rsplit('@').next()?;
    let host = host_port.split(':').next()?;
    (!host.is_empty()).then(|| host.to_ascii_lowercase())
}

/// Cookie domain match: exact host, or a parent domain
fn domain_matches(host: &str, domain: &str) -> bool {
    let domain = domain.trim_start_matches('.').to_ascii_lowercase();
    host == domain || host.ends_with(&format!(".{}", domain))
}
