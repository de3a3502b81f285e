//! Context tracker
//!
//! Tracks the one browsing context under observation. Switching to another
//! context, navigating or reloading the active one, or closing it empties
//! the collection.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::collector::{Collector, ResetCause};
use crate::detection::ContextId;
use crate::security::Sanitizer;

/// The monitored context and its last known URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveContext {
    pub id: ContextId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Tracks which context is active and resets the collector when it changes
pub struct ContextTracker {
    active: RwLock<Option<ActiveContext>>,
    collector: Arc<Collector>,
}

impl ContextTracker {
    pub fn new(collector: Arc<Collector>) -> Self {
        Self {
            active: RwLock::new(None),
            collector,
        }
    }

    pub async fn active(&self) -> Option<ActiveContext> {
        self.active.read().await.clone()
    }

    /// Returns true if events from `context_id` may reach the collector
    pub async fn is_active(&self, context_id: ContextId) -> bool {
        self.active
            .read()
            .await
            .as_ref()
            .is_some_and(|active| active.id == context_id)
    }

    /// Handles a context switch
    ///
    /// Returns true if the collection was reset. Re-activating the current
    /// context only refreshes its URL.
    pub async fn on_context_changed(&self, context_id: ContextId, url: Option<String>) -> bool {
        // Held across the reset so no reader sees the new id before it
        let mut active = self.active.write().await;

        if let Some(current) = active.as_mut().filter(|c| c.id == context_id) {
            if url.is_some() {
                current.url = url;
            }
            return false;
        }

        tracing::info!("Now monitoring {}", context_id);
        *active = Some(ActiveContext {
            id: context_id,
            url,
        });
        self.collector.reset(ResetCause::ContextChanged).await;
        true
    }

    /// Handles navigation or reload inside a context
    ///
    /// Forces a reset when `context_id` is the active one, even though the
    /// identifier didn't change. Ignored for other contexts.
    pub async fn on_content_changed(&self, context_id: ContextId, url: Option<String>) -> bool {
        let mut active = self.active.write().await;

        let Some(current) = active.as_mut().filter(|c| c.id == context_id) else {
            tracing::debug!("Ignoring navigation in inactive {}", context_id);
            return false;
        };

        if url.is_some() {
            current.url = url;
        }
        tracing::info!(
            "{} navigated to {}",
            context_id,
            current
                .url
                .as_deref()
                .map(Sanitizer::sanitize_url)
                .unwrap_or_else(|| "unknown URL".to_string())
        );
        self.collector.reset(ResetCause::ContentChanged).await;
        true
    }

    /// Handles the active context going away
    pub async fn on_context_closed(&self, context_id: ContextId) -> bool {
        let mut active = self.active.write().await;

        if !active.as_ref().is_some_and(|c| c.id == context_id) {
            return false;
        }

        tracing::info!("{} closed, no context monitored", context_id);
        *active = None;
        self.collector.reset(ResetCause::ContextChanged).await;
        true
    }
}
