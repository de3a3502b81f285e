//! On-demand storage and cookie scans
//!
//! A scan fetches a snapshot through the [`SnapshotSource`] and feeds it to
//! the collector. The fetch runs without touching the collection lock; the
//! insert happens under the ticket captured before the fetch, so a scan that
//! outlives a reset comes back `Superseded`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::collection::IngestOutcome;
use super::collector::{Collector, SessionTicket};
use super::context::ActiveContext;
use crate::detection::{ContextId, DetectionSource, FeedEvent, ObservedEvent};
use crate::security::Sanitizer;
use crate::sources::{ScanError, SnapshotSource};

/// A snapshot to fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScanRequest {
    Storage { context_id: ContextId },
    Cookies { context_id: ContextId, url: String },
}

impl ScanRequest {
    /// Scan requested by a feed event, if it asks for one
    pub fn from_feed(event: &FeedEvent) -> Option<Self> {
        match event {
            FeedEvent::StorageSnapshotRequested { context_id } => Some(Self::Storage {
                context_id: *context_id,
            }),
            FeedEvent::CookiesSnapshotRequested { context_id, url } => Some(Self::Cookies {
                context_id: *context_id,
                url: url.clone(),
            }),
            FeedEvent::RequestObserved { .. } => None,
        }
    }

    /// Scan matching `source` for the active context
    ///
    /// `Ok(None)` when the source is `RequestHeaders`, which has nothing to
    /// fetch.
    pub fn for_active(
        active: &ActiveContext,
        source: DetectionSource,
    ) -> Result<Option<Self>, ScanError> {
        match source {
            DetectionSource::RequestHeaders => Ok(None),
            DetectionSource::BrowserStorage => Ok(Some(Self::Storage {
                context_id: active.id,
            })),
            DetectionSource::Cookies => {
                let url = active.url.clone().ok_or(ScanError::MissingUrl)?;
                Ok(Some(Self::Cookies {
                    context_id: active.id,
                    url,
                }))
            }
        }
    }

    pub fn context_id(&self) -> ContextId {
        match self {
            Self::Storage { context_id } | Self::Cookies { context_id, .. } => *context_id,
        }
    }

    fn source(&self) -> DetectionSource {
        match self {
            Self::Storage { .. } => DetectionSource::BrowserStorage,
            Self::Cookies { .. } => DetectionSource::Cookies,
        }
    }
}

/// Runs scans against a snapshot source and ingests the results
pub struct Scanner {
    source: Arc<dyn SnapshotSource>,
    collector: Arc<Collector>,
}

impl Scanner {
    pub fn new(source: Arc<dyn SnapshotSource>, collector: Arc<Collector>) -> Self {
        Self { source, collector }
    }

    /// Scans under the current ticket
    pub async fn scan(&self, request: &ScanRequest) -> Result<IngestOutcome, ScanError> {
        let ticket = self.collector.ticket().await;
        self.scan_with(&ticket, request).await
    }

    /// Scans under a ticket captured earlier
    ///
    /// Requests for a source the ticket's policy doesn't watch are skipped
    /// without fetching.
    pub async fn scan_with(
        &self,
        ticket: &SessionTicket,
        request: &ScanRequest,
    ) -> Result<IngestOutcome, ScanError> {
        if ticket.policy().detection_source() != request.source() {
            tracing::debug!(
                "Skipping {:?} scan, policy watches {}",
                request.source(),
                ticket.policy().detection_source().id()
            );
            return Ok(IngestOutcome::NoMatch);
        }

        let event = match request {
            ScanRequest::Storage { context_id } => {
                let items = self
                    .fetch(*context_id, self.source.fetch_storage(*context_id))
                    .await?;
                ObservedEvent::Storage {
                    origin: context_id.to_string(),
                    items,
                }
            }
            ScanRequest::Cookies { context_id, url } => {
                let cookies = self
                    .fetch(*context_id, self.source.fetch_cookies(*context_id, url))
                    .await?;
                ObservedEvent::Cookies {
                    url: url.clone(),
                    cookies,
                }
            }
        };

        Ok(self.collector.ingest_with(ticket, &event).await)
    }

    /// Scans the active context under a ticket
    ///
    /// `Ok(None)` when the ticket's policy has nothing to scan for.
    pub async fn scan_active(
        &self,
        ticket: &SessionTicket,
        active: &ActiveContext,
    ) -> Result<Option<IngestOutcome>, ScanError> {
        let Some(request) = ScanRequest::for_active(active, ticket.policy().detection_source())?
        else {
            return Ok(None);
        };

        if let ScanRequest::Cookies { url, .. } = &request {
            tracing::debug!("Scanning cookies for {}", Sanitizer::sanitize_url(url));
        }
        self.scan_with(ticket, &request).await.map(Some)
    }

    async fn fetch<T>(
        &self,
        context_id: ContextId,
        fetch: impl std::future::Future<Output = Result<T, ScanError>>,
    ) -> Result<T, ScanError> {
        fetch.await.inspect_err(|e| {
            tracing::warn!(
                "Scan of {} via {} failed: {}",
                context_id,
                self.source.id(),
                e
            );
        })
    }
}
