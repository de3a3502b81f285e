//! Feed agent - the single consumer of the session's event queue
//!
//! Pulls feed events and context signals off a bounded channel and applies
//! them in order. Request headers are ingested inline; snapshot requests are
//! handed to the scanner as separate tasks so a slow fetch never stalls the
//! queue. Each scan task carries the ticket taken when its event was
//! dequeued.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::base::{Agent, AgentError, AgentStatus, RunState};
use crate::detection::{ContextId, FeedEvent, ObservedEvent};
use crate::engine::{Collector, ContextTracker, ScanRequest, Scanner};

/// Everything the feed agent consumes
#[derive(Debug)]
pub enum SessionEvent {
    /// Event from the host's observation feed
    Feed(FeedEvent),
    /// A context became the monitored one
    ContextActivated {
        context_id: ContextId,
        url: Option<String>,
    },
    /// The monitored context navigated or reloaded
    ContentChanged {
        context_id: ContextId,
        url: Option<String>,
    },
    /// A context closed
    ContextClosed { context_id: ContextId },
    /// Answered once every event queued before it has been applied
    Barrier(oneshot::Sender<()>),
}

impl From<FeedEvent> for SessionEvent {
    fn from(event: FeedEvent) -> Self {
        Self::Feed(event)
    }
}

/// Agent applying session events to the collector and context tracker
pub struct FeedAgent {
    receiver: Mutex<Option<mpsc::Receiver<SessionEvent>>>,
    collector: Arc<Collector>,
    tracker: Arc<ContextTracker>,
    scanner: Arc<Scanner>,
    state: RunState,
}

impl FeedAgent {
    pub fn new(
        receiver: mpsc::Receiver<SessionEvent>,
        collector: Arc<Collector>,
        tracker: Arc<ContextTracker>,
        scanner: Arc<Scanner>,
    ) -> Self {
        Self {
            receiver: Mutex::new(Some(receiver)),
            collector,
            tracker,
            scanner,
            state: RunState::new(),
        }
    }

    /// Applies one event
    ///
    /// Returns the handle of the scan task when the event asked for one.
    /// Scan tasks stop early once `cancel` fires.
    pub async fn dispatch(
        &self,
        event: SessionEvent,
        cancel: &CancellationToken,
    ) -> Option<JoinHandle<()>> {
        match event {
            SessionEvent::ContextActivated { context_id, url } => {
                self.tracker.on_context_changed(context_id, url).await;
                None
            }
            SessionEvent::ContentChanged { context_id, url } => {
                self.tracker.on_content_changed(context_id, url).await;
                None
            }
            SessionEvent::ContextClosed { context_id } => {
                self.tracker.on_context_closed(context_id).await;
                None
            }
            SessionEvent::Feed(event) => self.dispatch_feed(event, cancel).await,
            SessionEvent::Barrier(done) => {
                if done.send(()).is_err() {
                    tracing::debug!("Barrier waiter went away");
                }
                None
            }
        }
    }

    async fn dispatch_feed(
        &self,
        event: FeedEvent,
        cancel: &CancellationToken,
    ) -> Option<JoinHandle<()>> {
        // Ticket before the active check: a switch in between bumps the generation
        let ticket = self.collector.ticket().await;
        let context_id = event.context_id();
        if !self.tracker.is_active(context_id).await {
            tracing::debug!("Discarding event from inactive {}", context_id);
            return None;
        }

        if let Some(request) = ScanRequest::from_feed(&event) {
            let scanner = Arc::clone(&self.scanner);
            let cancel = cancel.child_token();
            return Some(tokio::spawn(async move {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!("Scan of {} cancelled", request.context_id());
                    }
                    result = scanner.scan_with(&ticket, &request) => match result {
                        Ok(outcome) => tracing::debug!("Scan of {}: {:?}", request.context_id(), outcome),
                        Err(e) => tracing::warn!("Scan of {} failed: {}", request.context_id(), e),
                    },
                }
            }));
        }

        if let FeedEvent::RequestObserved { url, headers, .. } = event {
            self.collector
                .ingest_with(&ticket, &ObservedEvent::Headers { url, headers })
                .await;
        }
        None
    }
}

#[async_trait]
impl Agent for FeedAgent {
    fn id(&self) -> &'static str {
        "feed"
    }

    fn name(&self) -> &'static str {
        "Feed Agent"
    }

    fn status(&self) -> AgentStatus {
        self.state.status()
    }

    async fn start(&self) -> Result<(), AgentError> {
        let cancel = self.state.begin().await?;

        let Some(mut receiver) = self.receiver.lock().await.take() else {
            self.state.fail("event queue already taken").await;
            return Err(AgentError::OperationFailed(
                "feed agent has no event queue".into(),
            ));
        };

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("Feed agent cancelled");
                    break;
                }
                event = receiver.recv() => match event {
                    Some(event) => {
                        self.dispatch(event, &cancel).await;
                    }
                    None => {
                        tracing::info!("Event feed closed");
                        break;
                    }
                },
            }
        }

        // Cancels in-flight scans too
        cancel.cancel();
        *self.receiver.lock().await = Some(receiver);
        self.state.finish().await;
        Ok(())
    }

    async fn stop(&self) -> Result<(), AgentError> {
        self.state.cancel().await;
        Ok(())
    }
}
