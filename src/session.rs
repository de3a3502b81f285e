//! Monitored session wiring
//!
//! A [`Session`] owns one collector and everything attached to it: the
//! context tracker, scanner, lifecycle manager and the background agents.
//! Hosts build one per monitored session and hand it to the command layer.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::agents::{
    AgentError, AgentManager, FeedAgent, MirrorAgent, ScanAgent, ScanConfig, SessionEvent,
};
use crate::config::AppConfig;
use crate::engine::{
    Collector, ContextTracker, LifecycleManager, Scanner, ShutdownOutcome, ShutdownSignal,
};
use crate::sources::SnapshotSource;
use crate::store::{MirrorError, MirrorStore};

/// Session state shared with the command layer
pub struct Session {
    collector: Arc<Collector>,
    tracker: Arc<ContextTracker>,
    lifecycle: LifecycleManager,
    mirror: Arc<dyn MirrorStore>,
    scan_agent: Arc<ScanAgent>,
    agent_manager: AgentManager,
    feed: mpsc::Sender<SessionEvent>,
}

impl Session {
    /// Builds a session from configuration
    ///
    /// Agents are registered but not started; call [`Session::start`].
    pub async fn new(
        config: &AppConfig,
        source: Arc<dyn SnapshotSource>,
        mirror: Arc<dyn MirrorStore>,
    ) -> Self {
        let collector = Arc::new(Collector::new(config.policy()));
        let tracker = Arc::new(ContextTracker::new(collector.clone()));
        let scanner = Arc::new(Scanner::new(source, collector.clone()));
        let lifecycle = LifecycleManager::new(collector.clone(), mirror.clone());

        let (feed, receiver) = mpsc::channel(config.feed_capacity.max(1));
        let feed_agent = Arc::new(FeedAgent::new(
            receiver,
            collector.clone(),
            tracker.clone(),
            scanner.clone(),
        ));
        let scan_agent = Arc::new(ScanAgent::new(
            ScanConfig {
                scan_on_start: config.scan_on_start,
                ..ScanConfig::with_interval_seconds(config.scan_interval_secs)
            },
            collector.clone(),
            tracker.clone(),
            scanner,
        ));
        let mirror_agent = Arc::new(MirrorAgent::new(collector.clone(), mirror.clone()));

        let agent_manager = AgentManager::new();
        agent_manager.register(feed_agent).await;
        agent_manager.register(scan_agent.clone()).await;
        agent_manager.register(mirror_agent).await;

        tracing::info!("Session created with policy {}", collector.policy().await);

        Self {
            collector,
            tracker,
            lifecycle,
            mirror,
            scan_agent,
            agent_manager,
            feed,
        }
    }

    pub fn collector(&self) -> &Arc<Collector> {
        &self.collector
    }

    pub fn tracker(&self) -> &Arc<ContextTracker> {
        &self.tracker
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    pub fn mirror(&self) -> &Arc<dyn MirrorStore> {
        &self.mirror
    }

    pub fn scan_agent(&self) -> &Arc<ScanAgent> {
        &self.scan_agent
    }

    pub fn agents(&self) -> &AgentManager {
        &self.agent_manager
    }

    /// Sender for the session's event queue
    pub fn feed(&self) -> mpsc::Sender<SessionEvent> {
        self.feed.clone()
    }

    /// Waits until the feed agent has applied every event queued so far
    ///
    /// Returns at once when the feed agent isn't running, since nothing
    /// would drain the queue.
    pub async fn settle(&self) -> Result<(), AgentError> {
        if !self.agent_manager.is_running("feed").await {
            return Ok(());
        }

        let (done, applied) = oneshot::channel();
        self.feed
            .send(SessionEvent::Barrier(done))
            .await
            .map_err(|_| AgentError::OperationFailed("event feed is closed".into()))?;
        applied.await.map_err(|_| {
            AgentError::OperationFailed("feed agent dropped queued events".into())
        })
    }

    /// Starts all agents
    pub async fn start(&self) -> Result<(), AgentError> {
        self.agent_manager.start_all().await
    }

    /// Stops all agents
    pub async fn stop(&self) -> Result<(), AgentError> {
        self.agent_manager.stop_all().await
    }

    /// Runs shutdown cleanup for one closing window
    ///
    /// After a wipe the mirror agent is stopped and the mirror wiped once
    /// more, so a sync that raced the cleanup can't leave entries behind.
    pub async fn shutdown(&self, signal: ShutdownSignal) -> Result<ShutdownOutcome, MirrorError> {
        let outcome = self.lifecycle.on_environment_shutdown_signal(signal).await?;

        if outcome == ShutdownOutcome::Wiped {
            if let Err(e) = self.agent_manager.stop_agent("mirror").await {
                tracing::warn!("Failed to stop mirror agent: {}", e);
            }
            self.mirror.wipe().await?;
        }

        Ok(outcome)
    }
}
