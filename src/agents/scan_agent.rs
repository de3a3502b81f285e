//! Scan agent - Periodically scans the active context
//!
//! When the policy watches browser storage or cookies there is no push feed
//! for them, so this agent fetches a snapshot of the active context at a
//! configurable interval. `trigger` scans immediately.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::base::{Agent, AgentError, AgentStatus, RunState};
use crate::engine::{Collector, ContextTracker, IngestOutcome, Scanner};
use crate::sources::ScanError;

/// Configuration for the scan agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    /// Interval between scans; `None` disables periodic scans
    pub interval: Option<Duration>,
    /// Whether to scan immediately on start
    pub scan_on_start: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            interval: Some(Duration::from_secs(30)),
            scan_on_start: true,
        }
    }
}

impl ScanConfig {
    /// Creates a config with an interval in seconds; 0 disables periodic scans
    pub fn with_interval_seconds(seconds: u64) -> Self {
        Self {
            interval: (seconds > 0).then(|| Duration::from_secs(seconds)),
            ..Self::default()
        }
    }
}

/// Result of the most recent scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub finished_at: DateTime<Utc>,
    /// `Ok(None)` when the policy had nothing to scan for
    pub result: Result<Option<IngestOutcome>, ScanError>,
}

/// Agent that scans the active context's storage or cookies
pub struct ScanAgent {
    config: ScanConfig,
    collector: Arc<Collector>,
    tracker: Arc<ContextTracker>,
    scanner: Arc<Scanner>,
    state: RunState,
    last_report: RwLock<Option<ScanReport>>,
}

impl ScanAgent {
    pub fn new(
        config: ScanConfig,
        collector: Arc<Collector>,
        tracker: Arc<ContextTracker>,
        scanner: Arc<Scanner>,
    ) -> Self {
        Self {
            config,
            collector,
            tracker,
            scanner,
            state: RunState::new(),
            last_report: RwLock::new(None),
        }
    }

    /// Gets the result of the most recent scan
    pub async fn last_report(&self) -> Option<ScanReport> {
        self.last_report.read().await.clone()
    }

    /// Scans the active context once
    ///
    /// `Ok(None)` when the policy watches request headers. Fails with
    /// `NoActiveContext` when a scan is needed but nothing is monitored.
    pub async fn scan_once(&self) -> Result<Option<IngestOutcome>, ScanError> {
        let ticket = self.collector.ticket().await;

        let result = if !ticket.policy().detection_source().needs_scan() {
            Ok(None)
        } else {
            match self.tracker.active().await {
                Some(active) => self.scanner.scan_active(&ticket, &active).await,
                None => Err(ScanError::NoActiveContext),
            }
        };

        *self.last_report.write().await = Some(ScanReport {
            finished_at: Utc::now(),
            result: result.clone(),
        });
        result
    }

    async fn periodic_scan(&self) {
        match self.scan_once().await {
            Ok(outcome) => tracing::debug!("Periodic scan: {:?}", outcome),
            Err(e) if e.awaits_context() => tracing::debug!("Periodic scan skipped: {}", e),
            Err(e) => tracing::warn!("Periodic scan failed: {}", e),
        }
    }
}

#[async_trait]
impl Agent for ScanAgent {
    fn id(&self) -> &'static str {
        "scan"
    }

    fn name(&self) -> &'static str {
        "Scan Agent"
    }

    fn status(&self) -> AgentStatus {
        self.state.status()
    }

    async fn start(&self) -> Result<(), AgentError> {
        let cancel = self.state.begin().await?;

        if self.config.scan_on_start {
            self.periodic_scan().await;
        }

        match self.config.interval {
            Some(interval) => loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        self.periodic_scan().await;
                    }
                    _ = cancel.cancelled() => {
                        tracing::info!("Scan agent cancelled");
                        break;
                    }
                }
            },
            None => cancel.cancelled().await,
        }

        self.state.finish().await;
        Ok(())
    }

    async fn stop(&self) -> Result<(), AgentError> {
        self.state.cancel().await;
        Ok(())
    }

    async fn trigger(&self) -> Result<(), AgentError> {
        self.scan_once().await?;
        Ok(())
    }
}
