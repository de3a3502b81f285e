//! Base agent trait and types
//!
//! Defines the Agent trait shared by the feed, scan and mirror agents, and
//! the run-state bookkeeping they have in common.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::sources::ScanError;
use crate::store::MirrorError;

/// Errors that can occur in agents
#[derive(Debug, Error)]
pub enum AgentError {
    /// Agent is already running
    #[error("Agent is already running")]
    AlreadyRunning,

    /// No agent registered under that id
    #[error("Agent '{0}' not found")]
    NotFound(String),

    /// Agent cannot run with its current wiring
    #[error("Agent operation failed: {0}")]
    OperationFailed(String),

    /// A triggered scan failed
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// Mirror sync failed
    #[error(transparent)]
    Mirror(#[from] MirrorError),
}

/// Status of an agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentStatus {
    /// Agent is idle and not running
    Idle,
    /// Agent is currently running
    Running,
    /// Agent encountered an error
    Error(String),
    /// Agent has been stopped
    Stopped,
}

impl AgentStatus {
    /// Returns true if the agent is running
    pub fn is_running(&self) -> bool {
        matches!(self, AgentStatus::Running)
    }

    /// Returns true if the agent can be started
    pub fn is_stopped(&self) -> bool {
        matches!(
            self,
            AgentStatus::Idle | AgentStatus::Stopped | AgentStatus::Error(_)
        )
    }

    /// Returns true if the agent has an error
    pub fn has_error(&self) -> bool {
        matches!(self, AgentStatus::Error(_))
    }
}

/// Trait for background agents
///
/// `start` runs the agent's loop until `stop` is called, so callers spawn
/// it. An agent can be started again after it stopped.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Returns the unique identifier for this agent
    fn id(&self) -> &'static str;

    /// Returns the display name for this agent
    fn name(&self) -> &'static str;

    /// Returns the current status of the agent
    fn status(&self) -> AgentStatus;

    /// Runs the agent's main loop until stopped
    async fn start(&self) -> Result<(), AgentError>;

    /// Signals the main loop to exit
    async fn stop(&self) -> Result<(), AgentError>;

    /// Runs the agent's work once, right now
    async fn trigger(&self) -> Result<(), AgentError> {
        Ok(())
    }
}

/// Status and cancellation shared by every agent
///
/// A stop that lands before the loop called `begin` still cancels that run.
/// Each finished run arms a fresh [`CancellationToken`], so a stopped agent
/// can be started again.
#[derive(Debug)]
pub(crate) struct RunState {
    status: RwLock<AgentStatus>,
    cancel: RwLock<CancellationToken>,
}

impl RunState {
    pub(crate) fn new() -> Self {
        Self {
            status: RwLock::new(AgentStatus::Idle),
            cancel: RwLock::new(CancellationToken::new()),
        }
    }

    /// Non-blocking status read; reports `Idle` while a transition holds the lock
    pub(crate) fn status(&self) -> AgentStatus {
        self.status
            .try_read()
            .map(|s| s.clone())
            .unwrap_or(AgentStatus::Idle)
    }

    /// Marks the agent running and hands out the token for this run
    pub(crate) async fn begin(&self) -> Result<CancellationToken, AgentError> {
        let mut status = self.status.write().await;
        if status.is_running() {
            return Err(AgentError::AlreadyRunning);
        }
        *status = AgentStatus::Running;
        Ok(self.cancel.read().await.clone())
    }

    /// Marks the run over and arms a fresh token for the next one
    pub(crate) async fn finish(&self) {
        *self.cancel.write().await = CancellationToken::new();
        *self.status.write().await = AgentStatus::Stopped;
    }

    pub(crate) async fn fail(&self, message: impl Into<String>) {
        *self.cancel.write().await = CancellationToken::new();
        *self.status.write().await = AgentStatus::Error(message.into());
    }

    pub(crate) async fn cancel(&self) {
        self.cancel.read().await.cancel();
    }
}
