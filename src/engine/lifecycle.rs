//! Lifecycle manager
//!
//! Reacts to environment shutdown signals and explicit clear commands by
//! wiping the collection and its mirror. Hosts pass shutdown in as a
//! [`ShutdownSignal`] instead of the engine hooking window events itself.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::collector::{Collector, ResetCause};
use crate::store::{MirrorError, MirrorStore};

/// Environment shutdown notification
///
/// Sent once per closing window; `remaining_contexts` is how many monitored
/// contexts are still open after this one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownSignal {
    pub remaining_contexts: usize,
}

impl ShutdownSignal {
    /// Signal for the last window closing
    pub fn last_window() -> Self {
        Self {
            remaining_contexts: 0,
        }
    }
}

/// What a shutdown signal did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownOutcome {
    /// Collection and mirror wiped
    Wiped,
    /// Other contexts still open; nothing wiped yet
    Deferred,
    /// Policy has auto-cleanup off
    AutoCleanupDisabled,
}

/// Wipes collector state and its mirror on shutdown or explicit clear
pub struct LifecycleManager {
    collector: Arc<Collector>,
    mirror: Arc<dyn MirrorStore>,
}

impl LifecycleManager {
    pub fn new(collector: Arc<Collector>, mirror: Arc<dyn MirrorStore>) -> Self {
        Self { collector, mirror }
    }

    /// Handles an environment shutdown signal
    ///
    /// Safe to call repeatedly; the wipe happens once no monitored context
    /// remains, and wiping an already empty state is a no-op.
    pub async fn on_environment_shutdown_signal(
        &self,
        signal: ShutdownSignal,
    ) -> Result<ShutdownOutcome, MirrorError> {
        if !self.collector.policy().await.auto_cleanup() {
            tracing::debug!("Shutdown signal ignored, auto-cleanup disabled");
            return Ok(ShutdownOutcome::AutoCleanupDisabled);
        }

        if signal.remaining_contexts > 0 {
            tracing::debug!(
                "Shutdown cleanup deferred, {} contexts remain",
                signal.remaining_contexts
            );
            return Ok(ShutdownOutcome::Deferred);
        }

        self.collector.reset(ResetCause::Shutdown).await;
        let removed = self.mirror.wipe().await?;
        tracing::info!("Shutdown cleanup complete (mirror removed: {})", removed);
        Ok(ShutdownOutcome::Wiped)
    }

    /// Handles an explicit clear, regardless of the auto-cleanup flag
    pub async fn on_explicit_clear_command(&self) -> Result<(), MirrorError> {
        self.collector.clear().await;
        self.mirror.wipe().await?;
        tracing::info!("Collection cleared by user");
        Ok(())
    }
}
