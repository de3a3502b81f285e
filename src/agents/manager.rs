//! Agent manager - Orchestrates the session's agents
//!
//! Spawns each agent's main loop on the runtime, stops them in
//! registration order, and reports their status.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use super::base::{Agent, AgentError, AgentStatus};

/// How long `stop` waits for an agent loop to return before aborting it
const STOP_GRACE: Duration = Duration::from_secs(2);

/// Manages the lifecycle of multiple agents
pub struct AgentManager {
    agents: RwLock<Vec<Arc<dyn Agent>>>,
    handles: RwLock<HashMap<&'static str, JoinHandle<()>>>,
}

impl AgentManager {
    /// Creates a new AgentManager
    pub fn new() -> Self {
        Self {
            agents: RwLock::new(Vec::new()),
            handles: RwLock::new(HashMap::new()),
        }
    }

    /// Registers an agent, replacing any agent with the same id
    pub async fn register(&self, agent: Arc<dyn Agent>) {
        let mut agents = self.agents.write().await;
        agents.retain(|a| a.id() != agent.id());
        agents.push(agent);
    }

    /// Gets an agent by id
    pub async fn get(&self, id: &str) -> Option<Arc<dyn Agent>> {
        self.agents
            .read()
            .await
            .iter()
            .find(|a| a.id() == id)
            .cloned()
    }

    /// Starts every registered agent that isn't running
    pub async fn start_all(&self) -> Result<(), AgentError> {
        let agents = self.agents.read().await.clone();

        for agent in agents {
            if agent.status().is_stopped() {
                self.spawn(agent).await;
            }
        }

        Ok(())
    }

    /// Starts a specific agent by id
    #[cfg(test)]
    pub async fn start_agent(&self, id: &str) -> Result<(), AgentError> {
        let agent = self
            .get(id)
            .await
            .ok_or_else(|| AgentError::NotFound(id.to_string()))?;
        self.spawn(agent).await;
        Ok(())
    }

    async fn spawn(&self, agent: Arc<dyn Agent>) {
        let id = agent.id();
        let runner = Arc::clone(&agent);

        let handle = tokio::spawn(async move {
            if let Err(e) = runner.start().await {
                tracing::error!("Agent '{}' error: {}", runner.id(), e);
            }
        });

        if let Some(previous) = self.handles.write().await.insert(id, handle) {
            previous.abort();
        }
        tracing::info!("Started agent: {}", id);
    }

    /// Whether the agent's loop has been spawned and hasn't returned
    pub async fn is_running(&self, id: &str) -> bool {
        self.handles
            .read()
            .await
            .get(id)
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stops all agents, in registration order
    pub async fn stop_all(&self) -> Result<(), AgentError> {
        let agents = self.agents.read().await.clone();

        for agent in agents {
            self.stop(agent).await?;
        }

        Ok(())
    }

    /// Stops a specific agent by id; unknown ids are ignored
    pub async fn stop_agent(&self, id: &str) -> Result<(), AgentError> {
        match self.get(id).await {
            Some(agent) => self.stop(agent).await,
            None => Ok(()),
        }
    }

    async fn stop(&self, agent: Arc<dyn Agent>) -> Result<(), AgentError> {
        let Some(mut handle) = self.handles.write().await.remove(agent.id()) else {
            return Ok(());
        };

        agent.stop().await?;

        if tokio::time::timeout(STOP_GRACE, &mut handle).await.is_err() {
            tracing::warn!("Agent '{}' did not stop in time, aborting", agent.id());
            handle.abort();
        }

        tracing::info!("Stopped agent: {}", agent.id());
        Ok(())
    }

    /// Gets the status of all agents
    pub async fn status(&self) -> HashMap<&'static str, AgentStatus> {
        self.agents
            .read()
            .await
            .iter()
            .map(|agent| (agent.id(), agent.status()))
            .collect()
    }

    /// Returns the number of registered agents
    pub async fn agent_count(&self) -> usize {
        self.agents.read().await.len()
    }

    /// Triggers a specific agent
    pub async fn trigger_agent(&self, id: &str) -> Result<(), AgentError> {
        let agent = self
            .get(id)
            .await
            .ok_or_else(|| AgentError::NotFound(id.to_string()))?;
        agent.trigger().await
    }
}

impl Default for AgentManager {
    fn default() -> Self {
        Self::new()
    }
}
