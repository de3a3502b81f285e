//! Mirror agent - Keeps the mirrored view in step with the collection
//!
//! Subscribes to collector change notifications and rewrites the mirror
//! with the masked listing. An empty collection removes the mirror instead
//! of writing an empty one.

use std::sync::Arc;

use async_trait::async_trait;

use super::base::{Agent, AgentError, AgentStatus, RunState};
use crate::engine::{CollectionView, Collector};
use crate::store::{MirrorError, MirrorStore};

/// Agent that mirrors the masked collection to a [`MirrorStore`]
pub struct MirrorAgent {
    collector: Arc<Collector>,
    mirror: Arc<dyn MirrorStore>,
    state: RunState,
}

impl MirrorAgent {
    pub fn new(collector: Arc<Collector>, mirror: Arc<dyn MirrorStore>) -> Self {
        Self {
            collector,
            mirror,
            state: RunState::new(),
        }
    }

    /// Writes the current view, or wipes the mirror if the collection is empty
    pub async fn sync(&self) -> Result<(), MirrorError> {
        let view = CollectionView::from(&self.collector.snapshot().await);
        if view.is_empty() {
            self.mirror.wipe().await?;
        } else {
            self.mirror.write(&view).await?;
            tracing::debug!("Mirrored {} entries", view.entries.len());
        }
        Ok(())
    }

    async fn sync_logged(&self) {
        if let Err(e) = self.sync().await {
            tracing::warn!("Mirror sync failed: {}", e);
        }
    }
}

#[async_trait]
impl Agent for MirrorAgent {
    fn id(&self) -> &'static str {
        "mirror"
    }

    fn name(&self) -> &'static str {
        "Mirror Agent"
    }

    fn status(&self) -> AgentStatus {
        self.state.status()
    }

    async fn start(&self) -> Result<(), AgentError> {
        let cancel = self.state.begin().await?;
        let mut changes = self.collector.subscribe();

        self.sync_logged().await;

        loop {
            tokio::select! {
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.sync_logged().await;
                }
                _ = cancel.cancelled() => {
                    tracing::info!("Mirror agent cancelled");
                    break;
                }
            }
        }

        self.state.finish().await;
        Ok(())
    }

    async fn stop(&self) -> Result<(), AgentError> {
        self.state.cancel().await;
        Ok(())
    }

    async fn trigger(&self) -> Result<(), AgentError> {
        self.sync().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::detection::{DetectionKind, DetectionSource, Header, ObservedEvent, Policy};
    use crate::engine::ResetCause;
    use crate::store::MemoryMirror;

    fn setup() -> (Arc<Collector>, Arc<MemoryMirror>, Arc<MirrorAgent>) {
        let policy =
            Policy::new(DetectionKind::BearerHeader, DetectionSource::RequestHeaders, 5).unwrap();
        let collector = Arc::new(Collector::new(policy));
        let mirror = Arc::new(MemoryMirror::new());
        let agent = Arc::new(MirrorAgent::new(collector.clone(), mirror.clone()));
        (collector, mirror, agent)
    }

    fn bearer(token: &str) -> ObservedEvent {
        ObservedEvent::Headers {
            url: "https://api.example.com/me?key=secret".into(),
            headers: vec![Header::new("Authorization", format!("Bearer {}", token))],
        }
    }

    async fn wait_until<F, Fut>(mut check: F)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        for _ in 0..200 {
            if check().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition never held");
    }

    #[tokio::test]
    async fn test_sync_writes_masked_view() {
        let (collector, mirror, agent) = setup();
        collector.ingest(&bearer("abcd1234efgh5678")).await;

        agent.sync().await.unwrap();

        let record = mirror.read().await.unwrap().unwrap();
        assert_eq!(record.collection.entries.len(), 1);
        assert_eq!(record.collection.entries[0].masked_token, "abcd********5678");
        assert_eq!(
            record.collection.entries[0].display_source,
            "https://api.example.com/me"
        );
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("abcd1234efgh5678"));
    }

    #[tokio::test]
    async fn test_sync_wipes_when_empty() {
        let (collector, mirror, agent) = setup();
        collector.ingest(&bearer("abcd1234efgh5678")).await;
        agent.sync().await.unwrap();

        collector.reset(ResetCause::ContextChanged).await;
        agent.sync().await.unwrap();
        assert!(mirror.read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_agent_follows_changes() {
        let (collector, mirror, agent) = setup();
        let runner = agent.clone();
        let handle = tokio::spawn(async move { runner.start().await });

        collector.ingest(&bearer("abcd1234efgh5678")).await;
        wait_until(|| {
            let mirror = mirror.clone();
            async move { mirror.read().await.unwrap().is_some() }
        })
        .await;

        collector.clear().await;
        wait_until(|| {
            let mirror = mirror.clone();
            async move { mirror.read().await.unwrap().is_none() }
        })
        .await;

        agent.stop().await.unwrap();
        handle.await.unwrap().unwrap();
        assert_eq!(agent.status(), AgentStatus::Stopped);
    }
}
