//! Display and settings commands
//!
//! Everything a display or settings surface may call on a session. Listings
//! only carry masked tokens; the raw value leaves through [`copy_token`].

use std::collections::HashMap;

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::agents::{AgentError, AgentStatus};
use crate::detection::{Policy, PolicyError, PolicySettings};
use crate::engine::{CollectionView, ShutdownOutcome, ShutdownSignal, TokenHandle};
use crate::security::SecureString;
use crate::session::Session;
use crate::sources::ScanError;
use crate::store::MirrorError;

/// Errors surfaced to the calling surface
#[derive(Debug, Error)]
pub enum CommandError {
    /// Rejected policy; the active policy is unchanged
    #[error("Invalid policy: {0}")]
    Validation(#[from] PolicyError),

    /// On-demand scan failed; the collection is unchanged
    #[error("Scan failed, try again: {0}")]
    Scan(#[from] ScanError),

    /// Handle doesn't name a current entry
    #[error("No token with handle {0}")]
    UnknownHandle(TokenHandle),

    #[error("Failed to update mirror: {0}")]
    Mirror(#[from] MirrorError),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),
}

impl Serialize for CommandError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// Gets the masked collection
pub async fn get_collection(session: &Session) -> CollectionView {
    CollectionView::from(&session.collector().snapshot().await)
}

/// Reveals the raw token behind a handle
pub async fn copy_token(session: &Session, handle: TokenHandle) -> Result<SecureString, CommandError> {
    let token = session
        .collector()
        .token(handle)
        .await
        .ok_or(CommandError::UnknownHandle(handle))?;
    tracing::info!("Token {} copied", handle);
    Ok(token)
}

/// Scans the active context now and returns the updated collection
///
/// Nothing is fetched while the policy watches request headers.
pub async fn request_scan(session: &Session) -> Result<CollectionView, CommandError> {
    session.scan_agent().scan_once().await?;
    Ok(get_collection(session).await)
}

/// Clears the collection and its mirror
pub async fn clear_all(session: &Session) -> Result<(), CommandError> {
    session.lifecycle().on_explicit_clear_command().await?;
    Ok(())
}

/// Gets the active policy
pub async fn get_policy(session: &Session) -> Policy {
    session.collector().policy().await
}

/// Validates and applies a new policy, emptying the collection
pub async fn set_policy(session: &Session, settings: PolicySettings) -> Result<Policy, CommandError> {
    let policy = Policy::try_from(settings)?;
    session.collector().replace_policy(policy.clone()).await;
    Ok(policy)
}

/// Passes an environment shutdown signal to the session
pub async fn environment_shutdown(
    session: &Session,
    signal: ShutdownSignal,
) -> Result<ShutdownOutcome, CommandError> {
    Ok(session.shutdown(signal).await?)
}

/// Runs an agent's work now, e.g. a scan for `"scan"`
pub async fn trigger_agent(session: &Session, id: &str) -> Result<(), CommandError> {
    session.agents().trigger_agent(id).await?;
    Ok(())
}

/// Gets the status of the session's agents
pub async fn get_agent_status(session: &Session) -> HashMap<&'static str, AgentStatus> {
    session.agents().status().await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::AppConfig;
    use crate::detection::{ContextId, DetectionKind, DetectionSource, Header, ObservedEvent};
    use crate::sources::MemorySnapshotSource;
    use crate::store::MemoryMirror;

    async fn session() -> Session {
        Session::new(
            &AppConfig::default(),
            Arc::new(MemorySnapshotSource::new()),
            Arc::new(MemoryMirror::new()),
        )
        .await
    }

    async fn collect(session: &Session, token: &str) {
        session
            .collector()
            .ingest(&ObservedEvent::Headers {
                url: "https://api.example.com/me".into(),
                headers: vec![Header::new("Authorization", format!("Bearer {}", token))],
            })
            .await;
    }

    #[tokio::test]
    async fn test_get_collection_is_masked() {
        let session = session().await;
        collect(&session, "abc123xyz789").await;

        let view = get_collection(&session).await;
        assert_eq!(view.capacity, 5);
        assert_eq!(view.entries.len(), 1);
        assert_eq!(view.entries[0].masked_token, "abc1********z789");
    }

    #[tokio::test]
    async fn test_copy_token() {
        let session = session().await;
        collect(&session, "abc123xyz789").await;
        let handle = get_collection(&session).await.entries[0].handle;

        let token = copy_token(&session, handle).await.unwrap();
        assert_eq!(token.as_str(), "abc123xyz789");
    }

    #[tokio::test]
    async fn test_copy_stale_handle_fails() {
        let session = session().await;
        collect(&session, "abc123xyz789").await;
        let handle = get_collection(&session).await.entries[0].handle;

        clear_all(&session).await.unwrap();
        collect(&session, "def456uvw012").await;

        assert!(matches!(
            copy_token(&session, handle).await,
            Err(CommandError::UnknownHandle(h)) if h == handle
        ));
    }

    #[tokio::test]
    async fn test_set_policy_rejects_invalid() {
        let session = session().await;
        collect(&session, "abc123xyz789").await;

        let result = set_policy(
            &session,
            PolicySettings {
                max_entries: 0,
                ..PolicySettings::default()
            },
        )
        .await;
        assert!(matches!(result, Err(CommandError::Validation(_))));

        let result = set_policy(
            &session,
            PolicySettings {
                detection_kind: DetectionKind::CustomHeader {
                    header_name: "  ".into(),
                },
                ..PolicySettings::default()
            },
        )
        .await;
        assert!(matches!(
            result,
            Err(CommandError::Validation(PolicyError::EmptyHeaderName))
        ));

        assert_eq!(get_policy(&session).await, Policy::default());
        assert_eq!(session.collector().current_size().await, 1);
    }

    #[tokio::test]
    async fn test_set_policy_resets() {
        let session = session().await;
        collect(&session, "abc123xyz789").await;

        let policy = set_policy(
            &session,
            PolicySettings {
                detection_source: DetectionSource::Cookies,
                max_entries: 2,
                ..PolicySettings::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(policy.max_entries(), 2);
        assert_eq!(get_policy(&session).await, policy);
        assert!(get_collection(&session).await.is_empty());
        assert_eq!(get_collection(&session).await.capacity, 2);
    }

    #[tokio::test]
    async fn test_request_scan_failure_surfaces() {
        let session = session().await;
        set_policy(
            &session,
            PolicySettings {
                detection_source: DetectionSource::BrowserStorage,
                ..PolicySettings::default()
            },
        )
        .await
        .unwrap();

        let err = request_scan(&session).await.unwrap_err();
        assert!(matches!(err, CommandError::Scan(ScanError::NoActiveContext)));

        session.tracker().on_context_changed(ContextId(1), None).await;
        let err = request_scan(&session).await.unwrap_err();
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            serde_json::json!("Scan failed, try again: Context unavailable: context:1")
        );
    }

    #[tokio::test]
    async fn test_trigger_agent() {
        let session = session().await;
        trigger_agent(&session, "scan").await.unwrap();
        assert!(session.scan_agent().last_report().await.is_some());

        assert!(matches!(
            trigger_agent(&session, "missing").await,
            Err(CommandError::Agent(AgentError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_request_scan_with_headers_policy_returns_collection() {
        let session = session().await;
        collect(&session, "abc123xyz789").await;
        let view = request_scan(&session).await.unwrap();
        assert_eq!(view.entries.len(), 1);
    }
}
