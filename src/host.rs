//! JSON-lines host protocol
//!
//! The `tokenscope` binary reads one [`HostMessage`] per stdin line and
//! writes [`HostReply`] lines to stdout. Storage and cookie state arrive as
//! messages too and are kept in a [`MemorySnapshotSource`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::agents::SessionEvent;
use crate::commands::{self, CommandError};
use crate::detection::{ContextId, CookieItem, FeedEvent, Policy, PolicySettings, StorageItem};
use crate::engine::{CollectionView, ShutdownOutcome, ShutdownSignal, TokenHandle};
use crate::session::Session;
use crate::sources::MemorySnapshotSource;

/// One line of host input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum HostMessage {
    /// Event for the feed queue
    Feed { event: FeedEvent },
    ContextActivated {
        context_id: ContextId,
        #[serde(default)]
        url: Option<String>,
    },
    ContentChanged {
        context_id: ContextId,
        #[serde(default)]
        url: Option<String>,
    },
    ContextClosed { context_id: ContextId },
    /// Storage contents reported for a context
    SetStorage {
        context_id: ContextId,
        items: Vec<StorageItem>,
    },
    /// Cookies reported for a context
    SetCookies {
        context_id: ContextId,
        cookies: Vec<CookieItem>,
    },
    /// Later fetches for the context fail as permission denied
    Deny { context_id: ContextId },
    /// Drops the storage and cookie state reported for a context
    Forget { context_id: ContextId },
    Scan,
    /// Runs an agent's work now
    Trigger { agent: String },
    Clear,
    List,
    GetPolicy,
    SetPolicy { policy: PolicySettings },
    Copy { handle: TokenHandle },
    Shutdown {
        #[serde(default)]
        remaining_contexts: usize,
    },
}

/// One line of host output
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum HostReply {
    Collection { collection: CollectionView },
    Policy { policy: Policy },
    Token { handle: TokenHandle, token: String },
    Shutdown { outcome: ShutdownOutcome },
    Error { message: String },
}

impl From<CommandError> for HostReply {
    fn from(error: CommandError) -> Self {
        Self::Error {
            message: error.to_string(),
        }
    }
}

/// Applies host messages to a session
pub struct Host {
    session: Arc<Session>,
    source: Arc<MemorySnapshotSource>,
}

impl Host {
    pub fn new(session: Arc<Session>, source: Arc<MemorySnapshotSource>) -> Self {
        Self { session, source }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Handles one message; `None` when there is nothing to reply
    ///
    /// Context signals and feed events go through the session's queue.
    /// Every other message first waits for that queue to drain, so messages
    /// take effect in the order they arrive.
    pub async fn handle(&self, message: HostMessage) -> Option<HostReply> {
        let event = match message {
            HostMessage::Feed { event } => SessionEvent::Feed(event),
            HostMessage::ContextActivated { context_id, url } => {
                SessionEvent::ContextActivated { context_id, url }
            }
            HostMessage::ContentChanged { context_id, url } => {
                SessionEvent::ContentChanged { context_id, url }
            }
            HostMessage::ContextClosed { context_id } => SessionEvent::ContextClosed { context_id },
            command => {
                if let Err(e) = self.session.settle().await {
                    return Some(HostReply::Error {
                        message: e.to_string(),
                    });
                }
                return self.run(command).await;
            }
        };

        if self.session.feed().send(event).await.is_err() {
            return Some(HostReply::Error {
                message: "Event feed is closed".into(),
            });
        }
        None
    }

    async fn run(&self, command: HostMessage) -> Option<HostReply> {
        let session = &self.session;
        match command {
            HostMessage::SetStorage { context_id, items } => {
                self.source.set_storage(context_id, items).await;
                None
            }
            HostMessage::SetCookies {
                context_id,
                cookies,
            } => {
                self.source.set_cookies(context_id, cookies).await;
                None
            }
            HostMessage::Deny { context_id } => {
                self.source.deny(context_id).await;
                None
            }
            HostMessage::Forget { context_id } => {
                self.source.remove(context_id).await;
                None
            }
            HostMessage::Scan => Some(match commands::request_scan(session).await {
                Ok(collection) => HostReply::Collection { collection },
                Err(e) => e.into(),
            }),
            HostMessage::Trigger { agent } => commands::trigger_agent(session, &agent)
                .await
                .err()
                .map(HostReply::from),
            HostMessage::Clear => commands::clear_all(session).await.err().map(HostReply::from),
            HostMessage::List => Some(HostReply::Collection {
                collection: commands::get_collection(session).await,
            }),
            HostMessage::GetPolicy => Some(HostReply::Policy {
                policy: commands::get_policy(session).await,
            }),
            HostMessage::SetPolicy { policy } => {
                Some(match commands::set_policy(session, policy).await {
                    Ok(policy) => HostReply::Policy { policy },
                    Err(e) => e.into(),
                })
            }
            HostMessage::Copy { handle } => Some(match commands::copy_token(session, handle).await {
                Ok(token) => HostReply::Token {
                    handle,
                    token: token.as_str().to_string(),
                },
                Err(e) => e.into(),
            }),
            HostMessage::Shutdown { remaining_contexts } => {
                let signal = ShutdownSignal { remaining_contexts };
                Some(match commands::environment_shutdown(session, signal).await {
                    Ok(outcome) => HostReply::Shutdown { outcome },
                    Err(e) => e.into(),
                })
            }
            HostMessage::Feed { .. }
            | HostMessage::ContextActivated { .. }
            | HostMessage::ContentChanged { .. }
            | HostMessage::ContextClosed { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::detection::{DetectionSource, Header, StorageKind};
    use crate::store::MemoryMirror;

    async fn host() -> Host {
        let config = AppConfig {
            scan_interval_secs: 0,
            scan_on_start: false,
            ..AppConfig::default()
        };
        let source = Arc::new(MemorySnapshotSource::new());
        let session = Session::new(&config, source.clone(), Arc::new(MemoryMirror::new())).await;
        session.start().await.unwrap();
        Host::new(Arc::new(session), source)
    }

    async fn use_storage_policy(host: &Host) {
        let reply = host
            .handle(HostMessage::SetPolicy {
                policy: PolicySettings {
                    detection_source: DetectionSource::BrowserStorage,
                    ..PolicySettings::default()
                },
            })
            .await;
        assert!(matches!(reply, Some(HostReply::Policy { .. })));
    }

    fn activate(context: u64) -> HostMessage {
        HostMessage::ContextActivated {
            context_id: ContextId(context),
            url: None,
        }
    }

    fn bearer(context: u64, token: &str) -> HostMessage {
        HostMessage::Feed {
            event: FeedEvent::RequestObserved {
                context_id: ContextId(context),
                url: "https://api.example.com/me".into(),
                headers: vec![Header::new("Authorization", format!("Bearer {}", token))],
            },
        }
    }

    async fn listed(host: &Host) -> CollectionView {
        match host.handle(HostMessage::List).await {
            Some(HostReply::Collection { collection }) => collection,
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[test]
    fn test_parse_messages() {
        let message: HostMessage = serde_json::from_str(
            r#"{"op":"feed","event":{"type":"request_observed","context_id":1,"url":"https://a.test","headers":[{"name":"Authorization","value":"Bearer abc123xyz789"}]}}"#,
        )
        .unwrap();
        assert!(matches!(
            message,
            HostMessage::Feed {
                event: FeedEvent::RequestObserved { .. }
            }
        ));

        let message: HostMessage = serde_json::from_str(r#"{"op":"shutdown"}"#).unwrap();
        assert_eq!(
            message,
            HostMessage::Shutdown {
                remaining_contexts: 0
            }
        );

        let message: HostMessage =
            serde_json::from_str(r#"{"op":"context_activated","context_id":3}"#).unwrap();
        assert_eq!(message, activate(3));

        let message: HostMessage =
            serde_json::from_str(r#"{"op":"trigger","agent":"scan"}"#).unwrap();
        assert_eq!(
            message,
            HostMessage::Trigger {
                agent: "scan".into()
            }
        );
    }

    #[test]
    fn test_reply_format() {
        let reply = HostReply::Error {
            message: "boom".into(),
        };
        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            serde_json::json!({"reply": "error", "message": "boom"})
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_scan_sees_preceding_activation() {
        let host = host().await;
        use_storage_policy(&host).await;
        host.handle(HostMessage::SetStorage {
            context_id: ContextId(1),
            items: vec![StorageItem::new(
                StorageKind::Local,
                "access_token",
                "host-token-0123456789",
            )],
        })
        .await;

        assert!(host.handle(activate(1)).await.is_none());
        match host.handle(HostMessage::Scan).await {
            Some(HostReply::Collection { collection }) => {
                assert_eq!(collection.entries.len(), 1);
                assert_eq!(collection.entries[0].display_source, "localStorage:access_token");
            }
            other => panic!("unexpected reply {:?}", other),
        }

        host.session().stop().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_clear_covers_tokens_observed_before_it() {
        let host = host().await;
        host.handle(activate(1)).await;

        for round in 0..20 {
            host.handle(bearer(1, &format!("token-before-clear-{}", round)))
                .await;
            assert!(host.handle(HostMessage::Clear).await.is_none());
            assert!(listed(&host).await.is_empty());
            assert_eq!(host.session().collector().current_size().await, 0);
        }

        host.handle(bearer(1, "token-after-clear")).await;
        assert_eq!(listed(&host).await.entries.len(), 1);

        host.session().stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_deny_and_forget_context() {
        let host = host().await;
        use_storage_policy(&host).await;
        host.handle(HostMessage::SetStorage {
            context_id: ContextId(1),
            items: vec![],
        })
        .await;
        host.handle(activate(1)).await;

        host.handle(HostMessage::Deny {
            context_id: ContextId(1),
        })
        .await;
        match host.handle(HostMessage::Scan).await {
            Some(HostReply::Error { message }) => assert!(message.contains("Permission denied")),
            other => panic!("unexpected reply {:?}", other),
        }

        host.handle(HostMessage::Forget {
            context_id: ContextId(1),
        })
        .await;
        match host.handle(HostMessage::Scan).await {
            Some(HostReply::Error { message }) => assert!(message.contains("Context unavailable")),
            other => panic!("unexpected reply {:?}", other),
        }

        host.session().stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_trigger_unknown_agent_replies_error() {
        let host = host().await;
        assert!(host
            .handle(HostMessage::Trigger {
                agent: "scan".into()
            })
            .await
            .is_none());
        assert!(matches!(
            host.handle(HostMessage::Trigger {
                agent: "missing".into()
            })
            .await,
            Some(HostReply::Error { .. })
        ));
        host.session().stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_copy_unknown_handle_replies_error() {
        let host = host().await;
        let reply = host
            .handle(HostMessage::Copy {
                handle: TokenHandle::from_raw(99),
            })
            .await;
        assert!(matches!(reply, Some(HostReply::Error { .. })));
        host.session().stop().await.unwrap();
    }
}
