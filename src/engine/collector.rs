//! Collector - the single owner of the token collection
//!
//! Every mutation (ingest, reset, clear, policy replace) goes through one
//! write lock, and the matcher runs before that lock is taken. Each reset
//! bumps a generation counter; an ingest carries the [`SessionTicket`] it
//! was started under and is dropped as `Superseded` if the generation moved
//! on in the meantime. That covers both stale on-demand scans and candidates
//! matched under a policy that has since been replaced.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, RwLock};

use super::collection::{Collection, CollectionEntry, IngestOutcome, TokenHandle};
use crate::detection::{Matcher, ObservedEvent, Policy};
use crate::security::{Sanitizer, SecureString};

/// Why the collection was emptied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetCause {
    /// A different context became active (or the active one closed)
    ContextChanged,
    /// The active context navigated or reloaded
    ContentChanged,
    /// A new policy replaced the old one
    PolicyChanged,
    /// The user asked for a clear
    ExplicitClear,
    /// Environment shutdown cleanup
    Shutdown,
}

/// What a change notification describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "cause")]
pub enum ChangeReason {
    Initial,
    Ingested,
    Reset(ResetCause),
}

/// Change notification, published after the mutation is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionChanged {
    /// Monotonic per collector
    pub revision: u64,
    pub reason: ChangeReason,
    pub size: usize,
}

/// The policy and generation an ingest was started under
#[derive(Debug, Clone)]
pub struct SessionTicket {
    generation: u64,
    policy: Policy,
}

impl SessionTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }
}

/// Consistent read of the collection and its bookkeeping
#[derive(Debug, Clone)]
pub struct CollectionSnapshot {
    pub entries: Vec<CollectionEntry>,
    pub capacity: usize,
    pub suppressed: usize,
    pub revision: u64,
}

struct CollectorState {
    policy: Policy,
    collection: Collection,
    generation: u64,
    next_handle: u64,
    revision: u64,
}

/// Stateful token collection engine
pub struct Collector {
    state: RwLock<CollectorState>,
    changes: watch::Sender<CollectionChanged>,
}

impl Collector {
    /// Creates a collector with an empty collection
    pub fn new(policy: Policy) -> Self {
        let (changes, _) = watch::channel(CollectionChanged {
            revision: 0,
            reason: ChangeReason::Initial,
            size: 0,
        });

        Self {
            state: RwLock::new(CollectorState {
                policy,
                collection: Collection::new(),
                generation: 0,
                next_handle: 1,
                revision: 0,
            }),
            changes,
        }
    }

    /// Subscribes to change notifications
    ///
    /// Notifications coalesce: a slow subscriber only sees the latest one,
    /// and reading [`Collector::list`] afterwards always shows current state.
    pub fn subscribe(&self) -> watch::Receiver<CollectionChanged> {
        self.changes.subscribe()
    }

    /// Returns the active policy
    pub async fn policy(&self) -> Policy {
        self.state.read().await.policy.clone()
    }

    /// Captures the current generation and policy
    pub async fn ticket(&self) -> SessionTicket {
        let state = self.state.read().await;
        SessionTicket {
            generation: state.generation,
            policy: state.policy.clone(),
        }
    }

    /// Runs the matcher on an event and inserts the result
    pub async fn ingest(&self, event: &ObservedEvent) -> IngestOutcome {
        let ticket = self.ticket().await;
        self.ingest_with(&ticket, event).await
    }

    /// Like [`Collector::ingest`], but under a previously captured ticket
    pub async fn ingest_with(&self, ticket: &SessionTicket, event: &ObservedEvent) -> IngestOutcome {
        let Some(candidate) = Matcher::match_event(event, &ticket.policy) else {
            return IngestOutcome::NoMatch;
        };
        let masked = candidate.value.masked();

        let mut guard = self.state.write().await;
        let state = &mut *guard;

        if state.generation != ticket.generation {
            tracing::debug!(
                "Dropping {} from generation {} (now {})",
                masked,
                ticket.generation,
                state.generation
            );
            return IngestOutcome::Superseded;
        }

        let source = Sanitizer::sanitize_url(&candidate.source_label);
        let handle = TokenHandle::from_raw(state.next_handle);
        state.next_handle += 1;

        let outcome = state.collection.try_insert(
            candidate,
            state.policy.max_entries(),
            handle,
            Utc::now(),
        );

        match outcome {
            IngestOutcome::Accepted => {
                tracing::info!("Collected token {} from {}", masked, source);
                self.publish(state, ChangeReason::Ingested);
            }
            IngestOutcome::CapacityReached => {
                tracing::debug!(
                    "Collection full ({}), discarded {}",
                    state.policy.max_entries(),
                    masked
                );
            }
            other => {
                tracing::debug!("Token {} from {}: {:?}", masked, source, other);
            }
        }

        outcome
    }

    /// Returns the entries in insertion order
    pub async fn list(&self) -> Vec<CollectionEntry> {
        self.state.read().await.collection.entries().to_vec()
    }

    /// Returns entries, capacity and revision from one read
    pub async fn snapshot(&self) -> CollectionSnapshot {
        let state = self.state.read().await;
        CollectionSnapshot {
            entries: state.collection.entries().to_vec(),
            capacity: state.policy.max_entries(),
            suppressed: state.collection.suppressed(),
            revision: state.revision,
        }
    }

    pub async fn current_size(&self) -> usize {
        self.state.read().await.collection.len()
    }

    pub async fn capacity(&self) -> usize {
        self.state.read().await.policy.max_entries()
    }

    /// Looks up the raw token behind a display handle
    pub async fn token(&self, handle: TokenHandle) -> Option<SecureString> {
        self.state
            .read()
            .await
            .collection
            .get(handle)
            .map(|entry| entry.token.clone())
    }

    /// Empties the collection
    pub async fn reset(&self, cause: ResetCause) {
        let mut guard = self.state.write().await;
        let dropped = guard.collection.len();
        Self::empty(&mut guard);
        tracing::info!("Collection reset ({:?}), dropped {} entries", cause, dropped);
        self.publish(&mut guard, ChangeReason::Reset(cause));
    }

    /// Empties the collection on an explicit user request
    pub async fn clear(&self) {
        self.reset(ResetCause::ExplicitClear).await;
    }

    /// Replaces the policy and empties the collection in one step
    pub async fn replace_policy(&self, policy: Policy) -> Policy {
        let mut guard = self.state.write().await;
        tracing::info!("Policy changed: {} -> {}", guard.policy, policy);
        let previous = std::mem::replace(&mut guard.policy, policy);
        Self::empty(&mut guard);
        self.publish(&mut guard, ChangeReason::Reset(ResetCause::PolicyChanged));
        previous
    }

    fn empty(state: &mut CollectorState) {
        state.collection.clear();
        state.generation += 1;
    }

    // Called with the write lock held so revisions go out in order
    fn publish(&self, state: &mut CollectorState, reason: ChangeReason) {
        state.revision += 1;
        self.changes.send_replace(CollectionChanged {
            revision: state.revision,
            reason,
            size: state.collection.len(),
        });
    }
}
