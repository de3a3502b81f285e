//! The bounded, deduplicated token collection
//!
//! Plain data owned by the [`Collector`](super::Collector). Entries keep
//! insertion order, are keyed by exact token value and never exceed the
//! capacity passed to [`Collection::try_insert`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::detection::CandidateToken;
use crate::security::SecureString;

/// Opaque handle used by the display surface to copy a raw token
///
/// Handles are never reused within a collector's lifetime, so a handle from
/// before a reset can't resolve to a different token afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenHandle(u64);

impl TokenHandle {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TokenHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Result of offering one event to the collector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestOutcome {
    /// New token appended
    Accepted,
    /// Token already collected; the first source is kept
    DuplicateIgnored,
    /// Collection full; candidate discarded
    CapacityReached,
    /// Event carried no token under the active policy
    NoMatch,
    /// Collection was reset while the event was being evaluated
    Superseded,
}

impl IngestOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// One collected token
#[derive(Debug, Clone)]
pub struct CollectionEntry {
    pub handle: TokenHandle,
    pub token: SecureString,
    /// Source of the first sighting; later duplicates never overwrite it
    pub representative_source: String,
    pub first_seen_at: DateTime<Utc>,
}

/// Insertion-ordered token set with a hard size bound
#[derive(Debug, Default)]
pub struct Collection {
    entries: Vec<CollectionEntry>,
    suppressed: usize,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order
    pub fn entries(&self) -> &[CollectionEntry] {
        &self.entries
    }

    /// Distinct candidates dropped at capacity since the last reset
    pub fn suppressed(&self) -> usize {
        self.suppressed
    }

    pub fn contains(&self, token: &str) -> bool {
        self.entries.iter().any(|e| e.token == token)
    }

    pub fn get(&self, handle: TokenHandle) -> Option<&CollectionEntry> {
        self.entries.iter().find(|e| e.handle == handle)
    }

    /// Offers a candidate
    ///
    /// Duplicates are checked before capacity, so re-sighting a collected
    /// token on a full collection is `DuplicateIgnored`, not `CapacityReached`.
    pub fn try_insert(
        &mut self,
        candidate: CandidateToken,
        capacity: usize,
        handle: TokenHandle,
        now: DateTime<Utc>,
    ) -> IngestOutcome {
        if candidate.value.is_empty() {
            return IngestOutcome::NoMatch;
        }

        if self.contains(&candidate.value) {
            return IngestOutcome::DuplicateIgnored;
        }

        if self.entries.len() >= capacity {
            self.suppressed += 1;
            return IngestOutcome::CapacityReached;
        }

        self.entries.push(CollectionEntry {
            handle,
            token: candidate.value,
            representative_source: candidate.source_label,
            first_seen_at: now,
        });
        IngestOutcome::Accepted
    }

    /// Drops every entry; token memory is zeroed as entries drop
    pub fn clear(&mut self) {
        self.entries.clear();
        self.suppressed = 0;
    }
}
