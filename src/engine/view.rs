//! Display-safe view of the collection
//!
//! What the display surface and the mirror get: masked tokens, sanitized
//! sources and handles. Raw values only leave through an explicit copy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::collection::{CollectionEntry, TokenHandle};
use super::collector::CollectionSnapshot;
use crate::security::Sanitizer;

/// One masked entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayEntry {
    pub display_source: String,
    pub masked_token: String,
    pub handle: TokenHandle,
    pub first_seen_at: DateTime<Utc>,
}

impl From<&CollectionEntry> for DisplayEntry {
    fn from(entry: &CollectionEntry) -> Self {
        Self {
            display_source: Sanitizer::sanitize_url(&entry.representative_source),
            masked_token: entry.token.masked(),
            handle: entry.handle,
            first_seen_at: entry.first_seen_at,
        }
    }
}

/// The collection as shown to the display surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionView {
    pub entries: Vec<DisplayEntry>,
    pub capacity: usize,
    /// Distinct tokens dropped at capacity since the last reset
    #[serde(default)]
    pub suppressed: usize,
}

impl CollectionView {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<&CollectionSnapshot> for CollectionView {
    fn from(snapshot: &CollectionSnapshot) -> Self {
        Self {
            entries: snapshot.entries.iter().map(DisplayEntry::from).collect(),
            capacity: snapshot.capacity,
            suppressed: snapshot.suppressed,
        }
    }
}
