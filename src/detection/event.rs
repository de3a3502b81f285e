//! Observed events
//!
//! Two layers of event types: [`FeedEvent`] is what the host feeds in, tagged
//! with the context it came from; [`ObservedEvent`] is what the matcher sees
//! once context filtering and any on-demand fetch have happened.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a browsing context (one tab)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(pub u64);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "context:{}", self.0)
    }
}

/// A single request header, in the order it was sent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Which web storage area an item came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    /// Durable `localStorage`
    Local,
    /// Tab-scoped `sessionStorage`
    Session,
}

impl StorageKind {
    /// Returns the label prefix used in source labels
    pub fn label(&self) -> &'static str {
        match self {
            Self::Local => "localStorage",
            Self::Session => "sessionStorage",
        }
    }
}

/// One key/value pair read from web storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageItem {
    pub key: String,
    pub value: String,
    pub kind: StorageKind,
}

impl StorageItem {
    pub fn new(kind: StorageKind, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            kind,
        }
    }
}

/// A cookie visible to the monitored context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieItem {
    pub name: String,
    pub value: String,
    /// Domain the cookie belongs to, when the host reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

impl CookieItem {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
        }
    }

    /// Sets the cookie domain
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }
}

/// Events supplied by the host's event feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedEvent {
    /// An outbound request and its headers
    RequestObserved {
        context_id: ContextId,
        url: String,
        #[serde(default)]
        headers: Vec<Header>,
    },
    /// Ask for the context's local and session storage to be scanned
    StorageSnapshotRequested { context_id: ContextId },
    /// Ask for the cookies visible to `url` to be scanned
    CookiesSnapshotRequested { context_id: ContextId, url: String },
}

impl FeedEvent {
    /// Returns the context the event belongs to
    pub fn context_id(&self) -> ContextId {
        match self {
            Self::RequestObserved { context_id, .. }
            | Self::StorageSnapshotRequested { context_id }
            | Self::CookiesSnapshotRequested { context_id, .. } => *context_id,
        }
    }
}

/// Matcher input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservedEvent {
    /// Request headers plus the request URL
    Headers { url: String, headers: Vec<Header> },
    /// Storage snapshot from both stores, with an origin tag for logging
    Storage { origin: String, items: Vec<StorageItem> },
    /// Cookies visible to `url`
    Cookies { url: String, cookies: Vec<CookieItem> },
}

impl ObservedEvent {
    /// Short name used in log lines
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Headers { .. } => "headers",
            Self::Storage { .. } => "storage",
            Self::Cookies { .. } => "cookies",
        }
    }
}
