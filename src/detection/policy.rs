//! Detection policy
//!
//! A [`Policy`] is an immutable, validated value. The only way to get one is
//! through [`Policy::new`] or [`TryFrom<PolicySettings>`], so an out-of-range
//! capacity or an empty custom header name is rejected at construction and
//! never reaches the collector.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::security::{Sanitizer, SanitizerError};

/// Smallest allowed collection capacity
pub const MIN_ENTRIES: usize = 1;

/// Largest allowed collection capacity
pub const MAX_ENTRIES: usize = 5;

const MAX_HEADER_NAME_LEN: usize = 256;

/// Errors raised when a policy fails validation
#[derive(Debug, Error, PartialEq)]
pub enum PolicyError {
    /// Capacity outside `MIN_ENTRIES..=MAX_ENTRIES`
    #[error("maxEntries must be between 1 and 5, got {0}")]
    MaxEntriesOutOfRange(usize),

    /// Custom header detection without a header name
    #[error("Custom header detection requires a non-empty header name")]
    EmptyHeaderName,

    /// Custom header name rejected by the input sanitizer
    #[error("Invalid custom header name: {0}")]
    InvalidHeaderName(#[from] SanitizerError),
}

/// What kind of token to look for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetectionKind {
    /// `Authorization: Bearer <token>`
    BearerHeader,
    /// Well-known session token headers
    SessionHeader,
    /// A user configured header, matched case-insensitively
    CustomHeader { header_name: String },
}

impl DetectionKind {
    /// Returns the identifier used in logs
    pub fn id(&self) -> &'static str {
        match self {
            Self::BearerHeader => "bearer_header",
            Self::SessionHeader => "session_header",
            Self::CustomHeader { .. } => "custom_header",
        }
    }
}

/// Where tokens are looked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionSource {
    /// Outbound request headers
    RequestHeaders,
    /// localStorage and sessionStorage of the monitored context
    BrowserStorage,
    /// Cookies visible to the monitored context
    Cookies,
}

impl DetectionSource {
    /// Returns the identifier used in logs
    pub fn id(&self) -> &'static str {
        match self {
            Self::RequestHeaders => "request_headers",
            Self::BrowserStorage => "browser_storage",
            Self::Cookies => "cookies",
        }
    }

    /// Returns true if tokens for this source are fetched by a scan
    pub fn needs_scan(&self) -> bool {
        !matches!(self, Self::RequestHeaders)
    }
}

/// Raw, unvalidated policy as edited by the settings surface or stored in config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySettings {
    pub detection_kind: DetectionKind,
    pub detection_source: DetectionSource,
    pub max_entries: usize,
    /// Wipe the collection when the environment shuts down
    #[serde(default = "default_auto_cleanup")]
    pub auto_cleanup: bool,
}

fn default_auto_cleanup() -> bool {
    true
}

impl Default for PolicySettings {
    fn default() -> Self {
        Policy::default().into()
    }
}

/// Validated detection policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PolicySettings", into = "PolicySettings")]
pub struct Policy {
    detection_kind: DetectionKind,
    detection_source: DetectionSource,
    max_entries: usize,
    auto_cleanup: bool,
}

impl Policy {
    /// Creates a validated policy with auto-cleanup enabled
    pub fn new(
        detection_kind: DetectionKind,
        detection_source: DetectionSource,
        max_entries: usize,
    ) -> Result<Self, PolicyError> {
        if !(MIN_ENTRIES..=MAX_ENTRIES).contains(&max_entries) {
            return Err(PolicyError::MaxEntriesOutOfRange(max_entries));
        }

        let detection_kind = match detection_kind {
            DetectionKind::CustomHeader { header_name } => {
                let header_name = header_name.trim();
                if header_name.is_empty() {
                    return Err(PolicyError::EmptyHeaderName);
                }
                Sanitizer::validate_input_with_max_length(header_name, MAX_HEADER_NAME_LEN)?;
                DetectionKind::CustomHeader {
                    header_name: header_name.to_string(),
                }
            }
            other => other,
        };

        Ok(Self {
            detection_kind,
            detection_source,
            max_entries,
            auto_cleanup: true,
        })
    }

    /// Sets the auto-cleanup flag
    pub fn with_auto_cleanup(mut self, auto_cleanup: bool) -> Self {
        self.auto_cleanup = auto_cleanup;
        self
    }

    pub fn detection_kind(&self) -> &DetectionKind {
        &self.detection_kind
    }

    pub fn detection_source(&self) -> DetectionSource {
        self.detection_source
    }

    /// Collection capacity, always within `MIN_ENTRIES..=MAX_ENTRIES`
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn auto_cleanup(&self) -> bool {
        self.auto_cleanup
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            detection_kind: DetectionKind::BearerHeader,
            detection_source: DetectionSource::RequestHeaders,
            max_entries: MAX_ENTRIES,
            auto_cleanup: true,
        }
    }
}

impl TryFrom<PolicySettings> for Policy {
    type Error = PolicyError;

    fn try_from(settings: PolicySettings) -> Result<Self, Self::Error> {
        Ok(Policy::new(
            settings.detection_kind,
            settings.detection_source,
            settings.max_entries,
        )?
        .with_auto_cleanup(settings.auto_cleanup))
    }
}

impl From<Policy> for PolicySettings {
    fn from(policy: Policy) -> Self {
        Self {
            detection_kind: policy.detection_kind,
            detection_source: policy.detection_source,
            max_entries: policy.max_entries,
            auto_cleanup: policy.auto_cleanup,
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} via {} (max {})",
            self.detection_kind.id(),
            self.detection_source.id(),
            self.max_entries
        )
    }
}
