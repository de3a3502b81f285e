//! Token matcher
//!
//! Stateless: given one [`ObservedEvent`] and the active [`Policy`], decides
//! whether the event carries a token and extracts it with a display label.
//! Events whose kind does not match the policy's detection source are ignored.

use thiserror::Error;

use super::event::{CookieItem, Header, ObservedEvent, StorageItem};
use super::policy::{DetectionKind, DetectionSource, Policy};
use crate::security::{Sanitizer, SecureString};

/// Storage and cookie values must be longer than this to count as a token
pub const MIN_TOKEN_LEN: usize = 10;

/// Header names accepted for session header detection
pub const SESSION_HEADER_NAMES: &[&str] = &["x-session-token", "session-token", "x-session-id"];

const BEARER_STORAGE_KEYWORDS: &[&str] = &[
    "token",
    "access_token",
    "accesstoken",
    "auth_token",
    "authtoken",
    "id_token",
    "bearer",
    "jwt",
];

const SESSION_STORAGE_KEYWORDS: &[&str] = &["session", "sessionid", "session_id", "sess_id"];

const BEARER_COOKIE_KEYWORDS: &[&str] = &[
    "token",
    "access_token",
    "auth_token",
    "bearer",
    "jwt",
    "auth",
];

const SESSION_COOKIE_KEYWORDS: &[&str] = &["session", "sessionid", "session_id", "sess", "sid"];

/// Why an event could not be evaluated
///
/// Never surfaced to the user; the collector logs it and treats the event
/// as carrying no token.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MatchError {
    /// Header or cookie event without a URL
    #[error("{kind} event has no URL")]
    MissingUrl { kind: &'static str },

    /// Header name that cannot appear on the wire
    #[error("header #{index} has a malformed name")]
    MalformedHeader { index: usize },
}

/// A token extracted from one event, not yet admitted to the collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateToken {
    pub value: SecureString,
    /// Where it was seen: a request URL, `localStorage:<key>`, `cookie:<name>`
    pub source_label: String,
}

impl CandidateToken {
    pub fn new(value: impl Into<SecureString>, source_label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            source_label: source_label.into(),
        }
    }
}

/// Stateless token matcher
pub struct Matcher;

impl Matcher {
    /// Matches an event, treating malformed events as carrying no token
    pub fn match_event(event: &ObservedEvent, policy: &Policy) -> Option<CandidateToken> {
        match Self::try_match(event, policy) {
            Ok(candidate) => candidate,
            Err(e) => {
                tracing::warn!("Ignoring malformed {} event: {}", event.kind_name(), e);
                None
            }
        }
    }

    /// Matches an event, reporting malformed input as an error
    pub fn try_match(
        event: &ObservedEvent,
        policy: &Policy,
    ) -> Result<Option<CandidateToken>, MatchError> {
        let kind = policy.detection_kind();
        match (event, policy.detection_source()) {
            (ObservedEvent::Headers { url, headers }, DetectionSource::RequestHeaders) => {
                if url.is_empty() {
                    return Err(MatchError::MissingUrl { kind: "headers" });
                }
                validate_headers(headers)?;
                Ok(match_headers(url, headers, kind))
            }
            (ObservedEvent::Storage { items, .. }, DetectionSource::BrowserStorage) => {
                Ok(match_storage(items, kind))
            }
            (ObservedEvent::Cookies { url, cookies }, DetectionSource::Cookies) => {
                if url.is_empty() {
                    return Err(MatchError::MissingUrl { kind: "cookies" });
                }
                Ok(match_cookies(cookies, kind))
            }
            _ => Ok(None),
        }
    }
}

fn validate_headers(headers: &[Header]) -> Result<(), MatchError> {
    for (index, header) in headers.iter().enumerate() {
        let malformed = header.name.is_empty()
            || header
                .name
                .chars()
                .any(|c| c.is_whitespace() || c.is_control() || c == ':');
        if malformed {
            return Err(MatchError::MalformedHeader { index });
        }
    }
    Ok(())
}

fn match_headers(url: &str, headers: &[Header], kind: &DetectionKind) -> Option<CandidateToken> {
    let token = headers.iter().find_map(|header| {
        let value = match kind {
            DetectionKind::BearerHeader => {
                if !header.name.eq_ignore_ascii_case("authorization") {
                    return None;
                }
                strip_bearer(&header.value)?
            }
            DetectionKind::SessionHeader => {
                if !SESSION_HEADER_NAMES
                    .iter()
                    .any(|name| header.name.eq_ignore_ascii_case(name))
                {
                    return None;
                }
                header.value.as_str()
            }
            DetectionKind::CustomHeader { header_name } => {
                if !header.name.eq_ignore_ascii_case(header_name) {
                    return None;
                }
                header.value.as_str()
            }
        };
        (!value.is_empty()).then_some(value)
    })?;

    tracing::debug!(
        "Matched {} header on {}",
        kind.id(),
        Sanitizer::sanitize_url(url)
    );
    Some(CandidateToken::new(token, url))
}

/// Returns the token from a `Bearer <token>` value, prefix case-insensitive
fn strip_bearer(value: &str) -> Option<&str> {
    const PREFIX: &str = "bearer ";
    let value = value.trim_start();
    let prefix = value.get(..PREFIX.len())?;
    if !prefix.eq_ignore_ascii_case(PREFIX) {
        return None;
    }
    let token = value[PREFIX.len()..].trim();
    (!token.is_empty()).then_some(token)
}

fn match_storage(items: &[StorageItem], kind: &DetectionKind) -> Option<CandidateToken> {
    items
        .iter()
        .find(|item| {
            name_matches(&item.key, kind, BEARER_STORAGE_KEYWORDS, SESSION_STORAGE_KEYWORDS)
                && is_plausible(&item.value)
        })
        .map(|item| {
            CandidateToken::new(
                item.value.as_str(),
                format!("{}:{}", item.kind.label(), item.key),
            )
        })
}

fn match_cookies(cookies: &[CookieItem], kind: &DetectionKind) -> Option<CandidateToken> {
    cookies
        .iter()
        .find(|cookie| {
            name_matches(&cookie.name, kind, BEARER_COOKIE_KEYWORDS, SESSION_COOKIE_KEYWORDS)
                && is_plausible(&cookie.value)
        })
        .map(|cookie| {
            CandidateToken::new(cookie.value.as_str(), format!("cookie:{}", cookie.name))
        })
}

/// Case-insensitive substring match of `name` against the keyword set for `kind`
fn name_matches(
    name: &str,
    kind: &DetectionKind,
    bearer_keywords: &[&str],
    session_keywords: &[&str],
) -> bool {
    let name = name.to_ascii_lowercase();
    match kind {
        DetectionKind::BearerHeader => bearer_keywords.iter().any(|k| name.contains(k)),
        DetectionKind::SessionHeader => session_keywords.iter().any(|k| name.contains(k)),
        DetectionKind::CustomHeader { header_name } => {
            name.contains(&header_name.to_ascii_lowercase())
        }
    }
}

fn is_plausible(value: &str) -> bool {
    value.chars().count() > MIN_TOKEN_LEN
}
