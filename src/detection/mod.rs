//! Detection module - What a token looks like and where to find it
//!
//! - Event types fed in by the host
//! - The validated detection policy
//! - The stateless matcher that extracts candidate tokens

mod event;
mod matcher;
mod policy;

pub use event::{
    ContextId, CookieItem, FeedEvent, Header, ObservedEvent, StorageItem, StorageKind,
};
pub use matcher::{CandidateToken, MatchError, Matcher, MIN_TOKEN_LEN, SESSION_HEADER_NAMES};
pub use policy::{
    DetectionKind, DetectionSource, Policy, PolicyError, PolicySettings, MAX_ENTRIES, MIN_ENTRIES,
};
