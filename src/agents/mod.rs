//! Agent module - Background tasks of a monitored session
//!
//! Provides agents for:
//! - Consuming the event feed in order
//! - Periodic storage and cookie scans
//! - Keeping the collection mirror in sync

mod base;
mod feed_agent;
mod manager;
mod mirror_agent;
mod scan_agent;

pub use base::{Agent, AgentError, AgentStatus};
pub use feed_agent::{FeedAgent, SessionEvent};
pub use manager::AgentManager;
pub use mirror_agent::MirrorAgent;
pub use scan_agent::{ScanAgent, ScanConfig, ScanReport};
