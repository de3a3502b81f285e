//! TokenScope - Collect authentication tokens observed in a browsing context
//!
//! Watches one monitored context (request headers, web storage or cookies),
//! keeps a small deduplicated collection of the tokens it sees, and hands a
//! masked listing to a display surface.
//!
//! ## Features
//!
//! - Bearer, session and custom header detection
//! - On-demand and periodic storage and cookie scans
//! - Bounded, deduplicated collection that resets with the context
//! - Masked listings; raw values only through an explicit copy
//! - Ephemeral mirror wiped on clear and on shutdown
//!
//! ## Architecture
//!
//! - **Detection**: event types, policy, stateless matcher
//! - **Engine**: collector, context tracker, lifecycle manager, scanner
//! - **Sources**: snapshot source seam for storage and cookie fetches
//! - **Store**: collection mirror
//! - **Agents**: feed consumer, periodic scans, mirror sync
//! - **Security**: masking, URL sanitizing, zeroizing token storage

pub mod agents;
pub mod commands;
pub mod config;
pub mod detection;
pub mod engine;
pub mod host;
pub mod security;
pub mod session;
pub mod sources;
pub mod store;

use tracing_subscriber::EnvFilter;

/// Default log filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "tokenscope=debug,tokenscope_lib=debug,info";

/// Initializes logging to stderr
///
/// `RUST_LOG` overrides `default_filter`. Calling it twice is harmless.
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
