//! Collection engine
//!
//! - Bounded, deduplicated token collection and its single owner
//! - Active context tracking
//! - Shutdown and explicit-clear lifecycle
//! - On-demand storage and cookie scans

mod collection;
mod collector;
mod context;
mod lifecycle;
mod scanner;
mod view;

pub use collection::{Collection, CollectionEntry, IngestOutcome, TokenHandle};
pub use collector::{
    ChangeReason, CollectionChanged, CollectionSnapshot, Collector, ResetCause, SessionTicket,
};
pub use context::{ActiveContext, ContextTracker};
pub use lifecycle::{LifecycleManager, ShutdownOutcome, ShutdownSignal};
pub use scanner::{ScanRequest, Scanner};
pub use view::{CollectionView, DisplayEntry};
