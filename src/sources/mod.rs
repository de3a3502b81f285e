//! Sources module - On-demand storage and cookie snapshots
//!
//! - [`SnapshotSource`]: the seam to the host environment
//! - [`MemorySnapshotSource`]: state reported by the host, kept in memory

mod base;
mod memory;

pub use base::{ScanError, SnapshotSource};
pub use memory::MemorySnapshotSource;

#[cfg(test)]
pub use base::MockSnapshotSource;
