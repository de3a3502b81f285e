//! Store module - Session-scoped mirror of the collection
//!
//! Nothing here survives an environment shutdown cleanup.

mod mirror;

pub use mirror::{FileMirror, MemoryMirror, MirrorError, MirrorRecord, MirrorStore};
