//! In-memory index store with atomic snapshot swap
//!
//! The index is a disposable cache over the log files; nothing is persisted.
//! - [`IndexSnapshot`]: immutable sessions plus a flat message lookup
//! - [`IndexStore`]: publishes snapshots and serializes rebuilds
//! - [`FileFingerprint`]: size/mtime per source file, used to skip unchanged
//!   sessions on rebuild and to report staleness

pub mod fingerprint;
pub mod snapshot;
pub mod store;

pub use fingerprint::FileFingerprint;
pub use snapshot::{FileFailure, IndexSnapshot, IndexStats};
pub use store::{IndexStore, RebuildReport, RebuildTrigger};
