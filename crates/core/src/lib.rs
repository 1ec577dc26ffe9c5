//! Snapshot primitives for snapwatch
//!
//! This crate provides the storage layer:
//! - Watch target naming and the snapshot data model
//! - Pluggable snapshot backends (btrfs subvolumes, staged directory copy)
//! - The snapshot store that lists, creates and deletes snapshots
//! - Error types shared by every other crate

pub mod backend;
pub mod error;
pub mod snapshot;
pub mod store;

// Re-export main types for convenience
pub use backend::{disk_usage, BackendKind, BtrfsBackend, CopyBackend, DiskUsage, SnapshotBackend};
pub use error::{ConfigError, SnapshotError};
pub use snapshot::{Snapshot, WatchTarget, TIMESTAMP_FORMAT};
pub use store::{SnapshotStore, STATE_DIR};

/// Common result type used throughout snapwatch-core
pub type Result<T, E = SnapshotError> = std::result::Result<T, E>;
