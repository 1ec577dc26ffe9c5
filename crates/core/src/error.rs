//! Error taxonomy for snapshot operations and configuration

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure of a snapshot operation
///
/// `Throttled` and `NotFound` are expected outcomes of normal operation;
/// the lifecycle manager turns them into plain boolean results.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("cooldown active ({:.1}s remaining)", remaining.as_secs_f64())]
    Throttled { remaining: Duration },

    #[error("insufficient disk space: {available} bytes free, {required} required")]
    InsufficientSpace { available: u64, required: u64 },

    #[error("{op} failed: {detail}")]
    Backend { op: &'static str, detail: String },

    #[error("snapshot not found: {0}")]
    NotFound(String),

    #[error("snapshot already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid watch target: {0}")]
    InvalidTarget(PathBuf),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl SnapshotError {
    pub fn backend(op: &'static str, detail: impl Into<String>) -> Self {
        Self::Backend {
            op,
            detail: detail.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Invalid configuration, fatal at startup
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid retention mode '{0}': must be 'count' or 'time'")]
    UnknownRetentionMode(String),

    #[error("unknown backend '{0}': must be 'btrfs' or 'copy'")]
    UnknownBackend(String),

    #[error("max_snapshots must be at least 1")]
    MaxSnapshotsTooSmall,

    #[error("retention_days must be at least 1")]
    RetentionDaysTooSmall,

    #[error("required configuration field missing: {0}")]
    Missing(&'static str),
}
