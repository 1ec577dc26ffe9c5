//! Snapshot backends
//!
//! A backend is the capability that actually duplicates and removes
//! snapshot directories. The store never branches on which one is in use.

mod btrfs;
mod copy;

pub use btrfs::{parse_size, BtrfsBackend};
pub use copy::CopyBackend;

use crate::{ConfigError, Result, SnapshotError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// Create/delete/query primitive behind every snapshot operation
pub trait SnapshotBackend: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Check that `source` can be snapshotted by this backend
    fn validate_source(&self, source: &Path) -> Result<()>;

    /// Atomically duplicate `source` into `dest`
    ///
    /// On error nothing may be left at `dest`.
    fn create(&self, source: &Path, dest: &Path) -> Result<()>;

    fn delete(&self, path: &Path) -> Result<()>;

    /// Bytes occupied by the snapshot at `path`
    fn size(&self, path: &Path) -> Result<u64>;

    /// Bytes available to unprivileged users on the filesystem holding `path`
    fn free_space(&self, path: &Path) -> Result<u64> {
        available_space(path)
    }
}

/// Backend selection from configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum BackendKind {
    /// btrfs subvolume snapshots (requires root)
    #[default]
    Btrfs,
    /// Staged recursive copy; works on any filesystem
    Copy,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Btrfs => "btrfs",
            BackendKind::Copy => "copy",
        }
    }

    pub fn build(self) -> Arc<dyn SnapshotBackend> {
        match self {
            BackendKind::Btrfs => Arc::new(BtrfsBackend::new()),
            BackendKind::Copy => Arc::new(CopyBackend::new()),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "btrfs" => Ok(BackendKind::Btrfs),
            "copy" => Ok(BackendKind::Copy),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

impl TryFrom<String> for BackendKind {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Capacity of the filesystem holding a path, in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiskUsage {
    pub total: u64,
    pub used: u64,
    /// Available to unprivileged users
    pub free: u64,
}

impl DiskUsage {
    pub fn percent_used(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.used as f64 / self.total as f64 * 100.0
    }
}

#[cfg(unix)]
pub fn disk_usage(path: &Path) -> Result<DiskUsage> {
    let stat = nix::sys::statvfs::statvfs(path).map_err(|e| {
        SnapshotError::backend("statvfs", format!("{}: {}", path.display(), e))
    })?;

    let fragment = stat.fragment_size() as u64;
    let total = stat.blocks() as u64 * fragment;
    Ok(DiskUsage {
        total,
        used: total.saturating_sub(stat.blocks_free() as u64 * fragment),
        free: stat.blocks_available() as u64 * fragment,
    })
}

#[cfg(not(unix))]
pub fn disk_usage(path: &Path) -> Result<DiskUsage> {
    Err(SnapshotError::backend(
        "statvfs",
        format!("{}: disk usage query unsupported on this platform", path.display()),
    ))
}

/// Free space via statvfs
pub fn available_space(path: &Path) -> Result<u64> {
    Ok(disk_usage(path)?.free)
}
