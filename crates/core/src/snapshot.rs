//! Watch target and snapshot data model

use crate::{Result, SnapshotError};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Timestamp suffix of every snapshot name (millisecond precision)
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%3f";

/// The directory under observation
///
/// The basename of the directory is the prefix that namespaces its
/// snapshots, so several targets can share one snapshot root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTarget {
    path: PathBuf,
    prefix: String,
}

impl WatchTarget {
    /// Create a watch target, resolving relative paths against the cwd
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|e| SnapshotError::io(path, e))?
                .join(path)
        };

        let prefix = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.is_empty() && n != "." && n != "..")
            .ok_or_else(|| SnapshotError::InvalidTarget(path.clone()))?;

        Ok(Self { path, prefix })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Snapshot name for the given instant: `<prefix>_<YYYYMMDD_HHMMSS_mmm>`
    pub fn snapshot_name(&self, at: DateTime<Local>) -> String {
        format!("{}_{}", self.prefix, at.format(TIMESTAMP_FORMAT))
    }

    /// Whether a directory entry name belongs to this target
    pub fn owns(&self, name: &str) -> bool {
        name.strip_prefix(self.prefix.as_str())
            .map_or(false, |rest| rest.starts_with('_'))
    }
}

/// One point-in-time copy of the watch target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub name: String,
    pub path: PathBuf,
    /// Directory mtime; not stored anywhere else
    pub created: SystemTime,
}

impl Snapshot {
    pub fn created_local(&self) -> DateTime<Local> {
        DateTime::<Local>::from(self.created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_snapshot_name_format() {
        let target = WatchTarget::new("/data/mydir").unwrap();
        let at = Local
            .with_ymd_and_hms(2024, 3, 7, 9, 5, 2)
            .unwrap()
            + chrono::Duration::milliseconds(42);

        assert_eq!(target.prefix(), "mydir");
        assert_eq!(target.snapshot_name(at), "mydir_20240307_090502_042");
    }

    #[test]
    fn test_owns_requires_prefix_and_separator() {
        let target = WatchTarget::new("/data/mydir").unwrap();

        assert!(target.owns("mydir_20240307_090502_042"));
        assert!(!target.owns("mydir"));
        assert!(!target.owns("mydirectory_20240307_090502_042"));
        assert!(!target.owns("other_20240307_090502_042"));
        assert!(!target.owns(".mydir_20240307_090502_042.partial"));
    }

    #[test]
    fn test_relative_target_is_made_absolute() {
        let target = WatchTarget::new("some/dir").unwrap();
        assert!(target.path().is_absolute());
        assert_eq!(target.prefix(), "dir");
    }

    #[test]
    fn test_root_is_not_a_valid_target() {
        assert!(matches!(
            WatchTarget::new("/"),
            Err(SnapshotError::InvalidTarget(_))
        ));
    }
}
