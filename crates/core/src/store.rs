//! Snapshot store: the only writer under the snapshot root

use crate::backend::{self, DiskUsage, SnapshotBackend};
use crate::snapshot::{Snapshot, WatchTarget};
use crate::{Result, SnapshotError};
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// Hidden directory under the snapshot root for lock and cooldown files
pub const STATE_DIR: &str = ".snapwatch";

/// Snapshots of one watch target under a snapshot root
///
/// Layout:
/// ```text
/// <snapshot_root>/
///   <prefix>_20240307_090502_042/
///   <prefix>_20240307_091502_311/
///   <other-prefix>_.../          (ignored, belongs to another target)
///   .snapwatch/                  (daemon state, ignored)
/// ```
pub struct SnapshotStore {
    target: WatchTarget,
    root: PathBuf,
    backend: Arc<dyn SnapshotBackend>,
}

impl SnapshotStore {
    /// Open a store, creating the snapshot root if needed
    pub fn open(
        target: WatchTarget,
        root: impl Into<PathBuf>,
        backend: Arc<dyn SnapshotBackend>,
    ) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| SnapshotError::io(&root, e))?;

        Ok(Self {
            target,
            root,
            backend,
        })
    }

    pub fn target(&self) -> &WatchTarget {
        &self.target
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lock, cooldown and daemon output files for every target in this root
    pub fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    /// All snapshots of this target, oldest first by mtime
    ///
    /// Ordering is by modification time regardless of how names sort.
    pub fn list(&self) -> Result<Vec<Snapshot>> {
        let entries = fs::read_dir(&self.root).map_err(|e| SnapshotError::io(&self.root, e))?;
        let mut snapshots = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| SnapshotError::io(&self.root, e))?;
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(_) => continue,
            };
            if !self.target.owns(&name) {
                continue;
            }

            let path = entry.path();
            let metadata = match fs::metadata(&path) {
                Ok(m) => m,
                // Deleted between read_dir and stat
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    warn!("Skipping unreadable snapshot {}: {}", path.display(), e);
                    continue;
                }
            };
            if !metadata.is_dir() {
                continue;
            }

            let created = metadata.modified().map_err(|e| SnapshotError::io(&path, e))?;
            snapshots.push(Snapshot {
                name,
                path,
                created,
            });
        }

        snapshots.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.name.cmp(&b.name)));
        Ok(snapshots)
    }

    /// Look up a snapshot of this target by name
    pub fn find(&self, name: &str) -> Result<Snapshot> {
        if !self.target.owns(name) || name.contains('/') || name.contains('\\') {
            return Err(SnapshotError::NotFound(name.to_string()));
        }

        let path = self.root.join(name);
        match fs::metadata(&path) {
            Ok(metadata) if metadata.is_dir() => {
                let created = metadata.modified().map_err(|e| SnapshotError::io(&path, e))?;
                Ok(Snapshot {
                    name: name.to_string(),
                    path,
                    created,
                })
            }
            Ok(_) => Err(SnapshotError::NotFound(name.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SnapshotError::NotFound(name.to_string()))
            }
            Err(e) => Err(SnapshotError::io(&path, e)),
        }
    }

    /// Create a snapshot named after the current local time
    pub fn create(&self) -> Result<Snapshot> {
        self.create_at(Local::now())
    }

    /// Create a snapshot named after `at`
    pub fn create_at(&self, at: DateTime<Local>) -> Result<Snapshot> {
        let name = self.target.snapshot_name(at);
        let path = self.root.join(&name);

        if path.exists() {
            return Err(SnapshotError::AlreadyExists(name));
        }

        self.backend.create(self.target.path(), &path)?;
        self.find(&name)
    }

    /// Delete a snapshot; a snapshot that is already gone is `NotFound`
    pub fn delete(&self, snapshot: &Snapshot) -> Result<()> {
        if !snapshot.path.exists() {
            return Err(SnapshotError::NotFound(snapshot.name.clone()));
        }
        self.backend.delete(&snapshot.path)
    }

    pub fn size_of(&self, snapshot: &Snapshot) -> Result<u64> {
        self.backend.size(&snapshot.path)
    }

    /// Free space on the filesystem holding the snapshot root
    pub fn free_space(&self) -> Result<u64> {
        self.backend.free_space(&self.root)
    }

    /// Capacity of the filesystem holding the snapshot root
    pub fn disk_usage(&self) -> Result<DiskUsage> {
        backend::disk_usage(&self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CopyBackend;
    use filetime::FileTime;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        watch: PathBuf,
        snaps: PathBuf,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let watch = temp.path().join("data");
        let snaps = temp.path().join("snapshots");
        fs::create_dir_all(&watch).unwrap();
        fs::write(watch.join("file.txt"), b"contents").unwrap();
        Fixture {
            _temp: temp,
            watch,
            snaps,
        }
    }

    fn open(fx: &Fixture) -> SnapshotStore {
        SnapshotStore::open(
            WatchTarget::new(&fx.watch).unwrap(),
            &fx.snaps,
            Arc::new(CopyBackend::new()),
        )
        .unwrap()
    }

    fn seed(root: &Path, name: &str, age: Duration) {
        let path = root.join(name);
        fs::create_dir_all(&path).unwrap();
        let mtime = SystemTime::now() - age;
        filetime::set_file_mtime(&path, FileTime::from_system_time(mtime)).unwrap();
    }

    #[test]
    fn test_open_creates_root() {
        let fx = fixture();
        assert!(!fx.snaps.exists());
        let _store = open(&fx);
        assert!(fx.snaps.is_dir());
    }

    #[test]
    fn test_create_names_snapshot_after_target() {
        let fx = fixture();
        let store = open(&fx);

        let snapshot = store.create().unwrap();

        assert!(snapshot.name.starts_with("data_"));
        assert_eq!(snapshot.name.len(), "data_".len() + "YYYYMMDD_HHMMSS_mmm".len());
        assert!(snapshot.path.join("file.txt").exists());
        assert_eq!(store.list().unwrap(), vec![snapshot]);
    }

    #[test]
    fn test_create_at_same_instant_is_rejected() {
        let fx = fixture();
        let store = open(&fx);
        let at = Local::now();

        store.create_at(at).unwrap();
        let err = store.create_at(at).unwrap_err();
        assert!(matches!(err, SnapshotError::AlreadyExists(_)));
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_list_sorts_by_mtime_not_name() {
        let fx = fixture();
        let store = open(&fx);

        // Lexical order is the reverse of age order
        seed(&fx.snaps, "data_20240101_000000_000", Duration::from_secs(10));
        seed(&fx.snaps, "data_20240102_000000_000", Duration::from_secs(300));
        seed(&fx.snaps, "data_20240103_000000_000", Duration::from_secs(100));

        let names: Vec<_> = store.list().unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec![
                "data_20240102_000000_000",
                "data_20240103_000000_000",
                "data_20240101_000000_000",
            ]
        );

        let listed = store.list().unwrap();
        for pair in listed.windows(2) {
            assert!(pair[0].created <= pair[1].created);
        }
    }

    #[test]
    fn test_list_ignores_foreign_entries() {
        let fx = fixture();
        let store = open(&fx);

        seed(&fx.snaps, "data_20240101_000000_000", Duration::from_secs(10));
        seed(&fx.snaps, "other_20240101_000000_000", Duration::from_secs(10));
        seed(&fx.snaps, "database_20240101_000000_000", Duration::from_secs(10));
        seed(&fx.snaps, STATE_DIR, Duration::from_secs(10));
        fs::write(fx.snaps.join("data_20240102_000000_000"), b"not a dir").unwrap();

        let names: Vec<_> = store.list().unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["data_20240101_000000_000"]);
    }

    #[test]
    fn test_two_targets_share_a_root() {
        let fx = fixture();
        let other_watch = fx.watch.parent().unwrap().join("other");
        fs::create_dir_all(&other_watch).unwrap();

        let store = open(&fx);
        let other = SnapshotStore::open(
            WatchTarget::new(&other_watch).unwrap(),
            &fx.snaps,
            Arc::new(CopyBackend::new()),
        )
        .unwrap();

        store.create().unwrap();
        other.create().unwrap();

        assert_eq!(store.list().unwrap().len(), 1);
        assert_eq!(other.list().unwrap().len(), 1);
    }

    #[test]
    fn test_find_and_delete() {
        let fx = fixture();
        let store = open(&fx);
        seed(&fx.snaps, "data_20240101_000000_000", Duration::from_secs(10));

        let snapshot = store.find("data_20240101_000000_000").unwrap();
        store.delete(&snapshot).unwrap();

        assert!(store.list().unwrap().is_empty());
        // Already gone
        assert!(store.delete(&snapshot).unwrap_err().is_not_found());
    }

    #[test]
    fn test_find_rejects_foreign_and_traversal_names() {
        let fx = fixture();
        let store = open(&fx);
        seed(&fx.snaps, "other_20240101_000000_000", Duration::from_secs(10));

        assert!(store.find("other_20240101_000000_000").unwrap_err().is_not_found());
        assert!(store.find("data_/../other_20240101_000000_000").unwrap_err().is_not_found());
        assert!(store.find("data_20990101_000000_000").unwrap_err().is_not_found());
    }

    #[test]
    fn test_size_and_free_space() {
        let fx = fixture();
        let store = open(&fx);
        let snapshot = store.create().unwrap();

        assert_eq!(store.size_of(&snapshot).unwrap(), b"contents".len() as u64);
        assert!(store.free_space().unwrap() > 0);
        assert!(store.disk_usage().unwrap().total >= store.free_space().unwrap());
    }
}
