//! Directory-copy backend for filesystems without snapshot support

use super::SnapshotBackend;
use crate::{Result, SnapshotError};
use filetime::FileTime;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Snapshots by recursive copy
///
/// The copy is written to a hidden staging directory next to the
/// destination and renamed into place only once complete, so a failed
/// copy never shows up under the snapshot's name.
#[derive(Debug, Clone, Default)]
pub struct CopyBackend;

impl CopyBackend {
    pub fn new() -> Self {
        Self
    }

    fn staging_path(dest: &Path) -> Result<PathBuf> {
        let name = dest
            .file_name()
            .ok_or_else(|| SnapshotError::backend("copy", format!("invalid destination {}", dest.display())))?;
        let parent = dest.parent().unwrap_or_else(|| Path::new("."));
        Ok(parent.join(format!(".{}.partial", name.to_string_lossy())))
    }
}

impl SnapshotBackend for CopyBackend {
    fn name(&self) -> &'static str {
        "copy"
    }

    fn validate_source(&self, source: &Path) -> Result<()> {
        if source.is_dir() {
            Ok(())
        } else {
            Err(SnapshotError::backend(
                "copy",
                format!("{} is not a directory", source.display()),
            ))
        }
    }

    fn create(&self, source: &Path, dest: &Path) -> Result<()> {
        if dest.exists() {
            return Err(SnapshotError::AlreadyExists(file_name(dest)));
        }

        let staging = Self::staging_path(dest)?;
        if staging.exists() {
            warn!("Removing stale staging directory {}", staging.display());
            fs::remove_dir_all(&staging).map_err(|e| SnapshotError::io(&staging, e))?;
        }

        // Never copy the snapshot root into itself when it lives inside the source
        let snapshot_root = dest
            .parent()
            .filter(|root| root.starts_with(source) && *root != source);

        if let Err(e) = copy_tree(source, &staging, snapshot_root) {
            if let Err(cleanup) = fs::remove_dir_all(&staging) {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove staging directory {}: {}", staging.display(), cleanup);
                }
            }
            return Err(e);
        }

        fs::rename(&staging, dest).map_err(|e| {
            let _ = fs::remove_dir_all(&staging);
            SnapshotError::backend("copy", format!("rename into {} failed: {}", dest.display(), e))
        })?;

        // Creation time is the directory mtime
        filetime::set_file_mtime(dest, FileTime::now()).map_err(|e| SnapshotError::io(dest, e))?;

        debug!("Copied {} to {}", source.display(), dest.display());
        Ok(())
    }

    fn delete(&self, path: &Path) -> Result<()> {
        match fs::remove_dir_all(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SnapshotError::NotFound(file_name(path)))
            }
            Err(e) => Err(SnapshotError::backend("copy delete", format!("{}: {}", path.display(), e))),
        }
    }

    fn size(&self, path: &Path) -> Result<u64> {
        let mut total = 0u64;

        for entry in WalkDir::new(path).follow_links(false) {
            let entry = entry.map_err(|e| SnapshotError::backend("copy size", e.to_string()))?;
            if entry.file_type().is_file() {
                let metadata = entry
                    .metadata()
                    .map_err(|e| SnapshotError::backend("copy size", e.to_string()))?;
                total += metadata.len();
            }
        }

        Ok(total)
    }
}

/// Recursively copy `source` into `dest`, skipping `exclude`
fn copy_tree(source: &Path, dest: &Path, exclude: Option<&Path>) -> Result<()> {
    fs::create_dir_all(dest).map_err(|e| SnapshotError::io(dest, e))?;

    let walker = WalkDir::new(source)
        .follow_links(false)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| exclude.map_or(true, |ex| !e.path().starts_with(ex)));

    for entry in walker {
        let entry = entry.map_err(|e| SnapshotError::backend("copy", e.to_string()))?;
        let rel = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| SnapshotError::backend("copy", e.to_string()))?;
        let target = dest.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| SnapshotError::io(&target, e))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| SnapshotError::io(entry.path(), e))?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> Result<()> {
    let pointee = fs::read_link(link).map_err(|e| SnapshotError::io(link, e))?;
    std::os::unix::fs::symlink(&pointee, target).map_err(|e| SnapshotError::io(target, e))
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, target: &Path) -> Result<()> {
    fs::copy(link, target)
        .map(|_| ())
        .map_err(|e| SnapshotError::io(link, e))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
