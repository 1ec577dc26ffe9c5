//! btrfs subvolume backend (shells out to btrfs-progs)

use super::SnapshotBackend;
use crate::{Result, SnapshotError};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Snapshots via `btrfs subvolume snapshot`
///
/// The watch target must itself be a subvolume and the process needs
/// root privileges.
#[derive(Debug, Clone)]
pub struct BtrfsBackend {
    program: PathBuf,
}

impl BtrfsBackend {
    pub fn new() -> Self {
        Self::with_program("btrfs")
    }

    /// Use a specific `btrfs` executable
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run the tool, returning stdout on success and stderr as the
    /// diagnostic on failure
    fn run(&self, op: &'static str, args: &[&OsStr]) -> Result<String> {
        debug!("Running {} {:?}", self.program.display(), args);

        let output = Command::new(&self.program).args(args).output().map_err(|e| {
            SnapshotError::backend(
                op,
                format!("failed to run {}: {}", self.program.display(), e),
            )
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let detail = if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr
            };
            return Err(SnapshotError::backend(op, detail));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for BtrfsBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotBackend for BtrfsBackend {
    fn name(&self) -> &'static str {
        "btrfs"
    }

    fn validate_source(&self, source: &Path) -> Result<()> {
        self.run(
            "btrfs subvolume show",
            &[OsStr::new("subvolume"), OsStr::new("show"), source.as_os_str()],
        )
        .map(|_| ())
        .map_err(|e| match e {
            SnapshotError::Backend { op, detail } => SnapshotError::Backend {
                op,
                detail: format!("{} is not a btrfs subvolume: {}", source.display(), detail),
            },
            other => other,
        })
    }

    fn create(&self, source: &Path, dest: &Path) -> Result<()> {
        self.run(
            "btrfs subvolume snapshot",
            &[
                OsStr::new("subvolume"),
                OsStr::new("snapshot"),
                source.as_os_str(),
                dest.as_os_str(),
            ],
        )
        .map(|_| ())
    }

    fn delete(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(SnapshotError::NotFound(file_name(path)));
        }

        self.run(
            "btrfs subvolume delete",
            &[OsStr::new("subvolume"), OsStr::new("delete"), path.as_os_str()],
        )
        .map(|_| ())
    }

    fn size(&self, path: &Path) -> Result<u64> {
        let stdout = self.run(
            "btrfs filesystem du",
            &[OsStr::new("filesystem"), OsStr::new("du"), OsStr::new("-s"), path.as_os_str()],
        )?;

        parse_du_output(&stdout).ok_or_else(|| {
            SnapshotError::backend(
                "btrfs filesystem du",
                format!("unparseable output: {}", stdout.trim()),
            )
        })
    }
}

/// Total column of the last line of `btrfs filesystem du -s`
///
/// Last line: "<total> <exclusive> <set shared> <path>"
fn parse_du_output(stdout: &str) -> Option<u64> {
    stdout
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .and_then(|line| line.split_whitespace().next())
        .and_then(parse_size)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Parse a human-readable size as printed by btrfs-progs
///
/// Accepts `123`, `1.5K`, `12.00MiB`, `0.00B`, case-insensitive.
pub fn parse_size(s: &str) -> Option<u64> {
    let upper = s.trim().to_ascii_uppercase();
    let s = upper.strip_suffix('B').unwrap_or(&upper);
    let s = s.strip_suffix('I').unwrap_or(s);

    let (number, multiplier) = match s.chars().last()? {
        'K' => (&s[..s.len() - 1], 1u64 << 10),
        'M' => (&s[..s.len() - 1], 1u64 << 20),
        'G' => (&s[..s.len() - 1], 1u64 << 30),
        'T' => (&s[..s.len() - 1], 1u64 << 40),
        _ => (s, 1),
    };

    let value: f64 = number.trim().parse().ok()?;
    if value < 0.0 {
        return None;
    }
    Some((value * multiplier as f64) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_size_units() {
        assert_eq!(parse_size("0.00B"), Some(0));
        assert_eq!(parse_size("512"), Some(512));
        assert_eq!(parse_size("512B"), Some(512));
        assert_eq!(parse_size("1K"), Some(1024));
        assert_eq!(parse_size("1.50KiB"), Some(1536));
        assert_eq!(parse_size("2.00MiB"), Some(2 * 1024 * 1024));
        assert_eq!(parse_size("1G"), Some(1024 * 1024 * 1024));
        assert_eq!(parse_size("1.00TiB"), Some(1u64 << 40));
        assert_eq!(parse_size("12.00mib"), Some(12 * 1024 * 1024));
    }

    #[test]
    fn test_parse_size_rejects_garbage() {
        assert_eq!(parse_size("-"), None);
        assert_eq!(parse_size(""), None);
        assert_eq!(parse_size("Total"), None);
    }

    #[test]
    fn test_missing_program_is_backend_failure() {
        let temp_dir = TempDir::new().unwrap();
        let backend = BtrfsBackend::with_program("/nonexistent/btrfs-for-tests");

        let err = backend
            .create(temp_dir.path(), &temp_dir.path().join("snap"))
            .unwrap_err();
        match err {
            SnapshotError::Backend { op, detail } => {
                assert_eq!(op, "btrfs subvolume snapshot");
                assert!(detail.contains("failed to run"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let backend = BtrfsBackend::with_program("/nonexistent/btrfs-for-tests");

        let err = backend
            .delete(&temp_dir.path().join("data_20240101_000000_000"))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_nonzero_exit_without_stderr() {
        let temp_dir = TempDir::new().unwrap();
        let backend = BtrfsBackend::with_program("false");

        let err = backend
            .create(temp_dir.path(), &temp_dir.path().join("snap"))
            .unwrap_err();
        assert!(err.to_string().contains("exited with"));
    }

    #[test]
    fn test_nonzero_exit_reports_stderr() {
        // `sh subvolume show <dir>` fails trying to open a script named "subvolume"
        let temp_dir = TempDir::new().unwrap();
        let backend = BtrfsBackend::with_program("sh");

        let err = backend.validate_source(temp_dir.path()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("is not a btrfs subvolume"));
        assert!(message.contains("subvolume"));
        assert!(matches!(err, SnapshotError::Backend { op: "btrfs subvolume show", .. }));
    }

    #[test]
    fn test_parse_du_output() {
        let stdout = "     Total   Exclusive  Set shared  Filename\n   2.00MiB       0.00B     2.00MiB  /snap\n";
        assert_eq!(parse_du_output(stdout), Some(2 * 1024 * 1024));
        assert_eq!(parse_du_output("     Total   Exclusive  Set shared  Filename\n"), None);
        assert_eq!(parse_du_output(""), None);
    }
}
