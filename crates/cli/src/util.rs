//! Shared utilities for CLI commands

use crate::config::Config;
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use lifecycle::{LifecycleManager, ManagerConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;
use sw_core::{SnapshotStore, WatchTarget, STATE_DIR};

/// Make a path absolute against the current directory
pub fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    Ok(cwd.join(path))
}

/// Directory holding lock and daemon output files
pub fn state_dir(config: &Config) -> Result<PathBuf> {
    Ok(absolute(&config.snapshot_dir)?.join(STATE_DIR))
}

pub fn watch_target(config: &Config) -> Result<WatchTarget> {
    WatchTarget::new(&config.watch_dir)
        .with_context(|| format!("Invalid watch directory {}", config.watch_dir.display()))
}

/// Build the lifecycle manager described by `config`
pub fn build_manager(config: &Config) -> Result<LifecycleManager> {
    let policy = config.validate()?;
    let target = watch_target(config)?;
    let snapshot_dir = absolute(&config.snapshot_dir)?;

    let store = SnapshotStore::open(target, &snapshot_dir, config.backend.build())
        .with_context(|| format!("Failed to open snapshot directory {}", snapshot_dir.display()))?;

    Ok(LifecycleManager::new(
        store,
        ManagerConfig::new(Duration::from_secs(config.cooldown_secs), policy),
    ))
}

/// Format a time as relative ("2 hours ago")
pub fn format_relative_time(time: DateTime<Local>) -> String {
    let seconds = Local::now().signed_duration_since(time).num_seconds();
    if seconds < 0 {
        return "in the future".to_string();
    }

    if seconds < 60 {
        format!("{} seconds ago", seconds)
    } else if seconds < 3600 {
        format!("{} minutes ago", seconds / 60)
    } else if seconds < 86400 {
        format!("{} hours ago", seconds / 3600)
    } else if seconds < 604800 {
        format!("{} days ago", seconds / 86400)
    } else {
        format!("{} weeks ago", seconds / 604800)
    }
}

/// Format a time as absolute ("2024-01-03 14:30:00")
pub fn format_absolute_time(time: DateTime<Local>) -> String {
    time.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Format file size in human-readable format
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use tempfile::TempDir;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1024 * 1024), "1.00 MB");
        assert_eq!(format_size(1024 * 1024 * 1024), "1.00 GB");
        assert_eq!(format_size(1536), "1.50 KB");
    }

    #[test]
    fn test_format_relative_time() {
        let now = Local::now();
        assert!(format_relative_time(now).contains("seconds ago"));
        assert!(format_relative_time(now - ChronoDuration::hours(1)).contains("hour"));
        assert!(format_relative_time(now - ChronoDuration::days(1)).contains("day"));
        assert_eq!(format_relative_time(now + ChronoDuration::hours(1)), "in the future");
    }

    #[test]
    fn test_build_manager_opens_store() {
        let temp_dir = TempDir::new().unwrap();
        let watch = temp_dir.path().join("docs");
        std::fs::create_dir_all(&watch).unwrap();

        let config = Config {
            watch_dir: watch,
            snapshot_dir: temp_dir.path().join("snaps"),
            backend: sw_core::BackendKind::Copy,
            ..Config::default()
        };
        let manager = build_manager(&config).unwrap();

        assert_eq!(manager.store().target().prefix(), "docs");
        assert!(temp_dir.path().join("snaps").is_dir());
    }

    #[test]
    fn test_build_manager_rejects_invalid_retention() {
        let mut config = Config::default();
        config.retention.max_snapshots = 0;
        assert!(build_manager(&config).is_err());
    }
}
