//! Lifecycle manager: cooldown gate, capacity gate, creation and cleanup

use crate::cooldown::CooldownGate;
use crate::retention::RetentionPolicy;
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use sw_core::{Result, Snapshot, SnapshotError, SnapshotStore};
use tracing::{debug, error, info, warn};
use watcher::{ChangeHandler, ChangeSummary};

/// Snapshots are refused below this much free space (1 GiB)
pub const MIN_FREE_BYTES: u64 = 1024 * 1024 * 1024;

/// Lifecycle manager configuration
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Minimum time between two snapshots, measured from completion
    pub cooldown: Duration,
    pub policy: RetentionPolicy,
    pub min_free_bytes: u64,
}

impl ManagerConfig {
    pub fn new(cooldown: Duration, policy: RetentionPolicy) -> Self {
        Self {
            cooldown,
            policy,
            min_free_bytes: MIN_FREE_BYTES,
        }
    }
}

/// One row of `list_snapshots`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotRecord {
    pub name: String,
    pub path: PathBuf,
    pub created: DateTime<Local>,
    /// Best-effort; 0 when sizing failed
    pub size: u64,
}

/// Read-only aggregate over the snapshot population
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotInfo {
    pub count: usize,
    pub total_size: u64,
    pub oldest: Option<String>,
    pub newest: Option<String>,
    pub last_snapshot_time: Option<DateTime<Local>>,
}

/// Single entry point for everything that creates or deletes snapshots
///
/// Safe to share between the watch loop, the cleanup scheduler and manual
/// triggers. The cooldown gate is locked from the check through the
/// timestamp update, both in memory and on disk, so concurrent callers in
/// any number of processes create at most one snapshot per window.
pub struct LifecycleManager {
    store: SnapshotStore,
    config: ManagerConfig,
    cooldown: CooldownGate,
    cleanup_lock: Mutex<()>,
}

impl LifecycleManager {
    pub fn new(store: SnapshotStore, config: ManagerConfig) -> Self {
        let cooldown =
            CooldownGate::new(&store.state_dir(), store.target().prefix(), config.cooldown);
        Self {
            store,
            config,
            cooldown,
            cleanup_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Run the creation pipeline and report the structured outcome
    pub fn attempt_snapshot(&self, reason: &str) -> Result<Snapshot> {
        let snapshot = self.cooldown.pass(|| {
            self.check_capacity()?;
            info!("Creating snapshot ({})", reason);
            self.store.create()
        })?;

        info!("Snapshot created: {}", snapshot.name);
        Ok(snapshot)
    }

    /// Create a snapshot unless throttled
    ///
    /// Returns `Ok(true)` when a snapshot was created and `Ok(false)` when
    /// the cooldown is active or the backend failed. Only the capacity gate
    /// is reported as an error.
    pub fn trigger_snapshot(&self, reason: &str) -> Result<bool> {
        match self.attempt_snapshot(reason) {
            Ok(_) => Ok(true),
            Err(SnapshotError::Throttled { remaining }) => {
                info!(
                    "Skipping snapshot, cooldown active ({:.1}s remaining)",
                    remaining.as_secs_f64()
                );
                Ok(false)
            }
            Err(e @ SnapshotError::InsufficientSpace { .. }) => {
                error!("Snapshot refused: {}", e);
                Err(e)
            }
            Err(e) => {
                error!("Snapshot failed: {}", e);
                Ok(false)
            }
        }
    }

    fn check_capacity(&self) -> Result<()> {
        match self.store.free_space() {
            Ok(available) if available < self.config.min_free_bytes => {
                Err(SnapshotError::InsufficientSpace {
                    available,
                    required: self.config.min_free_bytes,
                })
            }
            Ok(_) => Ok(()),
            Err(e) => {
                warn!("Could not check free space, proceeding: {}", e);
                Ok(())
            }
        }
    }

    /// Apply the retention policy; returns the names actually deleted
    pub fn cleanup(&self) -> Result<Vec<String>> {
        let _pass = self.cleanup_lock.lock();

        let snapshots = self.store.list()?;
        let victims = self
            .config
            .policy
            .select_victims(&snapshots, SystemTime::now());

        if victims.is_empty() {
            debug!("Cleanup: nothing to remove ({} snapshots)", snapshots.len());
            return Ok(Vec::new());
        }

        info!(
            "Cleanup ({}): removing {} of {} snapshots",
            self.config.policy,
            victims.len(),
            snapshots.len()
        );

        let mut deleted = Vec::with_capacity(victims.len());
        for snapshot in victims {
            match self.store.delete(snapshot) {
                Ok(()) => {
                    info!("Deleted old snapshot: {}", snapshot.name);
                    deleted.push(snapshot.name.clone());
                }
                Err(e) => warn!("Failed to delete snapshot {}: {}", snapshot.name, e),
            }
        }

        Ok(deleted)
    }

    /// All snapshots, oldest first
    pub fn list_snapshots(&self) -> Result<Vec<SnapshotRecord>> {
        let snapshots = self.store.list()?;
        Ok(snapshots.iter().map(|s| self.record(s)).collect())
    }

    fn record(&self, snapshot: &Snapshot) -> SnapshotRecord {
        let size = self.store.size_of(snapshot).unwrap_or_else(|e| {
            debug!("Size query failed for {}: {}", snapshot.name, e);
            0
        });

        SnapshotRecord {
            name: snapshot.name.clone(),
            path: snapshot.path.clone(),
            created: snapshot.created_local(),
            size,
        }
    }

    /// Delete one snapshot by name; `Ok(false)` if there is no such snapshot
    pub fn delete_snapshot(&self, name: &str) -> Result<bool> {
        let snapshot = match self.store.find(name) {
            Ok(snapshot) => snapshot,
            Err(e) if e.is_not_found() => return Ok(false),
            Err(e) => return Err(e),
        };

        match self.store.delete(&snapshot) {
            Ok(()) => {
                info!("Deleted snapshot: {}", name);
                Ok(true)
            }
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Aggregate over the current snapshot population
    ///
    /// `last_snapshot_time` falls back to the newest snapshot's mtime when
    /// no completion has been recorded for this target.
    pub fn info(&self) -> Result<SnapshotInfo> {
        let records = self.list_snapshots()?;
        let last_created = self.cooldown.last_snapshot();

        Ok(SnapshotInfo {
            count: records.len(),
            total_size: records.iter().map(|r| r.size).sum(),
            oldest: records.first().map(|r| r.name.clone()),
            newest: records.last().map(|r| r.name.clone()),
            last_snapshot_time: last_created.or_else(|| records.last().map(|r| r.created)),
        })
    }

    /// Watch callback: snapshot on change, then enforce retention
    pub fn on_change(&self, summary: &ChangeSummary) -> Result<()> {
        debug!(
            "Change detected: {} events across {} files",
            summary.event_count, summary.unique_files
        );

        if self.trigger_snapshot(&summary.reason())? {
            self.cleanup()?;
        }
        Ok(())
    }

    /// Adapter for the watch loop
    pub fn change_handler(self: &Arc<Self>) -> Arc<dyn ChangeHandler> {
        let manager = Arc::clone(self);
        Arc::new(move |summary: &ChangeSummary| -> anyhow::Result<()> {
            manager.on_change(summary)?;
            Ok(())
        })
    }
}
