//! Periodic cleanup scheduler
//!
//! Enforces retention on a fixed interval, independent of change activity,
//! so time-based retention still prunes while the watch target is idle.

use crate::manager::LifecycleManager;
use crossbeam_channel::{bounded, select, tick, Sender};
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Background thread running `cleanup()` every `interval`
pub struct CleanupScheduler {
    stop_tx: Mutex<Option<Sender<()>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl CleanupScheduler {
    /// Spawn the scheduler; the first pass runs after one interval
    pub fn start(manager: Arc<LifecycleManager>, interval: Duration) -> io::Result<Self> {
        let (stop_tx, stop_rx) = bounded::<()>(0);

        let handle = thread::Builder::new()
            .name("snapwatch-cleanup".into())
            .spawn(move || {
                let ticker = tick(interval);
                info!("Starting periodic cleanup (interval: {:?})", interval);

                loop {
                    select! {
                        recv(ticker) -> _ => {
                            match manager.cleanup() {
                                Ok(deleted) if !deleted.is_empty() => {
                                    info!("Periodic cleanup removed {} snapshots", deleted.len());
                                }
                                Ok(_) => debug!("Periodic cleanup: nothing to remove"),
                                Err(e) => warn!("Periodic cleanup failed: {}", e),
                            }
                        }
                        // Sender dropped
                        recv(stop_rx) -> _ => break,
                    }
                }

                debug!("Cleanup scheduler stopped");
            })?;

        Ok(Self {
            stop_tx: Mutex::new(Some(stop_tx)),
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Stop the scheduler, waiting for an in-flight pass
    pub fn stop(&self) {
        drop(self.stop_tx.lock().take());
        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                warn!("Cleanup scheduler thread panicked");
            }
        }
    }
}

impl Drop for CleanupScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::ManagerConfig;
    use crate::retention::RetentionPolicy;
    use std::fs;
    use std::time::Instant;
    use sw_core::{CopyBackend, SnapshotStore, WatchTarget};
    use tempfile::TempDir;

    fn manager(temp: &TempDir, keep: usize) -> Arc<LifecycleManager> {
        let watch = temp.path().join("data");
        fs::create_dir_all(&watch).unwrap();
        let store = SnapshotStore::open(
            WatchTarget::new(&watch).unwrap(),
            temp.path().join("snapshots"),
            Arc::new(CopyBackend::new()),
        )
        .unwrap();
        Arc::new(LifecycleManager::new(
            store,
            ManagerConfig::new(Duration::ZERO, RetentionPolicy::count(keep)),
        ))
    }

    #[test]
    fn test_scheduler_enforces_retention() {
        let temp = TempDir::new().unwrap();
        let manager = manager(&temp, 1);
        for i in 0..3 {
            fs::create_dir_all(temp.path().join(format!("snapshots/data_2024010{}_000000_000", i)))
                .unwrap();
        }

        let scheduler = CleanupScheduler::start(Arc::clone(&manager), Duration::from_millis(50)).unwrap();

        let start = Instant::now();
        while manager.list_snapshots().unwrap().len() > 1 && start.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(20));
        }
        scheduler.stop();

        assert_eq!(manager.list_snapshots().unwrap().len(), 1);
    }

    #[test]
    fn test_stop_is_prompt_and_idempotent() {
        let temp = TempDir::new().unwrap();
        let scheduler = CleanupScheduler::start(manager(&temp, 5), Duration::from_secs(3600)).unwrap();

        let start = Instant::now();
        scheduler.stop();
        scheduler.stop();
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
