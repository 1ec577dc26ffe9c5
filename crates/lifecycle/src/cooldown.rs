//! Cooldown gate shared by every process working on one watch target
//!
//! The completion time of the last snapshot is stored in
//! `<snapshot_root>/.snapwatch/<prefix>.cooldown`. The file is held under an
//! exclusive flock from the gate check through the timestamp update, so the
//! daemon, a manual `snapwatch snapshot` and a restarted daemon all observe
//! the same window.

use chrono::{DateTime, Local, SecondsFormat};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use sw_core::{Result, SnapshotError};
use tracing::{debug, warn};

pub struct CooldownGate {
    path: PathBuf,
    window: Duration,
    /// Last completion seen by this process; backs up an unwritable file
    last: Mutex<Option<DateTime<Local>>>,
}

impl CooldownGate {
    pub fn new(state_dir: &Path, prefix: &str, window: Duration) -> Self {
        Self {
            path: state_dir.join(format!("{}.cooldown", prefix)),
            window,
            last: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `create` unless a snapshot completed less than one window ago
    ///
    /// Completion is recorded only when `create` succeeds, so a failed
    /// attempt never starts a new window.
    pub fn pass<T>(&self, create: impl FnOnce() -> Result<T>) -> Result<T> {
        let mut last = self.last.lock();
        let mut file = self.lock_file()?;

        let recorded = read_stamp(&mut file);
        let newest = match (recorded, *last) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        if let Some(remaining) = newest.and_then(|at| self.remaining(at, Local::now())) {
            return Err(SnapshotError::Throttled { remaining });
        }

        let value = create()?;

        let now = Local::now();
        *last = Some(now);
        if let Err(e) = write_stamp(&mut file, now) {
            warn!("Failed to record cooldown in {}: {}", self.path.display(), e);
        }
        Ok(value)
    }

    /// Completion time of the last snapshot taken through any gate on this file
    pub fn last_snapshot(&self) -> Option<DateTime<Local>> {
        let recorded = File::open(&self.path).ok().and_then(|mut f| read_stamp(&mut f));
        match (recorded, *self.last.lock()) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }

    /// Time left in the window opened at `last`
    ///
    /// A stamp in the future is honoured for at most one window; anything
    /// further ahead means the clock was moved and the stamp is ignored.
    fn remaining(&self, last: DateTime<Local>, now: DateTime<Local>) -> Option<Duration> {
        match now.signed_duration_since(last).to_std() {
            Ok(elapsed) => (elapsed < self.window).then(|| self.window - elapsed),
            Err(_) => {
                let ahead = last.signed_duration_since(now).to_std().ok()?;
                (ahead <= self.window).then_some(self.window)
            }
        }
    }

    fn lock_file(&self) -> Result<File> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| SnapshotError::io(dir, e))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&self.path)
            .map_err(|e| SnapshotError::io(&self.path, e))?;

        flock_exclusive(&file).map_err(|e| SnapshotError::io(&self.path, e))?;
        Ok(file)
    }
}

fn read_stamp(file: &mut File) -> Option<DateTime<Local>> {
    let mut contents = String::new();
    file.seek(SeekFrom::Start(0)).ok()?;
    file.read_to_string(&mut contents).ok()?;

    let contents = contents.trim();
    if contents.is_empty() {
        return None;
    }
    match DateTime::parse_from_rfc3339(contents) {
        Ok(at) => Some(at.with_timezone(&Local)),
        Err(e) => {
            debug!("Ignoring unreadable cooldown stamp {:?}: {}", contents, e);
            None
        }
    }
}

fn write_stamp(file: &mut File, at: DateTime<Local>) -> std::io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(at.to_rfc3339_opts(SecondsFormat::Millis, false).as_bytes())?;
    file.sync_all()
}

/// Blocks until the lock is ours; released when the file is closed
#[cfg(unix)]
fn flock_exclusive(file: &File) -> std::io::Result<()> {
    use nix::fcntl::{flock, FlockArg};
    use std::os::unix::io::AsRawFd;

    flock(file.as_raw_fd(), FlockArg::LockExclusive).map_err(std::io::Error::from)
}

#[cfg(not(unix))]
fn flock_exclusive(_file: &File) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use tempfile::TempDir;

    const WINDOW: Duration = Duration::from_secs(60);

    fn ok() -> Result<()> {
        Ok(())
    }

    #[test]
    fn test_second_gate_sees_first_gates_window() {
        let temp_dir = TempDir::new().unwrap();
        let daemon = CooldownGate::new(temp_dir.path(), "docs", WINDOW);
        let manual = CooldownGate::new(temp_dir.path(), "docs", WINDOW);

        daemon.pass(ok).unwrap();
        let err = manual.pass(ok).unwrap_err();

        match err {
            SnapshotError::Throttled { remaining } => assert!(remaining <= WINDOW),
            other => panic!("expected Throttled, got {:?}", other),
        }
        assert!(manual.last_snapshot().is_some());
    }

    #[test]
    fn test_window_survives_restart() {
        let temp_dir = TempDir::new().unwrap();
        CooldownGate::new(temp_dir.path(), "docs", WINDOW).pass(ok).unwrap();

        let restarted = CooldownGate::new(temp_dir.path(), "docs", WINDOW);
        assert!(matches!(restarted.pass(ok), Err(SnapshotError::Throttled { .. })));
    }

    #[test]
    fn test_targets_have_separate_windows() {
        let temp_dir = TempDir::new().unwrap();
        CooldownGate::new(temp_dir.path(), "docs", WINDOW).pass(ok).unwrap();
        CooldownGate::new(temp_dir.path(), "photos", WINDOW).pass(ok).unwrap();
    }

    #[test]
    fn test_failed_create_does_not_start_window() {
        let temp_dir = TempDir::new().unwrap();
        let gate = CooldownGate::new(temp_dir.path(), "docs", WINDOW);

        let err = gate
            .pass(|| -> Result<()> { Err(SnapshotError::backend("create", "device busy")) })
            .unwrap_err();
        assert!(matches!(err, SnapshotError::Backend { .. }));
        assert!(gate.last_snapshot().is_none());

        gate.pass(ok).unwrap();
    }

    #[test]
    fn test_window_expires() {
        let temp_dir = TempDir::new().unwrap();
        let gate = CooldownGate::new(temp_dir.path(), "docs", Duration::from_millis(200));

        gate.pass(ok).unwrap();
        thread::sleep(Duration::from_millis(300));
        gate.pass(ok).unwrap();
    }

    #[test]
    fn test_far_future_stamp_is_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let gate = CooldownGate::new(temp_dir.path(), "docs", WINDOW);
        let future = Local::now() + chrono::Duration::days(2);
        std::fs::write(
            gate.path(),
            future.to_rfc3339_opts(SecondsFormat::Millis, false),
        )
        .unwrap();

        gate.pass(ok).unwrap();
    }

    #[test]
    fn test_garbage_stamp_is_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let gate = CooldownGate::new(temp_dir.path(), "docs", WINDOW);
        std::fs::write(gate.path(), "not a timestamp").unwrap();

        gate.pass(ok).unwrap();
        assert!(gate.last_snapshot().is_some());
    }

    #[test]
    fn test_independent_gates_admit_one_caller() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().to_path_buf();
        let created = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(6));

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let dir = dir.clone();
                let created = Arc::clone(&created);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    // One gate per thread, like separate processes
                    let gate = CooldownGate::new(&dir, "docs", WINDOW);
                    barrier.wait();
                    let _ = gate.pass(|| -> Result<()> {
                        thread::sleep(Duration::from_millis(20));
                        created.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    });
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }
}
