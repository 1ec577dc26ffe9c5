//! Per-target lock file for daemon exclusivity

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Exclusive lock held by the running daemon for one watch target
pub struct DaemonLock {
    path: PathBuf,
    #[allow(dead_code)]
    file: File,
}

/// Lock file content: who runs the daemon and since when
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockContent {
    pub pid: u32,
    pub watch_dir: PathBuf,
    /// Milliseconds since the Unix epoch
    pub started_at: u64,
}

impl LockContent {
    pub fn uptime(&self) -> Duration {
        Duration::from_millis(current_timestamp_ms().saturating_sub(self.started_at))
    }
}

impl DaemonLock {
    /// Lock file path for a target prefix
    pub fn path_for(state_dir: &Path, prefix: &str) -> PathBuf {
        state_dir.join(format!("{}.lock", prefix))
    }

    /// Acquire the lock for `prefix`
    ///
    /// Fails if another live process holds it. A lock left behind by a dead
    /// process is removed and retaken.
    pub fn acquire(state_dir: &Path, prefix: &str, watch_dir: &Path) -> Result<Self> {
        let lock_path = Self::path_for(state_dir, prefix);

        std::fs::create_dir_all(state_dir)
            .with_context(|| format!("Failed to create state directory {}", state_dir.display()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&lock_path)
            .context("Failed to open lock file")?;

        if !try_flock_exclusive(&file)? {
            if Self::is_stale_lock(&mut file) {
                tracing::warn!("Removing stale daemon lock {}", lock_path.display());
                drop(file);
                std::fs::remove_file(&lock_path)?;
                return Self::acquire(state_dir, prefix, watch_dir);
            }
            anyhow::bail!(
                "Daemon already running for {} (lock {} held by an active process)",
                watch_dir.display(),
                lock_path.display()
            );
        }

        Self::write_lock_content(&mut file, watch_dir)?;

        Ok(Self {
            path: lock_path,
            file,
        })
    }

    /// Release the lock and remove the file
    pub fn release(self) -> Result<()> {
        std::fs::remove_file(&self.path).context("Failed to remove lock file")?;
        Ok(())
    }

    /// The live daemon holding the lock for `prefix`, if any
    pub fn holder(state_dir: &Path, prefix: &str) -> Option<LockContent> {
        let mut file = File::open(Self::path_for(state_dir, prefix)).ok()?;
        let content = Self::read_lock_content(&mut file).ok()?;
        is_process_alive(content.pid).then_some(content)
    }

    fn is_stale_lock(file: &mut File) -> bool {
        match Self::read_lock_content(file) {
            Ok(content) => !is_process_alive(content.pid),
            // Unreadable content counts as stale
            Err(_) => true,
        }
    }

    fn write_lock_content(file: &mut File, watch_dir: &Path) -> Result<()> {
        let content = LockContent {
            pid: std::process::id(),
            watch_dir: watch_dir.to_path_buf(),
            started_at: current_timestamp_ms(),
        };

        let serialized =
            serde_json::to_string(&content).context("Failed to serialize lock content")?;

        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(serialized.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    fn read_lock_content(file: &mut File) -> Result<LockContent> {
        file.seek(SeekFrom::Start(0))?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        serde_json::from_str(&contents).context("Failed to deserialize lock content")
    }
}

impl Drop for DaemonLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(unix)]
fn try_flock_exclusive(file: &File) -> Result<bool> {
    use nix::fcntl::{flock, FlockArg};
    use std::os::unix::io::AsRawFd;

    match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
        Ok(_) => Ok(true),
        Err(nix::errno::Errno::EWOULDBLOCK) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(not(unix))]
fn try_flock_exclusive(_file: &File) -> Result<bool> {
    Ok(true)
}

/// Check if a process is alive
#[cfg(unix)]
pub fn is_process_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    // Null signal: existence check only
    match kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => true,
        Err(nix::errno::Errno::ESRCH) => false,
        // EPERM: exists but owned by someone else
        Err(_) => true,
    }
}

#[cfg(not(unix))]
pub fn is_process_alive(_pid: u32) -> bool {
    true
}

fn current_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
