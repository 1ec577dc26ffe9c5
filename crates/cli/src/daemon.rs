//! Daemon lifecycle management

use crate::config::Config;
use crate::locks::{self, DaemonLock, LockContent};
use crate::util;
use anyhow::{Context, Result};
use lifecycle::CleanupScheduler;
use std::sync::Arc;
use std::time::{Duration, Instant};
use sw_core::{BackendKind, WatchTarget};
use tracing::{info, warn};
use watcher::{IgnoreConfig, WatchConfig, WatchLoop};

/// Run the watch daemon in the foreground until SIGINT/SIGTERM
pub async fn start(config: &Config) -> Result<()> {
    let target = util::watch_target(config)?;
    validate_environment(config, &target)?;

    let snapshot_dir = util::absolute(&config.snapshot_dir)?;
    let manager = Arc::new(util::build_manager(config)?);
    let lock = DaemonLock::acquire(&util::state_dir(config)?, target.prefix(), target.path())?;

    // Only a snapshot root nested in the watch dir produces events of its own
    let excluded_roots = if snapshot_dir.starts_with(target.path()) {
        vec![snapshot_dir.clone()]
    } else {
        Vec::new()
    };
    let watch_config = WatchConfig {
        debounce: Duration::from_secs(config.debounce_secs),
        ignore: IgnoreConfig {
            exclude_patterns: config.exclude_patterns.clone(),
            excluded_roots,
        },
    };
    let watch = WatchLoop::start(target.path(), watch_config, manager.change_handler())
        .with_context(|| format!("Failed to watch {}", target.path().display()))?;

    let scheduler = if config.cleanup_interval_secs > 0 {
        let interval = Duration::from_secs(config.cleanup_interval_secs);
        Some(
            CleanupScheduler::start(Arc::clone(&manager), interval)
                .context("Failed to start cleanup scheduler")?,
        )
    } else {
        None
    };

    info!(
        "snapwatch started: watching {} -> {} (backend: {}, retention: {}, cooldown: {}s)",
        watch.root().display(),
        snapshot_dir.display(),
        config.backend,
        manager.config().policy,
        config.cooldown_secs
    );

    wait_for_shutdown().await?;
    info!("Shutting down");

    // Joining the debounce thread can wait on an in-flight snapshot
    tokio::task::spawn_blocking(move || {
        watch.stop();
        if let Some(scheduler) = scheduler {
            scheduler.stop();
        }
    })
    .await
    .context("Shutdown task failed")?;

    lock.release()?;
    info!("snapwatch stopped");
    Ok(())
}

/// Refuse to start on an environment the backend cannot work with
fn validate_environment(config: &Config, target: &WatchTarget) -> Result<()> {
    if !target.path().is_dir() {
        anyhow::bail!("Watch directory does not exist: {}", target.path().display());
    }

    if config.backend == BackendKind::Btrfs && !is_root() {
        anyhow::bail!("The btrfs backend must run as root (use backend = \"copy\" otherwise)");
    }

    config
        .backend
        .build()
        .validate_source(target.path())
        .with_context(|| format!("Backend {} cannot snapshot {}", config.backend, target.path().display()))?;

    let snapshot_dir = util::absolute(&config.snapshot_dir)?;
    if snapshot_dir.starts_with(target.path()) {
        warn!(
            "Snapshot directory {} is inside the watch directory; its events are ignored",
            snapshot_dir.display()
        );
    }

    Ok(())
}

#[cfg(unix)]
fn is_root() -> bool {
    nix::unistd::geteuid().is_root()
}

#[cfg(not(unix))]
fn is_root() -> bool {
    false
}

#[cfg(unix)]
async fn wait_for_shutdown() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    tokio::select! {
        res = tokio::signal::ctrl_c() => res.context("Failed to listen for SIGINT")?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")
}

/// The daemon watching this config's target, if running
pub fn holder(config: &Config) -> Result<Option<LockContent>> {
    let target = util::watch_target(config)?;
    Ok(DaemonLock::holder(&util::state_dir(config)?, target.prefix()))
}

/// Pid of the daemon watching this config's target, if running
pub fn running_pid(config: &Config) -> Result<Option<u32>> {
    Ok(holder(config)?.map(|content| content.pid))
}

pub async fn is_running(config: &Config) -> bool {
    matches!(running_pid(config), Ok(Some(_)))
}

/// Send SIGTERM to the daemon and wait for it to exit
pub async fn stop(config: &Config) -> Result<bool> {
    let pid = match running_pid(config)? {
        Some(pid) => pid,
        None => return Ok(false),
    };

    send_terminate(pid)?;

    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if !locks::is_process_alive(pid) {
            return Ok(true);
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    anyhow::bail!("Daemon (pid {}) did not exit within 10 seconds", pid)
}

#[cfg(unix)]
fn send_terminate(pid: u32) -> Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), Signal::SIGTERM)
        .with_context(|| format!("Failed to signal daemon (pid {})", pid))
}

#[cfg(not(unix))]
fn send_terminate(pid: u32) -> Result<()> {
    anyhow::bail!("Stopping the daemon (pid {}) is only supported on unix", pid)
}
