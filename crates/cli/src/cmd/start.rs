//! Start the snapwatch daemon

use crate::config::Config;
use crate::util;
use anyhow::{Context, Result};
use std::time::Duration;

pub async fn run(config: &Config, foreground: bool) -> Result<()> {
    if foreground {
        crate::daemon::start(config).await
    } else {
        start_background(config).await
    }
}

async fn start_background(config: &Config) -> Result<()> {
    use std::process::Command;

    if let Some(pid) = crate::daemon::running_pid(config)? {
        anyhow::bail!("Daemon already running (pid {})", pid);
    }

    let target = util::watch_target(config)?;
    let state_dir = util::state_dir(config)?;
    std::fs::create_dir_all(&state_dir).context("Failed to create state directory")?;
    let log_file = state_dir.join(format!("{}.out", target.prefix()));

    let exe = std::env::current_exe().context("Failed to get current executable path")?;

    // Same global flags, now in the foreground
    let mut args: Vec<_> = std::env::args_os().skip(1).collect();
    args.push("--foreground".into());

    let log_file_writer = std::fs::File::create(&log_file).context("Failed to create log file")?;

    Command::new("nohup")
        .arg(&exe)
        .args(&args)
        .stdout(log_file_writer.try_clone()?)
        .stderr(log_file_writer)
        .spawn()
        .context("Failed to spawn daemon process")?;

    // Wait a moment to verify it started
    tokio::time::sleep(Duration::from_millis(500)).await;

    if crate::daemon::is_running(config).await {
        println!("Daemon started successfully");
        println!("Output: {}", log_file.display());
        Ok(())
    } else {
        anyhow::bail!("Daemon failed to start (check {})", log_file.display());
    }
}
