//! Disk, snapshot and daemon statistics

use crate::config::Config;
use crate::{daemon, util};
use anyhow::{Context, Result};
use lifecycle::SnapshotInfo;
use owo_colors::OwoColorize;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct Stats {
    disk: DiskStats,
    snapshots: SnapshotInfo,
    daemon: DaemonStats,
}

#[derive(Debug, Serialize)]
struct DiskStats {
    total: u64,
    used: u64,
    free: u64,
    percent: f64,
}

#[derive(Debug, Serialize)]
struct DaemonStats {
    running: bool,
    pid: Option<u32>,
    uptime_secs: Option<u64>,
}

pub async fn run(config: &Config, json: bool) -> Result<()> {
    let manager = util::build_manager(config)?;
    let usage = manager
        .store()
        .disk_usage()
        .with_context(|| format!("Failed to read disk usage of {}", manager.store().root().display()))?;
    let holder = daemon::holder(config)?;

    let stats = Stats {
        disk: DiskStats {
            total: usage.total,
            used: usage.used,
            free: usage.free,
            percent: usage.percent_used(),
        },
        snapshots: manager.info()?,
        daemon: DaemonStats {
            running: holder.is_some(),
            pid: holder.as_ref().map(|h| h.pid),
            uptime_secs: holder.as_ref().map(|h| h.uptime().as_secs()),
        },
    };

    if json {
        let out = serde_json::to_string_pretty(&stats).context("Failed to serialize stats")?;
        println!("{}", out);
        return Ok(());
    }

    println!("{}", "Snapwatch Stats".bold());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();
    println!("Disk ({})", manager.store().root().display());
    println!("  Total:       {}", util::format_size(stats.disk.total));
    println!(
        "  Used:        {} ({:.1}%)",
        util::format_size(stats.disk.used),
        stats.disk.percent
    );
    println!("  Free:        {}", util::format_size(stats.disk.free));
    println!();
    println!("Snapshots:     {}", stats.snapshots.count);
    println!("  Total size:  {}", util::format_size(stats.snapshots.total_size));
    println!();
    match (stats.daemon.pid, stats.daemon.uptime_secs) {
        (Some(pid), Some(uptime)) => println!(
            "Daemon:        {} (pid {}, up {})",
            "running".green(),
            pid,
            format_uptime(uptime)
        ),
        _ => println!("Daemon:        {}", "not running".yellow()),
    }

    Ok(())
}

fn format_uptime(secs: u64) -> String {
    let (days, hours, minutes) = (secs / 86400, secs % 86400 / 3600, secs % 3600 / 60);
    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m {}s", minutes, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(42), "0m 42s");
        assert_eq!(format_uptime(3 * 3600 + 5 * 60), "3h 5m");
        assert_eq!(format_uptime(2 * 86400 + 7 * 3600), "2d 7h");
    }
}
