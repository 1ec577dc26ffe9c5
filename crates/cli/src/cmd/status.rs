//! Show daemon and snapshot status

use crate::config::Config;
use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;

pub async fn run(config: &Config) -> Result<()> {
    let manager = util::build_manager(config)?;
    let pid = crate::daemon::running_pid(config)?;
    let info = manager.info()?;

    println!("{}", "Snapwatch Status".bold());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();

    println!("Watching:      {}", manager.store().target().path().display().to_string().cyan());
    println!("Snapshots in:  {}", manager.store().root().display());
    println!("Backend:       {}", config.backend);
    println!("Retention:     {}", manager.config().policy);
    println!();

    print!("Daemon:        ");
    match pid {
        Some(pid) => {
            println!("{}", "Running ✓".green());
            println!("  PID:         {}", pid);
        }
        None => {
            println!("{}", "Not running".yellow());
            println!("  {}", "Tip: Start with 'snapwatch start'".dimmed());
        }
    }
    println!();

    println!("Snapshots:     {}", info.count);
    println!("Total size:    {}", util::format_size(info.total_size));
    match info.last_snapshot_time {
        Some(time) => println!(
            "Last:          {} ({})",
            util::format_relative_time(time),
            util::format_absolute_time(time).dimmed()
        ),
        None => println!("Last:          {}", "No snapshots yet".dimmed()),
    }

    Ok(())
}
