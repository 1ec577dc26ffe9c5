//! Aggregate snapshot information

use crate::config::Config;
use crate::util;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;

pub async fn run(config: &Config, json: bool) -> Result<()> {
    let manager = util::build_manager(config)?;
    let info = manager.info()?;

    if json {
        let out = serde_json::to_string_pretty(&info).context("Failed to serialize info")?;
        println!("{}", out);
        return Ok(());
    }

    println!("{}", "Snapshot Information".bold());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();
    println!("Target:       {}", manager.store().target().prefix().cyan());
    println!("Count:        {}", info.count);
    println!("Total size:   {}", util::format_size(info.total_size));
    println!("Oldest:       {}", info.oldest.as_deref().unwrap_or("-"));
    println!("Newest:       {}", info.newest.as_deref().unwrap_or("-"));
    if let Some(time) = info.last_snapshot_time {
        println!("Last created: {}", util::format_absolute_time(time));
    }

    Ok(())
}
