//! List snapshots, oldest first

use crate::config::Config;
use crate::util;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;

pub async fn run(config: &Config, json: bool) -> Result<()> {
    let manager = util::build_manager(config)?;
    let records = manager.list_snapshots()?;

    if json {
        let out = serde_json::to_string_pretty(&records).context("Failed to serialize snapshot list")?;
        println!("{}", out);
        return Ok(());
    }

    if records.is_empty() {
        println!("{}", "No snapshots".dimmed());
        return Ok(());
    }

    for record in &records {
        println!(
            "{}  {}  {}",
            record.name.yellow(),
            util::format_absolute_time(record.created).dimmed(),
            util::format_size(record.size)
        );
    }
    println!();
    println!("{} snapshots", records.len());

    Ok(())
}
