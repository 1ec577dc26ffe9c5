//! Delete one snapshot by name

use crate::config::Config;
use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;

pub async fn run(config: &Config, name: &str) -> Result<()> {
    let manager = util::build_manager(config)?;

    if manager.delete_snapshot(name)? {
        println!("{} Deleted snapshot: {}", "✓".green(), name);
        Ok(())
    } else {
        anyhow::bail!("Snapshot not found: {}", name)
    }
}
