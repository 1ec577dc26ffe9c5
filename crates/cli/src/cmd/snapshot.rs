//! Create a snapshot now

use crate::config::Config;
use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;

pub async fn run(config: &Config, reason: &str) -> Result<()> {
    let manager = util::build_manager(config)?;

    match manager.attempt_snapshot(reason) {
        Ok(snapshot) => {
            println!("{} Snapshot created: {}", "✓".green(), snapshot.name.cyan());
            let deleted = manager.cleanup()?;
            if !deleted.is_empty() {
                println!("Removed {} old snapshots", deleted.len());
            }
            Ok(())
        }
        Err(e) => anyhow::bail!("Snapshot failed: {}", e),
    }
}
