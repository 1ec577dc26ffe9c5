//! Apply the retention policy now

use crate::config::Config;
use crate::util;
use anyhow::Result;
use owo_colors::OwoColorize;

pub async fn run(config: &Config) -> Result<()> {
    let manager = util::build_manager(config)?;
    let deleted = manager.cleanup()?;

    if deleted.is_empty() {
        println!("{}", "Nothing to clean up".dimmed());
    } else {
        for name in &deleted {
            println!("Deleted: {}", name.yellow());
        }
        println!();
        println!("{} Deleted {} snapshots ({})", "✓".green(), deleted.len(), manager.config().policy);
    }

    Ok(())
}
