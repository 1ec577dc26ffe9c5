//! Stop the snapwatch daemon

use crate::config::Config;
use anyhow::Result;
use owo_colors::OwoColorize;

pub async fn run(config: &Config) -> Result<()> {
    if crate::daemon::stop(config).await? {
        println!("{}", "Daemon stopped".green());
    } else {
        println!("{}", "Daemon is not running".yellow());
    }
    Ok(())
}
