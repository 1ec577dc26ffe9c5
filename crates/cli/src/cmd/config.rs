//! Configuration management command
//!
//! Provides CLI interface to view and edit the configuration file.

use crate::config::{self, Config};
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};

/// Print the effective configuration as TOML
pub async fn run_show(explicit: Option<&Path>) -> Result<()> {
    let (mut config, source) = Config::load(explicit)?;
    config.apply_env()?;

    match source {
        Some(path) => println!("{}", format!("# {}", path.display()).dimmed()),
        None => println!("{}", "# defaults (no config file found)".dimmed()),
    }
    print!("{}", config.to_toml()?);
    Ok(())
}

/// Print a single configuration value
pub async fn run_get(explicit: Option<&Path>, key: &str) -> Result<()> {
    let (mut config, _) = Config::load(explicit)?;
    config.apply_env()?;
    println!("{}", config.get(key)?);
    Ok(())
}

/// Set a configuration value and save the file
pub async fn run_set(explicit: Option<&Path>, key: &str, value: &str) -> Result<()> {
    let (mut config, source) = if explicit.is_some_and(|p| !p.exists()) {
        (Config::default(), None)
    } else {
        Config::load(explicit)?
    };

    config.set(key, value)?;
    config.validate().context("Invalid configuration value")?;

    let path = write_path(explicit, source);
    config.save(&path)?;

    println!("{} {} = {}", "✓".green(), key.cyan(), value);
    println!("{}", format!("Saved to {}", path.display()).dimmed());
    println!(
        "{}",
        "Note: Restart daemon for changes to take effect (snapwatch stop && snapwatch start)".yellow()
    );
    Ok(())
}

/// Write the annotated example configuration
pub async fn run_init(explicit: Option<&Path>, force: bool) -> Result<()> {
    let path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(config::default_write_path);

    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {} (use --force to overwrite)",
            path.display()
        );
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(&path, config::example_config())
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("{} Created config file at: {}", "✓".green(), path.display());
    Ok(())
}

/// Print where configuration is read from
pub async fn run_path(explicit: Option<&Path>) -> Result<()> {
    match config::locate(explicit)? {
        Some(path) => println!("{}", path.display()),
        None => {
            println!("{}", "No config file found. Searched:".yellow());
            for path in config::search_paths() {
                println!("  {}", path.display());
            }
        }
    }
    Ok(())
}

fn write_path(explicit: Option<&Path>, source: Option<PathBuf>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .or(source)
        .unwrap_or_else(config::default_write_path)
}
