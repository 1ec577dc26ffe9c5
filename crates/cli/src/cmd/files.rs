//! Top-level contents of the watch directory

use crate::config::Config;
use crate::util;
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use owo_colors::OwoColorize;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// One direct child of the watch directory
#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub path: PathBuf,
    pub is_directory: bool,
    /// 0 for directories
    pub size: u64,
    pub modified: Option<DateTime<Local>>,
    /// Direct children of a directory entry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_count: Option<usize>,
}

#[derive(Debug, Serialize)]
struct Listing<'a> {
    watch_dir: &'a Path,
    count: usize,
    files: &'a [FileEntry],
}

pub async fn run(config: &Config, json: bool) -> Result<()> {
    let target = util::watch_target(config)?;
    let entries = list_entries(target.path())?;

    if json {
        let listing = Listing {
            watch_dir: target.path(),
            count: entries.len(),
            files: &entries,
        };
        let out = serde_json::to_string_pretty(&listing).context("Failed to serialize file list")?;
        println!("{}", out);
        return Ok(());
    }

    println!("{}", target.path().display().to_string().cyan());
    if entries.is_empty() {
        println!("{}", "Empty".dimmed());
        return Ok(());
    }

    for entry in &entries {
        let modified = entry
            .modified
            .map(util::format_absolute_time)
            .unwrap_or_else(|| "-".to_string());
        match entry.item_count {
            Some(count) => println!(
                "  {}/  {}  {} items",
                entry.name.blue(),
                modified.dimmed(),
                count
            ),
            None => println!(
                "  {}  {}  {}",
                entry.name,
                modified.dimmed(),
                util::format_size(entry.size)
            ),
        }
    }

    Ok(())
}

/// Direct children of `dir`, directories first, then by name
///
/// Entries that cannot be inspected are skipped.
pub fn list_entries(dir: &Path) -> Result<Vec<FileEntry>> {
    if !dir.is_dir() {
        anyhow::bail!("Watch directory does not exist: {}", dir.display());
    }

    let read = std::fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))?;
    let mut entries = Vec::new();

    for entry in read {
        let Ok(entry) = entry else { continue };
        let Ok(metadata) = entry.metadata() else { continue };
        let is_directory = metadata.is_dir();

        let item_count = is_directory.then(|| {
            std::fs::read_dir(entry.path())
                .map(|children| children.count())
                .unwrap_or(0)
        });

        entries.push(FileEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            path: entry.path(),
            is_directory,
            size: if is_directory { 0 } else { metadata.len() },
            modified: metadata.modified().ok().map(DateTime::<Local>::from),
            item_count,
        });
    }

    entries.sort_by(|a, b| {
        b.is_directory
            .cmp(&a.is_directory)
            .then_with(|| a.name.cmp(&b.name))
    });
    Ok(entries)
}
