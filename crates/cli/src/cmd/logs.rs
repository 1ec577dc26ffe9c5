//! Tail of the daemon log file

use crate::config::Config;
use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

pub async fn run(config: &Config, lines: usize) -> Result<()> {
    let path = config
        .log_file
        .as_deref()
        .context("No log file configured (set log_file or SNAPWATCH_LOG_FILE)")?;

    for line in tail(path, lines)? {
        println!("{}", line);
    }
    Ok(())
}

/// Last `count` lines of the file at `path`
pub fn tail(path: &Path, count: usize) -> Result<Vec<String>> {
    let file = File::open(path).with_context(|| format!("Failed to open log file {}", path.display()))?;

    let mut window = VecDeque::with_capacity(count);
    for line in BufReader::new(file).lines() {
        let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
        if count == 0 {
            continue;
        }
        if window.len() == count {
            window.pop_front();
        }
        window.push_back(line);
    }

    Ok(window.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_tail_keeps_last_lines() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("snapwatch.log");
        std::fs::write(&path, "one\ntwo\nthree\nfour\n").unwrap();

        assert_eq!(tail(&path, 2).unwrap(), vec!["three", "four"]);
        assert_eq!(tail(&path, 10).unwrap().len(), 4);
        assert!(tail(&path, 0).unwrap().is_empty());
    }

    #[test]
    fn test_tail_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        assert!(tail(&temp_dir.path().join("missing.log"), 5).is_err());
    }
}
