//! CLI command execution helpers with automatic timing
//!
//! Wraps the `snapwatch` binary so tests can run it against a scratch
//! watch/snapshot pair and assert on the outcome.

#![allow(dead_code)]

use anyhow::{Context, Result};
use filetime::FileTime;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant, SystemTime};
use tempfile::TempDir;

/// Environment variables that would leak the host's configuration into a test
const SCRUBBED_ENV: &[&str] = &[
    "SNAPWATCH_WATCH_DIR",
    "SNAPWATCH_SNAPSHOT_DIR",
    "SNAPWATCH_BACKEND",
    "SNAPWATCH_MAX_SNAPSHOTS",
    "SNAPWATCH_RETENTION_MODE",
    "SNAPWATCH_RETENTION_DAYS",
    "SNAPWATCH_COOLDOWN_SECS",
    "SNAPWATCH_DEBOUNCE_SECS",
    "SNAPWATCH_LOG_FILE",
    "SNAPWATCH_LOG_LEVEL",
    "RUST_LOG",
];

/// A watch directory and snapshot root under one temp dir
pub struct TestProject {
    pub temp: TempDir,
    pub watch_dir: PathBuf,
    pub snapshot_dir: PathBuf,
    pub config_path: PathBuf,
}

impl TestProject {
    /// Project with a copy-backend config file
    pub fn new() -> Result<Self> {
        let temp = TempDir::new()?;
        let watch_dir = temp.path().join("docs");
        let snapshot_dir = temp.path().join("snapshots");
        std::fs::create_dir_all(&watch_dir)?;
        std::fs::write(watch_dir.join("notes.txt"), b"hello")?;

        let config_path = temp.path().join("snapwatch.toml");
        std::fs::write(
            &config_path,
            format!(
                "watch_dir = {:?}\nsnapshot_dir = {:?}\nbackend = \"copy\"\n",
                watch_dir.display().to_string(),
                snapshot_dir.display().to_string()
            ),
        )?;

        Ok(Self {
            temp,
            watch_dir,
            snapshot_dir,
            config_path,
        })
    }

    /// Command preloaded with `--config <project config>`
    pub fn command(&self, args: &[&str]) -> SnapwatchCommand {
        let mut cmd = SnapwatchCommand::new(self.temp.path());
        cmd.args(&["--config", &self.config_path.display().to_string()]);
        cmd.args(args);
        cmd
    }

    /// Create a fake snapshot directory with a backdated mtime
    pub fn seed_snapshot(&self, name: &str, age: Duration) -> Result<PathBuf> {
        let path = self.snapshot_dir.join(name);
        std::fs::create_dir_all(&path)?;
        std::fs::write(path.join("notes.txt"), b"hello")?;
        let mtime = SystemTime::now() - age;
        filetime::set_file_mtime(&path, FileTime::from_system_time(mtime))?;
        Ok(path)
    }

    /// Names under the snapshot root, sorted
    pub fn snapshot_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.snapshot_dir)? {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if !name.starts_with('.') {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}

/// CLI command builder with timing
pub struct SnapwatchCommand {
    working_dir: PathBuf,
    args: Vec<String>,
    env: HashMap<String, String>,
}

impl SnapwatchCommand {
    pub fn new(working_dir: impl AsRef<Path>) -> Self {
        Self {
            working_dir: working_dir.as_ref().to_path_buf(),
            args: Vec::new(),
            env: HashMap::new(),
        }
    }

    pub fn args(&mut self, args: &[&str]) -> &mut Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    pub fn env(&mut self, key: &str, value: &str) -> &mut Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }

    /// Execute command and return result with timing
    pub fn execute(&self) -> Result<CommandResult> {
        let start = Instant::now();

        let mut command = Command::new(env!("CARGO_BIN_EXE_snapwatch"));
        command.args(&self.args).current_dir(&self.working_dir);
        for key in SCRUBBED_ENV {
            command.env_remove(key);
        }
        command.envs(&self.env);

        let output = command.output().context("Failed to execute snapwatch")?;

        Ok(CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            duration: start.elapsed(),
        })
    }

    pub fn assert_success(&self) -> Result<CommandResult> {
        let result = self.execute()?;
        if !result.success() {
            anyhow::bail!(
                "Command failed (exit code: {}):\nArgs: {:?}\nStdout: {}\nStderr: {}",
                result.exit_code,
                self.args,
                result.stdout,
                result.stderr
            );
        }
        Ok(result)
    }

    pub fn assert_failure(&self) -> Result<CommandResult> {
        let result = self.execute()?;
        if result.success() {
            anyhow::bail!(
                "Command should have failed but succeeded:\nArgs: {:?}\nStdout: {}",
                self.args,
                result.stdout
            );
        }
        Ok(result)
    }
}

/// Command execution result with timing
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration: Duration,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn contains_stdout(&self, text: &str) -> bool {
        self.stdout.contains(text)
    }

    pub fn contains_stderr(&self, text: &str) -> bool {
        self.stderr.contains(text)
    }
}
