//! Configuration file, environment overrides and validation

use anyhow::{Context, Result};
use lifecycle::{RetentionMode, RetentionPolicy, RetentionSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use sw_core::{BackendKind, ConfigError};
use tracing::warn;

const CONFIG_FILE_NAME: &str = "snapwatch.toml";

/// Daemon and CLI configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub watch_dir: PathBuf,
    pub snapshot_dir: PathBuf,
    pub backend: BackendKind,
    pub cooldown_secs: u64,
    pub debounce_secs: u64,
    /// 0 disables the periodic cleanup scheduler
    pub cleanup_interval_secs: u64,
    /// Gitignore-style, rooted at `watch_dir`
    pub exclude_patterns: Vec<String>,
    pub log_level: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
    pub retention: RetentionSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            watch_dir: PathBuf::from("/data/mydir"),
            snapshot_dir: PathBuf::from("/data/snapshots"),
            backend: BackendKind::Btrfs,
            cooldown_secs: 60,
            debounce_secs: 5,
            cleanup_interval_secs: 0,
            exclude_patterns: Vec::new(),
            log_level: "info".to_string(),
            log_file: None,
            retention: RetentionSettings::default(),
        }
    }
}

/// Config file search order, first existing file wins
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("snapwatch").join("config.toml"));
    }
    paths.push(PathBuf::from("/etc/snapwatch/config.toml"));
    paths
}

/// Where `config set` and `config init` write when no file exists yet
pub fn default_write_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("snapwatch").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

/// Find the config file to read
///
/// An explicit path must exist; otherwise the search paths are tried and
/// `None` means "use defaults".
pub fn locate(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.is_file() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        return Ok(Some(path.to_path_buf()));
    }
    Ok(search_paths().into_iter().find(|p| p.is_file()))
}

impl Config {
    /// Load from the located file, or defaults
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        match locate(explicit)? {
            Some(path) => Ok((Self::from_file(&path)?, Some(path))),
            None => Ok((Self::default(), None)),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, self.to_toml()?)
            .with_context(|| format!("Failed to write config file {}", path.display()))
    }

    /// Apply `SNAPWATCH_*` overrides from the process environment
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply `SNAPWATCH_*` overrides from `lookup`
    ///
    /// Unparseable numbers are warned about and ignored; an unknown backend
    /// or retention mode is an error.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SNAPWATCH_WATCH_DIR") {
            self.watch_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("SNAPWATCH_SNAPSHOT_DIR") {
            self.snapshot_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("SNAPWATCH_BACKEND") {
            self.backend = v.parse()?;
        }
        if let Some(v) = lookup("SNAPWATCH_RETENTION_MODE") {
            self.retention.mode = v.parse()?;
        }
        if let Some(n) = parse_env(&lookup, "SNAPWATCH_MAX_SNAPSHOTS") {
            self.retention.max_snapshots = n;
        }
        if let Some(n) = parse_env(&lookup, "SNAPWATCH_RETENTION_DAYS") {
            self.retention.retention_days = n;
        }
        if let Some(n) = parse_env(&lookup, "SNAPWATCH_COOLDOWN_SECS") {
            self.cooldown_secs = n;
        }
        if let Some(n) = parse_env(&lookup, "SNAPWATCH_DEBOUNCE_SECS") {
            self.debounce_secs = n;
        }
        if let Some(v) = lookup("SNAPWATCH_LOG_FILE") {
            self.log_file = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("SNAPWATCH_LOG_LEVEL") {
            self.log_level = v;
        }
        Ok(())
    }

    /// Check startup invariants and build the retention policy
    pub fn validate(&self) -> Result<RetentionPolicy, ConfigError> {
        if self.watch_dir.as_os_str().is_empty() {
            return Err(ConfigError::Missing("watch_dir"));
        }
        if self.snapshot_dir.as_os_str().is_empty() {
            return Err(ConfigError::Missing("snapshot_dir"));
        }
        self.retention.policy()
    }

    /// Read one value by dotted key
    pub fn get(&self, key: &str) -> Result<String> {
        let value = match key {
            "watch_dir" => self.watch_dir.display().to_string(),
            "snapshot_dir" => self.snapshot_dir.display().to_string(),
            "backend" => self.backend.to_string(),
            "cooldown_secs" => self.cooldown_secs.to_string(),
            "debounce_secs" => self.debounce_secs.to_string(),
            "cleanup_interval_secs" => self.cleanup_interval_secs.to_string(),
            "exclude_patterns" => self.exclude_patterns.join(","),
            "log_level" => self.log_level.clone(),
            "log_file" => self
                .log_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            "retention.mode" => self.retention.mode.to_string(),
            "retention.max_snapshots" => self.retention.max_snapshots.to_string(),
            "retention.retention_days" => self.retention.retention_days.to_string(),
            _ => anyhow::bail!(
                "Unknown config key: {}. Use 'snapwatch config show' to see available keys.",
                key
            ),
        };
        Ok(value)
    }

    /// Set one value by dotted key; the caller validates before saving
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "watch_dir" => self.watch_dir = PathBuf::from(value),
            "snapshot_dir" => self.snapshot_dir = PathBuf::from(value),
            "backend" => self.backend = value.parse()?,
            "cooldown_secs" => {
                self.cooldown_secs = value
                    .parse()
                    .context("Invalid value: must be a non-negative integer")?;
            }
            "debounce_secs" => {
                self.debounce_secs = value
                    .parse()
                    .context("Invalid value: must be a non-negative integer")?;
            }
            "cleanup_interval_secs" => {
                self.cleanup_interval_secs = value
                    .parse()
                    .context("Invalid value: must be a non-negative integer")?;
            }
            "exclude_patterns" => {
                self.exclude_patterns = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect();
            }
            "log_level" => self.log_level = value.to_string(),
            "log_file" => {
                self.log_file = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
            "retention.mode" => self.retention.mode = value.parse::<RetentionMode>()?,
            "retention.max_snapshots" => {
                self.retention.max_snapshots = value
                    .parse()
                    .context("Invalid value: must be a positive integer")?;
            }
            "retention.retention_days" => {
                self.retention.retention_days = value
                    .parse()
                    .context("Invalid value: must be a positive integer")?;
            }
            _ => anyhow::bail!(
                "Unknown config key: {}. Use 'snapwatch config show' to see available keys.",
                key
            ),
        }
        Ok(())
    }
}

fn parse_env<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {}={:?}: not a valid number", key, raw);
            None
        }
    }
}

/// Annotated example written by `config init`
pub fn example_config() -> &'static str {
    r#"# snapwatch configuration

# Directory to watch; snapshots are named after its basename
watch_dir = "/data/mydir"

# Where snapshots are created (on the same btrfs filesystem for "btrfs")
snapshot_dir = "/data/snapshots"

# "btrfs" (subvolume snapshots, requires root) or "copy"
backend = "btrfs"

# Minimum seconds between two snapshots
cooldown_secs = 60

# Quiet period before a burst of changes triggers a snapshot
debounce_secs = 5

# Run retention every N seconds even without changes (0 = off)
cleanup_interval_secs = 0

# Extra gitignore-style patterns, relative to watch_dir
exclude_patterns = []

log_level = "info"
# log_file = "/var/log/snapwatch.log"

[retention]
# "count" keeps the newest max_snapshots, "time" keeps retention_days
mode = "count"
max_snapshots = 50
retention_days = 7
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_example_config_matches_defaults() {
        let parsed = Config::from_toml(example_config()).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = Config::from_toml(
            r#"
            watch_dir = "/srv/docs"
            backend = "copy"

            [retention]
            mode = "time"
            "#,
        )
        .unwrap();

        assert_eq!(config.watch_dir, PathBuf::from("/srv/docs"));
        assert_eq!(config.backend, BackendKind::Copy);
        assert_eq!(config.retention.mode, RetentionMode::Time);
        assert_eq!(config.retention.retention_days, 7);
        assert_eq!(config.cooldown_secs, 60);
    }

    #[test]
    fn test_unknown_mode_in_file_is_rejected() {
        let err = Config::from_toml("[retention]\nmode = \"size\"\n").unwrap_err();
        assert!(err.to_string().contains("invalid retention mode 'size'"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env_from(env(&[
                ("SNAPWATCH_WATCH_DIR", "/srv/a"),
                ("SNAPWATCH_BACKEND", "copy"),
                ("SNAPWATCH_MAX_SNAPSHOTS", "12"),
                ("SNAPWATCH_RETENTION_MODE", "time"),
                ("SNAPWATCH_RETENTION_DAYS", "3"),
                ("SNAPWATCH_COOLDOWN_SECS", "not-a-number"),
            ]))
            .unwrap();

        assert_eq!(config.watch_dir, PathBuf::from("/srv/a"));
        assert_eq!(config.backend, BackendKind::Copy);
        assert_eq!(config.retention.max_snapshots, 12);
        assert_eq!(config.retention.mode, RetentionMode::Time);
        assert_eq!(config.retention.retention_days, 3);
        // Bad numbers are ignored
        assert_eq!(config.cooldown_secs, 60);
    }

    #[test]
    fn test_env_invalid_mode_is_an_error() {
        let mut config = Config::default();
        let err = config
            .apply_env_from(env(&[("SNAPWATCH_RETENTION_MODE", "forever")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::UnknownRetentionMode("forever".into()));
    }

    #[test]
    fn test_validate() {
        assert_eq!(Config::default().validate(), Ok(RetentionPolicy::count(50)));

        let mut config = Config::default();
        config.retention.max_snapshots = 0;
        assert_eq!(config.validate(), Err(ConfigError::MaxSnapshotsTooSmall));

        let mut config = Config::default();
        config.watch_dir = PathBuf::new();
        assert_eq!(config.validate(), Err(ConfigError::Missing("watch_dir")));
    }

    #[test]
    fn test_get_set_round_trip() {
        let mut config = Config::default();
        config.set("retention.max_snapshots", "9").unwrap();
        config.set("exclude_patterns", "*.log, build/").unwrap();
        config.set("log_file", "/tmp/sw.log").unwrap();

        assert_eq!(config.get("retention.max_snapshots").unwrap(), "9");
        assert_eq!(config.exclude_patterns, vec!["*.log", "build/"]);
        assert_eq!(config.get("log_file").unwrap(), "/tmp/sw.log");

        assert!(config.set("retention.mode", "weekly").is_err());
        assert!(config.set("cooldown_secs", "-1").is_err());
        assert!(config.get("no.such.key").is_err());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/config.toml");

        let mut config = Config::default();
        config.backend = BackendKind::Copy;
        config.log_file = Some(PathBuf::from("/var/log/snapwatch.log"));
        config.save(&path).unwrap();

        let (loaded, source) = Config::load(Some(path.as_path())).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(source, Some(path));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.toml");
        assert!(Config::load(Some(missing.as_path())).is_err());
    }
}
