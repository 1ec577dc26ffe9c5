//! Retention policies

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime};
use sw_core::{ConfigError, Snapshot};

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Which retention rule applies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum RetentionMode {
    /// Keep the newest `max_snapshots`
    #[default]
    Count,
    /// Keep snapshots younger than `retention_days`
    Time,
}

impl RetentionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetentionMode::Count => "count",
            RetentionMode::Time => "time",
        }
    }
}

impl fmt::Display for RetentionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RetentionMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "count" => Ok(RetentionMode::Count),
            "time" => Ok(RetentionMode::Time),
            other => Err(ConfigError::UnknownRetentionMode(other.to_string())),
        }
    }
}

impl TryFrom<String> for RetentionMode {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Retention section of the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionSettings {
    pub mode: RetentionMode,
    pub max_snapshots: usize,
    pub retention_days: u64,
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            mode: RetentionMode::Count,
            max_snapshots: 50,
            retention_days: 7,
        }
    }
}

impl RetentionSettings {
    /// Validate and build the active policy
    ///
    /// Only the field the selected mode uses is checked.
    pub fn policy(&self) -> Result<RetentionPolicy, ConfigError> {
        match self.mode {
            RetentionMode::Count => {
                if self.max_snapshots < 1 {
                    return Err(ConfigError::MaxSnapshotsTooSmall);
                }
                Ok(RetentionPolicy::count(self.max_snapshots))
            }
            RetentionMode::Time => {
                if self.retention_days < 1 {
                    return Err(ConfigError::RetentionDaysTooSmall);
                }
                Ok(RetentionPolicy::days(self.retention_days))
            }
        }
    }
}

/// Decides which snapshots cleanup removes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    Count { max_snapshots: usize },
    Time { retention: Duration },
}

impl RetentionPolicy {
    pub fn count(max_snapshots: usize) -> Self {
        RetentionPolicy::Count { max_snapshots }
    }

    pub fn days(days: u64) -> Self {
        RetentionPolicy::Time {
            retention: Duration::from_secs(days.saturating_mul(SECS_PER_DAY)),
        }
    }

    /// Snapshots to delete, oldest first
    ///
    /// `snapshots` must already be sorted oldest first.
    pub fn select_victims<'a>(&self, snapshots: &'a [Snapshot], now: SystemTime) -> Vec<&'a Snapshot> {
        match *self {
            RetentionPolicy::Count { max_snapshots } => {
                let excess = snapshots.len().saturating_sub(max_snapshots);
                snapshots[..excess].iter().collect()
            }
            RetentionPolicy::Time { retention } => {
                // A cutoff before the epoch means nothing is old enough
                let cutoff = match now.checked_sub(retention) {
                    Some(cutoff) => cutoff,
                    None => return Vec::new(),
                };
                snapshots.iter().filter(|s| s.created < cutoff).collect()
            }
        }
    }
}

impl fmt::Display for RetentionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetentionPolicy::Count { max_snapshots } => write!(f, "count (keep {})", max_snapshots),
            RetentionPolicy::Time { retention } => {
                write!(f, "time (keep {} days)", retention.as_secs() / SECS_PER_DAY)
            }
        }
    }
}
