//! File system watching for snapwatch
//!
//! This crate provides:
//! - Built-in and configurable ignore rules
//! - A debounced change aggregator that coalesces event storms
//! - The watch loop wiring notify to the aggregator

pub mod debounce;
pub mod ignore;
pub mod watch;

pub use debounce::{ChangeAggregator, ChangeHandler, ChangeSummary};
pub use crate::ignore::{IgnoreConfig, IgnoreRules};
pub use watch::{WatchConfig, WatchLoop};

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Errors raised while setting up a watch
#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("failed to create watcher: {0}")]
    Notify(#[from] notify::Error),

    #[error("failed to watch path {path}: {source}")]
    WatchPath {
        path: PathBuf,
        source: notify::Error,
    },

    #[error("invalid exclude pattern: {0}")]
    Pattern(#[from] ::ignore::Error),

    #[error("failed to spawn debounce thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// One raw file system notification
#[derive(Debug, Clone)]
pub struct RawChangeEvent {
    pub kind: ChangeKind,
    pub path: PathBuf,
    /// Directory-level events never trigger a snapshot
    pub is_dir: bool,
    pub at: Instant,
}

impl RawChangeEvent {
    pub fn new(kind: ChangeKind, path: impl AsRef<Path>) -> Self {
        Self {
            kind,
            path: path.as_ref().to_path_buf(),
            is_dir: false,
            at: Instant::now(),
        }
    }

    pub fn directory(kind: ChangeKind, path: impl AsRef<Path>) -> Self {
        Self {
            is_dir: true,
            ..Self::new(kind, path)
        }
    }
}

/// Type of file system change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
    Moved,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Created => "created",
            ChangeKind::Modified => "modified",
            ChangeKind::Deleted => "deleted",
            ChangeKind::Moved => "moved",
        }
    }

    /// Map a notify event kind; access events are not changes
    pub fn from_notify(kind: &notify::EventKind) -> Option<Self> {
        use notify::event::ModifyKind;
        use notify::EventKind;

        match kind {
            EventKind::Create(_) => Some(ChangeKind::Created),
            EventKind::Modify(ModifyKind::Name(_)) => Some(ChangeKind::Moved),
            EventKind::Modify(_) => Some(ChangeKind::Modified),
            EventKind::Remove(_) => Some(ChangeKind::Deleted),
            EventKind::Any => Some(ChangeKind::Modified),
            EventKind::Access(_) | EventKind::Other => None,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
