//! Watch loop: notify events into the debounced aggregator

use crate::debounce::{ChangeAggregator, ChangeHandler};
use crate::ignore::{IgnoreConfig, IgnoreRules};
use crate::{ChangeKind, RawChangeEvent, WatcherError};
use notify::event::{CreateKind, RemoveKind};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Watch loop configuration
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Quiet period before a batch is flushed
    pub debounce: Duration,
    pub ignore: IgnoreConfig,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(5),
            ignore: IgnoreConfig::default(),
        }
    }
}

/// Recursive watch on one directory
///
/// Events are delivered on notify's thread and handed to the aggregator,
/// which calls the handler from its own timer thread.
pub struct WatchLoop {
    root: PathBuf,
    watcher: Mutex<Option<RecommendedWatcher>>,
    aggregator: Arc<ChangeAggregator>,
}

impl WatchLoop {
    /// Start watching `root` recursively
    pub fn start(
        root: &Path,
        config: WatchConfig,
        handler: Arc<dyn ChangeHandler>,
    ) -> Result<Self, WatcherError> {
        let rules = IgnoreRules::load(root, config.ignore)?;
        info!(
            "Watching {} ({} ignore sources, {:?} debounce)",
            root.display(),
            rules.active_sources(),
            config.debounce
        );

        let aggregator = Arc::new(ChangeAggregator::start(config.debounce, rules, handler)?);

        let sink = Arc::clone(&aggregator);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for raw in raw_events(&event) {
                    sink.observe(raw);
                }
            }
            Err(e) => warn!("Watch error: {}", e),
        })?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|source| WatcherError::WatchPath {
                path: root.to_path_buf(),
                source,
            })?;

        Ok(Self {
            root: root.to_path_buf(),
            watcher: Mutex::new(Some(watcher)),
            aggregator,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_running(&self) -> bool {
        self.watcher.lock().is_some()
    }

    /// Stop delivering events, then disarm the aggregator
    ///
    /// Safe to call more than once.
    pub fn stop(&self) {
        if let Some(watcher) = self.watcher.lock().take() {
            drop(watcher);
            debug!("Stopped watching {}", self.root.display());
        }
        self.aggregator.stop();
    }
}

impl Drop for WatchLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Translate one notify event into raw change events, one per path
pub fn raw_events(event: &Event) -> Vec<RawChangeEvent> {
    let kind = match ChangeKind::from_notify(&event.kind) {
        Some(kind) => kind,
        None => return Vec::new(),
    };
    let folder_kind = matches!(
        event.kind,
        EventKind::Create(CreateKind::Folder) | EventKind::Remove(RemoveKind::Folder)
    );

    event
        .paths
        .iter()
        .map(|path| {
            if folder_kind || path.is_dir() {
                RawChangeEvent::directory(kind, path)
            } else {
                RawChangeEvent::new(kind, path)
            }
        })
        .collect()
}
