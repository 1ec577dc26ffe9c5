//! Debounced change aggregation
//!
//! Turns a storm of raw events into one summary per quiet period. Every
//! accepted event pushes the deadline out by the full debounce window, so
//! a continuous stream never flushes until it pauses.

use crate::ignore::IgnoreRules;
use crate::{ChangeKind, RawChangeEvent, WatcherError};
use parking_lot::{Condvar, Mutex};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Receiver of one summary per debounce window
pub trait ChangeHandler: Send + Sync + 'static {
    fn on_change(&self, summary: &ChangeSummary) -> anyhow::Result<()>;
}

impl<F> ChangeHandler for F
where
    F: Fn(&ChangeSummary) -> anyhow::Result<()> + Send + Sync + 'static,
{
    fn on_change(&self, summary: &ChangeSummary) -> anyhow::Result<()> {
        self(summary)
    }
}

/// What happened during one debounce window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSummary {
    /// `Modified` if any event was a modification, else the first kind seen
    pub kind: ChangeKind,
    /// File names when at most 3 files changed, else "N files"
    pub description: String,
    pub event_count: usize,
    pub unique_files: usize,
}

impl ChangeSummary {
    pub fn from_events(events: &[RawChangeEvent]) -> Option<Self> {
        let first = events.first()?;

        let kind = if events.iter().any(|e| e.kind == ChangeKind::Modified) {
            ChangeKind::Modified
        } else {
            first.kind
        };

        // Files are counted by name, so `a/x.txt` and `b/x.txt` are one file
        let mut names: Vec<String> = Vec::new();
        for event in events {
            let name = display_name(&event.path);
            if !names.contains(&name) {
                names.push(name);
            }
        }
        let unique_files = names.len();

        let description = if unique_files <= 3 {
            names.join(", ")
        } else {
            format!("{} files", unique_files)
        };

        Some(Self {
            kind,
            description,
            event_count: events.len(),
            unique_files,
        })
    }

    /// Human-readable trigger, e.g. `modified: notes.txt`
    pub fn reason(&self) -> String {
        format!("{}: {}", self.kind, self.description)
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Events accumulated since the last flush
#[derive(Default)]
struct PendingChangeSet {
    events: Vec<RawChangeEvent>,
    /// Armed while `events` is non-empty
    deadline: Option<Instant>,
    shutdown: bool,
}

struct Shared {
    pending: Mutex<PendingChangeSet>,
    wakeup: Condvar,
    debounce: Duration,
    rules: IgnoreRules,
    handler: Arc<dyn ChangeHandler>,
}

impl Shared {
    /// Summarize and notify; runs without the pending lock held
    fn dispatch(&self, events: Vec<RawChangeEvent>) -> Option<ChangeSummary> {
        let summary = ChangeSummary::from_events(&events)?;
        info!("Processing {} debounced events", summary.event_count);

        let handler = &self.handler;
        match panic::catch_unwind(AssertUnwindSafe(|| handler.on_change(&summary))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Error in change handler: {:#}", e),
            Err(_) => error!("Change handler panicked"),
        }

        Some(summary)
    }
}

/// Debounced change aggregator
///
/// Owns a timer thread that sleeps until the current deadline and then
/// flushes the pending set. Stopping disarms the timer and discards
/// anything still pending.
pub struct ChangeAggregator {
    shared: Arc<Shared>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl ChangeAggregator {
    /// Start the aggregator with its timer thread
    pub fn start(
        debounce: Duration,
        rules: IgnoreRules,
        handler: Arc<dyn ChangeHandler>,
    ) -> Result<Self, WatcherError> {
        let shared = Arc::new(Shared {
            pending: Mutex::new(PendingChangeSet::default()),
            wakeup: Condvar::new(),
            debounce,
            rules,
            handler,
        });

        let timer_shared = Arc::clone(&shared);
        let timer = thread::Builder::new()
            .name("snapwatch-debounce".into())
            .spawn(move || run_timer(timer_shared))?;

        Ok(Self {
            shared,
            timer: Mutex::new(Some(timer)),
        })
    }

    /// Offer a raw event; returns whether it was accepted
    pub fn observe(&self, event: RawChangeEvent) -> bool {
        if event.is_dir {
            return false;
        }
        if self.shared.rules.should_ignore(&event.path) {
            debug!("Ignoring event for: {}", event.path.display());
            return false;
        }

        let mut pending = self.shared.pending.lock();
        if pending.shutdown {
            return false;
        }

        debug!("Event queued - Type: {}, Path: {}", event.kind, event.path.display());
        pending.events.push(event);
        pending.deadline = Some(Instant::now() + self.shared.debounce);
        drop(pending);

        self.shared.wakeup.notify_one();
        true
    }

    /// Flush immediately instead of waiting for the deadline
    pub fn flush(&self) -> Option<ChangeSummary> {
        let events = {
            let mut pending = self.shared.pending.lock();
            pending.deadline = None;
            std::mem::take(&mut pending.events)
        };
        self.shared.dispatch(events)
    }

    /// Number of events waiting for the next flush
    pub fn pending(&self) -> usize {
        self.shared.pending.lock().events.len()
    }

    /// Disarm the timer and wait for an in-flight handler call
    ///
    /// Safe to call more than once.
    pub fn stop(&self) {
        {
            let mut pending = self.shared.pending.lock();
            if !pending.events.is_empty() {
                debug!("Discarding {} pending events on shutdown", pending.events.len());
            }
            pending.shutdown = true;
            pending.events.clear();
            pending.deadline = None;
        }
        self.shared.wakeup.notify_all();

        let handle = self.timer.lock().take();
        if let Some(handle) = handle {
            // A handler stopping its own aggregator must not join itself
            if handle.thread().id() != thread::current().id() {
                if handle.join().is_err() {
                    error!("Debounce thread panicked");
                }
            }
        }
    }
}

impl Drop for ChangeAggregator {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_timer(shared: Arc<Shared>) {
    loop {
        let events = {
            let mut pending = shared.pending.lock();
            loop {
                if pending.shutdown {
                    return;
                }
                match pending.deadline {
                    None => shared.wakeup.wait(&mut pending),
                    Some(deadline) if Instant::now() >= deadline => break,
                    Some(deadline) => {
                        shared.wakeup.wait_until(&mut pending, deadline);
                    }
                }
            }
            pending.deadline = None;
            std::mem::take(&mut pending.events)
        };

        shared.dispatch(events);
    }
}
