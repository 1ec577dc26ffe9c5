//! Tracing subscriber setup

use anyhow::{Context, Result};
use std::path::Path;
use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter directive from `--log-level`, `RUST_LOG` and the configured level
///
/// The first one present wins. `notify` is capped at `warn` unless
/// `RUST_LOG` says otherwise.
pub fn filter_directive(cli: Option<&str>, rust_log: Option<&str>, configured: &str) -> String {
    match (cli, rust_log) {
        (Some(level), _) => format!("{},notify=warn", level),
        (None, Some(env)) if !env.trim().is_empty() => env.to_string(),
        _ => format!("{},notify=warn", configured),
    }
}

/// Install the global subscriber
///
/// Console output goes to stderr so `--json` output on stdout stays clean.
/// With `log_file` set a second, ANSI-free layer appends to that file; the
/// returned guard must be held until exit so buffered lines are flushed.
pub fn init(cli_level: Option<&str>, configured: &str, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let directive = filter_directive(cli_level, rust_log.as_deref(), configured);
    let filter = EnvFilter::try_new(&directive)
        .with_context(|| format!("Invalid log level: {}", directive))?;

    let console = fmt::layer().with_writer(std::io::stderr);

    let mut file_error = None;
    let (file_layer, guard) = match log_file.map(open_appender).transpose() {
        Ok(Some(appender)) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        Ok(None) => (None, None),
        Err(e) => {
            file_error = Some(e);
            (None, None)
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .context("Failed to install log subscriber")?;

    if let (Some(path), Some(e)) = (log_file, file_error) {
        warn!("Could not open log file {}, logging to console only: {:#}", path.display(), e);
    }

    Ok(guard)
}

fn open_appender(path: &Path) -> Result<RollingFileAppender> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .with_context(|| format!("Log file has no file name: {}", path.display()))?;

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy())
        .build(dir)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}
