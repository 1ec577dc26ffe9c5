//! Ignore pattern management for snapwatch
//!
//! Two sources of ignore patterns:
//! 1. Built-in noise patterns (editor swap files, VCS metadata, bytecode - always active)
//! 2. Config-based exclude patterns (gitignore syntax, rooted at the watch directory)
//!
//! Paths under an excluded root (typically the snapshot directory) are
//! always ignored as well.

use ::ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::{Path, PathBuf};

/// Built-in patterns, checked in this order
///
/// `*.ext` matches a file name suffix, `xyz*` a file name prefix, and
/// anything else is a substring of the full path.
pub const BUILTIN_PATTERNS: &[&str] = &[
    "*.tmp",
    "*.swp",
    "*.swx",
    "*.lock",
    ".~lock.*",
    "~$*",
    ".git",
    "__pycache__",
    "*.pyc",
    ".DS_Store",
    "Thumbs.db",
];

/// Ignore rule manager
pub struct IgnoreRules {
    /// Watch root the exclude patterns are relative to
    root: Option<PathBuf>,

    /// Compiled exclude patterns (optional)
    excludes: Option<Gitignore>,

    /// Configuration
    config: IgnoreConfig,
}

impl IgnoreRules {
    /// Built-in patterns only
    pub fn builtin() -> Self {
        Self {
            root: None,
            excludes: None,
            config: IgnoreConfig::default(),
        }
    }

    /// Load rules for a watch root
    ///
    /// Excluded roots that do not lie inside `root` are dropped: a snapshot
    /// root above the watch directory must not swallow every event.
    pub fn load(root: &Path, mut config: IgnoreConfig) -> Result<Self, ::ignore::Error> {
        config
            .excluded_roots
            .retain(|excluded| excluded.starts_with(root) && excluded != root);

        let excludes = if config.exclude_patterns.is_empty() {
            None
        } else {
            let mut builder = GitignoreBuilder::new(root);
            for pattern in &config.exclude_patterns {
                builder.add_line(None, pattern)?;
            }
            Some(builder.build()?)
        };

        Ok(Self {
            root: Some(root.to_path_buf()),
            excludes,
            config,
        })
    }

    /// Check if an event for `path` should be discarded
    pub fn should_ignore(&self, path: &Path) -> bool {
        // 1. Built-in patterns
        if matches_builtin(path) {
            return true;
        }

        // 2. Excluded roots
        if self
            .config
            .excluded_roots
            .iter()
            .any(|excluded| path.starts_with(excluded))
        {
            return true;
        }

        // 3. Configured exclude patterns
        if let (Some(excludes), Some(root)) = (&self.excludes, &self.root) {
            if path.starts_with(root) || path.is_relative() {
                return excludes
                    .matched_path_or_any_parents(path, false)
                    .is_ignore();
            }
        }

        false
    }

    /// Get number of active ignore sources
    pub fn active_sources(&self) -> usize {
        let mut count = 1; // Built-in always active
        if self.excludes.is_some() {
            count += 1;
        }
        if !self.config.excluded_roots.is_empty() {
            count += 1;
        }
        count
    }
}

/// Check a path against the built-in patterns
///
/// Case-sensitive; any match short-circuits.
pub fn matches_builtin(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let full = path.to_string_lossy();

    BUILTIN_PATTERNS
        .iter()
        .any(|pattern| pattern_matches(pattern, name, &full))
}

fn pattern_matches(pattern: &str, name: &str, full: &str) -> bool {
    if let Some(suffix) = pattern.strip_prefix('*').filter(|s| s.starts_with('.')) {
        name.ends_with(suffix)
    } else if let Some(prefix) = pattern.strip_suffix('*') {
        name.starts_with(prefix)
    } else {
        full.contains(pattern)
    }
}

/// Ignore configuration
#[derive(Debug, Clone, Default)]
pub struct IgnoreConfig {
    /// Additional gitignore-style patterns
    pub exclude_patterns: Vec<String>,

    /// Directories whose contents never count as changes
    pub excluded_roots: Vec<PathBuf>,
}
