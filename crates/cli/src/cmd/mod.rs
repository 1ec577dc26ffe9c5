//! CLI command implementations

pub mod cleanup;
pub mod config;
pub mod delete;
pub mod files;
pub mod info;
pub mod list;
pub mod logs;
pub mod snapshot;
pub mod start;
pub mod stats;
pub mod status;
pub mod stop;
