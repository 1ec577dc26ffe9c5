//! Snapshot lifecycle management
//!
//! This crate provides:
//! - Count and time based retention policies
//! - A cooldown gate shared across processes through a locked state file
//! - The lifecycle manager (capacity gate, creation, cleanup)
//! - A periodic cleanup scheduler

pub mod cooldown;
pub mod manager;
pub mod retention;
pub mod scheduler;

// Re-exports
pub use cooldown::CooldownGate;
pub use manager::{LifecycleManager, ManagerConfig, SnapshotInfo, SnapshotRecord, MIN_FREE_BYTES};
pub use retention::{RetentionMode, RetentionPolicy, RetentionSettings};
pub use scheduler::CleanupScheduler;
