//! Guard rails for automated repair.
//!
//! [`SafetyController`] decides whether a monitor may attempt an automated
//! repair of a component, bounds attempts per time window, cools a
//! component down once its budget is spent, escalates repeated failures to
//! a human channel and, under system-wide stress, refuses every repair
//! until safe mode clears. [`backup::BackupStore`] keeps durable snapshots
//! for manual recovery.

pub mod backup;
pub mod config;
pub mod controller;
pub mod error;
pub mod escalation;
pub mod retry;
pub mod safe_mode;


pub use config::SafetyConfig;
pub use controller::{SafetyController, SafetyStatus};
pub use retry::{RejectReason, RepairDecision};
