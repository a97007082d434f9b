//! Declarative alert rules evaluated once per collection cycle.
//!
//! A [`RuleEngine`](engine::RuleEngine) holds rules in registration order and
//! evaluates every enabled one against the latest
//! [`MetricsSnapshot`]. Rules that fire produce an [`Alert`](hearth_common::types::Alert)
//! unless the rule is inside its suppression window.

pub mod defaults;
pub mod engine;
pub mod error;
pub mod rules;
pub mod suppression;

#[cfg(test)]
mod tests;

use hearth_common::types::{MetricsSnapshot, Severity};

/// A named condition over a metrics snapshot.
///
/// Implementations are registered in the [`engine::RuleEngine`], which owns
/// enablement and suppression; a rule only decides whether it fires.
pub trait AlertRule: Send + Sync {
    /// Unique rule name (e.g. `"HighCPUUsage"`).
    fn name(&self) -> &str;

    fn severity(&self) -> Severity;

    /// Grouping used by channels and the alert history (e.g. `"system"`).
    fn category(&self) -> &str;

    /// Rule-specific suppression window, overriding the severity tier.
    fn silence_secs(&self) -> Option<u64> {
        None
    }

    /// Evaluates the snapshot. `Ok(Some(message))` means the rule fired.
    ///
    /// # Errors
    ///
    /// Returns an error when the rule cannot be evaluated; the engine logs it
    /// and treats the rule as not fired for this cycle.
    fn evaluate(&self, snapshot: &MetricsSnapshot) -> anyhow::Result<Option<String>>;
}
