use chrono::{DateTime, Duration, Utc};
use hearth_common::types::Severity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_SUPPRESSION_SECS: u64 = 300;

fn default_suppression_secs() -> u64 {
    DEFAULT_SUPPRESSION_SECS
}

/// How long a rule stays quiet after it fired.
///
/// Resolution order: the rule's own override, then the severity tier, then
/// `default_secs`. A window of 0 disables suppression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuppressionPolicy {
    #[serde(default = "default_suppression_secs")]
    pub default_secs: u64,
    #[serde(default)]
    pub per_severity: HashMap<Severity, u64>,
}

impl Default for SuppressionPolicy {
    fn default() -> Self {
        Self {
            default_secs: DEFAULT_SUPPRESSION_SECS,
            per_severity: HashMap::new(),
        }
    }
}

impl SuppressionPolicy {
    pub fn window_secs(&self, severity: Severity, rule_override: Option<u64>) -> u64 {
        rule_override
            .or_else(|| self.per_severity.get(&severity).copied())
            .unwrap_or(self.default_secs)
    }
}

/// `rule name -> expires_at`.
#[derive(Debug, Default)]
pub struct SuppressionMap {
    entries: HashMap<String, DateTime<Utc>>,
}

impl SuppressionMap {
    pub fn is_suppressed(&self, rule: &str, now: DateTime<Utc>) -> bool {
        self.entries.get(rule).is_some_and(|expires| now < *expires)
    }

    /// Starts a window for `rule`. Zero-length windows record nothing.
    pub fn suppress(&mut self, rule: &str, now: DateTime<Utc>, window_secs: u64) {
        if window_secs == 0 {
            return;
        }
        let expires_at = now + Duration::seconds(window_secs as i64);
        self.entries.insert(rule.to_string(), expires_at);
    }

    pub fn expires_at(&self, rule: &str) -> Option<DateTime<Utc>> {
        self.entries.get(rule).copied()
    }

    pub fn remove(&mut self, rule: &str) {
        self.entries.remove(rule);
    }

    /// Drops expired entries and returns how many were removed.
    pub fn prune_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, expires| now < *expires);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
