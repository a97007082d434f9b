//! Per-component retry windows and cooldowns.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    SafeMode,
    Cooldown,
    MaxRetries,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::SafeMode => write!(f, "safe_mode"),
            RejectReason::Cooldown => write!(f, "cooldown"),
            RejectReason::MaxRetries => write!(f, "max_retries"),
        }
    }
}

/// Outcome of a repair admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RepairDecision {
    pub allowed: bool,
    pub reason: Option<RejectReason>,
}

impl RepairDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn reject(reason: RejectReason) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Cooldown {
    expires_at: DateTime<Utc>,
    /// Retry window the budget ran out in.
    window: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CooldownInfo {
    pub component: String,
    pub expires_at: DateTime<Utc>,
}

/// Attempt counters keyed by `(component, window)` where
/// `window = floor(now / retry_window)`. Counters reset implicitly when the
/// window rolls over; stale keys are dropped by [`RetryTracker::prune`].
#[derive(Debug)]
pub struct RetryTracker {
    window_secs: i64,
    cooldown: Duration,
    attempts: HashMap<(String, i64), u32>,
    cooldowns: HashMap<String, Cooldown>,
}

impl RetryTracker {
    pub fn new(window_secs: u64, cooldown_secs: u64) -> Self {
        Self {
            window_secs: window_secs.max(1) as i64,
            cooldown: Duration::seconds(cooldown_secs as i64),
            attempts: HashMap::new(),
            cooldowns: HashMap::new(),
        }
    }

    pub fn window_key(&self, now: DateTime<Utc>) -> i64 {
        now.timestamp().div_euclid(self.window_secs)
    }

    /// Attempts counted for `component` in the window containing `now`.
    pub fn attempts(&self, component: &str, now: DateTime<Utc>) -> u32 {
        self.attempts
            .get(&(component.to_string(), self.window_key(now)))
            .copied()
            .unwrap_or(0)
    }

    /// Admission check. An allowed attempt is counted immediately.
    ///
    /// While a cooldown holds, attempts in the window that exhausted the
    /// budget keep reporting `MaxRetries`; later windows report `Cooldown`.
    pub fn admit(&mut self, component: &str, max_retries: u32, now: DateTime<Utc>) -> RepairDecision {
        let window = self.window_key(now);

        if let Some(cooldown) = self.cooldowns.get(component).copied() {
            if now < cooldown.expires_at {
                let reason = if cooldown.window == window {
                    RejectReason::MaxRetries
                } else {
                    RejectReason::Cooldown
                };
                return RepairDecision::reject(reason);
            }
            self.cooldowns.remove(component);
            self.attempts.retain(|(c, _), _| c != component);
            tracing::info!(component, "Repair cooldown expired");
        }

        let count = self.attempts.entry((component.to_string(), window)).or_insert(0);
        if *count >= max_retries {
            let expires_at = now + self.cooldown;
            self.cooldowns
                .insert(component.to_string(), Cooldown { expires_at, window });
            tracing::warn!(
                component,
                attempts = *count,
                max_retries,
                expires_at = %expires_at,
                "Repair budget exhausted, cooling down"
            );
            return RepairDecision::reject(RejectReason::MaxRetries);
        }
        *count += 1;
        RepairDecision::allow()
    }

    pub fn in_cooldown(&self, component: &str, now: DateTime<Utc>) -> bool {
        self.cooldowns
            .get(component)
            .is_some_and(|c| now < c.expires_at)
    }

    pub fn cooldowns(&self, now: DateTime<Utc>) -> Vec<CooldownInfo> {
        let mut out: Vec<CooldownInfo> = self
            .cooldowns
            .iter()
            .filter(|(_, c)| now < c.expires_at)
            .map(|(component, c)| CooldownInfo {
                component: component.clone(),
                expires_at: c.expires_at,
            })
            .collect();
        out.sort_by(|a, b| a.component.cmp(&b.component));
        out
    }

    /// Counters of the current window, by component.
    pub fn current_attempts(&self, now: DateTime<Utc>) -> HashMap<String, u32> {
        let window = self.window_key(now);
        self.attempts
            .iter()
            .filter(|((_, w), _)| *w == window)
            .map(|((c, _), n)| (c.clone(), *n))
            .collect()
    }

    /// Drops counters of past windows and expired cooldowns. A component
    /// whose cooldown expired also loses its counters, same as in
    /// [`RetryTracker::admit`]. Returns the number of entries removed.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let window = self.window_key(now);
        let before = self.attempts.len() + self.cooldowns.len();
        let expired: HashSet<String> = self
            .cooldowns
            .iter()
            .filter(|(_, c)| now >= c.expires_at)
            .map(|(component, _)| component.clone())
            .collect();
        self.cooldowns.retain(|component, _| !expired.contains(component));
        self.attempts
            .retain(|(c, w), _| *w >= window && !expired.contains(c));
        before - (self.attempts.len() + self.cooldowns.len())
    }
}
