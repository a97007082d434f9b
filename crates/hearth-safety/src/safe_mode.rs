use crate::config::SafeModeConfig;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// System-wide stress signals sampled by the collection loop. Fractions are
/// in `0.0..=1.0`; `None` means the signal is not available this cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSignals {
    pub memory_fraction: Option<f64>,
    pub error_rate_fraction: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SafeModeStatus {
    pub active: bool,
    pub since: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

/// Global switch that rejects every automated repair while set.
#[derive(Debug, Default)]
pub struct SafeMode {
    since: Option<DateTime<Utc>>,
    reason: Option<String>,
}

impl SafeMode {
    pub fn is_active(&self) -> bool {
        self.since.is_some()
    }

    /// No-op when already active; the first reason is kept.
    pub fn activate(&mut self, reason: impl Into<String>, now: DateTime<Utc>) -> bool {
        if self.is_active() {
            return false;
        }
        let reason = reason.into();
        tracing::warn!(reason = %reason, "Safe mode activated, automated repairs disabled");
        self.since = Some(now);
        self.reason = Some(reason);
        true
    }

    /// Returns how long safe mode was active, or `None` if it was not.
    pub fn deactivate(&mut self, now: DateTime<Utc>, manual: bool) -> Option<Duration> {
        let since = self.since.take()?;
        let reason = self.reason.take().unwrap_or_default();
        let duration = now - since;
        tracing::info!(
            duration_secs = duration.num_seconds(),
            manual,
            reason = %reason,
            "Safe mode deactivated"
        );
        Some(duration)
    }

    pub fn status(&self) -> SafeModeStatus {
        SafeModeStatus {
            active: self.is_active(),
            since: self.since,
            reason: self.reason.clone(),
        }
    }
}

/// First trigger that holds, as a human-readable reason.
pub fn trigger(
    config: &SafeModeConfig,
    signals: &SystemSignals,
    worst_consecutive: Option<(&str, u32)>,
) -> Option<String> {
    if let Some(memory) = signals.memory_fraction {
        if memory > config.memory_fraction {
            return Some(format!(
                "memory usage {:.1}% above {:.1}%",
                memory * 100.0,
                config.memory_fraction * 100.0
            ));
        }
    }
    if let Some(rate) = signals.error_rate_fraction {
        if rate > config.error_rate_fraction {
            return Some(format!(
                "error rate {:.1}% above {:.1}%",
                rate * 100.0,
                config.error_rate_fraction * 100.0
            ));
        }
    }
    if let Some((component, failures)) = worst_consecutive {
        if config.consecutive_failures > 0 && failures >= config.consecutive_failures {
            return Some(format!("{failures} consecutive repair failures for {component}"));
        }
    }
    None
}
