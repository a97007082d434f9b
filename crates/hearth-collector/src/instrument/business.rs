use super::stats::rate;
use super::{lock, Forward, Instrumentation};
use crate::MetricSink;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use hearth_common::types::MetricSample;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTally {
    pub total: u64,
    pub failures: u64,
}

/// Counters for one business day, emitted right before they are cleared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    /// Day the counting period started on.
    pub date: NaiveDate,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub events: BTreeMap<String, EventTally>,
    pub total: u64,
    pub failures: u64,
    pub failure_rate: f64,
}

struct BusinessState {
    period_start: DateTime<Utc>,
    events: BTreeMap<String, EventTally>,
    /// Every event name seen since start, so per-event series drop to zero
    /// after a reset instead of going stale.
    known: BTreeSet<String>,
}

/// Counts domain events such as registrations or imported recipes.
pub struct BusinessInstrumentation {
    state: Mutex<BusinessState>,
    forward: Forward,
}

impl BusinessInstrumentation {
    pub fn new(now: DateTime<Utc>, sink: Option<Arc<dyn MetricSink>>) -> Self {
        Self {
            state: Mutex::new(BusinessState {
                period_start: now,
                events: BTreeMap::new(),
                known: BTreeSet::new(),
            }),
            forward: Forward::new(sink),
        }
    }

    pub fn record_event(&self, event: &str, success: bool, now: DateTime<Utc>) {
        {
            let mut state = lock(&self.state);
            if !state.known.contains(event) {
                state.known.insert(event.to_string());
            }
            let tally = state.events.entry(event.to_string()).or_default();
            tally.total += 1;
            if !success {
                tally.failures += 1;
            }
        }
        self.forward.send([MetricSample::labelled(
            "business.event",
            if success { 1.0 } else { 0.0 },
            "event",
            event,
            now,
        )]);
    }

    pub fn tally(&self, event: &str) -> EventTally {
        lock(&self.state).events.get(event).copied().unwrap_or_default()
    }

    /// Closes the current period: returns its summary and clears counters.
    pub fn reset_daily(&self, now: DateTime<Utc>) -> DailySummary {
        let mut state = lock(&self.state);
        let events = std::mem::take(&mut state.events);
        let period_start = std::mem::replace(&mut state.period_start, now);
        drop(state);

        let total = events.values().map(|t| t.total).sum();
        let failures = events.values().map(|t| t.failures).sum();
        let summary = DailySummary {
            date: period_start.date_naive(),
            period_start,
            period_end: now,
            events,
            total,
            failures,
            failure_rate: rate(failures, total),
        };
        tracing::info!(
            date = %summary.date,
            total = summary.total,
            failures = summary.failures,
            "Business counters reset"
        );
        summary
    }
}

/// Next `hour:00` UTC strictly after `now`. Hours above 23 are clamped.
pub fn next_reset_after(now: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
    let today = now.date_naive().and_time(time).and_utc();
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

impl Instrumentation for BusinessInstrumentation {
    fn name(&self) -> &str {
        "business"
    }

    fn derived(&self, now: DateTime<Utc>) -> Vec<MetricSample> {
        let state = lock(&self.state);
        let mut samples = Vec::with_capacity(state.known.len() * 2 + 3);
        let (mut total, mut failures) = (0, 0);
        for event in &state.known {
            let tally = state.events.get(event).copied().unwrap_or_default();
            total += tally.total;
            failures += tally.failures;
            samples.push(MetricSample::labelled(
                "business.events_today",
                tally.total as f64,
                "event",
                event.clone(),
                now,
            ));
            samples.push(MetricSample::labelled(
                "business.failures_today",
                tally.failures as f64,
                "event",
                event.clone(),
                now,
            ));
        }
        samples.push(MetricSample::new("business.events_total", total as f64, now));
        samples.push(MetricSample::new("business.failures_total", failures as f64, now));
        samples.push(MetricSample::new("business.failure_rate", rate(failures, total), now));
        samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::testing::value;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, h, m, 0).unwrap()
    }

    #[test]
    fn reset_emits_summary_then_clears() {
        let business = BusinessInstrumentation::new(at(0, 0), None);
        business.record_event("user_registration", true, at(9, 0));
        business.record_event("user_registration", true, at(10, 0));
        business.record_event("recipe_import", false, at(11, 0));
        business.record_event("recipe_import", true, at(12, 0));

        let summary = business.reset_daily(at(23, 59));
        assert_eq!(summary.date, at(0, 0).date_naive());
        assert_eq!(summary.total, 4);
        assert_eq!(summary.failures, 1);
        assert_eq!(summary.failure_rate, 25.0);
        assert_eq!(summary.events["user_registration"].total, 2);

        assert_eq!(business.tally("user_registration"), EventTally::default());
        let derived = business.derived(at(23, 59));
        assert_eq!(value(&derived, "business.events_total"), Some(0.0));
        assert_eq!(value(&derived, "business.failure_rate"), Some(0.0));
    }

    #[test]
    fn per_event_series_drop_to_zero_after_reset() {
        let business = BusinessInstrumentation::new(at(0, 0), None);
        business.record_event("recipe_import", false, at(9, 0));
        business.reset_daily(at(23, 59));

        let derived = business.derived(at(23, 59));
        for name in ["business.events_today", "business.failures_today"] {
            let sample = derived
                .iter()
                .find(|s| s.name == name)
                .expect("known event should still be emitted");
            assert_eq!(sample.labels.get("event").map(String::as_str), Some("recipe_import"));
            assert_eq!(sample.value, 0.0);
        }
        assert!(business.reset_daily(at(23, 59)).events.is_empty());
    }

    #[test]
    fn next_reset_rolls_over_to_tomorrow() {
        assert_eq!(next_reset_after(at(1, 30), 3), at(3, 0));
        assert_eq!(next_reset_after(at(3, 0), 3), at(3, 0) + Duration::days(1));
        assert_eq!(next_reset_after(at(22, 0), 0), at(0, 0) + Duration::days(1));
    }
}
