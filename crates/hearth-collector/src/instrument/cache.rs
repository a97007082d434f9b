use super::stats::{rate, RollingWindow, DEFAULT_WINDOW};
use super::{lock, Forward, Instrumentation};
use crate::MetricSink;
use chrono::{DateTime, Utc};
use hearth_common::types::MetricSample;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct CacheState {
    /// `true` for a hit.
    gets: RollingWindow,
    hits: u64,
    misses: u64,
    sets: u64,
}

/// Records cache lookups and writes.
pub struct CacheInstrumentation {
    state: Mutex<CacheState>,
    forward: Forward,
}

impl CacheInstrumentation {
    pub fn new(window: usize, sink: Option<Arc<dyn MetricSink>>) -> Self {
        Self {
            state: Mutex::new(CacheState {
                gets: RollingWindow::new(window),
                ..Default::default()
            }),
            forward: Forward::new(sink),
        }
    }

    pub fn record_get(&self, hit: bool, now: DateTime<Utc>) {
        {
            let mut state = lock(&self.state);
            state.gets.record(if hit { 1.0 } else { 0.0 }, hit);
            if hit {
                state.hits += 1;
            } else {
                state.misses += 1;
            }
        }
        self.forward
            .send([MetricSample::new("cache.get.hit", if hit { 1.0 } else { 0.0 }, now)]);
    }

    pub fn record_set(&self, now: DateTime<Utc>) {
        lock(&self.state).sets += 1;
        self.forward.send([MetricSample::new("cache.set", 1.0, now)]);
    }

    /// Hit percentage over the current window; 0 before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        let state = lock(&self.state);
        rate(state.gets.flagged(), state.gets.len() as u64)
    }
}

impl Default for CacheInstrumentation {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, None)
    }
}

impl Instrumentation for CacheInstrumentation {
    fn name(&self) -> &str {
        "cache"
    }

    fn derived(&self, now: DateTime<Utc>) -> Vec<MetricSample> {
        let state = lock(&self.state);
        vec![
            MetricSample::new("cache.hits_total", state.hits as f64, now),
            MetricSample::new("cache.misses_total", state.misses as f64, now),
            MetricSample::new("cache.sets_total", state.sets as f64, now),
            MetricSample::new("cache.hit_rate", state.gets.flagged_rate(), now),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::testing::{value, CaptureSink};

    #[test]
    fn hit_rate_over_window() {
        let now = Utc::now();
        let cache = CacheInstrumentation::new(4, None);
        assert_eq!(cache.hit_rate(), 0.0);

        for hit in [false, false, true, true, true, false] {
            cache.record_get(hit, now);
        }
        // window holds the last four lookups: true, true, true, false
        assert_eq!(cache.hit_rate(), 75.0);

        let derived = cache.derived(now);
        assert_eq!(value(&derived, "cache.hits_total"), Some(3.0));
        assert_eq!(value(&derived, "cache.misses_total"), Some(3.0));
    }

    #[test]
    fn sets_are_counted_and_forwarded() {
        let sink = Arc::new(CaptureSink::default());
        let cache = CacheInstrumentation::new(10, Some(sink.clone()));
        cache.record_set(Utc::now());
        cache.record_get(true, Utc::now());

        assert_eq!(value(&cache.derived(Utc::now()), "cache.sets_total"), Some(1.0));
        assert_eq!(sink.names(), vec!["cache.set", "cache.get.hit"]);
    }
}
