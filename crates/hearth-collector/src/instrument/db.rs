use super::stats::{percentile, RollingWindow, DEFAULT_WINDOW};
use super::{lock, Forward, Instrumentation};
use crate::MetricSink;
use chrono::{DateTime, Utc};
use hearth_common::types::MetricSample;
use serde::Serialize;
use std::sync::{Arc, Mutex};

pub const DEFAULT_SLOW_QUERY_MS: f64 = 1000.0;

/// Connection pool gauges as reported by the pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub total: u32,
    pub idle: u32,
    pub waiting: u32,
}

impl PoolStats {
    /// Callers are queueing and no connection is free.
    pub fn is_exhausted(&self) -> bool {
        self.waiting > 0 && self.idle == 0
    }
}

#[derive(Default)]
struct DbState {
    window: RollingWindow,
    total: u64,
    errors: u64,
    slow: u64,
    pool: Option<PoolStats>,
}

/// Records finished database queries and pool state.
pub struct DbInstrumentation {
    state: Mutex<DbState>,
    slow_query_ms: f64,
    forward: Forward,
}

impl DbInstrumentation {
    pub fn new(window: usize, slow_query_ms: f64, sink: Option<Arc<dyn MetricSink>>) -> Self {
        Self {
            state: Mutex::new(DbState {
                window: RollingWindow::new(window),
                ..Default::default()
            }),
            slow_query_ms,
            forward: Forward::new(sink),
        }
    }

    pub fn record_query(&self, operation: &str, duration_ms: f64, success: bool, now: DateTime<Utc>) {
        let slow = duration_ms >= self.slow_query_ms;
        {
            let mut state = lock(&self.state);
            state.window.record(duration_ms, !success);
            state.total += 1;
            if !success {
                state.errors += 1;
            }
            if slow {
                state.slow += 1;
            }
        }
        if slow {
            tracing::debug!(operation, duration_ms, "Slow query");
        }

        self.forward.send([
            MetricSample::labelled("db.query.duration_ms", duration_ms, "operation", operation, now),
            MetricSample::labelled(
                "db.query.success",
                if success { 1.0 } else { 0.0 },
                "operation",
                operation,
                now,
            ),
        ]);
    }

    pub fn set_pool(&self, pool: PoolStats) {
        lock(&self.state).pool = Some(pool);
    }

    pub fn pool(&self) -> Option<PoolStats> {
        lock(&self.state).pool
    }

    pub fn error_rate(&self) -> f64 {
        lock(&self.state).window.flagged_rate()
    }
}

impl Default for DbInstrumentation {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, DEFAULT_SLOW_QUERY_MS, None)
    }
}

impl Instrumentation for DbInstrumentation {
    fn name(&self) -> &str {
        "db"
    }

    fn derived(&self, now: DateTime<Utc>) -> Vec<MetricSample> {
        let state = lock(&self.state);
        let mut samples = vec![
            MetricSample::new("db.queries_total", state.total as f64, now),
            MetricSample::new("db.errors_total", state.errors as f64, now),
            MetricSample::new("db.slow_queries_total", state.slow as f64, now),
            MetricSample::new("db.error_rate", state.window.flagged_rate(), now),
        ];
        if let Some(p95) = percentile(&state.window.sorted_values(), 95.0) {
            samples.push(MetricSample::new("db.query_p95_ms", p95, now));
        }
        if let Some(pool) = state.pool {
            samples.push(MetricSample::new("db.pool.total", pool.total as f64, now));
            samples.push(MetricSample::new("db.pool.idle", pool.idle as f64, now));
            samples.push(MetricSample::new("db.pool.waiting", pool.waiting as f64, now));
        }
        samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::testing::value;

    #[test]
    fn counts_errors_and_slow_queries() {
        let now = Utc::now();
        let db = DbInstrumentation::new(100, 500.0, None);
        db.record_query("select", 20.0, true, now);
        db.record_query("select", 750.0, true, now);
        db.record_query("insert", 30.0, false, now);
        db.record_query("update", 40.0, true, now);

        let derived = db.derived(now);
        assert_eq!(value(&derived, "db.queries_total"), Some(4.0));
        assert_eq!(value(&derived, "db.slow_queries_total"), Some(1.0));
        assert_eq!(value(&derived, "db.error_rate"), Some(25.0));
        assert_eq!(value(&derived, "db.query_p95_ms"), Some(750.0));
    }

    #[test]
    fn pool_gauges_only_after_first_report() {
        let db = DbInstrumentation::default();
        assert_eq!(value(&db.derived(Utc::now()), "db.pool.idle"), None);

        db.set_pool(PoolStats { total: 10, idle: 0, waiting: 3 });
        let derived = db.derived(Utc::now());
        assert_eq!(value(&derived, "db.pool.waiting"), Some(3.0));
        assert!(db.pool().is_some_and(|p| p.is_exhausted()));
        assert!(!PoolStats { total: 10, idle: 1, waiting: 3 }.is_exhausted());
    }
}
