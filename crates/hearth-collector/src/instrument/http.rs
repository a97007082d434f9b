use super::stats::{RollingWindow, DEFAULT_WINDOW};
use super::{lock, Forward, Instrumentation};
use crate::MetricSink;
use chrono::{DateTime, Utc};
use hearth_common::types::{Labels, MetricSample};
use std::sync::{Arc, Mutex};

/// Responses with a status at or above this count as errors.
pub const ERROR_STATUS: u16 = 400;

#[derive(Default)]
struct HttpState {
    window: RollingWindow,
    total: u64,
    errors: u64,
}

/// Records finished HTTP requests.
pub struct HttpInstrumentation {
    state: Mutex<HttpState>,
    forward: Forward,
}

impl HttpInstrumentation {
    pub fn new(window: usize, sink: Option<Arc<dyn MetricSink>>) -> Self {
        Self {
            state: Mutex::new(HttpState {
                window: RollingWindow::new(window),
                ..Default::default()
            }),
            forward: Forward::new(sink),
        }
    }

    pub fn record_request(
        &self,
        method: &str,
        route: &str,
        status: u16,
        duration_ms: f64,
        now: DateTime<Utc>,
    ) {
        let is_error = status >= ERROR_STATUS;
        {
            let mut state = lock(&self.state);
            state.window.record(duration_ms, is_error);
            state.total += 1;
            if is_error {
                state.errors += 1;
            }
        }

        let mut labels = Labels::new();
        labels.insert("method".to_string(), method.to_uppercase());
        labels.insert("route".to_string(), route.to_string());
        self.forward.send([
            MetricSample::with_labels("http.request.duration_ms", duration_ms, labels.clone(), now),
            MetricSample::with_labels(
                "http.request.error",
                if is_error { 1.0 } else { 0.0 },
                labels,
                now,
            ),
        ]);
    }

    /// Error percentage over the current window.
    pub fn error_rate(&self) -> f64 {
        lock(&self.state).window.flagged_rate()
    }

    pub fn total(&self) -> u64 {
        lock(&self.state).total
    }
}

impl Default for HttpInstrumentation {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, None)
    }
}

impl Instrumentation for HttpInstrumentation {
    fn name(&self) -> &str {
        "http"
    }

    fn derived(&self, now: DateTime<Utc>) -> Vec<MetricSample> {
        let state = lock(&self.state);
        let mut samples = vec![
            MetricSample::new("http.requests_total", state.total as f64, now),
            MetricSample::new("http.errors_total", state.errors as f64, now),
            MetricSample::new("http.error_rate", state.window.flagged_rate(), now),
        ];
        if let Some(p) = state.window.percentiles() {
            samples.push(MetricSample::new("http.latency_p50", p.p50, now));
            samples.push(MetricSample::new("http.latency_p95", p.p95, now));
            samples.push(MetricSample::new("http.latency_p99", p.p99, now));
        }
        samples
    }
}
