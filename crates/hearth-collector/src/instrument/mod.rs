//! Instrumentation adapters for application call sites.
//!
//! Each adapter is shared as an `Arc` between the code it instruments and the
//! sampler. Recording methods take `&self`, push the raw observation to an
//! optional [`MetricSink`] and update a rolling window; the derived
//! aggregates (rates, percentiles, gauges) are emitted once per tick through
//! the [`Collector`] impl on `Arc<T>`.

pub mod business;
pub mod cache;
pub mod db;
pub mod http;
pub mod stats;

use crate::{Collector, MetricSink};
use anyhow::Result;
use chrono::{DateTime, Utc};
use hearth_common::types::MetricSample;
use std::sync::{Arc, Mutex, MutexGuard};

pub use business::BusinessInstrumentation;
pub use cache::CacheInstrumentation;
pub use db::DbInstrumentation;
pub use http::HttpInstrumentation;

/// An adapter that exposes derived aggregates on demand.
pub trait Instrumentation: Send + Sync {
    fn name(&self) -> &str;

    /// Current aggregates stamped with `now`.
    fn derived(&self, now: DateTime<Utc>) -> Vec<MetricSample>;
}

impl<T: Instrumentation> Collector for Arc<T> {
    fn name(&self) -> &str {
        Instrumentation::name(self.as_ref())
    }

    fn collect(&mut self, now: DateTime<Utc>) -> Result<Vec<MetricSample>> {
        Ok(self.derived(now))
    }
}

/// Forwards raw observations to the sink when one is attached.
#[derive(Clone, Default)]
pub(crate) struct Forward(Option<Arc<dyn MetricSink>>);

impl Forward {
    pub(crate) fn new(sink: Option<Arc<dyn MetricSink>>) -> Self {
        Self(sink)
    }

    pub(crate) fn send(&self, samples: impl IntoIterator<Item = MetricSample>) {
        if let Some(sink) = &self.0 {
            for sample in samples {
                sink.submit(sample);
            }
        }
    }
}

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}
