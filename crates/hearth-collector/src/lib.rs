//! Metric collection for the hearth observability core.
//!
//! Two producers feed the same storage abstraction:
//!
//! * [`Collector`] implementations sampled on a fixed tick by the
//!   [`sampler::MetricSampler`] (CPU, memory, disk, network, load), and
//! * instrumentation adapters in [`instrument`] that application call sites
//!   report into (HTTP, database, cache, business events).
//!
//! Samples land in per-series fixed-capacity ring buffers held by
//! [`series::MetricStore`].

pub mod buffer;
pub mod cpu;
pub mod disk;
pub mod error;
pub mod instrument;
pub mod load;
pub mod memory;
pub mod network;
pub mod sampler;
pub mod series;

use anyhow::Result;
use chrono::{DateTime, Utc};
use hearth_common::types::MetricSample;

/// A metric source polled once per collection tick.
///
/// Implementations are registered in the [`sampler::MetricSampler`]. A
/// failing collector only loses its own series for that tick.
pub trait Collector: Send {
    /// Collector name (e.g. `"cpu"`, `"http"`), used for logging.
    fn name(&self) -> &str;

    /// Collects current values, stamped with `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying system API call fails.
    fn collect(&mut self, now: DateTime<Utc>) -> Result<Vec<MetricSample>>;
}

/// Fire-and-forget destination for samples produced outside the tick, such
/// as a finished HTTP request. Must never block or fail the caller.
pub trait MetricSink: Send + Sync {
    fn submit(&self, sample: MetricSample);
}
