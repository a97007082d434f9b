use crate::buffer::RingBuffer;
use chrono::{DateTime, Utc};
use hearth_common::types::{MetricSample, MetricsSnapshot};
use std::collections::HashMap;

/// History of one series (metric name + label set).
#[derive(Debug, Clone)]
pub struct MetricSeries {
    key: String,
    buffer: RingBuffer<MetricSample>,
}

impl MetricSeries {
    pub fn new(key: impl Into<String>, capacity: usize) -> Self {
        Self {
            key: key.into(),
            buffer: RingBuffer::new(capacity),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn push(&mut self, sample: MetricSample) {
        self.buffer.push(sample);
    }

    pub fn latest(&self) -> Option<&MetricSample> {
        self.buffer.latest()
    }

    pub fn history(&self, n: usize) -> Vec<MetricSample> {
        self.buffer.to_vec(n)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// All live series. Series are created lazily on the first sample for a new
/// key and live until [`MetricStore::reset`].
#[derive(Debug)]
pub struct MetricStore {
    capacity: usize,
    series: HashMap<String, MetricSeries>,
}

impl MetricStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            series: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn push(&mut self, sample: MetricSample) {
        let key = sample.series_key();
        let capacity = self.capacity;
        self.series
            .entry(key)
            .or_insert_with_key(|k| {
                tracing::debug!(series = %k, "Created metric series");
                MetricSeries::new(k.clone(), capacity)
            })
            .push(sample);
    }

    pub fn extend(&mut self, samples: impl IntoIterator<Item = MetricSample>) {
        for sample in samples {
            self.push(sample);
        }
    }

    /// Most recent sample of every series, keyed by series key.
    pub fn latest(&self) -> HashMap<String, MetricSample> {
        self.series
            .iter()
            .filter_map(|(k, s)| s.latest().map(|dp| (k.clone(), dp.clone())))
            .collect()
    }

    /// Up to `n` most recent samples of one series, oldest first. Empty when
    /// the series does not exist.
    pub fn history(&self, key: &str, n: usize) -> Vec<MetricSample> {
        self.series
            .get(key)
            .map(|s| s.history(n))
            .unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<&MetricSeries> {
        self.series.get(key)
    }

    pub fn series_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.series.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> MetricsSnapshot {
        let samples = self
            .series
            .values()
            .filter_map(|s| s.latest().cloned())
            .collect();
        MetricsSnapshot::new(now, samples)
    }

    pub fn reset(&mut self) {
        self.series.clear();
    }
}
