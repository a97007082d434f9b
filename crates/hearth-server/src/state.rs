use crate::config::HearthConfig;
use crate::health::HealthFlags;
use chrono::{DateTime, Utc};
use hearth_alert::engine::RuleEngine;
use hearth_collector::instrument::{
    BusinessInstrumentation, CacheInstrumentation, DbInstrumentation, HttpInstrumentation,
};
use hearth_collector::series::MetricStore;
use hearth_collector::MetricSink;
use hearth_common::types::{MetricSample, MetricsSnapshot};
use hearth_notify::dispatcher::AlertDispatcher;
use hearth_safety::SafetyController;
use hearth_storage::PersistenceAdapter;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, watch};

/// Fire-and-forget ingestion handle. Samples queue until the next
/// collection tick; when the queue is full they are dropped and counted.
#[derive(Clone)]
pub struct MetricHandle {
    tx: mpsc::Sender<MetricSample>,
    dropped: Arc<AtomicU64>,
}

impl MetricHandle {
    pub fn new(queue_size: usize) -> (Self, mpsc::Receiver<MetricSample>) {
        let (tx, rx) = mpsc::channel(queue_size.max(1));
        (
            Self {
                tx,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl MetricSink for MetricHandle {
    fn submit(&self, sample: MetricSample) {
        if self.tx.try_send(sample).is_err() {
            let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            if total.is_power_of_two() {
                tracing::warn!(dropped_total = total, "Ingest queue full, samples dropped");
            }
        }
    }
}

/// Instrumentation adapters shared with application call sites.
#[derive(Clone)]
pub struct Instruments {
    pub http: Arc<HttpInstrumentation>,
    pub db: Arc<DbInstrumentation>,
    pub cache: Arc<CacheInstrumentation>,
    pub business: Arc<BusinessInstrumentation>,
}

#[derive(Clone)]
pub struct AppState {
    pub metrics: Arc<Mutex<MetricStore>>,
    pub snapshot: watch::Receiver<Arc<MetricsSnapshot>>,
    pub rules: Arc<Mutex<RuleEngine>>,
    pub dispatcher: Arc<AlertDispatcher>,
    pub storage: Arc<dyn PersistenceAdapter>,
    pub safety: Arc<Mutex<SafetyController>>,
    pub instruments: Instruments,
    pub ingest: MetricHandle,
    pub health: Arc<HealthFlags>,
    pub start_time: DateTime<Utc>,
    pub config: Arc<HearthConfig>,
}

impl AppState {
    /// Latest published snapshot; cheap to clone.
    pub fn latest_snapshot(&self) -> Arc<MetricsSnapshot> {
        self.snapshot.borrow().clone()
    }
}

/// Locks a std mutex, recovering the data if a holder panicked.
pub fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
