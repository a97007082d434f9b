//! Best-effort write queue between the collection loop and the store.
//!
//! Producers never wait on the database: when the queue is full the write
//! is dropped and counted. Failed or timed-out writes mark the storage
//! component degraded; the next successful write clears it.

use crate::error::StorageError;
use crate::PersistenceAdapter;
use chrono::{NaiveDate, Utc};
use hearth_common::health::ComponentHealth;
use hearth_common::types::{Alert, MetricSample};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug)]
pub enum WriteOp {
    Samples(Vec<MetricSample>),
    Alert(Alert),
    DailySummary {
        date: NaiveDate,
        summary: serde_json::Value,
    },
}

impl WriteOp {
    fn kind(&self) -> &'static str {
        match self {
            WriteOp::Samples(_) => "samples",
            WriteOp::Alert(_) => "alert",
            WriteOp::DailySummary { .. } => "daily_summary",
        }
    }
}

/// Cloneable producer handle.
#[derive(Clone)]
pub struct PersistenceWriter {
    tx: mpsc::Sender<WriteOp>,
    dropped: Arc<AtomicU64>,
}

/// Consumer half; drains the queue until every writer handle is dropped.
pub struct WriteWorker {
    rx: mpsc::Receiver<WriteOp>,
    health: Arc<ComponentHealth>,
}

impl PersistenceWriter {
    pub fn channel(queue_size: usize, health: Arc<ComponentHealth>) -> (Self, WriteWorker) {
        let (tx, rx) = mpsc::channel(queue_size.max(1));
        (
            Self {
                tx,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            WriteWorker { rx, health },
        )
    }

    /// Creates the queue and runs its worker on the current runtime.
    pub fn spawn(
        store: Arc<dyn PersistenceAdapter>,
        health: Arc<ComponentHealth>,
        queue_size: usize,
        write_timeout: Duration,
    ) -> (Self, JoinHandle<()>) {
        let (writer, worker) = Self::channel(queue_size, health);
        let handle = tokio::spawn(worker.run(store, write_timeout));
        (writer, handle)
    }

    pub fn submit_samples(&self, samples: Vec<MetricSample>) -> bool {
        if samples.is_empty() {
            return true;
        }
        self.submit(WriteOp::Samples(samples))
    }

    pub fn submit_alert(&self, alert: Alert) -> bool {
        self.submit(WriteOp::Alert(alert))
    }

    pub fn submit_daily_summary(&self, date: NaiveDate, summary: serde_json::Value) -> bool {
        self.submit(WriteOp::DailySummary { date, summary })
    }

    /// Enqueues without waiting. Returns false when the write was dropped.
    pub fn submit(&self, op: WriteOp) -> bool {
        match self.tx.try_send(op) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(op)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(kind = op.kind(), dropped_total = total, "Persistence queue full, write dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(op)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(kind = op.kind(), "Persistence worker stopped, write dropped");
                false
            }
        }
    }

    /// Writes dropped since start.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl WriteWorker {
    pub async fn run(mut self, store: Arc<dyn PersistenceAdapter>, write_timeout: Duration) {
        tracing::info!(backend = store.backend_name(), "Persistence writer started");
        while let Some(op) = self.rx.recv().await {
            let kind = op.kind();
            let result = tokio::time::timeout(write_timeout, apply(store.as_ref(), op))
                .await
                .unwrap_or_else(|_| {
                    Err(StorageError::Timeout {
                        timeout_ms: write_timeout.as_millis() as u64,
                    })
                });
            match result {
                Ok(()) => self.health.mark_healthy(Utc::now()),
                Err(e) => {
                    tracing::error!(kind, error = %e, "Persistence write failed");
                    self.health.mark_failed(e.to_string());
                }
            }
        }
        tracing::info!("Persistence writer stopped");
    }
}

async fn apply(store: &dyn PersistenceAdapter, op: WriteOp) -> crate::error::Result<()> {
    match op {
        WriteOp::Samples(samples) => store.save_samples(&samples).await,
        WriteOp::Alert(alert) => store.save_alert(&alert).await,
        WriteOp::DailySummary { date, summary } => store.save_daily_summary(date, &summary).await,
    }
}
