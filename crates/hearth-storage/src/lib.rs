//! Persistence for metrics, hourly aggregates, daily summaries and alerts.
//!
//! One [`PersistenceAdapter`] interface, two backends with the same logical
//! schema (`metrics_raw`, `metrics_hourly`, `daily_summaries`,
//! `alert_history`):
//!
//! * [`embedded::EmbeddedStore`]: a single SQLite file accessed through
//!   `rusqlite` on blocking threads.
//! * [`relational::RelationalStore`]: a SeaORM connection (PostgreSQL or
//!   SQLite URL) with its schema applied by `sea-orm-migration`.
//!
//! Writes from the collection loop go through [`writer::PersistenceWriter`],
//! which drops rather than queues without bound when the backend is slow.

pub mod config;
pub mod embedded;
pub mod error;
pub mod relational;
pub mod writer;


use async_trait::async_trait;
use chrono::{DateTime, Duration, DurationRound, NaiveDate, Utc};
use error::Result;
use hearth_common::types::{Alert, Labels, MetricSample, Severity};
use serde::Serialize;
use std::sync::Arc;

pub use config::{StorageBackend, StorageConfig};

/// Aggregated metric statistics. All zero when no samples matched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MetricStats {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub count: u64,
}

/// One `metrics_hourly` row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyAggregate {
    pub hour: DateTime<Utc>,
    pub metric_name: String,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub count: u64,
}

/// Persistence backend for metrics and alerts.
///
/// Implementations must be safe to share across tasks (`Send + Sync`): the
/// write queue, periodic jobs and the HTTP surface use the same instance.
#[async_trait]
pub trait PersistenceAdapter: Send + Sync {
    /// Short backend name for logs and `/health` (e.g. `"embedded"`).
    fn backend_name(&self) -> &'static str;

    async fn save_sample(&self, sample: &MetricSample) -> Result<()>;

    async fn save_samples(&self, samples: &[MetricSample]) -> Result<()> {
        for sample in samples {
            self.save_sample(sample).await?;
        }
        Ok(())
    }

    /// Stores a raw measurement stamped with the current time.
    async fn save_metric(&self, name: &str, value: f64, labels: &Labels) -> Result<()> {
        let sample = MetricSample::with_labels(name, value, labels.clone(), Utc::now());
        self.save_sample(&sample).await
    }

    /// Inserts the alert; a second save of the same id is ignored.
    async fn save_alert(&self, alert: &Alert) -> Result<()>;

    /// Most recent raw sample per distinct metric name.
    async fn get_latest_metrics(&self) -> Result<Vec<MetricSample>>;

    /// Statistics over raw samples of `name` from the last `hours` hours.
    async fn get_metric_stats(&self, name: &str, hours: u32) -> Result<MetricStats>;

    /// Unresolved alerts, most recent first.
    async fn get_active_alerts(&self) -> Result<Vec<Alert>>;

    /// Most recent first, optionally restricted to one severity.
    async fn get_alert_history(&self, limit: usize, severity: Option<Severity>) -> Result<Vec<Alert>>;

    /// Marks an alert resolved. Returns false when no unresolved alert has
    /// that id.
    async fn resolve_alert(&self, id: &str, now: DateTime<Utc>) -> Result<bool>;

    /// Rolls up the last completed hour.
    async fn aggregate_hourly(&self) -> Result<usize> {
        self.aggregate_hourly_at(last_completed_hour(Utc::now())).await
    }

    /// Rolls raw samples of the hour containing `hour` into one
    /// `metrics_hourly` row per metric. Re-running overwrites the rows.
    /// Returns the number of metrics aggregated.
    async fn aggregate_hourly_at(&self, hour: DateTime<Utc>) -> Result<usize>;

    /// Hourly rows for `name` with `from <= hour < to`, oldest first.
    async fn get_hourly(
        &self,
        name: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<HourlyAggregate>>;

    /// Deletes raw rows older than the retention horizon. Aggregates and
    /// alerts are kept.
    async fn cleanup_old(&self, retention_days: u32) -> Result<u64> {
        self.cleanup_before(Utc::now() - Duration::days(retention_days as i64))
            .await
    }

    /// Deletes raw rows with `timestamp < cutoff`. Returns the number deleted.
    async fn cleanup_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    /// Inserts or replaces the summary for `date`.
    async fn save_daily_summary(&self, date: NaiveDate, summary: &serde_json::Value) -> Result<()>;

    async fn get_daily_summary(&self, date: NaiveDate) -> Result<Option<serde_json::Value>>;

    /// Cheap round trip used by the health check.
    async fn ping(&self) -> Result<()>;
}

/// Opens the backend selected in `config`.
pub async fn open(config: &StorageConfig) -> Result<Arc<dyn PersistenceAdapter>> {
    let store: Arc<dyn PersistenceAdapter> = match config.backend {
        StorageBackend::Embedded => Arc::new(embedded::EmbeddedStore::open(&config.sqlite_path)?),
        StorageBackend::Relational => {
            Arc::new(relational::RelationalStore::connect(&config.database_url).await?)
        }
    };
    tracing::info!(backend = store.backend_name(), "Storage opened");
    Ok(store)
}

/// Start of the hour containing `ts`.
pub fn hour_start(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.duration_trunc(Duration::hours(1)).unwrap_or(ts)
}

/// Start of the hour before the one containing `now`.
pub fn last_completed_hour(now: DateTime<Utc>) -> DateTime<Utc> {
    hour_start(now) - Duration::hours(1)
}

pub(crate) fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

pub(crate) fn sample_from_row(name: String, value: f64, labels_json: &str, ts_ms: i64) -> MetricSample {
    let labels: Labels = serde_json::from_str(labels_json).unwrap_or_default();
    MetricSample::with_labels(name, value, labels, from_millis(ts_ms))
}

/// Column values of one `alert_history` row.
pub(crate) struct AlertRow {
    pub id: String,
    pub rule_name: String,
    pub severity: String,
    pub category: String,
    pub message: String,
    pub snapshot_json: String,
    pub timestamp: i64,
    pub resolved: i32,
    pub resolved_at: Option<i64>,
}

impl From<AlertRow> for Alert {
    fn from(row: AlertRow) -> Self {
        Alert {
            id: row.id,
            rule_name: row.rule_name,
            severity: row.severity.parse().unwrap_or(Severity::Info),
            message: row.message,
            category: row.category,
            metrics_snapshot: serde_json::from_str(&row.snapshot_json)
                .unwrap_or(serde_json::Value::Null),
            timestamp: from_millis(row.timestamp),
            resolved: row.resolved != 0,
            resolved_at: row.resolved_at.map(from_millis),
        }
    }
}

/// Keeps the first sample per metric name; input is ordered so the first
/// one is the newest.
pub(crate) fn dedupe_latest(samples: Vec<MetricSample>) -> Vec<MetricSample> {
    let mut seen = std::collections::HashSet::new();
    samples
        .into_iter()
        .filter(|s| seen.insert(s.name.clone()))
        .collect()
}
