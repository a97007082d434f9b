//! Single-file SQLite backend built on `rusqlite`.

use crate::error::{Result, StorageError};
use crate::{
    dedupe_latest, from_millis, hour_start, sample_from_row, AlertRow, HourlyAggregate,
    MetricStats, PersistenceAdapter,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use hearth_common::types::{Alert, MetricSample, Severity};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

const ALERT_COLUMNS: &str = "id, rule_name, severity, category, message, metrics_snapshot_json, timestamp, resolved, resolved_at";

/// Embedded store. All statements run on the blocking pool so the async
/// runtime never waits on disk I/O.
#[derive(Clone)]
pub struct EmbeddedStore {
    conn: Arc<Mutex<Connection>>,
}

impl EmbeddedStore {
    /// Opens (creating if needed) the database file and applies the schema.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(migration::SQLITE_SCHEMA)?;
        tracing::info!(path = %path.display(), "Opened embedded store");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory database, used by tests and dry runs.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(migration::SQLITE_SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Lock the connection, recovering from a poisoned Mutex if necessary.
    fn lock(conn: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
        conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = Self::lock(&conn);
            f(&mut guard)
        })
        .await
        .map_err(|e| StorageError::Other(format!("blocking task failed: {e}")))?
    }
}

fn read_alert(row: &rusqlite::Row<'_>) -> rusqlite::Result<AlertRow> {
    Ok(AlertRow {
        id: row.get(0)?,
        rule_name: row.get(1)?,
        severity: row.get(2)?,
        category: row.get(3)?,
        message: row.get(4)?,
        snapshot_json: row.get(5)?,
        timestamp: row.get(6)?,
        resolved: row.get(7)?,
        resolved_at: row.get(8)?,
    })
}

fn insert_sample(conn: &Connection, sample: &MetricSample) -> Result<()> {
    let labels_json = serde_json::to_string(&sample.labels)?;
    let mut stmt = conn.prepare_cached(
        "INSERT INTO metrics_raw (metric_name, metric_value, labels_json, timestamp) VALUES (?1, ?2, ?3, ?4)",
    )?;
    stmt.execute(params![
        &sample.name,
        sample.value,
        labels_json,
        sample.timestamp.timestamp_millis(),
    ])?;
    Ok(())
}

#[async_trait]
impl PersistenceAdapter for EmbeddedStore {
    fn backend_name(&self) -> &'static str {
        "embedded"
    }

    async fn save_sample(&self, sample: &MetricSample) -> Result<()> {
        let sample = sample.clone();
        self.with_conn(move |conn| insert_sample(conn, &sample)).await
    }

    async fn save_samples(&self, samples: &[MetricSample]) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }
        let samples = samples.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            for sample in &samples {
                insert_sample(&tx, sample)?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn save_alert(&self, alert: &Alert) -> Result<()> {
        let alert = alert.clone();
        self.with_conn(move |conn| {
            let snapshot = serde_json::to_string(&alert.metrics_snapshot)?;
            conn.execute(
                "INSERT OR IGNORE INTO alert_history (id, rule_name, severity, category, message, metrics_snapshot_json, timestamp, resolved, resolved_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    &alert.id,
                    &alert.rule_name,
                    alert.severity.to_string(),
                    &alert.category,
                    &alert.message,
                    snapshot,
                    alert.timestamp.timestamp_millis(),
                    alert.resolved as i32,
                    alert.resolved_at.map(|t| t.timestamp_millis()),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_latest_metrics(&self) -> Result<Vec<MetricSample>> {
        let samples = self
            .with_conn(|conn| {
                let mut stmt = conn.prepare_cached(
                    "SELECT r.metric_name, r.metric_value, r.labels_json, r.timestamp
                     FROM metrics_raw r
                     JOIN (SELECT metric_name, MAX(timestamp) AS ts FROM metrics_raw GROUP BY metric_name) m
                       ON r.metric_name = m.metric_name AND r.timestamp = m.ts
                     ORDER BY r.metric_name ASC, r.id DESC",
                )?;
                let rows = stmt.query_map([], |row| {
                    let name: String = row.get(0)?;
                    let value: f64 = row.get(1)?;
                    let labels: String = row.get(2)?;
                    let ts: i64 = row.get(3)?;
                    Ok(sample_from_row(name, value, &labels, ts))
                })?;
                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            })
            .await?;
        Ok(dedupe_latest(samples))
    }

    async fn get_metric_stats(&self, name: &str, hours: u32) -> Result<MetricStats> {
        let name = name.to_string();
        let since = (Utc::now() - Duration::hours(hours as i64)).timestamp_millis();
        self.with_conn(move |conn| {
            let (avg, min, max, count): (Option<f64>, Option<f64>, Option<f64>, i64) = conn
                .query_row(
                    "SELECT AVG(metric_value), MIN(metric_value), MAX(metric_value), COUNT(*)
                     FROM metrics_raw WHERE metric_name = ?1 AND timestamp >= ?2",
                    params![name, since],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                )?;
            if count == 0 {
                return Ok(MetricStats::default());
            }
            Ok(MetricStats {
                avg: avg.unwrap_or_default(),
                min: min.unwrap_or_default(),
                max: max.unwrap_or_default(),
                count: count as u64,
            })
        })
        .await
    }

    async fn get_active_alerts(&self) -> Result<Vec<Alert>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {ALERT_COLUMNS} FROM alert_history WHERE resolved = 0 ORDER BY timestamp DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], read_alert)?;
            let rows = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows.into_iter().map(Alert::from).collect())
        })
        .await
    }

    async fn get_alert_history(
        &self,
        limit: usize,
        severity: Option<Severity>,
    ) -> Result<Vec<Alert>> {
        self.with_conn(move |conn| {
            let limit = limit as i64;
            let rows = match severity {
                Some(sev) => {
                    let sql = format!(
                        "SELECT {ALERT_COLUMNS} FROM alert_history WHERE severity = ?1 ORDER BY timestamp DESC LIMIT ?2"
                    );
                    let mut stmt = conn.prepare(&sql)?;
                    let rows = stmt.query_map(params![sev.to_string(), limit], read_alert)?;
                    rows.collect::<rusqlite::Result<Vec<_>>>()?
                }
                None => {
                    let sql = format!(
                        "SELECT {ALERT_COLUMNS} FROM alert_history ORDER BY timestamp DESC LIMIT ?1"
                    );
                    let mut stmt = conn.prepare(&sql)?;
                    let rows = stmt.query_map(params![limit], read_alert)?;
                    rows.collect::<rusqlite::Result<Vec<_>>>()?
                }
            };
            Ok(rows.into_iter().map(Alert::from).collect())
        })
        .await
    }

    async fn resolve_alert(&self, id: &str, now: DateTime<Utc>) -> Result<bool> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE alert_history SET resolved = 1, resolved_at = ?1 WHERE id = ?2 AND resolved = 0",
                params![now.timestamp_millis(), id],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn aggregate_hourly_at(&self, hour: DateTime<Utc>) -> Result<usize> {
        let start = hour_start(hour);
        let start_ms = start.timestamp_millis();
        let end_ms = (start + Duration::hours(1)).timestamp_millis();
        let count = self
            .with_conn(move |conn| {
                let tx = conn.transaction()?;
                let rows = {
                    let mut stmt = tx.prepare_cached(
                        "SELECT metric_name, AVG(metric_value), MIN(metric_value), MAX(metric_value), COUNT(*)
                         FROM metrics_raw WHERE timestamp >= ?1 AND timestamp < ?2
                         GROUP BY metric_name",
                    )?;
                    let rows = stmt.query_map(params![start_ms, end_ms], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, f64>(1)?,
                            row.get::<_, f64>(2)?,
                            row.get::<_, f64>(3)?,
                            row.get::<_, i64>(4)?,
                        ))
                    })?;
                    rows.collect::<rusqlite::Result<Vec<_>>>()?
                };
                {
                    let mut upsert = tx.prepare_cached(
                        "INSERT INTO metrics_hourly (hour, metric_name, avg_value, min_value, max_value, count)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                         ON CONFLICT(hour, metric_name) DO UPDATE SET
                           avg_value = excluded.avg_value,
                           min_value = excluded.min_value,
                           max_value = excluded.max_value,
                           count = excluded.count",
                    )?;
                    for (name, avg, min, max, count) in &rows {
                        upsert.execute(params![start_ms, name, avg, min, max, count])?;
                    }
                }
                tx.commit()?;
                Ok(rows.len())
            })
            .await?;
        tracing::debug!(hour = %start, metrics = count, "Hourly aggregation complete");
        Ok(count)
    }

    async fn get_hourly(
        &self,
        name: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<HourlyAggregate>> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT hour, metric_name, avg_value, min_value, max_value, count FROM metrics_hourly
                 WHERE metric_name = ?1 AND hour >= ?2 AND hour < ?3 ORDER BY hour ASC",
            )?;
            let rows = stmt.query_map(
                params![name, from.timestamp_millis(), to.timestamp_millis()],
                |row| {
                    Ok(HourlyAggregate {
                        hour: from_millis(row.get(0)?),
                        metric_name: row.get(1)?,
                        avg: row.get(2)?,
                        min: row.get(3)?,
                        max: row.get(4)?,
                        count: row.get::<_, i64>(5)? as u64,
                    })
                },
            )?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    async fn cleanup_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let removed = self
            .with_conn(move |conn| {
                let n = conn.execute(
                    "DELETE FROM metrics_raw WHERE timestamp < ?1",
                    params![cutoff.timestamp_millis()],
                )?;
                Ok(n as u64)
            })
            .await?;
        if removed > 0 {
            tracing::info!(removed, cutoff = %cutoff, "Removed expired raw metrics");
        }
        Ok(removed)
    }

    async fn save_daily_summary(&self, date: NaiveDate, summary: &serde_json::Value) -> Result<()> {
        let json = serde_json::to_string(summary)?;
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO daily_summaries (date, summary_json) VALUES (?1, ?2)
                 ON CONFLICT(date) DO UPDATE SET summary_json = excluded.summary_json",
                params![date.to_string(), json],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_daily_summary(&self, date: NaiveDate) -> Result<Option<serde_json::Value>> {
        let raw: Option<String> = self
            .with_conn(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT summary_json FROM daily_summaries WHERE date = ?1",
                        params![date.to_string()],
                        |row| row.get(0),
                    )
                    .optional()?)
            })
            .await?;
        raw.map(|s| serde_json::from_str(&s).map_err(StorageError::from))
            .transpose()
    }

    async fn ping(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |_| Ok(()))?;
            Ok(())
        })
        .await
    }
}
