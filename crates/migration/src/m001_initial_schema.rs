use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::DbBackend;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m001_initial_schema"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let sql = match manager.get_database_backend() {
            DbBackend::Postgres => POSTGRES_SCHEMA,
            DbBackend::Sqlite => SQLITE_SCHEMA,
            other => {
                return Err(DbErr::Migration(format!(
                    "unsupported database backend: {other:?}"
                )))
            }
        };
        manager.get_connection().execute_unprepared(sql).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(DOWN_SQL)
            .await?;
        Ok(())
    }
}

/// Schema shared by the embedded store and the relational store's SQLite
/// mode. Timestamps are epoch milliseconds.
pub const SQLITE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS metrics_raw (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    metric_name TEXT NOT NULL,
    metric_value REAL NOT NULL,
    labels_json TEXT NOT NULL DEFAULT '{}',
    timestamp BIGINT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_metrics_raw_name_time ON metrics_raw(metric_name, timestamp);
CREATE INDEX IF NOT EXISTS idx_metrics_raw_time ON metrics_raw(timestamp);

CREATE TABLE IF NOT EXISTS metrics_hourly (
    hour BIGINT NOT NULL,
    metric_name TEXT NOT NULL,
    avg_value REAL NOT NULL,
    min_value REAL NOT NULL,
    max_value REAL NOT NULL,
    count BIGINT NOT NULL,
    UNIQUE(hour, metric_name)
);

CREATE TABLE IF NOT EXISTS daily_summaries (
    date TEXT NOT NULL UNIQUE,
    summary_json TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS alert_history (
    id TEXT PRIMARY KEY NOT NULL,
    rule_name TEXT NOT NULL,
    severity TEXT NOT NULL,
    category TEXT NOT NULL,
    message TEXT NOT NULL,
    metrics_snapshot_json TEXT NOT NULL DEFAULT '{}',
    timestamp BIGINT NOT NULL,
    resolved INTEGER NOT NULL DEFAULT 0,
    resolved_at BIGINT
);
CREATE INDEX IF NOT EXISTS idx_alert_history_time ON alert_history(timestamp);
CREATE INDEX IF NOT EXISTS idx_alert_history_resolved ON alert_history(resolved);
";

pub const POSTGRES_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS metrics_raw (
    id BIGSERIAL PRIMARY KEY,
    metric_name TEXT NOT NULL,
    metric_value DOUBLE PRECISION NOT NULL,
    labels_json TEXT NOT NULL DEFAULT '{}',
    timestamp BIGINT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_metrics_raw_name_time ON metrics_raw(metric_name, timestamp);
CREATE INDEX IF NOT EXISTS idx_metrics_raw_time ON metrics_raw(timestamp);

CREATE TABLE IF NOT EXISTS metrics_hourly (
    hour BIGINT NOT NULL,
    metric_name TEXT NOT NULL,
    avg_value DOUBLE PRECISION NOT NULL,
    min_value DOUBLE PRECISION NOT NULL,
    max_value DOUBLE PRECISION NOT NULL,
    count BIGINT NOT NULL,
    UNIQUE(hour, metric_name)
);

CREATE TABLE IF NOT EXISTS daily_summaries (
    date TEXT NOT NULL UNIQUE,
    summary_json TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS alert_history (
    id TEXT PRIMARY KEY NOT NULL,
    rule_name TEXT NOT NULL,
    severity TEXT NOT NULL,
    category TEXT NOT NULL,
    message TEXT NOT NULL,
    metrics_snapshot_json TEXT NOT NULL DEFAULT '{}',
    timestamp BIGINT NOT NULL,
    resolved INTEGER NOT NULL DEFAULT 0,
    resolved_at BIGINT
);
CREATE INDEX IF NOT EXISTS idx_alert_history_time ON alert_history(timestamp);
CREATE INDEX IF NOT EXISTS idx_alert_history_resolved ON alert_history(resolved);
";

const DOWN_SQL: &str = "
DROP TABLE IF EXISTS alert_history;
DROP TABLE IF EXISTS daily_summaries;
DROP TABLE IF EXISTS metrics_hourly;
DROP TABLE IF EXISTS metrics_raw;
";
