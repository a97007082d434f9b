//! Periodic jobs that run beside the collection loop: hourly roll-ups,
//! retention cleanup and the daily business reset.

use crate::health::HealthFlags;
use crate::state::{lock, Instruments};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use hearth_alert::engine::RuleEngine;
use hearth_collector::instrument::business::{next_reset_after, DailySummary};
use hearth_safety::SafetyController;
use hearth_storage::writer::PersistenceWriter;
use hearth_storage::{last_completed_hour, PersistenceAdapter};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::interval;

pub struct JobContext {
    pub storage: Arc<dyn PersistenceAdapter>,
    pub writer: PersistenceWriter,
    pub rules: Arc<Mutex<RuleEngine>>,
    pub safety: Arc<Mutex<SafetyController>>,
    pub instruments: Instruments,
    pub health: Arc<HealthFlags>,
    pub retention_days: u32,
    pub aggregation_interval: Duration,
    pub cleanup_interval: Duration,
    pub daily_reset_hour: u32,
}

/// Starts every job; each stops when `shutdown` flips.
pub fn spawn_all(ctx: JobContext, shutdown: &watch::Sender<bool>) -> Vec<JoinHandle<()>> {
    let ctx = Arc::new(ctx);
    vec![
        tokio::spawn(aggregation_job(ctx.clone(), shutdown.subscribe())),
        tokio::spawn(cleanup_job(ctx.clone(), shutdown.subscribe())),
        tokio::spawn(daily_reset_job(ctx, shutdown.subscribe())),
    ]
}

fn record_query(ctx: &JobContext, operation: &str, started: Instant, ok: bool, now: DateTime<Utc>) {
    let ms = started.elapsed().as_secs_f64() * 1000.0;
    ctx.instruments.db.record_query(operation, ms, ok, now);
}

/// Rolls up the last completed hour. Returns the number of metrics written.
pub async fn run_aggregation(ctx: &JobContext, now: DateTime<Utc>) -> Option<usize> {
    let hour = last_completed_hour(now);
    let started = Instant::now();
    let result = ctx.storage.aggregate_hourly_at(hour).await;
    record_query(ctx, "aggregate_hourly", started, result.is_ok(), now);
    match result {
        Ok(metrics) => {
            tracing::info!(hour = %hour, metrics, "Hourly aggregation finished");
            ctx.health.storage.mark_healthy(now);
            Some(metrics)
        }
        Err(e) => {
            tracing::error!(hour = %hour, error = %e, "Hourly aggregation failed");
            ctx.health.storage.mark_failed(e.to_string());
            None
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    pub raw_rows: u64,
    pub suppressions: usize,
    pub safety_entries: usize,
    pub backups: usize,
}

/// Drops expired raw rows, suppression entries, retry state and surplus
/// backups.
pub async fn run_cleanup(ctx: &JobContext, now: DateTime<Utc>) -> CleanupReport {
    let mut report = CleanupReport::default();

    let cutoff = now - ChronoDuration::days(ctx.retention_days as i64);
    let started = Instant::now();
    let result = ctx.storage.cleanup_before(cutoff).await;
    record_query(ctx, "cleanup", started, result.is_ok(), now);
    match result {
        Ok(removed) => {
            report.raw_rows = removed;
            ctx.health.storage.mark_healthy(now);
        }
        Err(e) => {
            tracing::error!(error = %e, "Raw metric cleanup failed");
            ctx.health.storage.mark_failed(e.to_string());
        }
    }

    report.suppressions = lock(&ctx.rules).prune_expired(now);
    report.safety_entries = lock(&ctx.safety).prune(now);

    let backups = lock(&ctx.safety).backups();
    match backups.prune().await {
        Ok(removed) => report.backups = removed,
        Err(e) => tracing::error!(error = %e, "Backup pruning failed"),
    }

    tracing::info!(
        raw_rows = report.raw_rows,
        suppressions = report.suppressions,
        safety_entries = report.safety_entries,
        backups = report.backups,
        "Cleanup finished"
    );
    report
}

/// Closes the business day and queues its summary for persistence.
pub fn run_daily_reset(ctx: &JobContext, now: DateTime<Utc>) -> DailySummary {
    let summary = ctx.instruments.business.reset_daily(now);
    match serde_json::to_value(&summary) {
        Ok(json) => {
            ctx.writer.submit_daily_summary(summary.date, json);
        }
        Err(e) => tracing::error!(date = %summary.date, error = %e, "Failed to encode daily summary"),
    }
    summary
}

async fn aggregation_job(ctx: Arc<JobContext>, mut shutdown: watch::Receiver<bool>) {
    let mut tick = interval(ctx.aggregation_interval);
    loop {
        tokio::select! {
            _ = tick.tick() => {
                run_aggregation(&ctx, Utc::now()).await;
            }
            _ = shutdown.changed() => break,
        }
    }
    tracing::debug!("Aggregation job stopped");
}

async fn cleanup_job(ctx: Arc<JobContext>, mut shutdown: watch::Receiver<bool>) {
    let mut tick = interval(ctx.cleanup_interval);
    loop {
        tokio::select! {
            _ = tick.tick() => {
                run_cleanup(&ctx, Utc::now()).await;
            }
            _ = shutdown.changed() => break,
        }
    }
    tracing::debug!("Cleanup job stopped");
}

async fn daily_reset_job(ctx: Arc<JobContext>, mut shutdown: watch::Receiver<bool>) {
    loop {
        let now = Utc::now();
        let next = next_reset_after(now, ctx.daily_reset_hour);
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        tracing::debug!(next = %next, "Next business reset scheduled");
        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                run_daily_reset(&ctx, Utc::now());
            }
            _ = shutdown.changed() => break,
        }
    }
    tracing::debug!("Daily reset job stopped");
}
