//! Owns every subsystem and their background tasks.
//!
//! [`Monitor::initialize`] builds the components, [`Monitor::start`] spawns
//! the collection loop, the dispatch task, the persistence writer and the
//! periodic jobs, and [`Monitor::shutdown`] stops them in dependency order:
//! producers first, then the queues they feed, each within the configured
//! grace period.

use crate::config::HearthConfig;
use crate::health::HealthFlags;
use crate::jobs::{self, JobContext};
use crate::state::{lock, AppState, Instruments, MetricHandle};
use anyhow::Context;
use chrono::{DateTime, Utc};
use hearth_alert::defaults::default_rules;
use hearth_alert::engine::RuleEngine;
use hearth_collector::instrument::{
    BusinessInstrumentation, CacheInstrumentation, DbInstrumentation, HttpInstrumentation,
};
use hearth_collector::sampler::{MetricSampler, SampleReport};
use hearth_collector::series::MetricStore;
use hearth_collector::MetricSink;
use hearth_common::health::ComponentHealth;
use hearth_common::types::{Alert, MetricSample, MetricsSnapshot};
use hearth_notify::dispatcher::AlertDispatcher;
use hearth_safety::safe_mode::SystemSignals;
use hearth_safety::SafetyController;
use hearth_storage::writer::{PersistenceWriter, WriteWorker};
use std::sync::{Arc, Mutex, TryLockError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Fired alerts and escalation notices waiting for delivery.
const ALERT_QUEUE_SIZE: usize = 256;

/// Outcome of one collection tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub samples: usize,
    pub alerts: usize,
    pub collector_failures: usize,
    pub safe_mode: bool,
}

/// Everything the collection loop mutates. Only the loop (or a test driving
/// [`Monitor::tick`]) runs a cycle.
struct Cycle {
    sampler: Arc<Mutex<MetricSampler>>,
    ingest: tokio::sync::Mutex<mpsc::Receiver<MetricSample>>,
    metrics: Arc<Mutex<MetricStore>>,
    snapshot: watch::Sender<Arc<MetricsSnapshot>>,
    rules: Arc<Mutex<RuleEngine>>,
    safety: Arc<Mutex<SafetyController>>,
    writer: PersistenceWriter,
    alerts: mpsc::Sender<Alert>,
    health: Arc<HealthFlags>,
    sample_timeout: Duration,
}

impl Cycle {
    /// Runs the sampler on a blocking thread, bounded by the sample timeout.
    /// A pass that overruns keeps the sampler locked; later ticks skip
    /// sampling until it finishes.
    async fn sample(&self, now: DateTime<Utc>) -> Option<SampleReport> {
        let sampler = self.sampler.clone();
        let task = tokio::task::spawn_blocking(move || match sampler.try_lock() {
            Ok(mut guard) => Some(guard.sample(now)),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner().sample(now)),
            Err(TryLockError::WouldBlock) => None,
        });

        match tokio::time::timeout(self.sample_timeout, task).await {
            Ok(Ok(Some(report))) => Some(report),
            Ok(Ok(None)) => {
                tracing::warn!("Previous sampling pass still running, skipping");
                self.health.collector.mark_failed("sampling overran its interval");
                None
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Sampling task failed");
                self.health.collector.mark_failed(e.to_string());
                None
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.sample_timeout.as_secs(),
                    "Sampling timed out"
                );
                self.health.collector.mark_failed("sampling timed out");
                None
            }
        }
    }

    async fn run(&self, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::default();

        let mut samples = match self.sample(now).await {
            Some(sampled) => {
                report.collector_failures = sampled.failures.len();
                self.health.collector.mark_healthy(now);
                sampled.samples
            }
            None => Vec::new(),
        };
        {
            let mut rx = self.ingest.lock().await;
            while let Ok(sample) = rx.try_recv() {
                samples.push(sample);
            }
        }
        report.samples = samples.len();

        let snapshot = {
            let mut metrics = lock(&self.metrics);
            metrics.extend(samples.iter().cloned());
            Arc::new(metrics.snapshot(now))
        };
        self.snapshot.send_replace(snapshot.clone());
        self.writer.submit_samples(samples);

        let alerts = lock(&self.rules).check_metrics(&snapshot, now);
        report.alerts = alerts.len();
        for alert in alerts {
            if let Err(e) = self.alerts.try_send(alert) {
                tracing::warn!(error = %e, "Alert queue unavailable, alert dropped");
            }
        }

        let signals = SystemSignals {
            memory_fraction: snapshot.value("memory.used_percent").map(|v| v / 100.0),
            error_rate_fraction: snapshot.value("http.error_rate").map(|v| v / 100.0),
        };
        report.safe_mode = lock(&self.safety).evaluate_safe_mode(&signals, now);
        if report.safe_mode {
            self.health.safety.mark_failed("safe mode active");
        } else {
            self.health.safety.mark_healthy(now);
        }

        tracing::debug!(
            samples = report.samples,
            alerts = report.alerts,
            collector_failures = report.collector_failures,
            "Collection tick finished"
        );
        report
    }
}

pub struct Monitor {
    config: Arc<HearthConfig>,
    state: AppState,
    cycle: Option<Arc<Cycle>>,
    write_worker: Option<WriteWorker>,
    alert_rx: Option<mpsc::Receiver<Alert>>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    dispatch: Option<(oneshot::Sender<()>, JoinHandle<()>)>,
    writer_task: Option<JoinHandle<()>>,
}

impl Monitor {
    /// Builds every component from `config`. Nothing runs until
    /// [`Monitor::start`].
    pub async fn initialize(config: HearthConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        let health = Arc::new(HealthFlags::new());
        let now = Utc::now();

        let storage = hearth_storage::open(&config.storage)
            .await
            .context("failed to open metric storage")?;
        let dispatcher = Arc::new(AlertDispatcher::from_config(&config.notify)?);

        let mut rules = RuleEngine::with_rules(
            config.alert.suppression.clone(),
            default_rules(&config.alert.thresholds),
        )?;
        for spec in &config.alert.rules {
            rules.add_rule(Box::new(spec.build()?))?;
            if !spec.enabled {
                rules.set_enabled(&spec.name, false)?;
            }
        }
        tracing::info!(rules = rules.len(), "Alert rules loaded");

        let (alert_tx, alert_rx) = mpsc::channel(ALERT_QUEUE_SIZE);
        let safety = SafetyController::new(config.safety.clone()).with_notices(alert_tx.clone());

        let (ingest, ingest_rx) = MetricHandle::new(config.collector.queue_size);
        let sink: Arc<dyn MetricSink> = Arc::new(ingest.clone());
        let window = config.collector.instrument_window;
        let instruments = Instruments {
            http: Arc::new(HttpInstrumentation::new(window, Some(sink.clone()))),
            db: Arc::new(DbInstrumentation::new(
                window,
                config.collector.slow_query_ms,
                Some(sink.clone()),
            )),
            cache: Arc::new(CacheInstrumentation::new(window, Some(sink.clone()))),
            business: Arc::new(BusinessInstrumentation::new(now, Some(sink))),
        };

        let mut sampler = if config.collector.system_collectors {
            MetricSampler::with_system_collectors(config.collector.link_speed_mbps)
        } else {
            MetricSampler::new()
        };
        sampler.register(Box::new(instruments.http.clone()));
        sampler.register(Box::new(instruments.db.clone()));
        sampler.register(Box::new(instruments.cache.clone()));
        sampler.register(Box::new(instruments.business.clone()));
        tracing::info!(collectors = ?sampler.collector_names(), "Sampler ready");

        let (writer, write_worker) =
            PersistenceWriter::channel(config.storage.queue_size, health.storage.clone());
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(MetricsSnapshot::new(now, Vec::new())));

        let metrics = Arc::new(Mutex::new(MetricStore::new(config.collector.buffer_capacity)));
        let rules = Arc::new(Mutex::new(rules));
        let safety = Arc::new(Mutex::new(safety));

        let cycle = Arc::new(Cycle {
            sampler: Arc::new(Mutex::new(sampler)),
            ingest: tokio::sync::Mutex::new(ingest_rx),
            metrics: metrics.clone(),
            snapshot: snapshot_tx,
            rules: rules.clone(),
            safety: safety.clone(),
            writer,
            alerts: alert_tx,
            health: health.clone(),
            sample_timeout: Duration::from_secs(config.collector.sample_timeout_secs.max(1)),
        });

        let state = AppState {
            metrics,
            snapshot: snapshot_rx,
            rules,
            dispatcher,
            storage,
            safety,
            instruments,
            ingest,
            health,
            start_time: now,
            config: config.clone(),
        };

        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            config,
            state,
            cycle: Some(cycle),
            write_worker: Some(write_worker),
            alert_rx: Some(alert_rx),
            shutdown,
            tasks: Vec::new(),
            dispatch: None,
            writer_task: None,
        })
    }

    /// Handle for the HTTP surface and embedding application code.
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    pub fn instruments(&self) -> &Instruments {
        &self.state.instruments
    }

    /// Spawns the background tasks on the current runtime.
    pub fn start(&mut self) -> anyhow::Result<()> {
        let cycle = self
            .cycle
            .clone()
            .context("monitor has already been shut down")?;
        let worker = self
            .write_worker
            .take()
            .context("monitor has already been started")?;

        let write_timeout = Duration::from_millis(self.config.storage.write_timeout_ms);
        self.writer_task = Some(tokio::spawn(
            worker.run(self.state.storage.clone(), write_timeout),
        ));

        if let Some(rx) = self.alert_rx.take() {
            let (stop_tx, stop_rx) = oneshot::channel();
            let handle = tokio::spawn(run_dispatch(
                rx,
                self.state.dispatcher.clone(),
                cycle.writer.clone(),
                self.state.health.notify.clone(),
                stop_rx,
            ));
            self.dispatch = Some((stop_tx, handle));
        }

        let period = Duration::from_secs(self.config.collector.interval_secs.max(1));
        self.tasks.push(tokio::spawn(collection_loop(
            cycle.clone(),
            period,
            self.shutdown.subscribe(),
        )));

        let storage_config = &self.config.storage;
        let ctx = JobContext {
            storage: self.state.storage.clone(),
            writer: cycle.writer.clone(),
            rules: self.state.rules.clone(),
            safety: self.state.safety.clone(),
            instruments: self.state.instruments.clone(),
            health: self.state.health.clone(),
            retention_days: storage_config.retention_days,
            aggregation_interval: Duration::from_secs(storage_config.aggregation_interval_secs.max(1)),
            cleanup_interval: Duration::from_secs(storage_config.cleanup_interval_secs.max(1)),
            daily_reset_hour: self.config.business.daily_reset_hour,
        };
        self.tasks.extend(jobs::spawn_all(ctx, &self.shutdown));

        tracing::info!(
            interval_secs = period.as_secs(),
            backend = self.state.storage.backend_name(),
            "Monitor started"
        );
        Ok(())
    }

    /// Runs one collection cycle immediately.
    pub async fn tick(&self, now: DateTime<Utc>) -> TickReport {
        match &self.cycle {
            Some(cycle) => cycle.run(now).await,
            None => TickReport::default(),
        }
    }

    /// Stops the loop and jobs, then drains the alert and write queues.
    /// Tasks that do not finish within the grace period are aborted.
    pub async fn shutdown(mut self) {
        let grace = Duration::from_secs(self.config.server.shutdown_grace_secs);
        tracing::info!(grace_secs = grace.as_secs(), "Monitor shutting down");

        let _ = self.shutdown.send(true);
        for handle in std::mem::take(&mut self.tasks) {
            join_within(handle, grace, "background").await;
        }

        // Last writer handles: the cycle's and the dispatch task's.
        drop(self.cycle.take());
        if let Some((stop, handle)) = self.dispatch.take() {
            let _ = stop.send(());
            join_within(handle, grace, "dispatch").await;
        }
        drop(self.alert_rx.take());
        drop(self.write_worker.take());
        if let Some(handle) = self.writer_task.take() {
            join_within(handle, grace, "persistence writer").await;
        }
        tracing::info!("Monitor stopped");
    }
}

async fn join_within(mut handle: JoinHandle<()>, grace: Duration, task: &str) {
    match tokio::time::timeout(grace, &mut handle).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(task, error = %e, "Task ended abnormally"),
        Err(_) => {
            tracing::warn!(task, "Task did not stop within grace period, aborting");
            handle.abort();
        }
    }
}

async fn collection_loop(cycle: Arc<Cycle>, period: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                cycle.run(Utc::now()).await;
            }
            _ = shutdown.changed() => break,
        }
    }
    tracing::info!("Collection loop stopped");
}

async fn run_dispatch(
    mut rx: mpsc::Receiver<Alert>,
    dispatcher: Arc<AlertDispatcher>,
    writer: PersistenceWriter,
    health: Arc<ComponentHealth>,
    mut stop: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            alert = rx.recv() => match alert {
                Some(alert) => deliver(&dispatcher, &writer, &health, alert).await,
                None => break,
            },
            _ = &mut stop => {
                while let Ok(alert) = rx.try_recv() {
                    deliver(&dispatcher, &writer, &health, alert).await;
                }
                break;
            }
        }
    }
    tracing::info!("Alert dispatch stopped");
}

async fn deliver(
    dispatcher: &AlertDispatcher,
    writer: &PersistenceWriter,
    health: &ComponentHealth,
    alert: Alert,
) {
    tracing::info!(
        rule = %alert.rule_name,
        severity = %alert.severity,
        id = %alert.id,
        "Alert fired"
    );
    writer.submit_alert(alert.clone());
    let report = dispatcher.send(&alert).await;
    if report.all_delivered() {
        health.mark_healthy(Utc::now());
    } else {
        let failed: Vec<&str> = report.failed.iter().map(|(name, _)| name.as_str()).collect();
        health.mark_failed(format!("delivery failed on {}", failed.join(", ")));
    }
}
