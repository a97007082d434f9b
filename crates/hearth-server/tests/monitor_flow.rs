mod common;

use axum::http::StatusCode;
use chrono::Utc;
use common::{build_test_context, decode_data, request_json, request_no_body};
use hearth_collector::MetricSink;
use hearth_common::types::{MetricSample, Severity};
use hearth_server::jobs::{self, JobContext};
use hearth_storage::writer::PersistenceWriter;
use serde_json::{json, Value};
use std::time::Duration;

#[tokio::test]
async fn submitted_cpu_sample_fires_one_persisted_alert() {
    let ctx = build_test_context().await.expect("context should build");

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/metrics",
        Some(json!({ "name": "cpu.usage", "value": 90.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED, "{body}");

    let first = ctx.monitor.tick(Utc::now()).await;
    assert_eq!(first.alerts, 1);
    assert!(!first.safe_mode);

    // Same value again, inside the suppression window.
    let second = ctx.monitor.tick(Utc::now()).await;
    assert_eq!(second.alerts, 0);

    let storage = ctx.state.storage.clone();
    let log_path = ctx.alert_log();
    ctx.monitor.shutdown().await;

    let history = storage
        .get_alert_history(10, None)
        .await
        .expect("history should load");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].rule_name, "HighCPUUsage");
    assert_eq!(history[0].severity, Severity::Warning);
    assert_eq!(history[0].category, "system");

    let log = std::fs::read_to_string(&log_path).expect("alert log should exist");
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 1);
    let line: Value = serde_json::from_str(lines[0]).expect("log line should be json");
    assert_eq!(line["rule_name"], "HighCPUUsage");
    assert_eq!(line["severity"], "warning");
}

#[tokio::test]
async fn runtime_rule_fires_on_submitted_metric() {
    let ctx = build_test_context().await.expect("context should build");

    let (status, _, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/rules",
        Some(json!({
            "name": "QueueBacklog",
            "metric": "queue.depth",
            "operator": ">",
            "threshold": 10.0,
            "severity": "critical",
            "category": "queue"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/metrics",
        Some(json!({ "name": "queue.depth", "value": 25.0, "labels": { "queue": "imports" } })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let report = ctx.monitor.tick(Utc::now()).await;
    assert_eq!(report.alerts, 1);

    let (status, body, _) = request_no_body(&ctx.app, "GET", "/v1/metrics/latest").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["queue.depth{queue=imports}"]["value"], 25.0);

    let storage = ctx.state.storage.clone();
    let dispatcher = ctx.state.dispatcher.clone();
    ctx.monitor.shutdown().await;

    let critical = storage
        .get_alert_history(10, Some(Severity::Critical))
        .await
        .expect("history should load");
    assert_eq!(critical.len(), 1);
    assert_eq!(critical[0].rule_name, "QueueBacklog");
    assert_eq!(critical[0].category, "queue");

    let recent = dispatcher.history(10, None);
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].id, critical[0].id);
}

#[tokio::test]
async fn critical_errors_escalate_through_the_alert_path() {
    let ctx = build_test_context().await.expect("context should build");

    let mut escalation = Value::Null;
    for _ in 0..5 {
        let (status, body, _) =
            request_no_body(&ctx.app, "POST", "/v1/safety/errors/database").await;
        assert_eq!(status, StatusCode::OK);
        escalation = body["data"]["escalation"].clone();
    }
    assert_eq!(escalation["component"], "database");
    assert_eq!(escalation["count"], 5);
    let id = escalation["id"].as_str().expect("escalation id").to_string();

    // A sixth error inside the same burst does not notify again.
    let (_, body, _) = request_no_body(&ctx.app, "POST", "/v1/safety/errors/database").await;
    assert!(body["data"]["escalation"].is_null());

    let (status, _, _) = request_no_body(
        &ctx.app,
        "POST",
        &format!("/v1/safety/escalations/{id}/ack"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let storage = ctx.state.storage.clone();
    ctx.monitor.shutdown().await;

    let history = storage
        .get_alert_history(10, None)
        .await
        .expect("history should load");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].rule_name, "SafetyEscalation");
    assert_eq!(history[0].severity, Severity::Critical);
}

#[tokio::test]
async fn daily_reset_persists_business_summary() {
    let ctx = build_test_context().await.expect("context should build");
    let state = ctx.state.clone();

    for success in [true, true, false] {
        let (status, _, _) = request_json(
            &ctx.app,
            "POST",
            "/v1/business/events",
            Some(json!({ "event": "recipe.import", "success": success })),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
    }

    let (writer, worker) = PersistenceWriter::channel(16, state.health.storage.clone());
    let worker = tokio::spawn(worker.run(state.storage.clone(), Duration::from_secs(2)));
    let job_ctx = JobContext {
        storage: state.storage.clone(),
        writer,
        rules: state.rules.clone(),
        safety: state.safety.clone(),
        instruments: state.instruments.clone(),
        health: state.health.clone(),
        retention_days: 30,
        aggregation_interval: Duration::from_secs(3600),
        cleanup_interval: Duration::from_secs(3600),
        daily_reset_hour: 0,
    };

    let summary = jobs::run_daily_reset(&job_ctx, Utc::now());
    assert_eq!(summary.total, 3);
    assert_eq!(summary.failures, 1);
    assert_eq!(state.instruments.business.tally("recipe.import").total, 0);

    assert!(jobs::run_aggregation(&job_ctx, Utc::now()).await.is_some());
    let cleanup = jobs::run_cleanup(&job_ctx, Utc::now()).await;
    assert_eq!(cleanup.backups, 0);

    drop(job_ctx);
    worker.await.expect("writer should drain");

    let (status, body, _) = request_no_body(
        &ctx.app,
        "GET",
        &format!("/v1/business/summary/{}", summary.date),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let stored: Value = decode_data(&body);
    assert_eq!(stored["total"], 3);
    assert_eq!(stored["failures"], 1);
    assert_eq!(stored["events"]["recipe.import"]["failures"], 1);

    ctx.monitor.shutdown().await;
}

#[tokio::test]
async fn ingest_survives_shutdown_of_monitor() {
    let ctx = build_test_context().await.expect("context should build");
    let handle = ctx.state.ingest.clone();
    ctx.monitor.shutdown().await;

    // The receiver is gone; submitting must neither block nor panic.
    handle.submit(MetricSample::new("late.sample", 1.0, Utc::now()));
    assert_eq!(handle.dropped(), 1);
}
