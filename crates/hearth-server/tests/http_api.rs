mod common;

use axum::http::StatusCode;
use chrono::Utc;
use common::{
    assert_err_envelope, assert_ok_envelope, build_test_context, decode_data, request_json,
    request_no_body, request_text,
};
use serde_json::{json, Value};

#[tokio::test]
async fn metrics_endpoint_renders_prometheus_text() {
    let ctx = build_test_context().await.expect("context should build");

    let submissions = [
        json!({ "name": "cpu.usage", "value": 42.5 }),
        json!({ "name": "disk.used_percent", "value": 60.0, "labels": { "mount": "/data" } }),
    ];
    for submission in submissions {
        let (status, _, _) = request_json(&ctx.app, "POST", "/v1/metrics", Some(submission)).await;
        assert_eq!(status, StatusCode::ACCEPTED);
    }
    ctx.monitor.tick(Utc::now()).await;

    let (status, body, content_type) = request_text(&ctx.app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.is_some_and(|ct| ct.starts_with("text/plain; version=0.0.4")));
    assert!(body.contains("# HELP hearth_cpu_usage cpu.usage\n"));
    assert!(body.contains("# TYPE hearth_cpu_usage gauge\n"));
    assert!(body.contains("\nhearth_cpu_usage 42.5\n"));
    assert!(body.contains("hearth_disk_used_percent{mount=\"/data\"} 60\n"));

    ctx.monitor.shutdown().await;
}

#[tokio::test]
async fn health_reports_components_and_degrades_on_safe_mode() {
    let ctx = build_test_context().await.expect("context should build");

    let (status, body, _) = request_no_body(&ctx.app, "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["overall"], "healthy");
    for component in ["collector", "storage", "notify", "safety"] {
        assert_eq!(body["components"][component]["healthy"], true, "{component}");
    }

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/safety/safe-mode",
        Some(json!({ "active": true, "reason": "maintenance" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["err_msg"], "updated");

    let (status, body, _) = request_no_body(&ctx.app, "GET", "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["overall"], "unhealthy");
    assert_eq!(body["components"]["safety"]["last_error"], "safe mode active");

    let (_, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/safety/safe-mode",
        Some(json!({ "active": false })),
    )
    .await;
    assert_eq!(body["err_msg"], "updated");
    let (status, _, _) = request_no_body(&ctx.app, "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);

    ctx.monitor.shutdown().await;
}

#[tokio::test]
async fn metric_submission_validates_input() {
    let ctx = build_test_context().await.expect("context should build");

    let (status, body, trace_id) = request_json(
        &ctx.app,
        "POST",
        "/v1/metrics",
        Some(json!({ "name": "  ", "value": 1.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body, 1001);
    assert_eq!(body["trace_id"].as_str(), trace_id.as_deref());

    let uri = "/v1/metrics/hourly?name=cpu.usage&from=2026-01-02T00:00:00Z&to=2026-01-01T00:00:00Z";
    let (status, body, _) = request_no_body(&ctx.app, "GET", uri).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body, 1001);

    ctx.monitor.shutdown().await;
}

#[tokio::test]
async fn live_query_surface_after_tick() {
    let ctx = build_test_context().await.expect("context should build");

    for value in [10.0, 20.0, 30.0] {
        let (status, _, _) = request_json(
            &ctx.app,
            "POST",
            "/v1/metrics",
            Some(json!({ "name": "jobs.pending", "value": value })),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
    }
    ctx.monitor.tick(Utc::now()).await;

    let (status, body, _) = request_no_body(&ctx.app, "GET", "/v1/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert_ok_envelope(&body);
    let keys: Vec<String> = decode_data(&body);
    assert!(keys.contains(&"jobs.pending".to_string()));

    let (status, body, _) =
        request_no_body(&ctx.app, "GET", "/v1/metrics/history?key=jobs.pending&n=2").await;
    assert_eq!(status, StatusCode::OK);
    let values: Vec<f64> = body["data"]
        .as_array()
        .expect("history should be a list")
        .iter()
        .filter_map(|s| s["value"].as_f64())
        .collect();
    assert_eq!(values, vec![20.0, 30.0]);

    let (status, body, _) = request_no_body(&ctx.app, "GET", "/v1/metrics/snapshot").await;
    assert_eq!(status, StatusCode::OK);
    let samples = body["data"]["samples"].as_array().expect("snapshot samples");
    assert!(samples
        .iter()
        .any(|s| s["name"] == "jobs.pending" && s["value"] == 30.0));

    ctx.monitor.shutdown().await;
}

#[tokio::test]
async fn rule_management_round_trip() {
    let ctx = build_test_context().await.expect("context should build");
    let spec = json!({
        "name": "SlowImports",
        "metric": "db.query_p95_ms",
        "operator": ">",
        "threshold": 500.0,
        "severity": "warning"
    });

    let (status, body, _) = request_json(&ctx.app, "POST", "/v1/rules", Some(spec.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_ok_envelope(&body);
    assert_eq!(body["data"]["category"], "custom");

    let (status, body, _) = request_json(&ctx.app, "POST", "/v1/rules", Some(spec)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_err_envelope(&body, 1005);

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/rules",
        Some(json!({
            "name": "Broken",
            "metric": "x",
            "operator": "~",
            "threshold": 1.0,
            "severity": "info"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body, 1001);

    let (status, _, _) = request_json(
        &ctx.app,
        "PUT",
        "/v1/rules/SlowImports/enabled",
        Some(json!({ "enabled": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body, _) = request_no_body(&ctx.app, "GET", "/v1/rules").await;
    let rules: Vec<Value> = decode_data(&body);
    let slow = rules
        .iter()
        .find(|r| r["name"] == "SlowImports")
        .expect("rule should be listed");
    assert_eq!(slow["enabled"], false);
    assert!(rules.iter().any(|r| r["name"] == "HighCPUUsage"));

    let (status, _, _) = request_no_body(&ctx.app, "DELETE", "/v1/rules/SlowImports").await;
    assert_eq!(status, StatusCode::OK);
    let (status, body, _) = request_no_body(&ctx.app, "DELETE", "/v1/rules/SlowImports").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_err_envelope(&body, 1004);

    ctx.monitor.shutdown().await;
}

#[tokio::test]
async fn repair_admission_respects_budget_and_safe_mode() {
    let ctx = build_test_context().await.expect("context should build");

    for _ in 0..3 {
        let (status, body, _) =
            request_no_body(&ctx.app, "POST", "/v1/safety/repairs/database").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["allowed"], true);
    }
    let (_, body, _) = request_no_body(&ctx.app, "POST", "/v1/safety/repairs/database").await;
    assert_eq!(body["data"]["allowed"], false);
    assert_eq!(body["data"]["reason"], "max_retries");

    let (_, body, _) = request_no_body(&ctx.app, "GET", "/v1/safety/status").await;
    assert_eq!(body["data"]["attempts"]["database"], 3);
    assert_eq!(body["data"]["safe_mode"]["active"], false);

    let (_, _, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/safety/safe-mode",
        Some(json!({ "active": true })),
    )
    .await;
    let (_, body, _) = request_no_body(&ctx.app, "POST", "/v1/safety/repairs/redis").await;
    assert_eq!(body["data"]["allowed"], false);
    assert_eq!(body["data"]["reason"], "safe_mode");

    let (_, body, _) = request_no_body(&ctx.app, "GET", "/v1/safety/status").await;
    assert_eq!(body["data"]["safe_mode"]["active"], true);
    assert_eq!(body["data"]["safe_mode"]["reason"], "manual");

    let (status, body, _) =
        request_no_body(&ctx.app, "POST", "/v1/safety/escalations/123/ack").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_err_envelope(&body, 1004);

    ctx.monitor.shutdown().await;
}

#[tokio::test]
async fn backups_create_list_restore() {
    let ctx = build_test_context().await.expect("context should build");

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/safety/backups",
        Some(json!({
            "component": "redis",
            "payload": { "maxmemory": "512mb" },
            "metadata": { "reason": "before flush" }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let id = body["data"]["id"].as_str().expect("backup id").to_string();
    assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));

    let (_, body, _) = request_no_body(&ctx.app, "GET", "/v1/safety/backups").await;
    let list: Vec<Value> = decode_data(&body);
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["component"], "redis");

    let (status, body, _) =
        request_no_body(&ctx.app, "GET", &format!("/v1/safety/backups/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["payload"]["maxmemory"], "512mb");
    assert_eq!(body["data"]["metadata"]["reason"], "before flush");

    let (status, body, _) = request_no_body(&ctx.app, "GET", "/v1/safety/backups/bad.id").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body, 1001);

    let (status, body, _) = request_no_body(&ctx.app, "GET", "/v1/safety/backups/999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_err_envelope(&body, 1004);

    ctx.monitor.shutdown().await;
}

#[tokio::test]
async fn business_summary_lookup_errors() {
    let ctx = build_test_context().await.expect("context should build");

    let (status, body, _) =
        request_no_body(&ctx.app, "GET", "/v1/business/summary/yesterday").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body, 1001);

    let (status, body, _) =
        request_no_body(&ctx.app, "GET", "/v1/business/summary/2020-01-01").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_err_envelope(&body, 1004);

    let (status, _, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/instrument/cache",
        Some(json!({ "op": "get", "hit": true })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(ctx.state.instruments.cache.hit_rate(), 100.0);

    ctx.monitor.shutdown().await;
}
