#![allow(dead_code)]

use anyhow::Result;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use hearth_common::types::Severity;
use hearth_notify::config::FileConfig;
use hearth_server::app;
use hearth_server::config::HearthConfig;
use hearth_server::monitor::Monitor;
use hearth_server::state::AppState;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::PathBuf;
use tempfile::TempDir;
use tower::util::ServiceExt;

pub struct TestContext {
    pub temp_dir: TempDir,
    pub monitor: Monitor,
    pub state: AppState,
    pub app: axum::Router,
}

impl TestContext {
    pub fn alert_log(&self) -> PathBuf {
        self.temp_dir.path().join("alerts.log")
    }
}

/// Config rooted in `dir`: no host collectors, file notifications only and
/// a collection interval long enough that tests drive every tick.
pub fn test_config(dir: &std::path::Path) -> HearthConfig {
    let mut config = HearthConfig::default();
    config.server.shutdown_grace_secs = 5;
    config.collector.system_collectors = false;
    config.collector.interval_secs = 3600;
    config.notify.console = false;
    config.notify.file = Some(FileConfig {
        path: dir.join("alerts.log"),
        min_severity: Severity::Info,
    });
    config.storage.sqlite_path = dir.join("hearth.db");
    config.safety.backup_dir = dir.join("backups");
    config
}

pub async fn build_test_context() -> Result<TestContext> {
    hearth_common::id::init(1, 1);

    let temp_dir = tempfile::tempdir()?;
    let config = test_config(temp_dir.path());

    let mut monitor = Monitor::initialize(config).await?;
    monitor.start()?;
    let state = monitor.state();
    let app = app::build_http_app(state.clone());

    Ok(TestContext {
        temp_dir,
        monitor,
        state,
        app,
    })
}

async fn read_response(resp: axum::response::Response) -> (StatusCode, Value, Option<String>) {
    let status = resp.status();
    let trace_id = resp
        .headers()
        .get("x-trace-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };
    (status, json, trace_id)
}

pub async fn request_json(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value, Option<String>) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.unwrap_or(Value::Null).to_string()))
        .expect("request should build");

    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");
    read_response(resp).await
}

pub async fn request_no_body(
    app: &axum::Router,
    method: &str,
    uri: &str,
) -> (StatusCode, Value, Option<String>) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");

    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");
    read_response(resp).await
}

/// Raw body and content type, for the unenveloped scrape endpoint.
pub async fn request_text(app: &axum::Router, uri: &str) -> (StatusCode, String, Option<String>) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");

    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");
    let status = resp.status();
    let content_type = resp
        .headers()
        .get("content-type")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    (status, String::from_utf8_lossy(&bytes).to_string(), content_type)
}

pub fn assert_ok_envelope(json: &Value) {
    assert_eq!(json["err_code"], 0, "unexpected envelope: {json}");
    assert!(json["trace_id"].as_str().is_some_and(|s| !s.is_empty()));
}

pub fn assert_err_envelope(json: &Value, code: i64) {
    assert_eq!(json["err_code"], code, "unexpected envelope: {json}");
    assert!(json["data"].is_null());
}

pub fn decode_data<T: DeserializeOwned>(json: &Value) -> T {
    serde_json::from_value(json["data"].clone()).expect("data should decode")
}
