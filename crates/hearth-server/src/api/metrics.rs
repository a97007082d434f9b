use crate::api::{error_response, success_empty_response, success_response};
use crate::logging::TraceId;
use crate::state::{lock, AppState};
use axum::extract::{Extension, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Duration, Utc};
use hearth_collector::MetricSink;
use hearth_common::types::{Labels, MetricSample};
use serde::Deserialize;
use std::collections::BTreeMap;

const DEFAULT_HISTORY: usize = 100;
const DEFAULT_STATS_HOURS: u32 = 24;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/metrics", get(list_series).post(submit_metric))
        .route("/v1/metrics/latest", get(latest))
        .route("/v1/metrics/history", get(history))
        .route("/v1/metrics/snapshot", get(snapshot))
        .route("/v1/metrics/stored/latest", get(stored_latest))
        .route("/v1/metrics/stats", get(stats))
        .route("/v1/metrics/hourly", get(hourly))
}

/// Live series keys, sorted.
async fn list_series(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> Response {
    let keys = lock(&state.metrics).series_keys();
    success_response(StatusCode::OK, &trace_id, keys)
}

#[derive(Debug, Deserialize)]
pub struct SubmitMetricRequest {
    pub name: String,
    pub value: f64,
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Queues a sample for the next tick. Never waits on the collection loop.
async fn submit_metric(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Json(req): Json<SubmitMetricRequest>,
) -> Response {
    if req.name.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, &trace_id, "bad_request", "name must not be empty");
    }
    if !req.value.is_finite() {
        return error_response(StatusCode::BAD_REQUEST, &trace_id, "bad_request", "value must be finite");
    }
    let timestamp = req.timestamp.unwrap_or_else(Utc::now);
    state
        .ingest
        .submit(MetricSample::with_labels(req.name, req.value, req.labels, timestamp));
    success_empty_response(StatusCode::ACCEPTED, &trace_id, "accepted")
}

/// Latest sample of every series keyed by series key.
async fn latest(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> Response {
    let latest: BTreeMap<String, MetricSample> = lock(&state.metrics).latest().into_iter().collect();
    success_response(StatusCode::OK, &trace_id, latest)
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    key: String,
    #[serde(default)]
    n: Option<usize>,
}

async fn history(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Response {
    let n = params.n.unwrap_or(DEFAULT_HISTORY);
    let samples = lock(&state.metrics).history(&params.key, n);
    success_response(StatusCode::OK, &trace_id, samples)
}

async fn snapshot(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> Response {
    success_response(StatusCode::OK, &trace_id, state.latest_snapshot().as_ref())
}

async fn stored_latest(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> Response {
    match state.storage.get_latest_metrics().await {
        Ok(samples) => success_response(StatusCode::OK, &trace_id, samples),
        Err(e) => {
            tracing::error!(error = %e, "Failed to read latest stored metrics");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &trace_id, "storage_error", &e.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
struct StatsParams {
    name: String,
    #[serde(default)]
    hours: Option<u32>,
}

async fn stats(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<StatsParams>,
) -> Response {
    let hours = params.hours.unwrap_or(DEFAULT_STATS_HOURS);
    match state.storage.get_metric_stats(&params.name, hours).await {
        Ok(stats) => success_response(StatusCode::OK, &trace_id, stats),
        Err(e) => {
            tracing::error!(metric = %params.name, error = %e, "Failed to read metric stats");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &trace_id, "storage_error", &e.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
struct HourlyParams {
    name: String,
    #[serde(default)]
    from: Option<DateTime<Utc>>,
    #[serde(default)]
    to: Option<DateTime<Utc>>,
}

/// Hourly roll-ups, last 24 hours unless a range is given.
async fn hourly(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<HourlyParams>,
) -> Response {
    let to = params.to.unwrap_or_else(Utc::now);
    let from = params.from.unwrap_or(to - Duration::hours(24));
    if from > to {
        return error_response(StatusCode::BAD_REQUEST, &trace_id, "bad_request", "from must not be after to");
    }
    match state.storage.get_hourly(&params.name, from, to).await {
        Ok(rows) => success_response(StatusCode::OK, &trace_id, rows),
        Err(e) => {
            tracing::error!(metric = %params.name, error = %e, "Failed to read hourly aggregates");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &trace_id, "storage_error", &e.to_string())
        }
    }
}
