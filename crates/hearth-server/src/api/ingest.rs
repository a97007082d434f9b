//! Event ingestion for collaborators running outside this process.

use crate::api::{error_response, success_empty_response, success_response};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use hearth_collector::instrument::db::PoolStats;
use serde::Deserialize;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/business/events", post(business_event))
        .route("/v1/business/summary/{date}", get(daily_summary))
        .route("/v1/instrument/db/query", post(db_query))
        .route("/v1/instrument/db/pool", post(db_pool))
        .route("/v1/instrument/cache", post(cache_op))
}

#[derive(Debug, Deserialize)]
struct BusinessEvent {
    event: String,
    #[serde(default = "default_success")]
    success: bool,
}

fn default_success() -> bool {
    true
}

async fn business_event(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Json(req): Json<BusinessEvent>,
) -> Response {
    if req.event.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, &trace_id, "bad_request", "event must not be empty");
    }
    state
        .instruments
        .business
        .record_event(&req.event, req.success, Utc::now());
    success_empty_response(StatusCode::ACCEPTED, &trace_id, "accepted")
}

async fn daily_summary(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Response {
    let Ok(date) = date.parse::<NaiveDate>() else {
        return error_response(StatusCode::BAD_REQUEST, &trace_id, "bad_request", "date must be YYYY-MM-DD");
    };
    match state.storage.get_daily_summary(date).await {
        Ok(Some(summary)) => success_response(StatusCode::OK, &trace_id, summary),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            &format!("no summary for {date}"),
        ),
        Err(e) => {
            tracing::error!(date = %date, error = %e, "Failed to read daily summary");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &trace_id, "storage_error", &e.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
struct DbQuery {
    operation: String,
    duration_ms: f64,
    #[serde(default = "default_success")]
    success: bool,
}

async fn db_query(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Json(req): Json<DbQuery>,
) -> Response {
    if !req.duration_ms.is_finite() || req.duration_ms < 0.0 {
        return error_response(StatusCode::BAD_REQUEST, &trace_id, "bad_request", "duration_ms must be a non-negative number");
    }
    state
        .instruments
        .db
        .record_query(&req.operation, req.duration_ms, req.success, Utc::now());
    success_empty_response(StatusCode::ACCEPTED, &trace_id, "accepted")
}

#[derive(Debug, Deserialize)]
struct DbPool {
    total: u32,
    idle: u32,
    waiting: u32,
}

async fn db_pool(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Json(req): Json<DbPool>,
) -> Response {
    state.instruments.db.set_pool(PoolStats {
        total: req.total,
        idle: req.idle,
        waiting: req.waiting,
    });
    success_empty_response(StatusCode::ACCEPTED, &trace_id, "accepted")
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum CacheOp {
    Get { hit: bool },
    Set,
}

async fn cache_op(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Json(req): Json<CacheOp>,
) -> Response {
    let now = Utc::now();
    match req {
        CacheOp::Get { hit } => state.instruments.cache.record_get(hit, now),
        CacheOp::Set => state.instruments.cache.record_set(now),
    }
    success_empty_response(StatusCode::ACCEPTED, &trace_id, "accepted")
}
