use crate::api::{error_response, success_empty_response, success_response};
use crate::logging::TraceId;
use crate::state::{lock, AppState};
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use hearth_alert::error::RuleError;
use hearth_alert::rules::RuleSpec;
use hearth_common::types::Severity;
use serde::Deserialize;

const DEFAULT_HISTORY_LIMIT: usize = 50;
const MAX_HISTORY_LIMIT: usize = 1000;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/alerts/history", get(alert_history))
        .route("/v1/alerts/recent", get(recent_alerts))
        .route("/v1/alerts/active", get(active_alerts))
        .route("/v1/alerts/{id}/resolve", post(resolve_alert))
        .route("/v1/rules", get(list_rules).post(create_rule))
        .route("/v1/rules/{name}/enabled", put(set_rule_enabled))
        .route("/v1/rules/{name}", delete(delete_rule))
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    severity: Option<String>,
}

impl HistoryParams {
    fn resolve(&self) -> Result<(usize, Option<Severity>), String> {
        let limit = self
            .limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .min(MAX_HISTORY_LIMIT);
        let severity = self
            .severity
            .as_deref()
            .map(str::parse::<Severity>)
            .transpose()?;
        Ok((limit, severity))
    }
}

/// Persisted alert history, most recent first.
async fn alert_history(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Response {
    let (limit, severity) = match params.resolve() {
        Ok(v) => v,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &trace_id, "bad_request", &msg),
    };
    match state.storage.get_alert_history(limit, severity).await {
        Ok(alerts) => success_response(StatusCode::OK, &trace_id, alerts),
        Err(e) => {
            tracing::error!(error = %e, "Failed to read alert history");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &trace_id, "storage_error", &e.to_string())
        }
    }
}

/// In-memory dispatch history; available even when storage is down.
async fn recent_alerts(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Response {
    match params.resolve() {
        Ok((limit, severity)) => {
            success_response(StatusCode::OK, &trace_id, state.dispatcher.history(limit, severity))
        }
        Err(msg) => error_response(StatusCode::BAD_REQUEST, &trace_id, "bad_request", &msg),
    }
}

async fn active_alerts(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> Response {
    match state.storage.get_active_alerts().await {
        Ok(alerts) => success_response(StatusCode::OK, &trace_id, alerts),
        Err(e) => {
            tracing::error!(error = %e, "Failed to read active alerts");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &trace_id, "storage_error", &e.to_string())
        }
    }
}

async fn resolve_alert(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    match state.storage.resolve_alert(&id, Utc::now()).await {
        Ok(true) => {
            tracing::info!(id = %id, "Alert resolved");
            success_empty_response(StatusCode::OK, &trace_id, "resolved")
        }
        Ok(false) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            &format!("no unresolved alert with id {id}"),
        ),
        Err(e) => {
            tracing::error!(id = %id, error = %e, "Failed to resolve alert");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &trace_id, "storage_error", &e.to_string())
        }
    }
}

fn rule_error_response(trace_id: &str, e: &RuleError) -> Response {
    let (status, code) = match e {
        RuleError::Duplicate(_) => (StatusCode::CONFLICT, "conflict"),
        RuleError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        RuleError::Invalid { .. } => (StatusCode::BAD_REQUEST, "bad_request"),
        RuleError::Evaluation { .. } | RuleError::Panicked { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
        }
    };
    error_response(status, trace_id, code, &e.to_string())
}

async fn list_rules(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> Response {
    let rules = lock(&state.rules).rules();
    success_response(StatusCode::OK, &trace_id, rules)
}

/// Registers a threshold rule at runtime.
async fn create_rule(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Json(spec): Json<RuleSpec>,
) -> Response {
    let rule = match spec.build() {
        Ok(rule) => rule,
        Err(e) => return rule_error_response(&trace_id, &e),
    };
    let result = {
        let mut rules = lock(&state.rules);
        rules
            .add_rule(Box::new(rule))
            .and_then(|()| rules.set_enabled(&spec.name, spec.enabled))
    };
    match result {
        Ok(()) => {
            tracing::info!(rule = %spec.name, metric = %spec.metric, "Rule added");
            success_response(StatusCode::CREATED, &trace_id, spec)
        }
        Err(e) => rule_error_response(&trace_id, &e),
    }
}

#[derive(Debug, Deserialize)]
struct EnabledRequest {
    enabled: bool,
}

async fn set_rule_enabled(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<EnabledRequest>,
) -> Response {
    let result = lock(&state.rules).set_enabled(&name, req.enabled);
    match result {
        Ok(()) => {
            tracing::info!(rule = %name, enabled = req.enabled, "Rule toggled");
            success_empty_response(StatusCode::OK, &trace_id, "updated")
        }
        Err(e) => rule_error_response(&trace_id, &e),
    }
}

async fn delete_rule(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Response {
    let removed = lock(&state.rules).remove_rule(&name);
    if removed {
        tracing::info!(rule = %name, "Rule removed");
        success_empty_response(StatusCode::OK, &trace_id, "deleted")
    } else {
        rule_error_response(&trace_id, &RuleError::NotFound(name))
    }
}
