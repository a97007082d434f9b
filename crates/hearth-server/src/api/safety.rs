use crate::api::{error_response, success_empty_response, success_response};
use crate::logging::TraceId;
use crate::state::{lock, AppState};
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use hearth_safety::error::SafetyError;
use hearth_safety::escalation::EscalationRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/safety/status", get(status))
        .route("/v1/safety/repairs/{component}", post(request_repair))
        .route("/v1/safety/repairs/{component}/result", post(record_result))
        .route("/v1/safety/errors/{component}", post(record_critical_error))
        .route("/v1/safety/safe-mode", post(set_safe_mode))
        .route("/v1/safety/escalations/{id}/ack", post(acknowledge))
        .route("/v1/safety/backups", get(list_backups).post(create_backup))
        .route("/v1/safety/backups/{id}", get(restore_backup))
}

async fn status(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> Response {
    let status = lock(&state.safety).status(Utc::now());
    success_response(StatusCode::OK, &trace_id, status)
}

/// Admission check. An allowed answer counts against the budget.
async fn request_repair(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(component): Path<String>,
) -> Response {
    let decision = lock(&state.safety).can_attempt_repair(&component, Utc::now());
    success_response(StatusCode::OK, &trace_id, decision)
}

#[derive(Debug, Deserialize)]
struct RepairResult {
    success: bool,
}

#[derive(Debug, Serialize)]
struct EscalationOutcome {
    escalation: Option<EscalationRecord>,
}

async fn record_result(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(component): Path<String>,
    Json(req): Json<RepairResult>,
) -> Response {
    let escalation = lock(&state.safety).record_repair_attempt(&component, req.success, Utc::now());
    success_response(StatusCode::OK, &trace_id, EscalationOutcome { escalation })
}

async fn record_critical_error(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(component): Path<String>,
) -> Response {
    let escalation = lock(&state.safety).record_critical_error(&component, Utc::now());
    success_response(StatusCode::OK, &trace_id, EscalationOutcome { escalation })
}

#[derive(Debug, Deserialize)]
struct SafeModeRequest {
    active: bool,
    #[serde(default)]
    reason: Option<String>,
}

/// Manual override. Entering keeps an existing reason; leaving also clears
/// consecutive failure counts.
async fn set_safe_mode(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Json(req): Json<SafeModeRequest>,
) -> Response {
    let now = Utc::now();
    let changed = {
        let mut safety = lock(&state.safety);
        if req.active {
            let reason = req.reason.as_deref().unwrap_or("manual");
            safety.enter_safe_mode(reason, now)
        } else {
            safety.exit_safe_mode(now)
        }
    };
    if req.active {
        state.health.safety.mark_failed("safe mode active");
    } else {
        state.health.safety.mark_healthy(now);
    }
    let msg = if changed { "updated" } else { "unchanged" };
    success_empty_response(StatusCode::OK, &trace_id, msg)
}

async fn acknowledge(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    if lock(&state.safety).acknowledge_escalation(&id) {
        success_empty_response(StatusCode::OK, &trace_id, "acknowledged")
    } else {
        error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            &format!("no open escalation with id {id}"),
        )
    }
}

fn backup_error_response(trace_id: &str, e: &SafetyError) -> Response {
    let (status, code) = match e {
        SafetyError::BackupNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        SafetyError::InvalidBackupId(_) => (StatusCode::BAD_REQUEST, "bad_request"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "backup_error"),
    };
    error_response(status, trace_id, code, &e.to_string())
}

async fn list_backups(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> Response {
    let backups = lock(&state.safety).backups();
    match backups.list().await {
        Ok(list) => success_response(StatusCode::OK, &trace_id, list),
        Err(e) => {
            tracing::error!(error = %e, "Failed to list backups");
            backup_error_response(&trace_id, &e)
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateBackupRequest {
    component: String,
    payload: Value,
    #[serde(default)]
    metadata: Value,
}

async fn create_backup(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Json(req): Json<CreateBackupRequest>,
) -> Response {
    if req.component.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, &trace_id, "bad_request", "component must not be empty");
    }
    let backups = lock(&state.safety).backups();
    match backups
        .create(&req.component, req.payload, req.metadata, Utc::now())
        .await
    {
        Ok(info) => success_response(StatusCode::CREATED, &trace_id, info),
        Err(e) => {
            tracing::error!(component = %req.component, error = %e, "Failed to write backup");
            backup_error_response(&trace_id, &e)
        }
    }
}

async fn restore_backup(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    let backups = lock(&state.safety).backups();
    match backups.restore(&id).await {
        Ok(backup) => success_response(StatusCode::OK, &trace_id, backup),
        Err(e) => backup_error_response(&trace_id, &e),
    }
}
