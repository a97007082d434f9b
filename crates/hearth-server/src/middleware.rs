use axum::body::Body;
use axum::extract::{MatchedPath, State};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;
use std::time::Instant;

use crate::state::AppState;

/// Feeds every API request into the HTTP instrumentation, labelled by the
/// route template so ids in paths do not explode the series count.
///
/// Must be installed with `route_layer` so the matched path is known.
/// Scrape and probe traffic is not recorded.
pub async fn http_instrumentation(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    if route == "/metrics" || route == "/health" {
        return next.run(req).await;
    }
    let method = req.method().to_string();

    let start = Instant::now();
    let response = next.run(req).await;
    let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

    state.instruments.http.record_request(
        &method,
        &route,
        response.status().as_u16(),
        duration_ms,
        Utc::now(),
    );
    response
}
