use crate::config::{LogFormat, LoggingConfig};
use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use rand::Rng;
use std::fmt::Write;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber: `RUST_LOG` plus the configured directive.
pub fn init(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::from_default_env().add_directive(config.directive.parse()?);
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = match config.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {e}"))
}

/// Trace id stored in request extensions.
#[derive(Clone)]
pub struct TraceId(pub String);

impl std::ops::Deref for TraceId {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

/// 16 hex chars from 8 random bytes.
fn generate_trace_id() -> String {
    let bytes: [u8; 8] = rand::thread_rng().gen();
    let mut s = String::with_capacity(16);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

const MAX_BODY_LOG_CHARS: usize = 200;

/// Truncates to at most `max` bytes on a char boundary.
fn truncate_body(bytes: &[u8], max: usize) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) if s.len() > max => {
            let mut end = max;
            while end > 0 && !s.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &s[..end])
        }
        Ok(s) => s.to_string(),
        Err(_) => "<non-utf8 body>".to_string(),
    }
}

fn format_elapsed(elapsed_us: u128) -> String {
    if elapsed_us < 1000 {
        format!("{elapsed_us}µs")
    } else if elapsed_us < 1_000_000 {
        format!("{}ms", elapsed_us / 1000)
    } else {
        format!("{:.1}s", elapsed_us as f64 / 1_000_000.0)
    }
}

/// Scrape and probe endpoints are polled constantly; log them at debug only.
fn is_probe(path: &str) -> bool {
    path == "/metrics" || path == "/health"
}

/// Largest request body buffered for logging; larger bodies are rejected by
/// the JSON extractors anyway.
const MAX_BUFFERED_BODY: usize = 1024 * 1024;

fn with_trace_header(mut response: Response, trace_id: &str) -> Response {
    if let Ok(val) = HeaderValue::from_str(trace_id) {
        response.headers_mut().insert("X-Trace-Id", val);
    }
    response
}

/// Buffers a write request's body so a snippet can be logged, then hands an
/// equivalent request back.
async fn capture_body(req: Request) -> (Request, Option<String>) {
    if !matches!(req.method().as_str(), "POST" | "PUT" | "PATCH") {
        return (req, None);
    }
    let (parts, body) = req.into_parts();
    let bytes = axum::body::to_bytes(body, MAX_BUFFERED_BODY)
        .await
        .unwrap_or_default();
    let snippet = (!bytes.is_empty()).then(|| truncate_body(&bytes, MAX_BODY_LOG_CHARS));
    (Request::from_parts(parts, Body::from(bytes)), snippet)
}

/// Only enveloped JSON is worth echoing into error logs.
fn is_json(response: &axum::http::response::Parts) -> bool {
    response
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"))
}

/// Assigns a trace id, logs the request line and the response status.
/// Failed responses are logged with a snippet of their body.
pub async fn request_logging(mut req: Request, next: Next) -> Response {
    let trace_id = generate_trace_id();
    req.extensions_mut().insert(TraceId(trace_id.clone()));
    let start = Instant::now();

    let path = req.uri().path().to_string();
    if is_probe(&path) {
        let response = next.run(req).await;
        tracing::debug!(
            trace_id = %trace_id,
            path = %path,
            status = response.status().as_u16(),
            elapsed = %format_elapsed(start.elapsed().as_micros()),
            "probe"
        );
        return with_trace_header(response, &trace_id);
    }

    let method = req.method().clone();
    let target = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or(path);
    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let (req, body) = capture_body(req).await;
    tracing::info!(
        trace_id = %trace_id,
        method = %method,
        path = %target,
        body = body.as_deref(),
        ua = %user_agent,
        "--> request"
    );

    let response = next.run(req).await;
    let status = response.status();
    let elapsed = format_elapsed(start.elapsed().as_micros());
    if status.is_success() || status.is_redirection() {
        tracing::info!(trace_id = %trace_id, status = status.as_u16(), elapsed = %elapsed, "<-- response");
        return with_trace_header(response, &trace_id);
    }

    let (parts, body) = response.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .unwrap_or_default();
    let snippet = if is_json(&parts) {
        truncate_body(&bytes, MAX_BODY_LOG_CHARS)
    } else {
        String::new()
    };
    if status.is_server_error() {
        tracing::error!(trace_id = %trace_id, status = status.as_u16(), elapsed = %elapsed, body = %snippet, "<-- response");
    } else {
        tracing::warn!(trace_id = %trace_id, status = status.as_u16(), elapsed = %elapsed, body = %snippet, "<-- response");
    }
    with_trace_header(Response::from_parts(parts, Body::from(bytes)), &trace_id)
}
