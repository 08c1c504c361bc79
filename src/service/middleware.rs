//! Service middleware: request logging with correlation ids, CORS and
//! request metrics.
//!
//! ## Metrics Emitted
//!
//! All metrics are `tracing` events under the `esg_reporting::metrics` target,
//! aggregated from the logs:
//!
//! - `request_metric` - path pattern, method, status and latency per request
//! - `report_metric` - format, size and latency per generated report
//! - `batch_metric` - applied/skipped/retried counts per batch update

use std::sync::OnceLock;
use std::time::Instant;

use axum::{
    extract::Request,
    http::{HeaderValue, Method},
    middleware::Next,
    response::Response,
};
use regex_lite::Regex;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, info_span, warn, Instrument};

use crate::batch::BatchStats;
use crate::config::ServiceConfig;
use crate::report::ReportFormat;

use super::routes::REQUEST_ID_HEADER;

/// Request logging middleware that assigns a correlation ID and times the request.
///
/// A caller-supplied `X-Request-Id` is kept; otherwise one is generated and
/// written back onto the request so handlers can echo it in error bodies.
/// The id is also returned as a response header.
pub async fn request_logging_middleware(mut request: Request, next: Next) -> Response {
    let start = Instant::now();

    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        request.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    let method = request.method().clone();
    let uri = request.uri().path().to_string();

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %uri,
        status = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
    );

    let mut response = next.run(request).instrument(span.clone()).await;

    let latency = start.elapsed();
    let status = response.status().as_u16();

    span.record("status", status);
    span.record("latency_ms", latency.as_millis() as u64);

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    info!(
        target: "esg_reporting::access",
        request_id = %request_id,
        method = %method,
        path = %uri,
        status = status,
        latency_ms = latency.as_millis() as u64,
        "request completed"
    );

    response
}

/// CORS policy from the configured origin. No origin allows any.
pub fn cors_layer(config: &ServiceConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers(Any);

    match config.cors_origin.as_deref().map(HeaderValue::from_str) {
        Some(Ok(origin)) => layer.allow_origin(origin),
        Some(Err(_)) => {
            warn!(origin = ?config.cors_origin, "Invalid CORS origin, allowing any");
            layer.allow_origin(Any)
        }
        None => layer.allow_origin(Any),
    }
}

/// Metrics middleware that records request counts and latency.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = normalize_path(request.uri().path());

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status().as_u16();

    info!(
        target: "esg_reporting::metrics",
        metric_type = "request",
        path = %path,
        method = %method,
        status = status,
        latency_ms = latency.as_millis() as u64,
        "request_metric"
    );

    response
}

/// Normalize a path for metrics to avoid high cardinality.
///
/// Numeric id segments become `:id`.
pub(crate) fn normalize_path(path: &str) -> String {
    static ID_SEGMENT: OnceLock<Regex> = OnceLock::new();
    let re = ID_SEGMENT.get_or_init(|| {
        Regex::new(r"/\d+(/|$)").expect("id segment pattern is valid")
    });

    re.replace_all(path, "/:id${1}").to_string()
}

/// Record report generation metrics.
pub fn record_report_metrics(format: ReportFormat, bytes: usize, latency_ms: u64) {
    info!(
        target: "esg_reporting::metrics",
        metric_type = "report",
        format = format.extension(),
        bytes = bytes,
        latency_ms = latency_ms,
        "report_metric"
    );
}

/// Record batch update metrics.
pub fn record_batch_metrics(stats: &BatchStats, success: bool, latency_ms: u64) {
    let status = if success { "success" } else { "error" };
    info!(
        target: "esg_reporting::metrics",
        metric_type = "batch_update",
        status = status,
        applied = stats.applied,
        skipped = stats.skipped,
        retries = stats.retries,
        latency_ms = latency_ms,
        "batch_metric"
    );
}
