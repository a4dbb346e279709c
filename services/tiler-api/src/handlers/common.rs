//! Shared handler plumbing: error responses, health and metrics endpoints.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use tracing::warn;

use tiler_common::TilerError;

/// Map a pipeline error to a JSON problem response.
///
/// Parameter and source-reachability failures surface as 400s, timeouts as
/// 504, everything else as 500.
pub fn error_response(err: &TilerError) -> Response {
    let status = StatusCode::from_u16(err.http_status_code())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        counter!("tiler_request_errors_total").increment(1);
        warn!(error = %err, "request failed");
    }
    (status, Json(json!({ "detail": err.to_string() }))).into_response()
}

pub async fn health_handler() -> Response {
    Json(json!({ "status": "ok" })).into_response()
}

pub async fn ready_handler() -> Response {
    Json(json!({ "status": "ready" })).into_response()
}

pub async fn metrics_handler(Extension(handle): Extension<PrometheusHandle>) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    )
        .into_response()
}
