//! # Prometheus Metrics
//!
//! Counters go through the `metrics` facade; the binary installs a
//! `metrics-exporter-prometheus` recorder and `/metrics` renders it. Without
//! an installed recorder (tests, embedding) every counter is a no-op and
//! `/metrics` returns an empty exposition.

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::state::AppState;

pub const EVENTS_INGESTED: &str = "ire_events_ingested_total";
pub const EVENTS_REJECTED: &str = "ire_events_rejected_total";
pub const INTENTS_EMITTED: &str = "ire_intents_emitted_total";
pub const ESCALATIONS: &str = "ire_escalations_total";
pub const NOTIFICATIONS_FAILED: &str = "ire_notifications_failed_total";
pub const HTTP_REQUESTS: &str = "ire_http_requests_total";

/// Install the global Prometheus recorder. Call once per process.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    metrics::describe_counter!(EVENTS_INGESTED, "Events accepted for routing");
    metrics::describe_counter!(EVENTS_REJECTED, "Events rejected at ingestion");
    metrics::describe_counter!(INTENTS_EMITTED, "Intents scheduled or re-escalated");
    metrics::describe_counter!(ESCALATIONS, "Work items raised one step by a sweep");
    metrics::describe_counter!(NOTIFICATIONS_FAILED, "Notifications that failed, timed out or were dropped");
    metrics::describe_counter!(HTTP_REQUESTS, "HTTP requests by status class");
    Ok(handle)
}

/// Count every request by status class (`2xx`, `4xx`, ...).
pub async fn http_metrics_middleware(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    let class = format!("{}xx", response.status().as_u16() / 100);
    metrics::counter!(HTTP_REQUESTS, "status" => class).increment(1);
    response
}

/// GET /metrics
pub async fn render(State(state): State<AppState>) -> Response {
    let body = state
        .prometheus
        .as_ref()
        .map(PrometheusHandle::render)
        .unwrap_or_default();
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response()
}
