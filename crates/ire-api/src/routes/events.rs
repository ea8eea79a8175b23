//! # Event Ingestion
//!
//! `POST /v1/events` validates one domain event, routes it against the
//! current rule snapshot, persists the resulting alerts and approvals, and
//! queues every intent for notification. The response carries the intents
//! and the created work items.
//!
//! When the store fails partway through, the intents bound to work items
//! written before the failure are still queued before the 503 goes out,
//! and the 503 body lists them.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use ire_routing::{RoutingError, RoutingOutcome};

use crate::error::AppError;
use crate::extractors::extract_json;
use crate::metrics::{EVENTS_INGESTED, EVENTS_REJECTED, INTENTS_EMITTED};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/events", post(ingest_event))
}

/// POST /v1/events: Route one event.
///
/// The body is a JSON object with `kind`, `occurredAt` and any number of
/// scalar facts.
#[utoipa::path(
    post,
    path = "/v1/events",
    responses(
        (status = 201, description = "Event routed; returns intents, alerts and approvals"),
        (status = 400, description = "Body is not JSON", body = crate::error::ErrorBody),
        (status = 422, description = "Missing kind or unparseable occurredAt", body = crate::error::ErrorBody),
        (status = 503, description = "Store unavailable; retryable", body = crate::error::ErrorBody),
    ),
    tag = "events"
)]
pub async fn ingest_event(
    State(state): State<AppState>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<(StatusCode, Json<RoutingOutcome>), AppError> {
    let payload = extract_json(body)?;

    let outcome = match state.engine.ingest(payload) {
        Ok(outcome) => outcome,
        Err(e) => {
            match &e {
                RoutingError::MalformedEvent(_) => {
                    metrics::counter!(EVENTS_REJECTED).increment(1);
                }
                RoutingError::StoreUnavailable { persisted, .. } if !persisted.is_empty() => {
                    metrics::counter!(INTENTS_EMITTED, "source" => "event")
                        .increment(persisted.len() as u64);
                    let queued = state.dispatcher.enqueue_all(persisted);
                    tracing::warn!(
                        persisted = persisted.len(),
                        queued,
                        "store failed mid-event; queued intents already persisted"
                    );
                }
                _ => {}
            }
            return Err(AppError::from(e));
        }
    };

    metrics::counter!(EVENTS_INGESTED).increment(1);
    metrics::counter!(INTENTS_EMITTED, "source" => "event").increment(outcome.intents.len() as u64);
    let queued = state.dispatcher.enqueue_all(&outcome.intents);
    tracing::info!(
        event_id = %outcome.event_id,
        rule_set_version = outcome.rule_set_version,
        fired = outcome.fired_rules.len(),
        intents = outcome.intents.len(),
        queued,
        "event routed"
    );

    Ok((StatusCode::CREATED, Json(outcome)))
}
