//! # OpenAPI Document Assembly
//!
//! Collects every utoipa-documented handler into one OpenAPI document,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Incident Routing & Escalation API",
        version = "0.1.0",
        description = "Routes care-facility domain events to alerts, pending approvals and notification intents, and escalates what goes unanswered."
    ),
    paths(
        // Events
        crate::routes::events::ingest_event,
        // Alerts
        crate::routes::alerts::list_alerts,
        crate::routes::alerts::create_alert,
        crate::routes::alerts::get_alert,
        crate::routes::alerts::acknowledge_alert,
        // Approvals
        crate::routes::approvals::list_approvals,
        crate::routes::approvals::create_approval,
        crate::routes::approvals::get_approval,
        crate::routes::approvals::approve,
        crate::routes::approvals::reject,
        // Rules
        crate::routes::rules::get_rules,
        crate::routes::rules::replace_rules,
        // Escalations
        crate::routes::escalations::sweep,
        crate::routes::escalations::audit,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::auth::Role,
        crate::routes::alerts::CreateAlertRequest,
        crate::routes::alerts::AcknowledgeRequest,
        crate::routes::approvals::CreateApprovalRequest,
        crate::routes::approvals::ApproveRequest,
        crate::routes::approvals::RejectRequest,
        crate::routes::rules::RulesReplaced,
        crate::routes::escalations::SweepRequest,
    )),
    tags(
        (name = "events", description = "Event ingestion and routing"),
        (name = "alerts", description = "Unacknowledged alerts"),
        (name = "approvals", description = "Pending approvals"),
        (name = "rules", description = "Rule administration"),
        (name = "escalations", description = "Escalation sweeps and the audit trail"),
    )
)]
pub struct ApiDoc;

pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
