//! # Escalation & Audit Endpoints
//!
//! Operators can trigger an escalation sweep on demand (the background task
//! runs the same sweep periodically) and read the routing audit trail.
//! Both require `admin`.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use ire_routing::{AuditEntry, SweepReport};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::{AppError, ErrorBody};
use crate::extractors::extract_optional_json;
use crate::monitor_task;
use crate::state::AppState;

const DEFAULT_AUDIT_LIMIT: usize = 100;
const MAX_AUDIT_LIMIT: usize = 1000;

/// Manual sweep body. Without `at` the sweep runs as of now.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct SweepRequest {
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuditQuery {
    /// Most recent entries to return; default 100, capped at 1000.
    #[serde(default)]
    pub limit: Option<usize>,
    /// Restrict to one subject, e.g. `event:…` or `alert:…`.
    #[serde(default)]
    pub subject: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/escalations/sweep", post(sweep))
        .route("/v1/audit", get(audit))
}

/// POST /v1/escalations/sweep: Run one escalation sweep now.
#[utoipa::path(
    post,
    path = "/v1/escalations/sweep",
    request_body = SweepRequest,
    responses(
        (status = 200, description = "Sweep report with the re-emitted intents"),
        (status = 403, description = "Caller is not an admin", body = ErrorBody),
    ),
    tag = "escalations"
)]
pub async fn sweep(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<SweepRequest>, JsonRejection>,
) -> Result<Json<SweepReport>, AppError> {
    require_role(&caller, Role::Admin)?;
    let req = extract_optional_json(body)?;
    let now = req.at.unwrap_or_else(Utc::now);
    let report = tokio::task::spawn_blocking(move || monitor_task::run_sweep(&state, now))
        .await
        .map_err(|e| AppError::Internal(format!("sweep task failed: {e}")))?;
    Ok(Json(report))
}

/// GET /v1/audit: Recent routing audit entries, oldest first.
#[utoipa::path(
    get,
    path = "/v1/audit",
    params(AuditQuery),
    responses(
        (status = 200, description = "Audit entries"),
        (status = 403, description = "Caller is not an admin", body = ErrorBody),
    ),
    tag = "escalations"
)]
pub async fn audit(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditEntry>>, AppError> {
    require_role(&caller, Role::Admin)?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_AUDIT_LIMIT)
        .min(MAX_AUDIT_LIMIT);
    let entries = match query.subject.as_deref() {
        Some(subject) => {
            let mut entries = state.engine.audit_for(subject);
            let skip = entries.len().saturating_sub(limit);
            entries.drain(..skip);
            entries
        }
        None => state.engine.recent_audit(limit),
    };
    Ok(Json(entries))
}
