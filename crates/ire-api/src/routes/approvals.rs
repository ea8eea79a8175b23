//! # Pending Approval Endpoints
//!
//! Team leaders see pending approvals assigned to their role, most urgent
//! first, and approve or reject them. A rejection needs a non-blank reason.
//! Two decisions racing on the same approval resolve to one winner; the
//! other caller gets `already_settled` with the winning decision.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use ire_core::{ApprovalId, Priority};
use ire_state::{ApprovalFilter, ApprovalKind, PendingApproval};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::{AppError, ErrorBody};
use crate::extractors::{extract_json, extract_optional_json, extract_validated_json, Validate};
use crate::routes::TransitionResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ApprovalQuery {
    /// Assigned role, case-insensitive.
    #[serde(default)]
    pub role: Option<String>,
    /// `shift_handover` or `incident_report`.
    #[serde(default, alias = "type")]
    pub kind: Option<String>,
}

impl ApprovalQuery {
    fn into_filter(self) -> Result<ApprovalFilter, AppError> {
        let kind = self
            .kind
            .as_deref()
            .map(str::parse::<ApprovalKind>)
            .transpose()
            .map_err(AppError::Validation)?;
        Ok(ApprovalFilter {
            role: self.role,
            kind,
        })
    }
}

/// Create a pending approval outside the rule engine.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateApprovalRequest {
    /// `shift_handover` or `incident_report`.
    #[serde(rename = "type")]
    pub kind: String,
    /// `normal` (default), `high` or `urgent`.
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(alias = "staffId")]
    pub staff_id: String,
    #[serde(default, alias = "staffName")]
    pub staff_name: String,
    pub content: String,
    #[serde(default, alias = "assignedRole")]
    pub assigned_role: Option<String>,
}

impl Validate for CreateApprovalRequest {
    fn validate(&self) -> Result<(), String> {
        self.kind.parse::<ApprovalKind>()?;
        if let Some(p) = &self.priority {
            p.parse::<Priority>().map_err(|e| e.to_string())?;
        }
        if self.staff_id.trim().is_empty() {
            return Err("staffId must not be empty".into());
        }
        if self.content.trim().is_empty() {
            return Err("content must not be empty".into());
        }
        Ok(())
    }
}

/// Approve body. `userId` is only read when the token carries no user.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ApproveRequest {
    #[serde(default, alias = "userId")]
    pub user_id: Option<String>,
}

/// Reject body.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RejectRequest {
    /// Required; blank reasons are refused.
    #[serde(default)]
    pub reason: String,
    #[serde(default, alias = "userId")]
    pub user_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/approvals", get(list_approvals).post(create_approval))
        .route("/v1/approvals/{id}", get(get_approval))
        .route("/v1/approvals/{id}/approve", post(approve))
        .route("/v1/approvals/{id}/reject", post(reject))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /v1/approvals: Pending approvals, most urgent then oldest first.
#[utoipa::path(
    get,
    path = "/v1/approvals",
    params(ApprovalQuery),
    responses(
        (status = 200, description = "Pending approvals"),
        (status = 422, description = "Unknown type", body = ErrorBody),
    ),
    tag = "approvals"
)]
pub async fn list_approvals(
    State(state): State<AppState>,
    Query(query): Query<ApprovalQuery>,
) -> Result<Json<Vec<PendingApproval>>, AppError> {
    let filter = query.into_filter()?;
    Ok(Json(state.engine.store().list_pending(&filter)?))
}

/// POST /v1/approvals: Create a pending approval directly.
#[utoipa::path(
    post,
    path = "/v1/approvals",
    request_body = CreateApprovalRequest,
    responses(
        (status = 201, description = "Approval created"),
        (status = 422, description = "Validation error", body = ErrorBody),
    ),
    tag = "approvals"
)]
pub async fn create_approval(
    State(state): State<AppState>,
    body: Result<Json<CreateApprovalRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PendingApproval>), AppError> {
    let req = extract_validated_json(body)?;
    let kind: ApprovalKind = req.kind.parse().map_err(AppError::Validation)?;
    let priority = match req.priority.as_deref() {
        Some(p) => p
            .parse()
            .map_err(|e: ire_core::IreError| AppError::Validation(e.to_string()))?,
        None => Priority::Normal,
    };

    let mut approval = PendingApproval::new(
        kind,
        priority,
        req.staff_id,
        req.staff_name,
        req.content,
        Utc::now(),
    );
    if let Some(role) = req.assigned_role {
        approval = approval.with_assigned_role(role);
    }
    let approval = state.engine.store().insert_approval(approval)?;
    tracing::info!(approval_id = %approval.id, kind = %approval.kind, "approval created directly");
    Ok((StatusCode::CREATED, Json(approval)))
}

/// GET /v1/approvals/{id}
#[utoipa::path(
    get,
    path = "/v1/approvals/{id}",
    params(("id" = Uuid, Path, description = "Approval id")),
    responses(
        (status = 200, description = "The approval"),
        (status = 404, description = "No such approval", body = ErrorBody),
    ),
    tag = "approvals"
)]
pub async fn get_approval(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PendingApproval>, AppError> {
    Ok(Json(state.engine.store().get_approval(&ApprovalId(id))?))
}

/// POST /v1/approvals/{id}/approve: Requires `team_leader`.
#[utoipa::path(
    post,
    path = "/v1/approvals/{id}/approve",
    params(("id" = Uuid, Path, description = "Approval id")),
    request_body = ApproveRequest,
    responses(
        (status = 200, description = "`applied` or `already_settled`, with the approval"),
        (status = 403, description = "Caller is not a team leader", body = ErrorBody),
        (status = 404, description = "No such approval", body = ErrorBody),
    ),
    tag = "approvals"
)]
pub async fn approve(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<ApproveRequest>, JsonRejection>,
) -> Result<Json<TransitionResponse<PendingApproval>>, AppError> {
    require_role(&caller, Role::TeamLeader)?;
    let req = extract_optional_json(body)?;
    let user = caller.actor(req.user_id.as_deref())?;
    let outcome = state
        .engine
        .store()
        .approve(&ApprovalId(id), &user, Utc::now())?;
    tracing::info!(
        approval_id = %ApprovalId(id),
        user = %user,
        outcome = outcome.as_str(),
        "approve"
    );
    Ok(Json(outcome.into()))
}

/// POST /v1/approvals/{id}/reject: Requires `team_leader` and a reason.
#[utoipa::path(
    post,
    path = "/v1/approvals/{id}/reject",
    params(("id" = Uuid, Path, description = "Approval id")),
    request_body = RejectRequest,
    responses(
        (status = 200, description = "`applied` or `already_settled`, with the approval"),
        (status = 403, description = "Caller is not a team leader", body = ErrorBody),
        (status = 404, description = "No such approval", body = ErrorBody),
        (status = 422, description = "Blank rejection reason", body = ErrorBody),
    ),
    tag = "approvals"
)]
pub async fn reject(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<RejectRequest>, JsonRejection>,
) -> Result<Json<TransitionResponse<PendingApproval>>, AppError> {
    require_role(&caller, Role::TeamLeader)?;
    let req = extract_json(body)?;
    let user = caller.actor(req.user_id.as_deref())?;
    let outcome = state
        .engine
        .store()
        .reject(&ApprovalId(id), &user, &req.reason, Utc::now())?;
    tracing::info!(
        approval_id = %ApprovalId(id),
        user = %user,
        outcome = outcome.as_str(),
        "reject"
    );
    Ok(Json(outcome.into()))
}
