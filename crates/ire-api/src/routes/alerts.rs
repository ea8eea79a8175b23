//! # Alert Endpoints
//!
//! Dashboards list unacknowledged alerts and acknowledge them. Collaborators
//! that raise alerts outside the rule engine create them directly.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use ire_core::{AlertId, Severity};
use ire_state::{Alert, AlertFilter};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::CallerIdentity;
use crate::error::{AppError, ErrorBody};
use crate::extractors::{extract_optional_json, extract_validated_json, Validate};
use crate::routes::TransitionResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Filters for the unacknowledged alert list. All optional.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AlertQuery {
    #[serde(default, alias = "facilityId")]
    pub facility_id: Option<String>,
    #[serde(default, alias = "participantId")]
    pub participant_id: Option<String>,
    /// `info`, `warning` or `critical`.
    #[serde(default, alias = "minSeverity")]
    pub min_severity: Option<String>,
}

impl AlertQuery {
    fn into_filter(self) -> Result<AlertFilter, AppError> {
        let min_severity = self
            .min_severity
            .as_deref()
            .map(str::parse::<Severity>)
            .transpose()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        Ok(AlertFilter {
            facility_id: self.facility_id,
            participant_id: self.participant_id,
            min_severity,
        })
    }
}

/// Create an alert outside the rule engine.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAlertRequest {
    #[serde(rename = "type")]
    pub alert_type: String,
    /// `info`, `warning` or `critical`.
    pub severity: String,
    pub message: String,
    /// Defaults to now.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, alias = "participantId")]
    pub participant_id: Option<String>,
    #[serde(default, alias = "facilityId")]
    pub facility_id: Option<String>,
}

impl Validate for CreateAlertRequest {
    fn validate(&self) -> Result<(), String> {
        if self.alert_type.trim().is_empty() {
            return Err("type must not be empty".into());
        }
        if self.message.trim().is_empty() {
            return Err("message must not be empty".into());
        }
        self.severity
            .parse::<Severity>()
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

/// Acknowledge body. `userId` is only read when the bearer token carries
/// no user.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct AcknowledgeRequest {
    #[serde(default, alias = "userId")]
    pub user_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/alerts", get(list_alerts).post(create_alert))
        .route("/v1/alerts/{id}", get(get_alert))
        .route("/v1/alerts/{id}/acknowledge", post(acknowledge_alert))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /v1/alerts: Unacknowledged alerts, newest first.
#[utoipa::path(
    get,
    path = "/v1/alerts",
    params(AlertQuery),
    responses(
        (status = 200, description = "Unacknowledged alerts, newest first"),
        (status = 422, description = "Unknown severity", body = ErrorBody),
    ),
    tag = "alerts"
)]
pub async fn list_alerts(
    State(state): State<AppState>,
    Query(query): Query<AlertQuery>,
) -> Result<Json<Vec<Alert>>, AppError> {
    let filter = query.into_filter()?;
    Ok(Json(state.engine.store().list_unacknowledged(&filter)?))
}

/// POST /v1/alerts: Create an alert directly.
#[utoipa::path(
    post,
    path = "/v1/alerts",
    request_body = CreateAlertRequest,
    responses(
        (status = 201, description = "Alert created"),
        (status = 422, description = "Validation error", body = ErrorBody),
    ),
    tag = "alerts"
)]
pub async fn create_alert(
    State(state): State<AppState>,
    body: Result<Json<CreateAlertRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Alert>), AppError> {
    let req = extract_validated_json(body)?;
    let severity: Severity = req
        .severity
        .parse()
        .map_err(|e: ire_core::IreError| AppError::Validation(e.to_string()))?;

    let mut alert = Alert::new(
        req.alert_type,
        severity,
        req.message,
        req.timestamp.unwrap_or_else(Utc::now),
    );
    if let Some(p) = req.participant_id {
        alert = alert.with_participant(p);
    }
    if let Some(f) = req.facility_id {
        alert = alert.with_facility(f);
    }
    let alert = state.engine.store().insert_alert(alert)?;
    tracing::info!(alert_id = %alert.id, severity = %alert.severity, "alert created directly");
    Ok((StatusCode::CREATED, Json(alert)))
}

/// GET /v1/alerts/{id}
#[utoipa::path(
    get,
    path = "/v1/alerts/{id}",
    params(("id" = Uuid, Path, description = "Alert id")),
    responses(
        (status = 200, description = "The alert"),
        (status = 404, description = "No such alert", body = ErrorBody),
    ),
    tag = "alerts"
)]
pub async fn get_alert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Alert>, AppError> {
    Ok(Json(state.engine.store().get_alert(&AlertId(id))?))
}

/// POST /v1/alerts/{id}/acknowledge
///
/// Idempotent: a repeat by anyone returns `already_settled` with the
/// original acknowledger.
#[utoipa::path(
    post,
    path = "/v1/alerts/{id}/acknowledge",
    params(("id" = Uuid, Path, description = "Alert id")),
    request_body = AcknowledgeRequest,
    responses(
        (status = 200, description = "`applied` or `already_settled`, with the alert"),
        (status = 404, description = "No such alert", body = ErrorBody),
        (status = 422, description = "No acting user", body = ErrorBody),
    ),
    tag = "alerts"
)]
pub async fn acknowledge_alert(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<AcknowledgeRequest>, JsonRejection>,
) -> Result<Json<TransitionResponse<Alert>>, AppError> {
    let req = extract_optional_json(body)?;
    let user = caller.actor(req.user_id.as_deref())?;
    let outcome = state
        .engine
        .store()
        .acknowledge(&AlertId(id), &user, Utc::now())?;
    tracing::info!(
        alert_id = %AlertId(id),
        user = %user,
        outcome = outcome.as_str(),
        "acknowledge"
    );
    Ok(Json(outcome.into()))
}
