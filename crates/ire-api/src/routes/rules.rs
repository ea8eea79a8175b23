//! # Rule Administration
//!
//! Read and replace the active rule set. Replacement is atomic: events
//! already being routed finish against the snapshot they started with, and
//! the next event sees the new version. Both endpoints require `admin`.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use ire_routing::RuleSet;
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::{require_role, CallerIdentity, Role};
use crate::error::{AppError, ErrorBody};
use crate::state::AppState;

/// Result of a rule replacement.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RulesReplaced {
    pub version: u64,
    pub rules: usize,
    pub actions: usize,
    /// Non-fatal findings, e.g. unknown operators.
    pub warnings: Vec<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/rules", get(get_rules).put(replace_rules))
}

/// GET /v1/rules: The active rule snapshot.
#[utoipa::path(
    get,
    path = "/v1/rules",
    responses(
        (status = 200, description = "Active rule set with its version"),
        (status = 403, description = "Caller is not an admin", body = ErrorBody),
    ),
    tag = "rules"
)]
pub async fn get_rules(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<RuleSet>, AppError> {
    require_role(&caller, Role::Admin)?;
    Ok(Json(state.engine.registry().snapshot().as_ref().clone()))
}

/// PUT /v1/rules: Replace the rule set.
///
/// The body is a YAML or JSON document: either a list of rules or an
/// object with a `rules` list.
#[utoipa::path(
    put,
    path = "/v1/rules",
    request_body(content = String, description = "YAML or JSON rule document"),
    responses(
        (status = 200, description = "Rules replaced", body = RulesReplaced),
        (status = 403, description = "Caller is not an admin", body = ErrorBody),
        (status = 422, description = "Unparseable or invalid rules", body = ErrorBody),
    ),
    tag = "rules"
)]
pub async fn replace_rules(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: String,
) -> Result<Json<RulesReplaced>, AppError> {
    require_role(&caller, Role::Admin)?;
    let parsed = RuleSet::from_yaml_str(&body)?;
    let warnings = parsed.warnings();
    let actions = parsed.total_actions();
    let next = state.engine.registry().replace(parsed.rules)?;
    for warning in &warnings {
        tracing::warn!(version = next.version, "{warning}");
    }
    Ok(Json(RulesReplaced {
        version: next.version,
        rules: next.rules.len(),
        actions,
        warnings,
    }))
}
