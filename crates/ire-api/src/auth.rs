//! # Authentication & Authorization Middleware
//!
//! Bearer token middleware with role-based access control.
//!
//! ## Token Format
//!
//! ```text
//! Bearer {role}:{user_id}:{secret}   e.g. team_leader:jlee:s3cret
//! Bearer {secret}                    treated as admin with no user id
//! ```
//!
//! Roles are ordered `staff < team_leader < admin`. Every authenticated
//! request carries a [`CallerIdentity`] in its extensions; handlers extract
//! it directly.

use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ire_core::UserId;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use utoipa::ToSchema;

use crate::error::{AppError, ErrorBody, ErrorDetail};

// ── Role ────────────────────────────────────────────────────────────────────

/// Caller roles, ordered by privilege.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Front-line staff: read, acknowledge, create work items.
    Staff,
    /// Can approve or reject pending approvals.
    TeamLeader,
    /// Rule administration and manual sweeps.
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Staff => "staff",
            Self::TeamLeader => "team_leader",
            Self::Admin => "admin",
        }
    }
}

// ── CallerIdentity ──────────────────────────────────────────────────────────

/// Identity of the authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub role: Role,
    /// `None` for legacy tokens and when auth is disabled.
    pub user_id: Option<UserId>,
}

impl CallerIdentity {
    pub fn has_role(&self, minimum: Role) -> bool {
        self.role >= minimum
    }

    /// The acting user: the token's user id, else `fallback` from the
    /// request body.
    pub fn actor(&self, fallback: Option<&str>) -> Result<UserId, AppError> {
        if let Some(id) = &self.user_id {
            return Ok(id.clone());
        }
        let raw = fallback.ok_or_else(|| {
            AppError::Validation("userId is required when the token carries no user".into())
        })?;
        UserId::new(raw).map_err(|e| AppError::Validation(e.to_string()))
    }
}

impl<S: Send + Sync> FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("no caller identity in request context".into()))
    }
}

/// 403 unless the caller has at least `minimum`.
pub fn require_role(caller: &CallerIdentity, minimum: Role) -> Result<(), AppError> {
    if caller.has_role(minimum) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "role '{}' required, caller has '{}'",
            minimum.as_str(),
            caller.role.as_str()
        )))
    }
}

// ── Auth Configuration ──────────────────────────────────────────────────────

/// Auth configuration injected into request extensions.
///
/// Custom `Debug` redacts the token value.
#[derive(Clone)]
pub struct AuthConfig {
    pub token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

// ── Token Validation ────────────────────────────────────────────────────────

fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Parse `{role}:{user_id}:{secret}` or a bare `{secret}`.
pub fn parse_bearer_token(provided: &str, expected_secret: &str) -> Result<CallerIdentity, String> {
    let parts: Vec<&str> = provided.splitn(3, ':').collect();

    match parts.as_slice() {
        [secret] => {
            if constant_time_token_eq(secret, expected_secret) {
                Ok(CallerIdentity {
                    role: Role::Admin,
                    user_id: None,
                })
            } else {
                Err("invalid bearer token".into())
            }
        }
        [role, user, secret] => {
            if !constant_time_token_eq(secret, expected_secret) {
                return Err("invalid bearer token".into());
            }
            let role = match *role {
                "admin" => Role::Admin,
                "team_leader" => Role::TeamLeader,
                "staff" => Role::Staff,
                other => return Err(format!("unknown role: {other}")),
            };
            let user_id = if user.is_empty() {
                None
            } else {
                Some(UserId::new(*user).map_err(|e| format!("invalid user_id: {e}"))?)
            };
            Ok(CallerIdentity { role, user_id })
        }
        _ => Err("invalid token format, expected {role}:{user_id}:{secret} or {secret}".into()),
    }
}

// ── Middleware ───────────────────────────────────────────────────────────────

/// Validate the bearer token and inject the caller's identity.
///
/// With no configured token every request runs as `admin` without a user id.
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let expected_token = request.extensions().get::<AuthConfig>().cloned();

    match expected_token {
        Some(AuthConfig {
            token: Some(ref expected),
        }) => {
            let auth_header = request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok());

            match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
                Some(provided) => match parse_bearer_token(provided, expected) {
                    Ok(identity) => {
                        request.extensions_mut().insert(identity);
                        next.run(request).await
                    }
                    Err(msg) => {
                        tracing::warn!(reason = %msg, "authentication failed: invalid bearer token");
                        unauthorized_response(&msg)
                    }
                },
                None if auth_header.is_some() => {
                    tracing::warn!("authentication failed: non-Bearer authorization scheme");
                    unauthorized_response("authorization header must use Bearer scheme")
                }
                None => {
                    tracing::warn!("authentication failed: missing authorization header");
                    unauthorized_response("missing authorization header")
                }
            }
        }
        _ => {
            request.extensions_mut().insert(CallerIdentity {
                role: Role::Admin,
                user_id: None,
            });
            next.run(request).await
        }
    }
}

fn unauthorized_response(message: &str) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message: message.to_string(),
            details: None,
        },
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}
