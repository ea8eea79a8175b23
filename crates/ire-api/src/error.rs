//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps routing and store errors to HTTP status codes with a JSON body of
//! the form `{"error": {"code", "message", "details"?}}`. Internal error
//! details are never returned to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ire_routing::RoutingError;
use ire_state::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "VALIDATION_ERROR").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional context, present only for client errors and 503s.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request validation failed (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Request body could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid token (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Insufficient role (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A dependency is temporarily unreachable (503). Retryable.
    #[error("service unavailable: {message}")]
    Unavailable {
        message: String,
        details: Option<serde_json::Value>,
    },

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Unavailable { .. } => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        if matches!(&self, Self::Internal(_)) {
            tracing::error!(error = %self, "internal server error");
        }

        let details = match self {
            Self::Unavailable { details, .. } => details,
            _ => None,
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => Self::NotFound(err.to_string()),
            StoreError::Validation(msg) => Self::Validation(msg),
            StoreError::Unavailable(_) => Self::Unavailable {
                message: err.to_string(),
                details: Some(serde_json::json!({ "retryable": true })),
            },
        }
    }
}

impl From<RoutingError> for AppError {
    fn from(err: RoutingError) -> Self {
        let message = err.to_string();
        match err {
            RoutingError::MalformedEvent(e) => Self::Validation(e.to_string()),
            RoutingError::RuleConfig(msg) => Self::Validation(msg),
            RoutingError::Store(e) => e.into(),
            RoutingError::StoreUnavailable {
                persisted, pending, ..
            } => {
                let pending_rules: Vec<&str> = pending.iter().map(|i| i.rule_id.as_str()).collect();
                Self::Unavailable {
                    message,
                    details: Some(serde_json::json!({
                        "retryable": true,
                        "persisted": persisted,
                        "pendingIntents": pending.len(),
                        "pendingRules": pending_rules,
                    })),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use ire_core::IngestError;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn status_codes() {
        let cases = [
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (AppError::Validation("x".into()), StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            (AppError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            (AppError::Forbidden("x".into()), StatusCode::FORBIDDEN, "FORBIDDEN"),
            (AppError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status_and_code(), (status, code));
        }
    }

    #[tokio::test]
    async fn internal_details_are_hidden() {
        let (status, body) = body_json(AppError::Internal("db password wrong".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["message"], "An internal error occurred");
        assert!(body["error"].get("details").is_none());
    }

    #[tokio::test]
    async fn malformed_event_is_422() {
        let err: AppError = RoutingError::MalformedEvent(IngestError::MissingKind).into();
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn store_unavailable_is_retryable_503() {
        let err: AppError = RoutingError::StoreUnavailable {
            reason: "connection reset".into(),
            persisted: Vec::new(),
            pending: Vec::new(),
        }
        .into();
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["details"]["retryable"], true);
        assert_eq!(body["error"]["details"]["pendingIntents"], 0);
        assert_eq!(body["error"]["details"]["persisted"], serde_json::json!([]));
    }

    #[test]
    fn store_errors_map() {
        let not_found: AppError = StoreError::NotFound {
            entity: "alert",
            id: "alert:1".into(),
        }
        .into();
        assert!(matches!(not_found, AppError::NotFound(_)));
        let blank: AppError = StoreError::Validation("rejection reason must not be empty".into()).into();
        assert!(matches!(blank, AppError::Validation(_)));
    }
}
