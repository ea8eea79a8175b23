//! # ire-api — HTTP Service for the Incident Routing Engine
//!
//! Accepts domain events, routes them through [`ire_routing::RoutingEngine`],
//! and exposes the resulting alerts and pending approvals to dashboards and
//! team leaders. Intents are handed to an asynchronous notification
//! dispatcher; a background task sweeps for unanswered work and escalates it.
//!
//! ## API Surface
//!
//! | Prefix                    | Module                     | Access        |
//! |---------------------------|----------------------------|---------------|
//! | `/v1/events`              | [`routes::events`]         | any caller    |
//! | `/v1/alerts/*`            | [`routes::alerts`]         | any caller    |
//! | `/v1/approvals/*`         | [`routes::approvals`]      | team leader to decide |
//! | `/v1/rules`               | [`routes::rules`]          | admin         |
//! | `/v1/escalations/sweep`, `/v1/audit` | [`routes::escalations`] | admin |
//! | `/health/*`, `/metrics`   | this module                | unauthenticated |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → HttpMetrics → AuthMiddleware → Handler
//! ```

pub mod auth;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod extractors;
pub mod metrics;
pub mod monitor_task;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;

pub use config::AppConfig;
pub use error::AppError;
pub use state::AppState;

/// Assemble the full application router.
///
/// Health probes and `/metrics` sit outside the auth middleware.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };

    let api = Router::new()
        .merge(routes::events::router())
        .merge(routes::alerts::router())
        .merge(routes::approvals::router())
        .merge(routes::rules::router())
        .merge(routes::escalations::router())
        .merge(openapi::router())
        .layer(from_fn(auth::auth_middleware))
        .layer(axum::Extension(auth_config))
        .with_state(state.clone());

    let public = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/metrics", get(metrics::render))
        .with_state(state);

    Router::new()
        .merge(public)
        .merge(api)
        .layer(from_fn(metrics::http_metrics_middleware))
        .layer(TraceLayer::new_for_http())
}

/// Liveness probe: 200 while the process runs.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe: 503 once the notification dispatcher has stopped.
async fn readiness(State(state): State<AppState>) -> (StatusCode, &'static str) {
    if state.dispatcher.is_running() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "dispatcher stopped")
    }
}
