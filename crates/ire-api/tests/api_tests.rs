//! # Integration Tests for ire-api
//!
//! Drives the assembled router with `tower::ServiceExt::oneshot`: event
//! ingestion, alert acknowledgement, approval decisions and their role
//! checks, rule administration, manual sweeps, authentication, and health
//! probes.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use ire_api::config::AppConfig;
use ire_api::dispatch::LogNotifier;
use ire_api::state::AppState;
use ire_routing::RuleSet;
use ire_state::MemoryStore;

const RULES: &str = r#"
version: 1
rules:
  - id: high-medication
    name: High severity medication error
    conditions:
      - { field: severity, operator: equals, value: high }
      - { field: type, operator: equals, value: medication_error }
    actions:
      - { type: notify, recipient: team_leader, timing: within_30_min }
      - { type: create_task, recipient: team_leader, timing: next_business_day }
"#;

const SECRET: &str = "s3cret";

fn rules() -> RuleSet {
    RuleSet::from_yaml_str(RULES).unwrap()
}

/// Helper: build the test app with auth disabled.
fn test_app() -> (AppState, axum::Router) {
    let state = AppState::with_parts(
        AppConfig::default(),
        rules(),
        Arc::new(MemoryStore::new()),
        Arc::new(LogNotifier),
    );
    (state.clone(), ire_api::app(state))
}

/// Helper: build the test app with bearer auth enabled.
fn test_app_with_auth() -> axum::Router {
    let config = AppConfig {
        auth_token: Some(SECRET.to_string()),
        ..AppConfig::default()
    };
    let state = AppState::with_parts(config, rules(), Arc::new(MemoryStore::new()), Arc::new(LogNotifier));
    ire_api::app(state)
}

fn token(role: &str, user: &str) -> String {
    format!("Bearer {role}:{user}:{SECRET}")
}

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    auth: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(a) = auth {
        builder = builder.header("Authorization", a);
    }
    let body = match body {
        Some(v) => {
            builder = builder.header("Content-Type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

fn incident() -> Value {
    json!({
        "kind": "incident_created",
        "occurredAt": "2025-10-07T14:00:00Z",
        "severity": "high",
        "type": "medication_error",
        "participantId": "p-12",
        "facilityId": "f-3",
        "staffId": "s-4",
        "staffName": "Jordan Lee",
    })
}

// -- Health Probes ------------------------------------------------------------

#[tokio::test]
async fn test_liveness_and_readiness() {
    let (_, app) = test_app();
    let (status, body) = send(&app, "GET", "/health/liveness", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ok".into()));

    let (status, body) = send(&app, "GET", "/health/readiness", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ready".into()));
}

#[tokio::test]
async fn test_health_probes_skip_auth() {
    let app = test_app_with_auth();
    let (status, _) = send(&app, "GET", "/health/liveness", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "GET", "/metrics", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

// -- Events -------------------------------------------------------------------

#[tokio::test]
async fn test_ingest_routes_incident() {
    let (_, app) = test_app();
    let (status, body) = send(&app, "POST", "/v1/events", None, Some(incident())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["ruleSetVersion"], 1);
    assert_eq!(body["firedRules"], json!(["high-medication"]));
    assert_eq!(body["intents"].as_array().unwrap().len(), 2);
    assert_eq!(body["intents"][0]["dueAt"], "2025-10-07T14:30:00Z");
    assert_eq!(body["alerts"][0]["severity"], "warning");
    assert_eq!(body["approvals"][0]["type"], "incident_report");
    assert_eq!(body["approvals"][0]["priority"], "high");

    let (status, alerts) = send(&app, "GET", "/v1/alerts?facilityId=f-3", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(alerts.as_array().unwrap().len(), 1);

    let (_, approvals) = send(&app, "GET", "/v1/approvals?role=TEAM_LEADER", None, None).await;
    assert_eq!(approvals.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unmatched_event_creates_nothing() {
    let (_, app) = test_app();
    let (status, body) = send(
        &app,
        "POST",
        "/v1/events",
        None,
        Some(json!({"kind": "incident_created", "occurredAt": "2025-10-07T14:00:00Z", "severity": "low"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["intents"].as_array().unwrap().is_empty());
    let (_, alerts) = send(&app, "GET", "/v1/alerts", None, None).await;
    assert!(alerts.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_event_returns_422() {
    let (_, app) = test_app();
    let (status, body) = send(&app, "POST", "/v1/events", None, Some(json!({"severity": "high"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, _) = send(
        &app,
        "POST",
        "/v1/events",
        None,
        Some(json!({"kind": "incident_created", "occurredAt": "yesterday"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_non_json_body_returns_400() {
    let (_, app) = test_app();
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/events")
                .header("Content-Type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// -- Alerts -------------------------------------------------------------------

#[tokio::test]
async fn test_acknowledge_is_idempotent() {
    let (_, app) = test_app();
    let (_, routed) = send(&app, "POST", "/v1/events", None, Some(incident())).await;
    let id = routed["alerts"][0]["id"].as_str().unwrap().to_string();
    let uri = format!("/v1/alerts/{id}/acknowledge");

    let (status, first) = send(&app, "POST", &uri, None, Some(json!({"userId": "u-1"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["outcome"], "applied");
    assert_eq!(first["record"]["acknowledgedBy"], "u-1");

    let (status, second) = send(&app, "POST", &uri, None, Some(json!({"userId": "u-2"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["outcome"], "already_settled");
    assert_eq!(second["record"]["acknowledgedBy"], "u-1");

    let (_, alerts) = send(&app, "GET", "/v1/alerts", None, None).await;
    assert!(alerts.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_acknowledge_requires_a_user() {
    let (_, app) = test_app();
    let (_, routed) = send(&app, "POST", "/v1/events", None, Some(incident())).await;
    let id = routed["alerts"][0]["id"].as_str().unwrap().to_string();
    let (status, _) = send(&app, "POST", &format!("/v1/alerts/{id}/acknowledge"), None, None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_unknown_alert_returns_404() {
    let (_, app) = test_app();
    let uri = format!("/v1/alerts/{}/acknowledge", uuid::Uuid::new_v4());
    let (status, body) = send(&app, "POST", &uri, None, Some(json!({"userId": "u-1"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_create_alert_directly() {
    let (_, app) = test_app();
    let (status, body) = send(
        &app,
        "POST",
        "/v1/alerts",
        None,
        Some(json!({"type": "billing_status_changed", "severity": "info", "message": "Claim paid"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["acknowledged"], false);

    let (status, _) = send(
        &app,
        "POST",
        "/v1/alerts",
        None,
        Some(json!({"type": "x", "severity": "catastrophic", "message": "m"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

// -- Approvals ----------------------------------------------------------------

async fn routed_approval_id(app: &axum::Router, auth: Option<&str>) -> String {
    let (status, routed) = send(app, "POST", "/v1/events", auth, Some(incident())).await;
    assert_eq!(status, StatusCode::CREATED);
    routed["approvals"][0]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_staff_cannot_decide_approvals() {
    let app = test_app_with_auth();
    let id = routed_approval_id(&app, Some(&token("staff", "s-4"))).await;
    let (status, body) = send(
        &app,
        "POST",
        &format!("/v1/approvals/{id}/approve"),
        Some(&token("staff", "s-4")),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_team_leader_approves_once() {
    let app = test_app_with_auth();
    let id = routed_approval_id(&app, Some(&token("staff", "s-4"))).await;
    let uri = format!("/v1/approvals/{id}/approve");

    let (status, first) = send(&app, "POST", &uri, Some(&token("team_leader", "tl-1")), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["outcome"], "applied");
    assert_eq!(first["record"]["status"], "approved");
    assert_eq!(first["record"]["decidedBy"], "tl-1");

    let reject_uri = format!("/v1/approvals/{id}/reject");
    let (status, second) = send(
        &app,
        "POST",
        &reject_uri,
        Some(&token("team_leader", "tl-2")),
        Some(json!({"reason": "too late"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["outcome"], "already_settled");
    assert_eq!(second["record"]["status"], "approved");
}

#[tokio::test]
async fn test_reject_requires_reason() {
    let (_, app) = test_app();
    let id = routed_approval_id(&app, None).await;
    let uri = format!("/v1/approvals/{id}/reject");

    let (status, _) = send(&app, "POST", &uri, None, Some(json!({"reason": "   ", "userId": "tl-1"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, current) = send(&app, "GET", &format!("/v1/approvals/{id}"), None, None).await;
    assert_eq!(current["status"], "pending");

    let (status, body) = send(
        &app,
        "POST",
        &uri,
        None,
        Some(json!({"reason": "Missing witness statement", "userId": "tl-1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["record"]["rejectionReason"], "Missing witness statement");
}

#[tokio::test]
async fn test_list_approvals_rejects_unknown_type() {
    let (_, app) = test_app();
    let (status, _) = send(&app, "GET", "/v1/approvals?type=expense", None, None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

// -- Rules --------------------------------------------------------------------

#[tokio::test]
async fn test_replace_and_read_rules() {
    let (state, app) = test_app();
    let yaml = r#"
- id: any-fall
  name: Any fall
  conditions:
    - { field: type, operator: equals, value: fall }
  actions:
    - { type: escalate, recipient: facility_manager, timing: immediate }
"#;
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/v1/rules")
                .header("Content-Type", "application/yaml")
                .body(Body::from(yaml))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let replaced: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(replaced["version"], 2);
    assert_eq!(replaced["rules"], 1);
    assert_eq!(state.engine.registry().snapshot().version, 2);

    let (status, body) = send(&app, "GET", "/v1/rules", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rules"][0]["id"], "any-fall");

    let (_, routed) = send(
        &app,
        "POST",
        "/v1/events",
        None,
        Some(json!({"kind": "incident_created", "occurredAt": "2025-10-07T14:00:00Z", "type": "fall"})),
    )
    .await;
    assert_eq!(routed["ruleSetVersion"], 2);
    assert_eq!(routed["alerts"][0]["severity"], "warning");
}

#[tokio::test]
async fn test_invalid_rules_keep_previous_version() {
    let (state, app) = test_app();
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/v1/rules")
                .body(Body::from("- id: broken\n  name: Broken\n  actions: [{ type: page, recipient: x, timing: immediate }]\n"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(state.engine.registry().snapshot().version, 1);
}

#[tokio::test]
async fn test_rules_require_admin() {
    let app = test_app_with_auth();
    let (status, _) = send(&app, "GET", "/v1/rules", Some(&token("team_leader", "tl-1")), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, "GET", "/v1/rules", Some(&token("admin", "ops-1")), None).await;
    assert_eq!(status, StatusCode::OK);
}

// -- Escalations --------------------------------------------------------------

#[tokio::test]
async fn test_manual_sweep_escalates_overdue_alert() {
    let (_, app) = test_app();
    let (_, routed) = send(&app, "POST", "/v1/events", None, Some(incident())).await;
    let alert_id = routed["alerts"][0]["id"].as_str().unwrap().to_string();

    let (status, early) = send(
        &app,
        "POST",
        "/v1/escalations/sweep",
        None,
        Some(json!({"at": "2025-10-07T14:10:00Z"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(early["emitted"].as_array().unwrap().is_empty());

    let (_, report) = send(
        &app,
        "POST",
        "/v1/escalations/sweep",
        None,
        Some(json!({"at": "2025-10-07T14:31:00Z"})),
    )
    .await;
    let emitted = report["emitted"].as_array().unwrap();
    assert_eq!(emitted.len(), 1);
    assert_eq!(emitted[0]["attempt"], 2);
    assert_eq!(emitted[0]["severity"], "critical");

    let (_, alert) = send(&app, "GET", &format!("/v1/alerts/{alert_id}"), None, None).await;
    assert_eq!(alert["severity"], "critical");

    let (status, audit) = send(&app, "GET", &format!("/v1/audit?subject=alert:{alert_id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(audit
        .as_array()
        .unwrap()
        .iter()
        .any(|e| e["entry_type"] == "intent_escalated"));
}

#[tokio::test]
async fn test_sweep_requires_admin() {
    let app = test_app_with_auth();
    let (status, _) = send(
        &app,
        "POST",
        "/v1/escalations/sweep",
        Some(&token("team_leader", "tl-1")),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// -- Authentication -----------------------------------------------------------

#[tokio::test]
async fn test_missing_or_wrong_token_returns_401() {
    let app = test_app_with_auth();
    let (status, body) = send(&app, "GET", "/v1/alerts", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, _) = send(&app, "GET", "/v1/alerts", Some("Bearer staff:s-1:wrong"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_user_is_the_acknowledger() {
    let app = test_app_with_auth();
    let (_, routed) = send(&app, "POST", "/v1/events", Some(&token("staff", "s-1")), Some(incident())).await;
    let id = routed["alerts"][0]["id"].as_str().unwrap().to_string();
    let (status, body) = send(
        &app,
        "POST",
        &format!("/v1/alerts/{id}/acknowledge"),
        Some(&token("staff", "s-1")),
        Some(json!({"userId": "someone-else"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["record"]["acknowledgedBy"], "s-1");
}

// -- OpenAPI ------------------------------------------------------------------

#[tokio::test]
async fn test_openapi_document_served() {
    let (_, app) = test_app();
    let (status, body) = send(&app, "GET", "/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/v1/events"].is_object());
}

// -- Store outage -------------------------------------------------------------

mod outage {
    use super::*;
    use std::time::Duration;

    use chrono::{DateTime, Utc};
    use ire_api::dispatch::{Notifier, NotifyError};
    use ire_core::{AlertId, ApprovalId, UserId};
    use ire_routing::Intent;
    use ire_state::{
        Alert, AlertFilter, ApprovalFilter, Escalation, PendingApproval, RoutingStore,
        StoreError, TransitionOutcome,
    };
    use parking_lot::Mutex;

    const CRITICAL_RULES: &str = r#"
- id: critical-incident
  name: Critical incident
  conditions:
    - { field: severity, operator: equals, value: critical }
  actions:
    - { type: notify, recipient: team_leader, timing: immediate }
    - { type: create_task, recipient: team_leader, timing: immediate }
"#;

    /// Alerts persist; approval writes fail as unreachable.
    struct ApprovalsDown(MemoryStore);

    impl RoutingStore for ApprovalsDown {
        fn insert_alert(&self, alert: Alert) -> Result<Alert, StoreError> {
            self.0.insert_alert(alert)
        }
        fn get_alert(&self, id: &AlertId) -> Result<Alert, StoreError> {
            self.0.get_alert(id)
        }
        fn acknowledge(
            &self,
            id: &AlertId,
            user: &UserId,
            at: DateTime<Utc>,
        ) -> Result<TransitionOutcome<Alert>, StoreError> {
            self.0.acknowledge(id, user, at)
        }
        fn escalate_alert(&self, id: &AlertId) -> Result<Escalation<Alert>, StoreError> {
            self.0.escalate_alert(id)
        }
        fn list_unacknowledged(&self, filter: &AlertFilter) -> Result<Vec<Alert>, StoreError> {
            self.0.list_unacknowledged(filter)
        }
        fn insert_approval(&self, _: PendingApproval) -> Result<PendingApproval, StoreError> {
            Err(StoreError::Unavailable("connection reset".into()))
        }
        fn get_approval(&self, id: &ApprovalId) -> Result<PendingApproval, StoreError> {
            self.0.get_approval(id)
        }
        fn approve(
            &self,
            id: &ApprovalId,
            user: &UserId,
            at: DateTime<Utc>,
        ) -> Result<TransitionOutcome<PendingApproval>, StoreError> {
            self.0.approve(id, user, at)
        }
        fn reject(
            &self,
            id: &ApprovalId,
            user: &UserId,
            reason: &str,
            at: DateTime<Utc>,
        ) -> Result<TransitionOutcome<PendingApproval>, StoreError> {
            self.0.reject(id, user, reason, at)
        }
        fn escalate_approval(
            &self,
            id: &ApprovalId,
        ) -> Result<Escalation<PendingApproval>, StoreError> {
            self.0.escalate_approval(id)
        }
        fn list_pending(&self, filter: &ApprovalFilter) -> Result<Vec<PendingApproval>, StoreError> {
            self.0.list_pending(filter)
        }
    }

    #[derive(Default)]
    struct Recording(Mutex<Vec<Intent>>);

    impl Notifier for Recording {
        fn notify(&self, intent: &Intent) -> Result<(), NotifyError> {
            self.0.lock().push(intent.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_persisted_intents_are_dispatched_despite_503() {
        let notifier = Arc::new(Recording::default());
        let state = AppState::with_parts(
            AppConfig::default(),
            RuleSet::from_yaml_str(CRITICAL_RULES).unwrap(),
            Arc::new(ApprovalsDown(MemoryStore::new())),
            notifier.clone(),
        );
        let app = ire_api::app(state.clone());

        let mut event = incident();
        event["severity"] = json!("critical");
        let (status, body) = send(&app, "POST", "/v1/events", None, Some(event)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let details = &body["error"]["details"];
        assert_eq!(details["retryable"], true);
        assert_eq!(details["pendingIntents"], 1);
        let persisted = details["persisted"].as_array().unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0]["actionType"], "notify");
        assert_eq!(persisted[0]["severity"], "critical");

        let mut delivered = Vec::new();
        for _ in 0..100 {
            delivered = notifier.0.lock().clone();
            if !delivered.is_empty() && state.engine.ledger().is_delivered(&delivered[0]) == Some(true) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].severity, ire_core::Severity::Critical);
        assert_eq!(state.engine.ledger().is_delivered(&delivered[0]), Some(true));

        // Delivered and already critical: the sweep has nothing to re-send.
        let (_, report) = send(
            &app,
            "POST",
            "/v1/escalations/sweep",
            None,
            Some(json!({"at": "2025-10-07T14:05:00Z"})),
        )
        .await;
        assert!(report["emitted"].as_array().unwrap().is_empty());
        assert_eq!(report["atMaximum"], 1);
        assert_eq!(report["redelivered"], 0);
    }
}
