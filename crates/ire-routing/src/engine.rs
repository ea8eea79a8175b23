//! # Routing Engine
//!
//! The per-event pipeline:
//!
//! ```text
//! payload ─▶ Event ─▶ facts ─▶ fired rules ─▶ intents ─▶ alerts / approvals
//!                                                    └─▶ intent ledger
//! ```
//!
//! Each evaluation works from a single rule-set snapshot. Work items are
//! persisted in intent order; when the store reports itself unavailable the
//! call fails with [`RoutingError::StoreUnavailable`] carrying both the
//! intents persisted before the failure and those not yet persisted. The
//! persisted ones stay bound and tracked, so a caller that retries the whole
//! event may create duplicates; acknowledgement is idempotent, which keeps
//! those harmless.
//!
//! Dispatching intents to people is the caller's job; the engine only
//! returns them. Callers report accepted notifications through
//! [`RoutingEngine::confirm_delivery`] so the monitor knows which intents
//! still owe a notification.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use ire_core::{Event, EventId, EventKind};
use ire_state::{Alert, ApprovalKind, PendingApproval, RoutingStore, StoreError};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};

use crate::audit::{AuditEntry, AuditEntryType, AuditTrail};
use crate::calendar::{BusinessCalendar, WeekdayCalendar};
use crate::error::RoutingError;
use crate::facts::{extract_facts, FactSet};
use crate::ledger::IntentLedger;
use crate::matcher::evaluate_rules;
use crate::monitor::{EscalationMonitor, MonitorConfig, SweepReport};
use crate::registry::RuleRegistry;
use crate::rule::ActionType;
use crate::scheduler::{schedule, Intent, IntentSubject};

/// Everything one event produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingOutcome {
    pub event_id: EventId,
    pub rule_set_version: u64,
    pub fired_rules: Vec<String>,
    pub intents: Vec<Intent>,
    pub alerts: Vec<Alert>,
    pub approvals: Vec<PendingApproval>,
}

enum WorkItem {
    Alert(Alert),
    Approval(PendingApproval),
}

/// The routing pipeline plus its escalation monitor.
pub struct RoutingEngine {
    registry: Arc<RuleRegistry>,
    store: Arc<dyn RoutingStore>,
    calendar: Arc<dyn BusinessCalendar>,
    ledger: Arc<IntentLedger>,
    monitor: EscalationMonitor,
    audit: Mutex<AuditTrail>,
}

impl RoutingEngine {
    /// Engine with a Monday–Friday UTC calendar and default sweep tuning.
    pub fn new(registry: Arc<RuleRegistry>, store: Arc<dyn RoutingStore>) -> Self {
        let ledger = Arc::new(IntentLedger::new());
        let monitor = EscalationMonitor::new(
            Arc::clone(&ledger),
            Arc::clone(&store),
            MonitorConfig::default(),
        );
        Self {
            registry,
            store,
            calendar: Arc::new(WeekdayCalendar::default()),
            ledger,
            monitor,
            audit: Mutex::new(AuditTrail::default()),
        }
    }

    /// Builder: replace the business calendar.
    pub fn with_calendar(mut self, calendar: Arc<dyn BusinessCalendar>) -> Self {
        self.calendar = calendar;
        self
    }

    /// Builder: replace the sweep tuning.
    pub fn with_monitor_config(mut self, config: MonitorConfig) -> Self {
        self.monitor =
            EscalationMonitor::new(Arc::clone(&self.ledger), Arc::clone(&self.store), config);
        self
    }

    pub fn registry(&self) -> &Arc<RuleRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn RoutingStore> {
        &self.store
    }

    pub fn ledger(&self) -> &Arc<IntentLedger> {
        &self.ledger
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        self.monitor.config()
    }

    /// Validate a raw JSON payload and route it.
    pub fn ingest(&self, payload: Value) -> Result<RoutingOutcome, RoutingError> {
        match Event::from_json(payload) {
            Ok(event) => self.process(&event),
            Err(e) => {
                tracing::warn!(error = %e, "rejected malformed event");
                self.record(AuditEntry::new(
                    AuditEntryType::EventRejected,
                    None,
                    Some(json!({ "reason": e.to_string() })),
                ));
                Err(RoutingError::MalformedEvent(e))
            }
        }
    }

    /// Route an already-validated event.
    pub fn process(&self, event: &Event) -> Result<RoutingOutcome, RoutingError> {
        let rules = self.registry.snapshot();
        let subject = event.id.to_string();
        self.record(AuditEntry::new(
            AuditEntryType::EventReceived,
            Some(subject.clone()),
            Some(json!({
                "kind": event.kind.as_str(),
                "occurred_at": ire_core::format_iso8601(&event.occurred_at),
                "rule_set_version": rules.version,
            })),
        ));

        let facts = extract_facts(event);
        let evaluations = evaluate_rules(&facts, &rules.rules);
        for eval in &evaluations {
            self.record(AuditEntry::new(
                AuditEntryType::RuleEvaluated,
                Some(subject.clone()),
                Some(json!({
                    "rule_id": eval.rule_id,
                    "enabled": eval.enabled,
                    "matched": eval.matched,
                })),
            ));
        }
        let fired: Vec<_> = rules
            .rules
            .iter()
            .zip(&evaluations)
            .filter(|(_, eval)| eval.matched)
            .map(|(rule, _)| rule)
            .collect();

        let scheduled = schedule(&fired, event, &facts, self.calendar.as_ref());
        tracing::debug!(
            event_id = %event.id,
            kind = %event.kind,
            fired = fired.len(),
            intents = scheduled.len(),
            "rules evaluated"
        );

        let mut outcome = RoutingOutcome {
            event_id: event.id,
            rule_set_version: rules.version,
            fired_rules: fired.iter().map(|r| r.id.clone()).collect(),
            intents: Vec::with_capacity(scheduled.len()),
            alerts: Vec::new(),
            approvals: Vec::new(),
        };

        for (index, intent) in scheduled.iter().enumerate() {
            let (bound, item) = match self.persist(intent, event, &facts) {
                Ok(done) => done,
                Err(StoreError::Unavailable(reason)) => {
                    tracing::error!(
                        event_id = %event.id,
                        reason = %reason,
                        persisted = outcome.intents.len(),
                        pending = scheduled.len() - index,
                        "store unavailable; intents not persisted"
                    );
                    return Err(RoutingError::StoreUnavailable {
                        reason,
                        persisted: outcome.intents,
                        pending: scheduled[index..].to_vec(),
                    });
                }
                Err(e) => return Err(RoutingError::Store(e)),
            };

            if bound.degraded {
                tracing::warn!(
                    event_id = %event.id,
                    rule_id = %bound.rule_id,
                    "intent scheduled with degraded due time"
                );
            }
            self.ledger.record(bound.clone());
            self.record(AuditEntry::new(
                AuditEntryType::IntentScheduled,
                Some(subject.clone()),
                Some(json!({
                    "intent_id": bound.id.to_string(),
                    "rule_id": bound.rule_id,
                    "action_index": bound.action_index,
                    "recipient": bound.recipient,
                    "due_at": ire_core::format_iso8601(&bound.due_at),
                    "degraded": bound.degraded,
                    "subject": bound.subject.map(|s| s.to_string()),
                })),
            ));
            match item {
                WorkItem::Alert(a) => outcome.alerts.push(a),
                WorkItem::Approval(a) => outcome.approvals.push(a),
            }
            outcome.intents.push(bound);
        }

        Ok(outcome)
    }

    fn persist(
        &self,
        intent: &Intent,
        event: &Event,
        facts: &FactSet,
    ) -> Result<(Intent, WorkItem), StoreError> {
        match intent.action_type {
            ActionType::Notify | ActionType::Escalate => {
                let alert_type = facts
                    .text("type")
                    .map(str::to_string)
                    .unwrap_or_else(|| event.kind.to_string());
                let mut alert = Alert::new(
                    alert_type,
                    intent.severity,
                    intent.message.clone(),
                    event.occurred_at,
                )
                .with_source(event.id, intent.rule_id.clone());
                if let Some(p) = facts.text("participant_id") {
                    alert = alert.with_participant(p);
                }
                if let Some(f) = facts.text("facility_id") {
                    alert = alert.with_facility(f);
                }
                let alert = self.store.insert_alert(alert)?;
                let bound = intent.clone().with_subject(IntentSubject::Alert(alert.id));
                Ok((bound, WorkItem::Alert(alert)))
            }
            ActionType::CreateTask => {
                let kind = if event.kind == EventKind::ShiftHandover {
                    ApprovalKind::ShiftHandover
                } else {
                    ApprovalKind::IncidentReport
                };
                let content = facts
                    .text("content")
                    .or_else(|| facts.text("description"))
                    .unwrap_or(&intent.message)
                    .to_string();
                let approval = PendingApproval::new(
                    kind,
                    intent.priority,
                    facts.text("staff_id").unwrap_or_default(),
                    facts.text("staff_name").unwrap_or_default(),
                    content,
                    event.occurred_at,
                )
                .with_assigned_role(intent.recipient.clone())
                .with_source(event.id, intent.rule_id.clone());
                let approval = self.store.insert_approval(approval)?;
                let bound = intent
                    .clone()
                    .with_subject(IntentSubject::Approval(approval.id));
                Ok((bound, WorkItem::Approval(approval)))
            }
        }
    }

    /// Run one escalation sweep as of `now`.
    pub fn sweep(&self, now: DateTime<Utc>) -> SweepReport {
        let report = self.monitor.sweep(now);
        for intent in &report.emitted {
            self.record(AuditEntry::new(
                AuditEntryType::IntentEscalated,
                intent.subject.map(|s| s.to_string()),
                Some(json!({
                    "intent_id": intent.id.to_string(),
                    "rule_id": intent.rule_id,
                    "attempt": intent.attempt,
                    "severity": intent.severity.as_str(),
                    "priority": intent.priority.as_str(),
                })),
            ));
        }
        report
    }

    /// Note that the notifier accepted `intent`. Returns `false` when the
    /// ledger no longer tracks it.
    pub fn confirm_delivery(&self, intent: &Intent) -> bool {
        self.ledger.mark_delivered(intent)
    }

    fn record(&self, entry: AuditEntry) {
        self.audit.lock().append(entry);
    }

    /// The most recent `n` audit entries.
    pub fn recent_audit(&self, n: usize) -> Vec<AuditEntry> {
        self.audit.lock().last_n(n).to_vec()
    }

    /// Audit entries concerning `subject` (display form, e.g. `event:…`).
    pub fn audit_for(&self, subject: &str) -> Vec<AuditEntry> {
        self.audit
            .lock()
            .entries_for_subject(subject)
            .into_iter()
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for RoutingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingEngine")
            .field("rule_set_version", &self.registry.snapshot().version)
            .field("ledger", &self.ledger.len())
            .field("monitor", &self.monitor)
            .finish()
    }
}
