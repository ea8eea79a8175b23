//! # Action Scheduler
//!
//! Turns fired rules into [`Intent`]s: one per action, in rule order then
//! action order. The due time is the event time plus the timing offset;
//! `next_business_day` asks the [`BusinessCalendar`].
//!
//! If the calendar fails the intent is still produced, due 24 hours after
//! the event and flagged `degraded`. A calendar failure only affects the
//! action that needed it.
//!
//! Urgency is derived from the event's reported `severity` fact:
//!
//! | reported     | severity | priority |
//! |--------------|----------|----------|
//! | critical     | critical | urgent   |
//! | high         | warning  | high     |
//! | anything else| info     | normal   |
//!
//! `escalate` actions start one step higher on both ladders.

use chrono::{DateTime, Utc};
use ire_core::{AlertId, ApprovalId, Event, EventId, EventKind, IntentId, Priority, Severity};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calendar::{degraded_due, BusinessCalendar};
use crate::facts::FactSet;
use crate::rule::{ActionType, RoutingRule, RuleAction, Timing};

// ---------------------------------------------------------------------------
// Intent
// ---------------------------------------------------------------------------

/// The work item an intent tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum IntentSubject {
    Alert(AlertId),
    Approval(ApprovalId),
}

impl IntentSubject {
    /// Ledger key component.
    pub fn key(&self) -> Uuid {
        match self {
            Self::Alert(id) => id.0,
            Self::Approval(id) => id.0,
        }
    }
}

impl std::fmt::Display for IntentSubject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Alert(id) => write!(f, "{id}"),
            Self::Approval(id) => write!(f, "{id}"),
        }
    }
}

/// A scheduled notification derived from one fired rule action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    pub id: IntentId,
    pub rule_id: String,
    pub action_index: usize,
    pub action_type: ActionType,
    pub recipient: String,
    pub message: String,
    pub event_id: EventId,
    pub event_kind: EventKind,
    pub due_at: DateTime<Utc>,
    /// 1 for the first emission, +1 per escalation.
    pub attempt: u32,
    pub severity: Severity,
    pub priority: Priority,
    /// The due time is a fallback because the calendar failed.
    #[serde(default)]
    pub degraded: bool,
    /// Bound once the alert or approval has been persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<IntentSubject>,
}

impl Intent {
    /// Builder: bind the persisted work item.
    pub fn with_subject(mut self, subject: IntentSubject) -> Self {
        self.subject = Some(subject);
        self
    }

    /// The follow-up emission after one escalation step.
    pub fn reescalated(&self, due_at: DateTime<Utc>, severity: Severity, priority: Priority) -> Self {
        Self {
            id: IntentId::new(),
            due_at,
            attempt: self.attempt + 1,
            severity,
            priority,
            degraded: false,
            ..self.clone()
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due_at <= now
    }
}

// ---------------------------------------------------------------------------
// Scheduling
// ---------------------------------------------------------------------------

/// Resolve an action's due time. Returns `(due_at, degraded)`.
pub fn resolve_due(
    timing: Timing,
    occurred_at: DateTime<Utc>,
    calendar: &dyn BusinessCalendar,
) -> (DateTime<Utc>, bool) {
    if let Some(offset) = timing.offset() {
        return (occurred_at + offset, false);
    }
    match calendar.next_business_day_at(occurred_at) {
        Ok(due) => (due, false),
        Err(e) => {
            tracing::warn!(
                occurred_at = %occurred_at,
                error = %e,
                "business calendar failed; scheduling with 24h fallback"
            );
            (degraded_due(occurred_at), true)
        }
    }
}

/// Substitute `{field}` placeholders from the fact set.
///
/// Unknown placeholders and unbalanced braces are left verbatim.
pub fn render_message(template: &str, facts: &FactSet) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let name = &after[..close];
                match facts.get(name.trim()) {
                    Some(value) => out.push_str(&value.to_string()),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn urgency(action: &RuleAction, facts: &FactSet) -> (Severity, Priority) {
    let reported = facts.text("severity");
    let severity = Severity::from_incident_severity(reported);
    let priority = Priority::from_incident_severity(reported);
    match action.action_type {
        ActionType::Escalate => (
            severity.escalated().unwrap_or(severity),
            priority.escalated().unwrap_or(priority),
        ),
        ActionType::Notify | ActionType::CreateTask => (severity, priority),
    }
}

/// One intent per action of every fired rule, in order.
pub fn schedule(
    fired: &[&RoutingRule],
    event: &Event,
    facts: &FactSet,
    calendar: &dyn BusinessCalendar,
) -> Vec<Intent> {
    let mut intents = Vec::with_capacity(fired.iter().map(|r| r.actions.len()).sum());
    for rule in fired {
        for (index, action) in rule.actions.iter().enumerate() {
            let (due_at, degraded) = resolve_due(action.timing, event.occurred_at, calendar);
            let (severity, priority) = urgency(action, facts);
            let message = match &action.message {
                Some(template) => render_message(template, facts),
                None => format!("{}: {}", rule.name, event.kind),
            };
            intents.push(Intent {
                id: IntentId::new(),
                rule_id: rule.id.clone(),
                action_index: index,
                action_type: action.action_type,
                recipient: action.recipient.clone(),
                message,
                event_id: event.id,
                event_kind: event.kind.clone(),
                due_at,
                attempt: 1,
                severity,
                priority,
                degraded,
                subject: None,
            });
        }
    }
    intents
}
