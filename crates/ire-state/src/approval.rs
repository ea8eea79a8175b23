//! # Pending Approval Lifecycle
//!
//! A human-in-the-loop decision blocking downstream workflow (a shift
//! handover sign-off, an incident report review).
//!
//! ```text
//! Pending ──approve(user)─────────▶ Approved (terminal)
//!    │
//!    ├──reject(user, reason)──────▶ Rejected (terminal, reason required)
//!    │
//!    └──escalate()──▶ Pending (priority + 1, capped at urgent)
//! ```
//!
//! There is no way back out of a terminal state.

use chrono::{DateTime, Utc};
use ire_core::{ApprovalId, EventId, Priority, StateError, UserId};
use serde::{Deserialize, Serialize};

/// What is awaiting a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalKind {
    ShiftHandover,
    IncidentReport,
}

impl ApprovalKind {
    /// Return the string value for serialization.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ShiftHandover => "shift_handover",
            Self::IncidentReport => "incident_report",
        }
    }
}

impl std::str::FromStr for ApprovalKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shift_handover" => Ok(Self::ShiftHandover),
            "incident_report" => Ok(Self::IncidentReport),
            other => Err(format!(
                "unknown approval type '{other}': must be shift_handover or incident_report"
            )),
        }
    }
}

impl std::fmt::Display for ApprovalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a pending approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// Awaiting a decision.
    Pending,
    /// Approved. Terminal.
    Approved,
    /// Rejected with a reason. Terminal.
    Rejected,
}

impl ApprovalStatus {
    /// Return the string value for serialization.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Whether this is a terminal status (no further transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted human-decision item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingApproval {
    pub id: ApprovalId,
    #[serde(rename = "type")]
    pub kind: ApprovalKind,
    pub priority: Priority,
    pub staff_id: String,
    pub staff_name: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Role expected to decide, e.g. `team_leader`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_role: Option<String>,
    pub status: ApprovalStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decided_by: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(default)]
    pub escalation_level: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_event_id: Option<EventId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
}

impl PendingApproval {
    /// Create a pending approval.
    pub fn new(
        kind: ApprovalKind,
        priority: Priority,
        staff_id: impl Into<String>,
        staff_name: impl Into<String>,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ApprovalId::new(),
            kind,
            priority,
            staff_id: staff_id.into(),
            staff_name: staff_name.into(),
            content: content.into(),
            timestamp,
            assigned_role: None,
            status: ApprovalStatus::Pending,
            decided_by: None,
            decided_at: None,
            rejection_reason: None,
            escalation_level: 0,
            source_event_id: None,
            rule_id: None,
        }
    }

    /// Builder: set the deciding role.
    pub fn with_assigned_role(mut self, role: impl Into<String>) -> Self {
        self.assigned_role = Some(role.into());
        self
    }

    /// Builder: link the approval to the event and rule that produced it.
    pub fn with_source(mut self, event_id: EventId, rule_id: impl Into<String>) -> Self {
        self.source_event_id = Some(event_id);
        self.rule_id = Some(rule_id.into());
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == ApprovalStatus::Pending
    }

    /// Pending → Approved.
    pub fn approve(&mut self, user: &UserId, at: DateTime<Utc>) -> Result<(), StateError> {
        self.ensure_pending(ApprovalStatus::Approved)?;
        self.status = ApprovalStatus::Approved;
        self.decided_by = Some(user.clone());
        self.decided_at = Some(at);
        Ok(())
    }

    /// Pending → Rejected. The reason is trimmed and must not be empty.
    pub fn reject(
        &mut self,
        user: &UserId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StateError> {
        let reason = validate_rejection_reason(reason)?;
        self.ensure_pending(ApprovalStatus::Rejected)?;
        self.status = ApprovalStatus::Rejected;
        self.decided_by = Some(user.clone());
        self.decided_at = Some(at);
        self.rejection_reason = Some(reason.to_string());
        Ok(())
    }

    /// Raise priority one step. `None` when settled or already urgent.
    pub fn escalate(&mut self) -> Option<Priority> {
        if !self.is_pending() {
            return None;
        }
        let next = self.priority.escalated()?;
        self.priority = next;
        self.escalation_level += 1;
        Some(next)
    }

    fn ensure_pending(&self, to: ApprovalStatus) -> Result<(), StateError> {
        if self.status.is_terminal() {
            return Err(StateError::InvalidTransition {
                entity: self.id.to_string(),
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        Ok(())
    }
}

/// Boundary check for rejection reasons. Returns the trimmed reason.
pub fn validate_rejection_reason(reason: &str) -> Result<&str, StateError> {
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        return Err(StateError::EmptyRejectionReason);
    }
    Ok(trimmed)
}
