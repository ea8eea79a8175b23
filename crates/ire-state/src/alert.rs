//! # Alert Lifecycle
//!
//! ```text
//! Unacknowledged ──acknowledge(user)──▶ Acknowledged (terminal)
//!       │
//!       └──escalate()──▶ Unacknowledged (severity + 1, capped at critical)
//! ```
//!
//! Alerts never expire. The acknowledgement is recorded exactly once; a later
//! acknowledge attempt is an `InvalidTransition` at this level, which the
//! store turns into a settled no-op carrying the original acknowledger.

use chrono::{DateTime, Utc};
use ire_core::{AlertId, EventId, Severity, StateError, UserId};
use serde::{Deserialize, Serialize};

/// Derived lifecycle state of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertState {
    /// Visible on dashboards, eligible for escalation.
    Unacknowledged,
    /// Seen and owned by a staff member. Terminal.
    Acknowledged,
}

impl AlertState {
    /// Return the string value for serialization.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unacknowledged => "unacknowledged",
            Self::Acknowledged => "acknowledged",
        }
    }
}

impl std::fmt::Display for AlertState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted, acknowledgeable notice shown to staff and management.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: AlertId,
    /// Alert category, e.g. the originating incident type.
    #[serde(rename = "type")]
    pub alert_type: String,
    pub severity: Severity,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facility_id: Option<String>,
    #[serde(default)]
    pub acknowledged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledged_by: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledged_at: Option<DateTime<Utc>>,
    /// Number of escalation steps applied since creation.
    #[serde(default)]
    pub escalation_level: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_event_id: Option<EventId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
}

impl Alert {
    /// Create an unacknowledged alert.
    pub fn new(
        alert_type: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AlertId::new(),
            alert_type: alert_type.into(),
            severity,
            message: message.into(),
            timestamp,
            participant_id: None,
            facility_id: None,
            acknowledged: false,
            acknowledged_by: None,
            acknowledged_at: None,
            escalation_level: 0,
            source_event_id: None,
            rule_id: None,
        }
    }

    /// Builder: set the participant the alert concerns.
    pub fn with_participant(mut self, participant_id: impl Into<String>) -> Self {
        self.participant_id = Some(participant_id.into());
        self
    }

    /// Builder: set the facility the alert belongs to.
    pub fn with_facility(mut self, facility_id: impl Into<String>) -> Self {
        self.facility_id = Some(facility_id.into());
        self
    }

    /// Builder: link the alert to the event and rule that produced it.
    pub fn with_source(mut self, event_id: EventId, rule_id: impl Into<String>) -> Self {
        self.source_event_id = Some(event_id);
        self.rule_id = Some(rule_id.into());
        self
    }

    pub fn state(&self) -> AlertState {
        if self.acknowledged {
            AlertState::Acknowledged
        } else {
            AlertState::Unacknowledged
        }
    }

    /// Record the acknowledgement.
    ///
    /// Fails with `InvalidTransition` if the alert is already acknowledged,
    /// whoever acknowledged it. The existing record is left untouched.
    pub fn acknowledge(&mut self, user: &UserId, at: DateTime<Utc>) -> Result<(), StateError> {
        if self.acknowledged {
            return Err(StateError::InvalidTransition {
                entity: self.id.to_string(),
                from: AlertState::Acknowledged.to_string(),
                to: AlertState::Acknowledged.to_string(),
            });
        }
        self.acknowledged = true;
        self.acknowledged_by = Some(user.clone());
        self.acknowledged_at = Some(at);
        Ok(())
    }

    /// Raise severity one step.
    ///
    /// Returns the new severity, or `None` when the alert is acknowledged or
    /// already critical (nothing changes in either case).
    pub fn escalate(&mut self) -> Option<Severity> {
        if self.acknowledged {
            return None;
        }
        let next = self.severity.escalated()?;
        self.severity = next;
        self.escalation_level += 1;
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(severity: Severity) -> Alert {
        Alert::new("medication_error", severity, "Medication error reported", Utc::now())
    }

    #[test]
    fn new_alert_is_unacknowledged() {
        let a = alert(Severity::Warning);
        assert_eq!(a.state(), AlertState::Unacknowledged);
        assert!(a.acknowledged_by.is_none());
        assert_eq!(a.escalation_level, 0);
    }

    #[test]
    fn acknowledge_records_actor_once() {
        let mut a = alert(Severity::Info);
        let tl = UserId::new("team-leader-1").unwrap();
        let other = UserId::new("manager-2").unwrap();
        let at = Utc::now();

        a.acknowledge(&tl, at).unwrap();
        assert_eq!(a.state(), AlertState::Acknowledged);
        assert_eq!(a.acknowledged_by.as_ref(), Some(&tl));

        let err = a.acknowledge(&other, Utc::now()).unwrap_err();
        assert!(matches!(err, StateError::InvalidTransition { .. }));
        assert_eq!(a.acknowledged_by.as_ref(), Some(&tl));
        assert_eq!(a.acknowledged_at, Some(at));
    }

    #[test]
    fn escalate_steps_and_caps() {
        let mut a = alert(Severity::Info);
        assert_eq!(a.escalate(), Some(Severity::Warning));
        assert_eq!(a.escalate(), Some(Severity::Critical));
        assert_eq!(a.escalate(), None);
        assert_eq!(a.severity, Severity::Critical);
        assert_eq!(a.escalation_level, 2);
    }

    #[test]
    fn acknowledged_alert_does_not_escalate() {
        let mut a = alert(Severity::Info);
        a.acknowledge(&UserId::new("u").unwrap(), Utc::now()).unwrap();
        assert_eq!(a.escalate(), None);
        assert_eq!(a.severity, Severity::Info);
    }

    #[test]
    fn serializes_with_wire_names() {
        let a = alert(Severity::Critical).with_participant("p-1").with_facility("f-1");
        let json = serde_json::to_value(&a).unwrap();
        assert_eq!(json["type"], "medication_error");
        assert_eq!(json["severity"], "critical");
        assert_eq!(json["participantId"], "p-1");
        assert_eq!(json["facilityId"], "f-1");
        assert_eq!(json["acknowledged"], false);
        assert!(json.get("acknowledgedBy").is_none());
    }
}
