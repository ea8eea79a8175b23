//! # Domain Vocabulary
//!
//! The urgency ladders used by alerts and approvals, the event kinds the
//! engine recognises, and the mapping from an incident's reported severity
//! (`low`/`medium`/`high`/`critical`) onto those ladders.
//!
//! Both ladders derive `Ord` in declaration order, so `Severity::Critical >
//! Severity::Info` and comparisons in filters need no lookup tables.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::IreError;

/// Alert severity, ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational; no action expected beyond reading.
    Info,
    /// Needs attention from the responsible role.
    Warning,
    /// Safety-critical; needs immediate attention. Ceiling of the ladder.
    Critical,
}

impl Severity {
    /// Return the string value for serialization.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }

    /// The next step up the ladder, or `None` at the ceiling.
    pub fn escalated(&self) -> Option<Self> {
        match self {
            Self::Info => Some(Self::Warning),
            Self::Warning => Some(Self::Critical),
            Self::Critical => None,
        }
    }

    /// Whether no further escalation is possible.
    pub fn is_max(&self) -> bool {
        self.escalated().is_none()
    }

    /// Map an incident's reported severity onto the alert ladder.
    ///
    /// `critical` → critical, `high` → warning, anything else → info.
    pub fn from_incident_severity(reported: Option<&str>) -> Self {
        match reported.and_then(incident_severity_rank) {
            Some(3) => Self::Critical,
            Some(2) => Self::Warning,
            _ => Self::Info,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = IreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(Self::Info),
            "warning" => Ok(Self::Warning),
            "critical" => Ok(Self::Critical),
            other => Err(IreError::Validation(format!(
                "unknown severity '{other}': must be info, warning, or critical"
            ))),
        }
    }
}

/// Pending-approval priority, ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Routine review.
    Normal,
    /// Review this shift.
    High,
    /// Review now. Ceiling of the ladder.
    Urgent,
}

impl Priority {
    /// Return the string value for serialization.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    /// The next step up the ladder, or `None` at the ceiling.
    pub fn escalated(&self) -> Option<Self> {
        match self {
            Self::Normal => Some(Self::High),
            Self::High => Some(Self::Urgent),
            Self::Urgent => None,
        }
    }

    /// Whether no further escalation is possible.
    pub fn is_max(&self) -> bool {
        self.escalated().is_none()
    }

    /// Map an incident's reported severity onto the priority ladder.
    ///
    /// `critical` → urgent, `high` → high, anything else → normal.
    pub fn from_incident_severity(reported: Option<&str>) -> Self {
        match reported.and_then(incident_severity_rank) {
            Some(3) => Self::Urgent,
            Some(2) => Self::High,
            _ => Self::Normal,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = IreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            other => Err(IreError::Validation(format!(
                "unknown priority '{other}': must be normal, high, or urgent"
            ))),
        }
    }
}

/// Ordinal of a reported incident severity: low=0, medium=1, high=2,
/// critical=3. Case-insensitive; `None` for anything else.
pub fn incident_severity_rank(reported: &str) -> Option<u8> {
    match reported.trim().to_ascii_lowercase().as_str() {
        "low" => Some(0),
        "medium" => Some(1),
        "high" => Some(2),
        "critical" => Some(3),
        _ => None,
    }
}

/// The kind of a domain event.
///
/// Known kinds get their own variant; anything else is carried verbatim in
/// `Other` so new collaborator events never fail ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    /// A new incident was reported.
    IncidentCreated,
    /// An incident report was submitted for review.
    ReportSubmitted,
    /// A shift handover note was lodged.
    ShiftHandover,
    /// A billing record changed state.
    BillingStatusChanged,
    /// Any other kind, lower-cased.
    Other(String),
}

impl EventKind {
    /// Return the canonical snake_case name.
    pub fn as_str(&self) -> &str {
        match self {
            Self::IncidentCreated => "incident_created",
            Self::ReportSubmitted => "report_submitted",
            Self::ShiftHandover => "shift_handover",
            Self::BillingStatusChanged => "billing_status_changed",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for EventKind {
    fn from(s: &str) -> Self {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "incident_created" => Self::IncidentCreated,
            "report_submitted" => Self::ReportSubmitted,
            "shift_handover" => Self::ShiftHandover,
            "billing_status_changed" => Self::BillingStatusChanged,
            _ => Self::Other(normalized),
        }
    }
}

impl From<String> for EventKind {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.as_str().to_string()
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
