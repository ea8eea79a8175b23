//! # Domain Events
//!
//! An [`Event`] is an immutable fact pushed by a collaborator whenever an
//! incident, report, shift or billing record changes state. The wire shape
//! is a flat JSON object:
//!
//! ```json
//! { "kind": "incident_created", "occurredAt": "2025-10-07T14:00:00Z",
//!   "severity": "high", "type": "medication_error", "participantId": "p-12" }
//! ```
//!
//! `kind` and `occurredAt` (or `occurred_at`) are mandatory; `id` is
//! optional and generated when absent. Every other top-level field, plus the
//! entries of an optional nested `facts` object, becomes a raw fact. Facts
//! are interpreted later by the fact extractor; this type only guarantees the
//! envelope is well-formed.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::EventKind;
use crate::error::IngestError;
use crate::identity::EventId;
use crate::temporal::{parse_iso8601, truncate_to_seconds};

/// Keys that belong to the event envelope rather than its facts.
const ENVELOPE_KEYS: &[&str] = &["id", "kind", "occurredAt", "occurred_at", "facts"];

/// An immutable domain event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", rename_all = "camelCase")]
pub struct Event {
    /// Identifier assigned by the producer or at ingestion.
    pub id: EventId,
    /// What happened.
    pub kind: EventKind,
    /// When it happened (UTC, whole seconds).
    pub occurred_at: DateTime<Utc>,
    /// Raw subject fields keyed by their wire names.
    #[serde(flatten)]
    pub facts: BTreeMap<String, Value>,
}

impl Event {
    /// Create an event with no facts.
    pub fn new(kind: impl Into<EventKind>, occurred_at: DateTime<Utc>) -> Self {
        Self {
            id: EventId::new(),
            kind: kind.into(),
            occurred_at: truncate_to_seconds(occurred_at),
            facts: BTreeMap::new(),
        }
    }

    /// Builder: attach a fact.
    pub fn with_fact(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if !ENVELOPE_KEYS.contains(&key.as_str()) {
            self.facts.insert(key, value.into());
        }
        self
    }

    /// Look up a raw fact by its wire name.
    pub fn fact(&self, key: &str) -> Option<&Value> {
        self.facts.get(key)
    }

    /// Validate and build an event from a JSON payload.
    pub fn from_json(value: Value) -> Result<Self, IngestError> {
        let Value::Object(mut map) = value else {
            return Err(IngestError::NotAnObject);
        };

        let kind = match map.remove("kind") {
            Some(Value::String(s)) if !s.trim().is_empty() => EventKind::from(s.as_str()),
            _ => return Err(IngestError::MissingKind),
        };

        let raw_occurred = map
            .remove("occurredAt")
            .or_else(|| map.remove("occurred_at"))
            .ok_or(IngestError::MissingOccurredAt)?;
        let occurred_at = match raw_occurred {
            Value::String(s) => parse_iso8601(&s)?,
            Value::Null => return Err(IngestError::MissingOccurredAt),
            other => {
                return Err(IngestError::InvalidTimestamp {
                    value: other.to_string(),
                    reason: "expected an ISO-8601 string".into(),
                })
            }
        };

        let id = match map.remove("id") {
            None | Some(Value::Null) => EventId::new(),
            Some(Value::String(s)) => s
                .parse::<uuid::Uuid>()
                .map(EventId)
                .map_err(|_| IngestError::InvalidId(s))?,
            Some(other) => return Err(IngestError::InvalidId(other.to_string())),
        };

        let mut facts = BTreeMap::new();
        if let Some(Value::Object(nested)) = map.remove("facts") {
            facts.extend(nested);
        }
        // Top-level fields win over nested ones with the same name.
        facts.extend(map);

        Ok(Self {
            id,
            kind,
            occurred_at,
            facts,
        })
    }
}

impl TryFrom<Value> for Event {
    type Error = IngestError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_json(value)
    }
}
