//! # Fact Extractor
//!
//! Flattens an [`Event`] into a [`FactSet`]: a sorted map of snake_case
//! field names to typed values that conditions are evaluated against.
//!
//! Extraction is total. Every event yields at least `kind` and
//! `occurred_at`; unknown kinds simply carry whatever scalar fields they
//! were sent with.
//!
//! ## Normalisation
//!
//! - Keys are converted to snake_case (`participantId` → `participant_id`).
//!   When both spellings are present the snake_case one wins.
//! - Values of [`CASE_INSENSITIVE_FIELDS`] are lower-cased.
//! - Other strings that parse as RFC 3339 become dates.
//! - `null` and nested objects are dropped; arrays keep their scalar items.
//!
//! ## Derived facts
//!
//! `hour_of_day` (UTC), `is_weekend` (UTC) and, when the event carries a
//! recognised `severity`, `severity_rank` (low 0 … critical 3). Derived
//! facts overwrite event-supplied fields of the same name.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use ire_core::domain::incident_severity_rank;
use ire_core::{format_iso8601, Event};
use serde::Serialize;
use serde_json::Value;

/// Fields compared without regard to case.
pub const CASE_INSENSITIVE_FIELDS: &[&str] = &[
    "severity",
    "type",
    "kind",
    "status",
    "report_type",
    "priority",
    "previous_status",
];

/// Whether `field` (already snake_case) is compared case-insensitively.
pub fn is_case_insensitive(field: &str) -> bool {
    CASE_INSENSITIVE_FIELDS.contains(&field)
}

/// A typed fact value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FactValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Date(DateTime<Utc>),
    List(Vec<FactValue>),
}

impl FactValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view: numbers, and text that parses as a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Date view: dates, and text that parses as ISO-8601.
    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Date(d) => Some(*d),
            Self::Text(s) => ire_core::parse_iso8601(s).ok(),
            _ => None,
        }
    }
}

impl std::fmt::Display for FactValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Self::Number(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Date(d) => f.write_str(&format_iso8601(d)),
            Self::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

/// The flattened, typed view of one event.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FactSet {
    facts: BTreeMap<String, FactValue>,
}

impl FactSet {
    pub fn get(&self, field: &str) -> Option<&FactValue> {
        self.facts.get(field)
    }

    /// Text value of `field`, if it is text.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(FactValue::as_text)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: FactValue) {
        self.facts.insert(field.into(), value);
    }

    pub fn contains(&self, field: &str) -> bool {
        self.facts.contains_key(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FactValue)> {
        self.facts.iter()
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

/// Convert a field name to snake_case.
///
/// `participantId` → `participant_id`, `facilityID` → `facility_id`,
/// `report-type` → `report_type`. Already-snake names pass through.
pub fn normalize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    let mut prev_lower_or_digit = false;
    for c in key.trim().chars() {
        if c == '-' || c == ' ' || c == '_' {
            if !out.ends_with('_') {
                out.push('_');
            }
            prev_lower_or_digit = false;
        } else if c.is_ascii_uppercase() {
            if prev_lower_or_digit {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
            prev_lower_or_digit = false;
        } else {
            out.push(c);
            prev_lower_or_digit = c.is_ascii_lowercase() || c.is_ascii_digit();
        }
    }
    out
}

fn convert(field: &str, value: &Value) -> Option<FactValue> {
    match value {
        Value::String(s) => {
            if is_case_insensitive(field) {
                Some(FactValue::Text(s.trim().to_lowercase()))
            } else if let Ok(d) = DateTime::parse_from_rfc3339(s.trim()) {
                Some(FactValue::Date(ire_core::temporal::truncate_to_seconds(
                    d.with_timezone(&Utc),
                )))
            } else {
                Some(FactValue::Text(s.clone()))
            }
        }
        Value::Number(n) => n.as_f64().map(FactValue::Number),
        Value::Bool(b) => Some(FactValue::Bool(*b)),
        Value::Array(items) => Some(FactValue::List(
            items
                .iter()
                .filter(|v| !v.is_array())
                .filter_map(|v| convert(field, v))
                .collect(),
        )),
        Value::Null | Value::Object(_) => None,
    }
}

/// Extract the fact set of an event.
pub fn extract_facts(event: &Event) -> FactSet {
    let mut facts = FactSet::default();

    for (raw_key, value) in &event.facts {
        let key = normalize_key(raw_key);
        if key.is_empty() || key == "kind" || key == "occurred_at" {
            continue;
        }
        // An explicit snake_case key beats its camelCase spelling.
        if facts.contains(&key) && *raw_key != key {
            continue;
        }
        if let Some(v) = convert(&key, value) {
            facts.insert(key, v);
        }
    }

    facts.insert("kind", FactValue::Text(event.kind.as_str().to_string()));
    facts.insert("occurred_at", FactValue::Date(event.occurred_at));
    facts.insert(
        "hour_of_day",
        FactValue::Number(f64::from(event.occurred_at.hour())),
    );
    facts.insert(
        "is_weekend",
        FactValue::Bool(matches!(
            event.occurred_at.weekday(),
            Weekday::Sat | Weekday::Sun
        )),
    );
    if let Some(rank) = facts.text("severity").and_then(incident_severity_rank) {
        facts.insert("severity_rank", FactValue::Number(f64::from(rank)));
    }

    facts
}
