//! # Condition Evaluator
//!
//! Evaluates a single [`RuleCondition`] against a [`FactSet`].
//!
//! Evaluation never fails. A missing field, a type mismatch between the fact
//! and the condition value, or an operator the engine does not recognise all
//! make the condition non-matching, so one malformed rule cannot stop the
//! others from firing.
//!
//! | operator       | text                  | number | date | bool | list       |
//! |----------------|-----------------------|--------|------|------|------------|
//! | `equals`       | exact (or ci, see below) | ==  | ==   | ==   | no         |
//! | `contains`     | substring             | no     | no   | no   | membership |
//! | `greater_than` | numeric text, severity | >     | >    | no   | no         |
//! | `less_than`    | numeric text, severity | <     | <    | no   | no         |
//!
//! Fields listed in [`CASE_INSENSITIVE_FIELDS`](crate::facts::CASE_INSENSITIVE_FIELDS)
//! compare case-insensitively. `greater_than`/`less_than` on `severity`
//! compare the incident severity ladder (low < medium < high < critical).

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use ire_core::domain::incident_severity_rank;
use serde::{Deserialize, Serialize};

use crate::facts::{is_case_insensitive, normalize_key, FactSet, FactValue};

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    Contains,
    GreaterThan,
    LessThan,
    /// Anything not listed above. Never matches.
    #[serde(other)]
    Unknown,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::Contains => "contains",
            Self::GreaterThan => "greater_than",
            Self::LessThan => "less_than",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The right-hand side of a condition.
///
/// Untagged on the wire: `true`, `3`, `"2025-10-07T14:00:00Z"` and `"high"`
/// deserialize to `Boolean`, `Number`, `Date` and `String` respectively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Boolean(bool),
    Number(f64),
    Date(DateTime<Utc>),
    String(String),
}

impl ConditionValue {
    fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Date(d) => Some(*d),
            Self::String(s) => ire_core::parse_iso8601(s).ok(),
            _ => None,
        }
    }
}

impl From<&str> for ConditionValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<f64> for ConditionValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for ConditionValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<DateTime<Utc>> for ConditionValue {
    fn from(d: DateTime<Utc>) -> Self {
        Self::Date(d)
    }
}

/// One predicate of a routing rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleCondition {
    /// Fact name. camelCase is accepted and normalised.
    pub field: String,
    pub operator: Operator,
    pub value: ConditionValue,
}

impl RuleCondition {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<ConditionValue>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }
}

/// Evaluate `condition` against `facts`.
pub fn matches(condition: &RuleCondition, facts: &FactSet) -> bool {
    let field = normalize_key(&condition.field);
    let Some(fact) = facts.get(&field) else {
        return false;
    };
    match condition.operator {
        Operator::Equals => equals(&field, fact, &condition.value),
        Operator::Contains => contains(&field, fact, &condition.value),
        Operator::GreaterThan => compare(&field, fact, &condition.value) == Some(Ordering::Greater),
        Operator::LessThan => compare(&field, fact, &condition.value) == Some(Ordering::Less),
        Operator::Unknown => false,
    }
}

fn text_eq(field: &str, a: &str, b: &str) -> bool {
    if is_case_insensitive(field) {
        a.trim().eq_ignore_ascii_case(b.trim())
    } else {
        a == b
    }
}

fn equals(field: &str, fact: &FactValue, value: &ConditionValue) -> bool {
    match (fact, value) {
        (FactValue::Text(a), ConditionValue::String(b)) => text_eq(field, a, b),
        (FactValue::Bool(a), ConditionValue::Boolean(b)) => a == b,
        (FactValue::Text(a), ConditionValue::Boolean(b)) => {
            a.trim().eq_ignore_ascii_case(if *b { "true" } else { "false" })
        }
        (FactValue::Number(_) | FactValue::Text(_), ConditionValue::Number(_))
        | (FactValue::Number(_), ConditionValue::String(_)) => {
            match (fact.as_number(), value.as_number()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        }
        (FactValue::Date(_), ConditionValue::Date(_) | ConditionValue::String(_))
        | (FactValue::Text(_), ConditionValue::Date(_)) => match (fact.as_date(), value.as_date()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
        _ => false,
    }
}

fn contains(field: &str, fact: &FactValue, value: &ConditionValue) -> bool {
    match (fact, value) {
        (FactValue::Text(haystack), ConditionValue::String(needle)) => {
            if is_case_insensitive(field) {
                haystack.to_lowercase().contains(&needle.to_lowercase())
            } else {
                haystack.contains(needle.as_str())
            }
        }
        (FactValue::List(items), _) => items.iter().any(|item| equals(field, item, value)),
        _ => false,
    }
}

fn compare(field: &str, fact: &FactValue, value: &ConditionValue) -> Option<Ordering> {
    if field == "severity" {
        let lhs = fact.as_text().and_then(incident_severity_rank)?;
        let rhs = match value {
            ConditionValue::String(s) => incident_severity_rank(s)?,
            ConditionValue::Number(n) => {
                return f64::from(lhs).partial_cmp(n);
            }
            _ => return None,
        };
        return Some(lhs.cmp(&rhs));
    }

    match value {
        ConditionValue::Boolean(_) => None,
        ConditionValue::Number(_) => fact.as_number()?.partial_cmp(&value.as_number()?),
        ConditionValue::Date(_) => Some(fact.as_date()?.cmp(&value.as_date()?)),
        ConditionValue::String(_) => match fact {
            FactValue::Number(n) => n.partial_cmp(&value.as_number()?),
            FactValue::Date(d) => Some(d.cmp(&value.as_date()?)),
            FactValue::Text(_) => {
                if let (Some(a), Some(b)) = (fact.as_number(), value.as_number()) {
                    a.partial_cmp(&b)
                } else {
                    Some(fact.as_date()?.cmp(&value.as_date()?))
                }
            }
            FactValue::Bool(_) | FactValue::List(_) => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::extract_facts;
    use chrono::TimeZone;
    use ire_core::Event;
    use proptest::prelude::*;
    use serde_json::json;

    fn facts() -> FactSet {
        extract_facts(
            &Event::from_json(json!({
                "kind": "incident_created",
                "occurredAt": "2025-10-07T14:00:00Z",
                "severity": "High",
                "type": "medication_error",
                "participantId": "P-12",
                "injuryCount": 2,
                "hoursSinceShiftStart": "6",
                "restrictive": true,
                "tags": ["falls", "night"],
                "reviewedAt": "2025-10-08T09:00:00Z",
            }))
            .unwrap(),
        )
    }

    fn cond(field: &str, op: Operator, value: impl Into<ConditionValue>) -> RuleCondition {
        RuleCondition::new(field, op, value)
    }

    #[test]
    fn equals_is_case_insensitive_only_where_declared() {
        let f = facts();
        assert!(matches(&cond("severity", Operator::Equals, "HIGH"), &f));
        assert!(matches(&cond("type", Operator::Equals, "Medication_Error"), &f));
        assert!(matches(&cond("participantId", Operator::Equals, "P-12"), &f));
        assert!(!matches(&cond("participant_id", Operator::Equals, "p-12"), &f));
    }

    #[test]
    fn equals_numbers_bools_and_dates() {
        let f = facts();
        assert!(matches(&cond("injury_count", Operator::Equals, 2.0), &f));
        assert!(matches(&cond("injury_count", Operator::Equals, "2"), &f));
        assert!(matches(&cond("hours_since_shift_start", Operator::Equals, 6.0), &f));
        assert!(matches(&cond("restrictive", Operator::Equals, true), &f));
        assert!(!matches(&cond("restrictive", Operator::Equals, false), &f));
        let reviewed = Utc.with_ymd_and_hms(2025, 10, 8, 9, 0, 0).unwrap();
        assert!(matches(&cond("reviewed_at", Operator::Equals, reviewed), &f));
        assert!(matches(&cond("reviewed_at", Operator::Equals, "2025-10-08T19:00:00+10:00"), &f));
    }

    #[test]
    fn contains_substring_and_membership() {
        let f = facts();
        assert!(matches(&cond("type", Operator::Contains, "MEDICATION"), &f));
        assert!(matches(&cond("tags", Operator::Contains, "night"), &f));
        assert!(!matches(&cond("tags", Operator::Contains, "day"), &f));
        assert!(!matches(&cond("participant_id", Operator::Contains, "p-"), &f));
        assert!(!matches(&cond("injury_count", Operator::Contains, "2"), &f));
    }

    #[test]
    fn ordering_on_numbers_dates_and_severity() {
        let f = facts();
        assert!(matches(&cond("injury_count", Operator::GreaterThan, 1.0), &f));
        assert!(!matches(&cond("injury_count", Operator::LessThan, 2.0), &f));
        assert!(matches(&cond("hours_since_shift_start", Operator::LessThan, 8.0), &f));
        assert!(matches(&cond("reviewed_at", Operator::GreaterThan, "2025-10-08T00:00:00Z"), &f));
        assert!(matches(&cond("severity", Operator::GreaterThan, "medium"), &f));
        assert!(matches(&cond("severity", Operator::LessThan, "critical"), &f));
        assert!(!matches(&cond("severity", Operator::GreaterThan, "high"), &f));
        assert!(matches(&cond("severity_rank", Operator::GreaterThan, 1.0), &f));
    }

    #[test]
    fn mismatched_types_do_not_match() {
        let f = facts();
        assert!(!matches(&cond("restrictive", Operator::GreaterThan, 0.0), &f));
        assert!(!matches(&cond("type", Operator::GreaterThan, 3.0), &f));
        assert!(!matches(&cond("severity", Operator::Equals, 2.0), &f));
        assert!(!matches(&cond("tags", Operator::LessThan, "z"), &f));
    }

    #[test]
    fn unknown_operator_deserializes_and_never_matches() {
        let c: RuleCondition = serde_json::from_value(json!({
            "field": "severity", "operator": "matches_regex", "value": "high"
        }))
        .unwrap();
        assert_eq!(c.operator, Operator::Unknown);
        assert!(!matches(&c, &facts()));
    }

    #[test]
    fn condition_values_deserialize_by_shape() {
        let v: ConditionValue = serde_json::from_value(json!(true)).unwrap();
        assert_eq!(v, ConditionValue::Boolean(true));
        let v: ConditionValue = serde_json::from_value(json!(3)).unwrap();
        assert_eq!(v, ConditionValue::Number(3.0));
        let v: ConditionValue = serde_json::from_value(json!("2025-10-07T14:00:00Z")).unwrap();
        assert!(matches!(v, ConditionValue::Date(_)));
        let v: ConditionValue = serde_json::from_value(json!("high")).unwrap();
        assert_eq!(v, ConditionValue::String("high".into()));
    }

    fn any_operator() -> impl Strategy<Value = Operator> {
        prop_oneof![
            Just(Operator::Equals),
            Just(Operator::Contains),
            Just(Operator::GreaterThan),
            Just(Operator::LessThan),
            Just(Operator::Unknown),
        ]
    }

    fn any_value() -> impl Strategy<Value = ConditionValue> {
        prop_oneof![
            any::<bool>().prop_map(ConditionValue::Boolean),
            any::<f64>().prop_map(ConditionValue::Number),
            "[a-zA-Z0-9 _-]{0,16}".prop_map(ConditionValue::String),
            (0i64..4_000_000_000).prop_map(|s| {
                ConditionValue::Date(DateTime::from_timestamp(s, 0).unwrap_or_default())
            }),
        ]
    }

    proptest! {
        #[test]
        fn missing_field_never_matches(
            field in "zz_[a-z]{1,12}",
            op in any_operator(),
            value in any_value(),
        ) {
            let condition = RuleCondition { field, operator: op, value };
            prop_assert!(!matches(&condition, &facts()));
        }

        #[test]
        fn evaluation_is_total(
            field in prop_oneof![
                Just("severity".to_string()),
                Just("injury_count".to_string()),
                Just("tags".to_string()),
                Just("restrictive".to_string()),
                Just("reviewed_at".to_string()),
            ],
            op in any_operator(),
            value in any_value(),
        ) {
            let c = RuleCondition { field, operator: op, value };
            let first = matches(&c, &facts());
            prop_assert_eq!(first, matches(&c, &facts()));
        }
    }
}
