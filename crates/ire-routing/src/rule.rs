//! # Routing Rules
//!
//! A [`RoutingRule`] is a named, enableable list of conditions (implicit
//! AND) plus the actions to take when they all hold. Rules are plain data,
//! loaded from YAML or JSON and held by the engine as an immutable, versioned
//! [`RuleSet`] snapshot.
//!
//! ```yaml
//! - id: high-severity-medication
//!   name: High severity medication error
//!   conditions:
//!     - { field: severity, operator: equals, value: high }
//!     - { field: type, operator: equals, value: medication_error }
//!   actions:
//!     - { type: notify, recipient: team_leader, timing: immediate }
//!     - { type: create_task, recipient: team_leader, timing: next_business_day }
//! ```
//!
//! A rule file is either a bare list of rules or a mapping with a `rules`
//! key. `enabled` defaults to `true`.

use std::collections::HashSet;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::condition::{Operator, RuleCondition};
use crate::error::RoutingError;

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// What a fired action produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Notify the recipient; tracked as an alert.
    Notify,
    /// Notify one severity step above the event's base level.
    Escalate,
    /// Create a pending approval assigned to the recipient role.
    CreateTask,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Notify => "notify",
            Self::Escalate => "escalate",
            Self::CreateTask => "create_task",
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When an action is due relative to the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timing {
    #[serde(rename = "immediate")]
    Immediate,
    #[serde(rename = "within_30_min")]
    Within30Min,
    #[serde(rename = "within_1_hour")]
    Within1Hour,
    #[serde(rename = "next_business_day")]
    NextBusinessDay,
}

impl Timing {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::Within30Min => "within_30_min",
            Self::Within1Hour => "within_1_hour",
            Self::NextBusinessDay => "next_business_day",
        }
    }

    /// Fixed offset from the event time, or `None` when the due time comes
    /// from the business calendar.
    pub fn offset(&self) -> Option<Duration> {
        match self {
            Self::Immediate => Some(Duration::zero()),
            Self::Within30Min => Some(Duration::minutes(30)),
            Self::Within1Hour => Some(Duration::minutes(60)),
            Self::NextBusinessDay => None,
        }
    }
}

impl std::fmt::Display for Timing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One action of a routing rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleAction {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    /// Role or person to notify, e.g. `team_leader`.
    pub recipient: String,
    pub timing: Timing,
    /// Message template with `{field}` placeholders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RuleAction {
    pub fn new(action_type: ActionType, recipient: impl Into<String>, timing: Timing) -> Self {
        Self {
            action_type,
            recipient: recipient.into(),
            timing,
            message: None,
        }
    }

    pub fn with_message(mut self, template: impl Into<String>) -> Self {
        self.message = Some(template.into());
        self
    }
}

// ---------------------------------------------------------------------------
// RoutingRule
// ---------------------------------------------------------------------------

fn default_enabled() -> bool {
    true
}

/// A routing rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingRule {
    pub id: String,
    pub name: String,
    /// All must match. Empty means the rule fires on every event.
    #[serde(default)]
    pub conditions: Vec<RuleCondition>,
    #[serde(default)]
    pub actions: Vec<RuleAction>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl RoutingRule {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            conditions: Vec::new(),
            actions: Vec::new(),
            enabled: true,
        }
    }

    pub fn with_condition(mut self, condition: RuleCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_action(mut self, action: RuleAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

// ---------------------------------------------------------------------------
// RuleSet
// ---------------------------------------------------------------------------

/// An immutable, versioned collection of rules in evaluation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default)]
    pub version: u64,
    pub rules: Vec<RoutingRule>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RuleFile {
    List(Vec<RoutingRule>),
    Wrapped { rules: Vec<RoutingRule> },
}

impl RuleSet {
    pub fn new(version: u64, rules: Vec<RoutingRule>) -> Self {
        Self { version, rules }
    }

    /// Parse a YAML (or JSON, which YAML accepts) rule document.
    pub fn from_yaml_str(source: &str) -> Result<Self, RoutingError> {
        let file: RuleFile = serde_yaml::from_str(source)
            .map_err(|e| RoutingError::RuleConfig(format!("cannot parse rules: {e}")))?;
        let rules = match file {
            RuleFile::List(rules) | RuleFile::Wrapped { rules } => rules,
        };
        let set = Self::new(1, rules);
        set.validate()?;
        Ok(set)
    }

    /// Structural checks: non-empty, unique ids and non-empty recipients.
    pub fn validate(&self) -> Result<(), RoutingError> {
        let mut problems = Vec::new();
        let mut seen = HashSet::new();
        for (i, rule) in self.rules.iter().enumerate() {
            if rule.id.trim().is_empty() {
                problems.push(format!("rule #{i} has an empty id"));
            } else if !seen.insert(rule.id.as_str()) {
                problems.push(format!("duplicate rule id '{}'", rule.id));
            }
            for (j, action) in rule.actions.iter().enumerate() {
                if action.recipient.trim().is_empty() {
                    problems.push(format!("rule '{}' action #{j} has an empty recipient", rule.id));
                }
            }
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(RoutingError::RuleConfig(problems.join("; ")))
        }
    }

    /// Non-fatal findings: conditions that can never match and rules that
    /// would fire without doing anything.
    pub fn warnings(&self) -> Vec<String> {
        let mut out = Vec::new();
        for rule in &self.rules {
            for c in &rule.conditions {
                if c.operator == Operator::Unknown {
                    out.push(format!(
                        "rule '{}': condition on '{}' has an unrecognised operator and never matches",
                        rule.id, c.field
                    ));
                }
            }
            if rule.enabled && rule.actions.is_empty() {
                out.push(format!("rule '{}' has no actions", rule.id));
            }
        }
        out
    }

    pub fn total_actions(&self) -> usize {
        self.rules.iter().map(|r| r.actions.len()).sum()
    }

    pub fn get(&self, id: &str) -> Option<&RoutingRule> {
        self.rules.iter().find(|r| r.id == id)
    }
}
