//! # Rule Matcher
//!
//! A rule fires iff it is enabled and every one of its conditions matches
//! the event's facts. A rule with no conditions fires on every event.
//!
//! Matching is pure and deterministic: the fired rules come back in the
//! order they appear in the rule set, and repeated calls with the same
//! inputs return the same list.

use ire_core::Event;
use serde::Serialize;

use crate::condition::matches;
use crate::facts::{extract_facts, FactSet};
use crate::rule::RoutingRule;

/// Outcome of evaluating one rule, kept for the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleEvaluation {
    pub rule_id: String,
    pub enabled: bool,
    pub matched: bool,
}

/// Whether `rule` fires for `facts`.
pub fn rule_fires(rule: &RoutingRule, facts: &FactSet) -> bool {
    rule.enabled && rule.conditions.iter().all(|c| matches(c, facts))
}

/// Rules that fire for an already-extracted fact set, in rule-set order.
pub fn match_facts<'r>(facts: &FactSet, rules: &'r [RoutingRule]) -> Vec<&'r RoutingRule> {
    rules.iter().filter(|r| rule_fires(r, facts)).collect()
}

/// Rules that fire for `event`, in rule-set order.
pub fn match_rules<'r>(event: &Event, rules: &'r [RoutingRule]) -> Vec<&'r RoutingRule> {
    match_facts(&extract_facts(event), rules)
}

/// Evaluate every rule and report each result, in rule-set order.
pub fn evaluate_rules(facts: &FactSet, rules: &[RoutingRule]) -> Vec<RuleEvaluation> {
    rules
        .iter()
        .map(|r| RuleEvaluation {
            rule_id: r.id.clone(),
            enabled: r.enabled,
            matched: rule_fires(r, facts),
        })
        .collect()
}
