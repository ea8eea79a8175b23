//! # Routing Properties
//!
//! Property tests over generated events and rule sets: matching is
//! deterministic, every fired action yields exactly one intent, and no
//! sequence of sweeps pushes a work item past the top of its ladder.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use ire_core::{Event, Priority, Severity};
use ire_routing::{
    extract_facts, match_rules, schedule, ActionType, Operator, RoutingEngine, RoutingRule,
    RuleAction, RuleCondition, RuleRegistry, RuleSet, Timing, WeekdayCalendar,
};
use ire_state::{MemoryStore, RoutingStore};
use proptest::prelude::*;
use serde_json::json;

const KINDS: &[&str] = &[
    "incident_created",
    "report_submitted",
    "shift_handover",
    "billing_status_changed",
];
const SEVERITIES: &[&str] = &["low", "medium", "high", "critical"];
const TYPES: &[&str] = &["fall", "medication_error", "behaviour", "absconding"];

fn timing() -> impl Strategy<Value = Timing> {
    prop_oneof![
        Just(Timing::Immediate),
        Just(Timing::Within30Min),
        Just(Timing::Within1Hour),
        Just(Timing::NextBusinessDay),
    ]
}

fn action_type() -> impl Strategy<Value = ActionType> {
    prop_oneof![
        Just(ActionType::Notify),
        Just(ActionType::Escalate),
        Just(ActionType::CreateTask),
    ]
}

fn condition() -> impl Strategy<Value = RuleCondition> {
    prop_oneof![
        prop::sample::select(SEVERITIES)
            .prop_map(|v| RuleCondition::new("severity", Operator::Equals, v)),
        prop::sample::select(TYPES).prop_map(|v| RuleCondition::new("type", Operator::Equals, v)),
        prop::sample::select(KINDS).prop_map(|v| RuleCondition::new("kind", Operator::Equals, v)),
        "[a-z]{1,4}".prop_map(|v| RuleCondition::new("type", Operator::Contains, v.as_str())),
        // References a field no event carries.
        Just(RuleCondition::new("ward", Operator::Equals, "east")),
    ]
}

fn rule(index: usize) -> impl Strategy<Value = RoutingRule> {
    (
        prop::collection::vec(condition(), 0..3),
        prop::collection::vec((action_type(), timing()), 0..3),
        prop::bool::weighted(0.85),
    )
        .prop_map(move |(conditions, actions, enabled)| {
            let mut rule = RoutingRule::new(format!("rule-{index}"), format!("Rule {index}"));
            for c in conditions {
                rule = rule.with_condition(c);
            }
            for (action_type, timing) in actions {
                rule = rule.with_action(RuleAction::new(action_type, "team_leader", timing));
            }
            if enabled {
                rule
            } else {
                rule.disabled()
            }
        })
}

fn rule_set() -> impl Strategy<Value = RuleSet> {
    (0usize..6)
        .prop_flat_map(|n| (0..n).map(rule).collect::<Vec<_>>())
        .prop_map(|rules| RuleSet::new(1, rules))
}

fn event() -> impl Strategy<Value = Event> {
    (
        prop::sample::select(KINDS),
        prop::sample::select(SEVERITIES),
        prop::sample::select(TYPES),
        0i64..(14 * 24 * 60),
    )
        .prop_map(|(kind, severity, kind_type, minutes)| {
            let occurred = Utc.with_ymd_and_hms(2025, 10, 6, 0, 0, 0).unwrap() + Duration::minutes(minutes);
            Event::from_json(json!({
                "kind": kind,
                "occurredAt": occurred.to_rfc3339(),
                "severity": severity,
                "type": kind_type,
            }))
            .unwrap()
        })
}

proptest! {
    /// Repeated matching yields the same rules in the same order.
    #[test]
    fn matching_is_deterministic(rules in rule_set(), event in event()) {
        let first: Vec<&str> = match_rules(&event, &rules.rules).iter().map(|r| r.id.as_str()).collect();
        let second: Vec<&str> = match_rules(&event, &rules.rules).iter().map(|r| r.id.as_str()).collect();
        prop_assert_eq!(first, second);
    }

    /// Fired rules keep rule-set order and never include disabled rules.
    #[test]
    fn fired_rules_are_enabled_and_ordered(rules in rule_set(), event in event()) {
        let fired = match_rules(&event, &rules.rules);
        prop_assert!(fired.iter().all(|r| r.enabled));
        let positions: Vec<usize> = fired
            .iter()
            .map(|f| rules.rules.iter().position(|r| r.id == f.id).unwrap())
            .collect();
        prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    /// One intent per fired action, never due before the event occurred.
    #[test]
    fn one_intent_per_fired_action(rules in rule_set(), event in event()) {
        let fired = match_rules(&event, &rules.rules);
        let expected: usize = fired.iter().map(|r| r.actions.len()).sum();
        let intents = schedule(&fired, &event, &extract_facts(&event), &WeekdayCalendar::default());
        prop_assert_eq!(intents.len(), expected);
        prop_assert!(intents.iter().all(|i| i.due_at >= event.occurred_at));
        prop_assert!(intents.iter().all(|i| i.attempt == 1));
    }

    /// However many overdue sweeps run, alerts stop at critical and
    /// approvals at urgent, and each work item is raised at most twice.
    #[test]
    fn escalation_never_exceeds_ceiling(
        rules in rule_set(),
        event in event(),
        sweeps in 1usize..8,
    ) {
        let store = Arc::new(MemoryStore::new());
        let engine = RoutingEngine::new(Arc::new(RuleRegistry::new(rules)), store.clone());
        let outcome = engine.process(&event).unwrap();
        let work_items = outcome.alerts.len() + outcome.approvals.len();

        // Two ladder steps, plus at most one re-send of a notification that
        // was never delivered at the top of the ladder.
        let mut emitted = 0;
        let mut now = event.occurred_at;
        for _ in 0..sweeps {
            now += Duration::days(4);
            emitted += engine.sweep(now).emitted.len();
        }
        prop_assert!(emitted <= work_items * 3);

        for alert in &outcome.alerts {
            let current = store.get_alert(&alert.id).unwrap();
            prop_assert!(current.severity >= alert.severity);
            prop_assert!(current.severity <= Severity::Critical);
        }
        for approval in &outcome.approvals {
            let current = store.get_approval(&approval.id).unwrap();
            prop_assert!(current.priority >= approval.priority);
            prop_assert!(current.priority <= Priority::Urgent);
        }
    }
}
