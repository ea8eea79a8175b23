//! # ire-routing — Rule-Driven Incident Routing
//!
//! Decides who must be told about an event, by when, and what happens when
//! nobody responds.
//!
//! ## Pipeline
//!
//! 1. [`facts`] flattens an [`Event`](ire_core::Event) into a [`FactSet`].
//! 2. [`condition`] evaluates a single [`RuleCondition`] against the facts.
//!    Evaluation is total: a missing field or a type mismatch is simply
//!    "no match".
//! 3. [`matcher`] returns every enabled rule whose conditions all hold, in
//!    rule order.
//! 4. [`scheduler`] turns each fired action into an [`Intent`] with a due
//!    time resolved against a [`BusinessCalendar`].
//! 5. [`engine`] persists the alert or approval behind each intent and
//!    records the intent in the [`IntentLedger`].
//! 6. [`monitor`] periodically re-fires overdue intents whose work item is
//!    still open, one severity or priority step at a time.
//!
//! Rule sets are swapped atomically through the [`RuleRegistry`]; an
//! in-flight evaluation keeps the snapshot it started with.

pub mod audit;
pub mod calendar;
pub mod condition;
pub mod engine;
pub mod error;
pub mod facts;
pub mod ledger;
pub mod matcher;
pub mod monitor;
pub mod registry;
pub mod rule;
pub mod scheduler;

pub use audit::{AuditEntry, AuditEntryType, AuditTrail};
pub use calendar::{BusinessCalendar, CalendarError, WeekdayCalendar};
pub use condition::{ConditionValue, Operator, RuleCondition};
pub use engine::{RoutingEngine, RoutingOutcome};
pub use error::RoutingError;
pub use facts::{extract_facts, FactSet, FactValue};
pub use ledger::{IntentLedger, TrackedIntent};
pub use matcher::{evaluate_rules, match_rules, RuleEvaluation};
pub use monitor::{EscalationMonitor, MonitorConfig, SweepReport};
pub use registry::RuleRegistry;
pub use rule::{ActionType, RoutingRule, RuleAction, RuleSet, Timing};
pub use scheduler::{schedule, Intent, IntentSubject};
