//! # Route Subcommand
//!
//! Routes one event against a rule file without touching any store: facts
//! are extracted, every rule is evaluated, and the intents the fired rules
//! would schedule are printed as JSON. Work items are not created, so the
//! output shows intents without a subject.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use ire_core::{Event, EventId};
use ire_routing::{
    evaluate_rules, extract_facts, match_rules, schedule, BusinessCalendar, Intent, RuleEvaluation,
    RuleSet,
};
use serde::Serialize;

/// Arguments for the `ire route` subcommand.
#[derive(Args, Debug)]
pub struct RouteArgs {
    /// Rule file (YAML or JSON).
    #[arg(long, value_name = "RULES")]
    pub rules: PathBuf,

    /// Event file (JSON or YAML) with `kind`, `occurredAt` and facts.
    #[arg(long, value_name = "EVENT")]
    pub event: PathBuf,

    /// UTC offset of the business calendar, e.g. `+10:00`.
    #[arg(long)]
    pub utc_offset: Option<String>,

    /// Include the per-rule evaluation results.
    #[arg(long)]
    pub explain: bool,
}

/// What routing one event would do.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteReport {
    pub event_id: EventId,
    pub rule_set_version: u64,
    pub fired_rules: Vec<String>,
    pub intents: Vec<Intent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluations: Option<Vec<RuleEvaluation>>,
}

/// Execute the route subcommand. Returns exit code 0.
pub fn run_route(args: &RouteArgs) -> Result<u8> {
    let rules = crate::read_rules(&args.rules)?;
    let payload = crate::read_document(&args.event)?;
    let event = Event::from_json(payload)
        .with_context(|| format!("malformed event: {}", args.event.display()))?;
    let calendar = crate::calendar_for(args.utc_offset.as_deref())?;

    let report = route_event(&rules, &event, &calendar, args.explain);
    tracing::info!(
        fired = report.fired_rules.len(),
        intents = report.intents.len(),
        "routed event"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(0)
}

/// Route `event` against `rules` without side effects.
pub fn route_event(
    rules: &RuleSet,
    event: &Event,
    calendar: &dyn BusinessCalendar,
    explain: bool,
) -> RouteReport {
    let fired = match_rules(event, &rules.rules);
    let facts = extract_facts(event);
    let intents = schedule(&fired, event, &facts, calendar);
    RouteReport {
        event_id: event.id,
        rule_set_version: rules.version,
        fired_rules: fired.iter().map(|r| r.id.clone()).collect(),
        intents,
        evaluations: explain.then(|| evaluate_rules(&facts, &rules.rules)),
    }
}
