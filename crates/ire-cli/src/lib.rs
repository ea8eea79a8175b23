//! # ire-cli — Incident Routing CLI
//!
//! Offline tooling around the routing engine, for rule authors and on-call
//! staff who want to see what a rule file would do before deploying it.
//!
//! ## Subcommands
//!
//! - `ire route`: route one event file against a rule file and print the
//!   fired rules and the intents that would be scheduled.
//! - `ire rules validate`: parse and validate a rule file.
//! - `ire calendar next`: resolve the next business-day opening after a
//!   timestamp.
//!
//! ```bash
//! ire route --rules rules.yaml --event incident.json --utc-offset +10:00
//! ire rules validate rules.yaml
//! ire calendar next 2025-10-10T18:00:00Z
//! ```

pub mod calendar;
pub mod route;
pub mod rules;

use std::path::Path;

use anyhow::{Context, Result};
use ire_routing::calendar::parse_utc_offset;
use ire_routing::{RuleSet, WeekdayCalendar};

/// Read and validate a YAML or JSON rule file.
pub fn read_rules(path: &Path) -> Result<RuleSet> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read rules file: {}", path.display()))?;
    RuleSet::from_yaml_str(&source).with_context(|| format!("invalid rules file: {}", path.display()))
}

/// Read a YAML or JSON document as a JSON value.
pub fn read_document(path: &Path) -> Result<serde_json::Value> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_yaml::from_str(&source).with_context(|| format!("failed to parse {}", path.display()))
}

/// Weekday calendar at `utc_offset` (`+10:00`, `-05:30`, `Z`), UTC when absent.
pub fn calendar_for(utc_offset: Option<&str>) -> Result<WeekdayCalendar> {
    match utc_offset {
        Some(s) => {
            let offset = parse_utc_offset(s).with_context(|| format!("invalid --utc-offset {s:?}"))?;
            Ok(WeekdayCalendar::with_offset(offset))
        }
        None => Ok(WeekdayCalendar::default()),
    }
}
