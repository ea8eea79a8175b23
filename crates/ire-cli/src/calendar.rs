//! # Calendar Subcommand
//!
//! `ire calendar next <timestamp>` prints when a `next_business_day` action
//! scheduled at `timestamp` would fall due.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use ire_core::{format_iso8601, parse_iso8601};
use ire_routing::BusinessCalendar;

/// Arguments for the `ire calendar` subcommand.
#[derive(Args, Debug)]
pub struct CalendarArgs {
    #[command(subcommand)]
    pub command: CalendarCommand,
}

#[derive(Subcommand, Debug)]
pub enum CalendarCommand {
    /// Next business-day opening strictly after a timestamp.
    Next {
        /// ISO-8601 timestamp, e.g. `2025-10-10T18:00:00Z`.
        #[arg(value_name = "TIMESTAMP")]
        timestamp: String,

        /// UTC offset of the business calendar, e.g. `+10:00`.
        #[arg(long)]
        utc_offset: Option<String>,
    },
}

/// Execute the calendar subcommand. Returns exit code 0.
pub fn run_calendar(args: &CalendarArgs) -> Result<u8> {
    match &args.command {
        CalendarCommand::Next {
            timestamp,
            utc_offset,
        } => {
            println!("{}", next_business_day(timestamp, utc_offset.as_deref())?);
            Ok(0)
        }
    }
}

/// Resolve and format the next business-day opening after `timestamp`.
pub fn next_business_day(timestamp: &str, utc_offset: Option<&str>) -> Result<String> {
    let ts = parse_iso8601(timestamp).with_context(|| format!("invalid timestamp {timestamp:?}"))?;
    let calendar = crate::calendar_for(utc_offset)?;
    let due = calendar
        .next_business_day_at(ts)
        .context("business calendar failed")?;
    Ok(format_iso8601(&due))
}
