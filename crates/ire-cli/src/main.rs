//! # ire CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ire_cli::calendar::{run_calendar, CalendarArgs};
use ire_cli::route::{run_route, RouteArgs};
use ire_cli::rules::{run_rules, RulesArgs};

/// Incident routing toolchain.
///
/// Routes events against rule files offline, validates rule files, and
/// resolves business-day due times.
#[derive(Parser, Debug)]
#[command(name = "ire", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Route an event file against a rule file and print the intents.
    Route(RouteArgs),

    /// Rule file operations.
    Rules(RulesArgs),

    /// Business calendar operations.
    Calendar(CalendarArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    // Logs go to stderr so stdout stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Route(args) => run_route(&args),
        Commands::Rules(args) => run_rules(&args),
        Commands::Calendar(args) => run_calendar(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}
