//! # Rules Subcommand
//!
//! `ire rules validate <file>` parses a rule file the way the service does
//! on startup and on `PUT /v1/rules`, then prints a summary and any
//! non-fatal warnings.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};

/// Arguments for the `ire rules` subcommand.
#[derive(Args, Debug)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub command: RulesCommand,
}

#[derive(Subcommand, Debug)]
pub enum RulesCommand {
    /// Parse and validate a rule file.
    Validate {
        /// Rule file (YAML or JSON).
        #[arg(value_name = "RULES")]
        file: PathBuf,

        /// Treat warnings as failures.
        #[arg(long)]
        strict: bool,
    },
}

/// Execute the rules subcommand.
///
/// Returns exit code: 0 when valid, 1 when invalid (or when `--strict` and
/// there are warnings).
pub fn run_rules(args: &RulesArgs) -> Result<u8> {
    match &args.command {
        RulesCommand::Validate { file, strict } => validate(file, *strict),
    }
}

fn validate(file: &std::path::Path, strict: bool) -> Result<u8> {
    let rules = match crate::read_rules(file) {
        Ok(rules) => rules,
        Err(e) => {
            println!("FAIL: {e:#}");
            return Ok(1);
        }
    };

    let warnings = rules.warnings();
    for warning in &warnings {
        println!("  warning: {warning}");
    }
    let enabled = rules.rules.iter().filter(|r| r.enabled).count();
    println!(
        "OK: {} ({} rules, {} enabled, {} actions)",
        file.display(),
        rules.rules.len(),
        enabled,
        rules.total_actions()
    );

    if strict && !warnings.is_empty() {
        tracing::warn!(warnings = warnings.len(), "strict mode: warnings treated as failures");
        return Ok(1);
    }
    Ok(0)
}
