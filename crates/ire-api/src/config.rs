//! # Service Configuration
//!
//! Built from environment variables at startup. Every variable is optional:
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `PORT` | `8080` | HTTP listen port |
//! | `AUTH_TOKEN` | unset | Bearer secret; unset disables auth |
//! | `RULES_PATH` | unset | YAML or JSON rule file loaded at bootstrap |
//! | `SWEEP_INTERVAL_SECS` | `30` | Period of the escalation sweep task |
//! | `SWEEP_BUDGET_MS` | `2000` | Wall-clock budget of one sweep |
//! | `REESCALATION_INTERVAL_SECS` | `900` | Due offset of re-escalated intents |
//! | `BUSINESS_UTC_OFFSET` | `+00:00` | Offset of the business-day calendar |
//! | `NOTIFY_TIMEOUT_MS` | `5000` | Per-notification timeout |
//! | `NOTIFY_QUEUE_CAPACITY` | `1024` | Dispatcher queue bound |
//! | `LOG_FORMAT` | `text` | `text` or `json` |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use ire_routing::calendar::parse_utc_offset;
use ire_routing::MonitorConfig;
use thiserror::Error;

/// A variable was set but could not be used.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {var}={value:?}: {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}', expected text or json")),
        }
    }
}

/// Runtime configuration of the API service.
///
/// Custom `Debug` redacts the auth token.
#[derive(Clone)]
pub struct AppConfig {
    pub port: u16,
    /// Bearer secret. `None` disables authentication.
    pub auth_token: Option<String>,
    pub rules_path: Option<PathBuf>,
    pub sweep_interval: Duration,
    pub sweep_budget: Duration,
    pub reescalation_interval: chrono::Duration,
    pub business_utc_offset: FixedOffset,
    pub notify_timeout: Duration,
    pub notify_queue_capacity: usize,
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read configuration through `lookup`, which returns a variable's value
    /// if set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let offset = match get("BUSINESS_UTC_OFFSET") {
            Some(v) => parse_utc_offset(&v).map_err(|e| ConfigError {
                var: "BUSINESS_UTC_OFFSET",
                value: v.clone(),
                reason: e.to_string(),
            })?,
            None => defaults.business_utc_offset,
        };
        let log_format = match get("LOG_FORMAT") {
            Some(v) => v.parse().map_err(|reason| ConfigError {
                var: "LOG_FORMAT",
                value: v.clone(),
                reason,
            })?,
            None => defaults.log_format,
        };
        let capacity: usize = parse_var(&get, "NOTIFY_QUEUE_CAPACITY", defaults.notify_queue_capacity)?;
        if capacity == 0 {
            return Err(ConfigError {
                var: "NOTIFY_QUEUE_CAPACITY",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }
        let sweep_secs: u64 = parse_var(&get, "SWEEP_INTERVAL_SECS", defaults.sweep_interval.as_secs())?;
        if sweep_secs == 0 {
            return Err(ConfigError {
                var: "SWEEP_INTERVAL_SECS",
                value: "0".into(),
                reason: "must be at least 1".into(),
            });
        }
        let reescalation_secs: i64 = parse_var(
            &get,
            "REESCALATION_INTERVAL_SECS",
            defaults.reescalation_interval.num_seconds(),
        )?;

        Ok(Self {
            port: parse_var(&get, "PORT", defaults.port)?,
            auth_token: get("AUTH_TOKEN"),
            rules_path: get("RULES_PATH").map(PathBuf::from),
            sweep_interval: Duration::from_secs(sweep_secs),
            sweep_budget: Duration::from_millis(parse_var(
                &get,
                "SWEEP_BUDGET_MS",
                defaults.sweep_budget.as_millis() as u64,
            )?),
            reescalation_interval: chrono::Duration::seconds(reescalation_secs.max(0)),
            business_utc_offset: offset,
            notify_timeout: Duration::from_millis(parse_var(
                &get,
                "NOTIFY_TIMEOUT_MS",
                defaults.notify_timeout.as_millis() as u64,
            )?),
            notify_queue_capacity: capacity,
            log_format,
        })
    }

    /// Escalation monitor tuning derived from this configuration.
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            reescalation_interval: self.reescalation_interval,
            budget: self.sweep_budget,
        }
    }
}

fn parse_var<T>(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(var) {
        Some(v) => v.trim().parse().map_err(|e: T::Err| ConfigError {
            var,
            value: v.clone(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let monitor = MonitorConfig::default();
        Self {
            port: 8080,
            auth_token: None,
            rules_path: None,
            sweep_interval: Duration::from_secs(30),
            sweep_budget: monitor.budget,
            reescalation_interval: monitor.reescalation_interval,
            business_utc_offset: Utc.fix(),
            notify_timeout: Duration::from_millis(5000),
            notify_queue_capacity: 1024,
            log_format: LogFormat::Text,
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("rules_path", &self.rules_path)
            .field("sweep_interval", &self.sweep_interval)
            .field("sweep_budget", &self.sweep_budget)
            .field("reescalation_interval", &self.reescalation_interval)
            .field("business_utc_offset", &self.business_utc_offset)
            .field("notify_timeout", &self.notify_timeout)
            .field("notify_queue_capacity", &self.notify_queue_capacity)
            .field("log_format", &self.log_format)
            .finish()
    }
}
