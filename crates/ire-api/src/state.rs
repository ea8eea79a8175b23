//! # Application State
//!
//! Shared state for the Axum application: the routing engine (rules,
//! store, intent ledger, escalation monitor), the notification dispatcher,
//! the configuration, and the Prometheus handle when one is installed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ire_routing::{RoutingEngine, RoutingError, RuleRegistry, RuleSet, WeekdayCalendar};
use ire_state::{MemoryStore, RoutingStore};
use metrics_exporter_prometheus::PrometheusHandle;
use thiserror::Error;

use crate::config::AppConfig;
use crate::dispatch::{Dispatcher, LogNotifier, Notifier};

/// Startup failures.
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("cannot read rules file {path}: {source}")]
    ReadRules {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("rules file {path}: {source}")]
    InvalidRules { path: PathBuf, source: RoutingError },
}

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RoutingEngine>,
    pub dispatcher: Dispatcher,
    pub config: AppConfig,
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    /// In-memory state with default configuration and the log notifier.
    ///
    /// Spawns the dispatcher worker, so it must run inside a Tokio runtime.
    pub fn new() -> Self {
        Self::with_parts(
            AppConfig::default(),
            RuleSet::default(),
            Arc::new(MemoryStore::new()),
            Arc::new(LogNotifier),
        )
    }

    /// Bootstrap from configuration: load `RULES_PATH` if set, in-memory
    /// store, log notifier.
    pub fn bootstrap(config: AppConfig) -> Result<Self, BootstrapError> {
        let rules = match &config.rules_path {
            Some(path) => load_rules(path)?,
            None => {
                tracing::warn!("RULES_PATH not set; starting with an empty rule set");
                RuleSet::default()
            }
        };
        Ok(Self::with_parts(
            config,
            rules,
            Arc::new(MemoryStore::new()),
            Arc::new(LogNotifier),
        ))
    }

    /// Assemble state from explicit collaborators.
    pub fn with_parts(
        config: AppConfig,
        rules: RuleSet,
        store: Arc<dyn RoutingStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let calendar = WeekdayCalendar::with_offset(config.business_utc_offset);
        let engine = RoutingEngine::new(Arc::new(RuleRegistry::new(rules)), store)
            .with_calendar(Arc::new(calendar))
            .with_monitor_config(config.monitor_config());
        let (dispatcher, _worker) = Dispatcher::spawn(
            notifier,
            Arc::clone(engine.ledger()),
            config.notify_queue_capacity,
            config.notify_timeout,
        );
        Self {
            engine: Arc::new(engine),
            dispatcher,
            config,
            prometheus: None,
        }
    }

    /// Builder: expose `handle` at `/metrics`.
    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("engine", &self.engine)
            .field("config", &self.config)
            .field("prometheus", &self.prometheus.is_some())
            .finish()
    }
}

/// Read and validate a YAML or JSON rule file.
pub fn load_rules(path: &Path) -> Result<RuleSet, BootstrapError> {
    let source = std::fs::read_to_string(path).map_err(|source| BootstrapError::ReadRules {
        path: path.to_path_buf(),
        source,
    })?;
    let rules = RuleSet::from_yaml_str(&source).map_err(|source| BootstrapError::InvalidRules {
        path: path.to_path_buf(),
        source,
    })?;
    for warning in rules.warnings() {
        tracing::warn!(path = %path.display(), "{warning}");
    }
    tracing::info!(
        path = %path.display(),
        rules = rules.rules.len(),
        actions = rules.total_actions(),
        "rules loaded"
    );
    Ok(rules)
}
