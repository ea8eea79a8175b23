//! # Rule Registry
//!
//! Holds the current [`RuleSet`] as an `Arc` snapshot behind a
//! `parking_lot::RwLock`. Each event evaluation takes one snapshot up front
//! and uses it throughout, so an administrator replacing the rules never
//! changes the outcome of an evaluation already in flight.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::RoutingError;
use crate::rule::{RoutingRule, RuleSet};

/// Versioned, swappable rule configuration.
#[derive(Debug)]
pub struct RuleRegistry {
    current: RwLock<Arc<RuleSet>>,
}

impl RuleRegistry {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            current: RwLock::new(Arc::new(rules)),
        }
    }

    /// The rule set in force right now.
    pub fn snapshot(&self) -> Arc<RuleSet> {
        self.current.read().clone()
    }

    /// Validate and install a new rule list. The version is bumped by one.
    ///
    /// On validation failure the current snapshot stays in force.
    pub fn replace(&self, rules: Vec<RoutingRule>) -> Result<Arc<RuleSet>, RoutingError> {
        let mut guard = self.current.write();
        let next = RuleSet::new(guard.version + 1, rules);
        next.validate()?;
        let next = Arc::new(next);
        *guard = Arc::clone(&next);
        tracing::info!(
            version = next.version,
            rules = next.rules.len(),
            "rule set replaced"
        );
        Ok(next)
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new(RuleSet::default())
    }
}
