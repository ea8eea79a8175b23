//! # Routing Errors
//!
//! Condition and matching problems never surface here; they are absorbed as
//! non-matches. What remains are ingestion rejections, rule configuration
//! problems and store failures.

use ire_core::IngestError;
use ire_state::StoreError;
use thiserror::Error;

use crate::scheduler::Intent;

/// Errors returned by the routing engine.
#[derive(Error, Debug)]
pub enum RoutingError {
    /// The event envelope was invalid. No rule was evaluated.
    #[error("malformed event: {0}")]
    MalformedEvent(#[from] IngestError),

    /// The store could not be reached while persisting work items.
    ///
    /// `persisted` holds the intents bound to work items written before the
    /// failure. They are tracked by the ledger and still need dispatching.
    /// `pending` holds the intents that were scheduled but not persisted,
    /// in schedule order, so the caller can retry without re-evaluating.
    #[error("store unavailable: {reason} ({} intents not persisted)", .pending.len())]
    StoreUnavailable {
        reason: String,
        persisted: Vec<Intent>,
        pending: Vec<Intent>,
    },

    /// Any other store failure.
    #[error("store error: {0}")]
    Store(StoreError),

    /// A rule set failed validation.
    #[error("invalid rule configuration: {0}")]
    RuleConfig(String),
}

impl RoutingError {
    /// Whether retrying the same request later can succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::StoreUnavailable { .. } => true,
            Self::Store(e) => e.is_retryable(),
            Self::MalformedEvent(_) | Self::RuleConfig(_) => false,
        }
    }
}
