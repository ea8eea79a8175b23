//! # API Route Modules
//!
//! - `events`: event ingestion and routing.
//! - `alerts`: unacknowledged alert listing, direct creation, acknowledgement.
//! - `approvals`: pending approval listing, direct creation, approve/reject.
//! - `rules`: rule snapshot read and replacement (admin).
//! - `escalations`: manual escalation sweep and the routing audit trail (admin).

pub mod alerts;
pub mod approvals;
pub mod escalations;
pub mod events;
pub mod rules;

use ire_state::TransitionOutcome;
use serde::Serialize;

/// Body of a lifecycle transition response.
///
/// `outcome` is `applied` when this request performed the transition and
/// `already_settled` when the record had already been decided; `record` is
/// the current state either way.
#[derive(Debug, Serialize)]
pub struct TransitionResponse<T> {
    pub outcome: &'static str,
    pub record: T,
}

impl<T> From<TransitionOutcome<T>> for TransitionResponse<T> {
    fn from(outcome: TransitionOutcome<T>) -> Self {
        Self {
            outcome: outcome.as_str(),
            record: outcome.into_record(),
        }
    }
}
