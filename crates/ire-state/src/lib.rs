//! # ire-state — Alert & Approval Lifecycles
//!
//! Owns the two work items the routing engine produces:
//!
//! - [`Alert`]: unacknowledged → acknowledged, once, irreversibly.
//! - [`PendingApproval`]: pending → approved | rejected (reason required).
//!
//! Both can be escalated one step at a time while still open, capped at the
//! top of their ladder. Persistence goes through the [`RoutingStore`] trait;
//! [`MemoryStore`] implements it with per-entity compare-and-set so that
//! concurrent decisions on the same record resolve to exactly one winner.

pub mod alert;
pub mod approval;
pub mod repository;
pub mod store;

pub use alert::{Alert, AlertState};
pub use approval::{ApprovalKind, ApprovalStatus, PendingApproval};
pub use repository::{
    AlertFilter, ApprovalFilter, Escalation, MemoryStore, RoutingStore, StoreError,
    TransitionOutcome,
};
pub use store::Store;
