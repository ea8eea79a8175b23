//! # ire-core — Foundational Types for the Incident Routing Engine
//!
//! Every other crate in the workspace depends on `ire-core`; it depends on
//! nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** `AlertId`, `ApprovalId`,
//!    `EventId`, `IntentId` and `UserId` cannot be confused with each other.
//!
//! 2. **Closed urgency ladders.** `Severity` (info → warning → critical) and
//!    `Priority` (normal → high → urgent) know their own next step and their
//!    ceiling, so escalation caps are enforced by the type, not by callers.
//!
//! 3. **Validated events.** An [`Event`] can only be built with a non-empty
//!    `kind` and a parseable `occurredAt`. Malformed payloads are rejected at
//!    ingestion with an [`IngestError`].
//!
//! ## Crate Policy
//!
//! - No dependencies on other `ire-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod domain;
pub mod error;
pub mod event;
pub mod identity;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use domain::{EventKind, Priority, Severity};
pub use error::{IngestError, IreError, StateError};
pub use event::Event;
pub use identity::{AlertId, ApprovalId, EventId, IntentId, UserId};
pub use temporal::{format_iso8601, parse_iso8601};
