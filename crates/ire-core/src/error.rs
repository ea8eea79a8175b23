//! # Error Types
//!
//! Structured error hierarchy shared by the routing engine crates. All
//! errors use `thiserror` for derive-based `Display` and `Error`.
//!
//! - Ingestion errors name the missing or malformed event field.
//! - State machine errors carry the entity, the current state, and the
//!   attempted transition so callers can report the settled state.

use thiserror::Error;

/// Top-level error type for the routing engine.
#[derive(Error, Debug)]
pub enum IreError {
    /// An inbound event was rejected at ingestion.
    #[error("malformed event: {0}")]
    Ingest(#[from] IngestError),

    /// A lifecycle transition was rejected.
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// A value failed validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Why an inbound event payload was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    /// The payload was not a JSON object.
    #[error("event payload must be a JSON object")]
    NotAnObject,

    /// `kind` was absent, not a string, or blank.
    #[error("event is missing a non-empty `kind`")]
    MissingKind,

    /// `occurredAt` was absent.
    #[error("event is missing `occurredAt`")]
    MissingOccurredAt,

    /// `occurredAt` could not be parsed as ISO-8601.
    #[error("invalid `occurredAt` {value:?}: {reason}")]
    InvalidTimestamp {
        /// The raw value supplied.
        value: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// `id` was present but not a UUID.
    #[error("invalid event id {0:?}")]
    InvalidId(String),
}

/// Error in alert/approval lifecycle transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// The entity is already in a terminal state.
    #[error("invalid transition of {entity} from {from} to {to}")]
    InvalidTransition {
        /// Entity description, e.g. `alert 3f2c…`.
        entity: String,
        /// Current state name.
        from: String,
        /// Attempted target state name.
        to: String,
    },

    /// A rejection was submitted without a reason.
    #[error("rejection reason must not be empty")]
    EmptyRejectionReason,
}
