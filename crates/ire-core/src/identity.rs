//! # Identifier Newtypes
//!
//! Newtype wrappers for identifiers. You cannot pass an `AlertId` where an
//! `ApprovalId` is expected, and user identities are validated on
//! construction.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::IreError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Access the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a persisted alert.
    AlertId,
    "alert"
);
uuid_id!(
    /// Unique identifier for a pending approval.
    ApprovalId,
    "approval"
);
uuid_id!(
    /// Unique identifier for an ingested domain event.
    EventId,
    "event"
);
uuid_id!(
    /// Unique identifier for a scheduled notification intent.
    IntentId,
    "intent"
);

/// Identity of a staff member acting on an alert or approval.
///
/// Serializes as a plain string. Construction trims whitespace and rejects
/// empty values so an acknowledgement can never be recorded anonymously.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Create a validated user identifier.
    pub fn new(s: impl Into<String>) -> Result<Self, IreError> {
        let s = s.into();
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(IreError::Validation("user id must not be empty".into()));
        }
        if trimmed.len() > 255 {
            return Err(IreError::Validation(
                "user id must not exceed 255 characters".into(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Return the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = IreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
