//! # Routing Audit Trail
//!
//! Records every event the engine receives or rejects, every rule it
//! evaluates, and every intent it schedules or escalates, so a reviewer can
//! reconstruct why a given person was (or was not) notified.
//!
//! Entries are individually digestable: [`AuditEntry::digest`] hashes the
//! entry's JSON form with SHA-256. The trail is bounded; past capacity the
//! oldest 10% is dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ---------------------------------------------------------------------------
// AuditEntryType
// ---------------------------------------------------------------------------

/// The kind of audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEntryType {
    /// A well-formed event entered the pipeline.
    EventReceived,
    /// A malformed event was rejected at ingestion.
    EventRejected,
    /// A rule was evaluated against an event.
    RuleEvaluated,
    /// An intent was scheduled and its work item persisted.
    IntentScheduled,
    /// A sweep re-emitted an intent one step higher.
    IntentEscalated,
}

impl AuditEntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EventReceived => "event_received",
            Self::EventRejected => "event_rejected",
            Self::RuleEvaluated => "rule_evaluated",
            Self::IntentScheduled => "intent_scheduled",
            Self::IntentEscalated => "intent_escalated",
        }
    }
}

impl std::fmt::Display for AuditEntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// AuditEntry
// ---------------------------------------------------------------------------

/// A single audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub entry_type: AuditEntryType,
    pub timestamp: DateTime<Utc>,
    /// Event, alert or approval the entry concerns (display form).
    pub subject: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl AuditEntry {
    /// Create an entry stamped with the current time.
    pub fn new(
        entry_type: AuditEntryType,
        subject: Option<String>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            entry_type,
            timestamp: Utc::now(),
            subject,
            metadata,
        }
    }

    /// Hex SHA-256 of the entry's JSON encoding.
    ///
    /// `serde_json` maps keep keys sorted, so equal entries hash equally.
    pub fn digest(&self) -> Option<String> {
        let bytes = match serde_json::to_vec(self) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(entry_type = %self.entry_type, error = %e, "audit entry encoding failed; digest unavailable");
                return None;
            }
        };
        let hash = Sha256::digest(&bytes);
        Some(hash.iter().map(|b| format!("{b:02x}")).collect())
    }
}

impl PartialEq for AuditEntry {
    fn eq(&self, other: &Self) -> bool {
        self.entry_type == other.entry_type
            && self.subject == other.subject
            && self.metadata == other.metadata
    }
}

impl Eq for AuditEntry {}

// ---------------------------------------------------------------------------
// AuditTrail
// ---------------------------------------------------------------------------

/// Bounded, append-only audit trail.
///
/// Not `Sync` on its own; the engine keeps it behind a mutex.
pub struct AuditTrail {
    entries: Vec<AuditEntry>,
    max_entries: usize,
}

impl AuditTrail {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_entries,
        }
    }

    /// Append an entry, trimming the oldest 10% once over capacity.
    pub fn append(&mut self, entry: AuditEntry) {
        self.entries.push(entry);
        if self.entries.len() > self.max_entries {
            let trim_count = (self.max_entries / 10).max(1);
            self.entries.drain(..trim_count.min(self.entries.len()));
        }
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries_for_subject(&self, subject: &str) -> Vec<&AuditEntry> {
        self.entries
            .iter()
            .filter(|e| e.subject.as_deref() == Some(subject))
            .collect()
    }

    pub fn entries_by_type(&self, entry_type: AuditEntryType) -> Vec<&AuditEntry> {
        self.entries
            .iter()
            .filter(|e| e.entry_type == entry_type)
            .collect()
    }

    /// The last `n` entries (or all, if fewer).
    pub fn last_n(&self, n: usize) -> &[AuditEntry] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }

    /// `(index, digest)` for every entry that could be encoded.
    pub fn compute_digests(&self) -> Vec<(usize, String)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, entry)| entry.digest().map(|d| (i, d)))
            .collect()
    }
}

impl Default for AuditTrail {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl std::fmt::Debug for AuditTrail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditTrail")
            .field("entries", &self.entries.len())
            .field("max_entries", &self.max_entries)
            .finish()
    }
}
