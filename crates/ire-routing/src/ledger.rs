//! # Intent Ledger
//!
//! Outstanding intents keyed by `(subject id, attempt)`. The escalation
//! monitor reads due entries from here and advances or retires them; the
//! routing engine records every intent it binds to a persisted work item.
//!
//! Only intents with a bound subject are tracked. Recording the same key
//! twice keeps the first entry.
//!
//! Each entry also carries its delivery state. An entry counts as delivered
//! once the notifier has accepted it; until then the monitor owes the
//! subject a notification even when the work item cannot climb any higher.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::scheduler::{Intent, IntentSubject};

type LedgerKey = (Uuid, u32);

/// A tracked intent and what is known about its delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedIntent {
    pub intent: Intent,
    /// The notifier accepted this intent.
    pub delivered: bool,
    /// This entry re-sends an undelivered intent whose work item was already
    /// at the top of its ladder. It is never re-sent again.
    pub redelivery: bool,
}

impl TrackedIntent {
    fn new(intent: Intent, redelivery: bool) -> Self {
        Self {
            intent,
            delivered: false,
            redelivery,
        }
    }

    /// Whether a sweep that finds the work item at its maximum still owes
    /// one notification for this entry.
    pub fn owes_delivery(&self) -> bool {
        !self.delivered && !self.redelivery
    }
}

/// Thread-safe store of outstanding intents.
#[derive(Debug, Default)]
pub struct IntentLedger {
    entries: Mutex<BTreeMap<LedgerKey, TrackedIntent>>,
}

impl IntentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(intent: &Intent) -> Option<LedgerKey> {
        intent.subject.map(|s| (s.key(), intent.attempt))
    }

    /// Track `intent`. Returns `false` if it has no subject or the key is
    /// already present.
    pub fn record(&self, intent: Intent) -> bool {
        let Some(key) = Self::key(&intent) else {
            return false;
        };
        let mut entries = self.entries.lock();
        if entries.contains_key(&key) {
            return false;
        }
        entries.insert(key, TrackedIntent::new(intent, false));
        true
    }

    /// Replace `previous` with its follow-up emission in one step.
    pub fn advance(&self, previous: &Intent, next: Intent) {
        self.replace(previous, TrackedIntent::new(next, false));
    }

    /// Replace `previous` with a one-off re-send of it.
    pub fn redeliver(&self, previous: &Intent, next: Intent) {
        self.replace(previous, TrackedIntent::new(next, true));
    }

    fn replace(&self, previous: &Intent, next: TrackedIntent) {
        let mut entries = self.entries.lock();
        if let Some(key) = Self::key(previous) {
            entries.remove(&key);
        }
        if let Some(key) = Self::key(&next.intent) {
            entries.insert(key, next);
        }
    }

    /// Note that the notifier accepted `intent`. Returns `false` when the
    /// entry is no longer tracked (advanced, retired or never bound).
    pub fn mark_delivered(&self, intent: &Intent) -> bool {
        let Some(key) = Self::key(intent) else {
            return false;
        };
        match self.entries.lock().get_mut(&key) {
            Some(entry) => {
                entry.delivered = true;
                true
            }
            None => false,
        }
    }

    /// Delivery state of `intent`'s entry, `None` when untracked.
    pub fn is_delivered(&self, intent: &Intent) -> Option<bool> {
        let key = Self::key(intent)?;
        self.entries.lock().get(&key).map(|e| e.delivered)
    }

    /// Drop every entry for `subject`. Returns how many were removed.
    pub fn retire(&self, subject: &IntentSubject) -> usize {
        let id = subject.key();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(subject_id, _), _| *subject_id != id);
        before - entries.len()
    }

    /// Entries due at `now`, earliest first, with at most one entry (the
    /// highest attempt) per subject.
    pub fn due(&self, now: DateTime<Utc>) -> Vec<TrackedIntent> {
        let entries = self.entries.lock();
        let mut latest: BTreeMap<Uuid, &TrackedIntent> = BTreeMap::new();
        for ((subject_id, _), entry) in entries.iter() {
            // BTreeMap order puts higher attempts later for the same subject.
            latest.insert(*subject_id, entry);
        }
        let mut due: Vec<TrackedIntent> = latest
            .into_values()
            .filter(|e| e.intent.is_due(now))
            .cloned()
            .collect();
        due.sort_by(|a, b| {
            a.intent
                .due_at
                .cmp(&b.intent.due_at)
                .then(a.intent.id.cmp(&b.intent.id))
        });
        due
    }

    /// All entries tracked for `subject`, by attempt.
    pub fn for_subject(&self, subject: &IntentSubject) -> Vec<Intent> {
        let id = subject.key();
        self.entries
            .lock()
            .range((id, 0)..=(id, u32::MAX))
            .map(|(_, e)| e.intent.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
