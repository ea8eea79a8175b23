//! # Escalation Monitor
//!
//! A sweep looks at every ledger intent that is due and whose work item is
//! still open, raises the work item one step, and emits a follow-up intent
//! with `attempt + 1` due one re-escalation interval later.
//!
//! - Alerts climb info → warning → critical; approvals climb
//!   normal → high → urgent. An item already at the top is not re-notified
//!   and its entries are retired from the ledger, unless the notifier never
//!   accepted its last intent. Such an intent is re-sent exactly once at the
//!   same level before the cap applies.
//! - Acknowledged, approved, rejected or deleted items are retired.
//! - Each subject is handled at most once per sweep, and sweeps are
//!   serialized: a second caller waits for the running sweep and then sees
//!   the advanced ledger.
//! - A sweep stops when its time budget runs out; the remaining due items
//!   are counted as deferred and picked up by the next sweep.
//! - A store failure leaves the entry in the ledger for the next sweep.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

use chrono::{DateTime, Duration, Utc};
use ire_core::{Priority, Severity};
use ire_state::{Escalation, RoutingStore, StoreError};
use parking_lot::Mutex;
use serde::Serialize;

use crate::ledger::{IntentLedger, TrackedIntent};
use crate::scheduler::{Intent, IntentSubject};

/// Sweep tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Due offset of a re-emitted intent from the sweep time.
    pub reescalation_interval: Duration,
    /// Wall-clock budget for one sweep.
    pub budget: StdDuration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            reescalation_interval: Duration::minutes(15),
            budget: StdDuration::from_secs(2),
        }
    }
}

/// What one sweep did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    /// Follow-up intents, in processing order.
    pub emitted: Vec<Intent>,
    /// Due items not reached within the budget.
    pub deferred: usize,
    /// Subjects dropped because they were settled or gone.
    pub retired: usize,
    /// Subjects still open but already at the top of their ladder.
    pub at_maximum: usize,
    /// Of `emitted`, re-sends of undelivered intents at the top of their
    /// ladder.
    pub redelivered: usize,
    /// Items whose store call failed; retried next sweep.
    pub failed: usize,
}

enum Step {
    Raised(Intent),
    AtMaximum { severity: Severity, priority: Priority },
    Settled,
}

/// Re-fires overdue, unsettled intents.
pub struct EscalationMonitor {
    ledger: Arc<IntentLedger>,
    store: Arc<dyn RoutingStore>,
    config: MonitorConfig,
    sweeping: Mutex<()>,
}

impl EscalationMonitor {
    pub fn new(ledger: Arc<IntentLedger>, store: Arc<dyn RoutingStore>, config: MonitorConfig) -> Self {
        Self {
            ledger,
            store,
            config,
            sweeping: Mutex::new(()),
        }
    }

    pub fn config(&self) -> MonitorConfig {
        self.config
    }

    /// Run one sweep as of `now`.
    pub fn sweep(&self, now: DateTime<Utc>) -> SweepReport {
        let _sweeping = self.sweeping.lock();
        let started = Instant::now();
        let due = self.ledger.due(now);
        let mut report = SweepReport::default();
        let mut seen = HashSet::new();

        for (index, tracked) in due.iter().enumerate() {
            if started.elapsed() >= self.config.budget {
                report.deferred = due.len() - index;
                tracing::warn!(
                    deferred = report.deferred,
                    budget_ms = self.config.budget.as_millis() as u64,
                    "escalation sweep budget exhausted"
                );
                break;
            }
            let intent = &tracked.intent;
            let Some(subject) = intent.subject else {
                continue;
            };
            if !seen.insert(subject) {
                continue;
            }

            match self.step(intent, subject, now) {
                Ok(Step::Raised(next)) => {
                    tracing::info!(
                        subject = %subject,
                        rule_id = %next.rule_id,
                        attempt = next.attempt,
                        severity = %next.severity,
                        priority = %next.priority,
                        "escalated overdue intent"
                    );
                    self.ledger.advance(intent, next.clone());
                    report.emitted.push(next);
                }
                Ok(Step::AtMaximum { severity, priority }) => {
                    report.at_maximum += 1;
                    if let Some(next) = self.redelivery(tracked, severity, priority, now) {
                        tracing::warn!(
                            subject = %subject,
                            rule_id = %next.rule_id,
                            attempt = next.attempt,
                            "at maximum but never delivered; re-sending once"
                        );
                        self.ledger.redeliver(intent, next.clone());
                        report.redelivered += 1;
                        report.emitted.push(next);
                    } else {
                        tracing::debug!(subject = %subject, "already at maximum; not re-notifying");
                        self.ledger.retire(&subject);
                    }
                }
                Ok(Step::Settled) | Err(StoreError::NotFound { .. }) => {
                    self.ledger.retire(&subject);
                    report.retired += 1;
                }
                Err(e) => {
                    tracing::warn!(subject = %subject, error = %e, "escalation failed; will retry");
                    report.failed += 1;
                }
            }
        }

        report
    }

    fn redelivery(
        &self,
        tracked: &TrackedIntent,
        severity: Severity,
        priority: Priority,
        now: DateTime<Utc>,
    ) -> Option<Intent> {
        tracked.owes_delivery().then(|| {
            tracked
                .intent
                .reescalated(now + self.config.reescalation_interval, severity, priority)
        })
    }

    fn step(
        &self,
        intent: &Intent,
        subject: IntentSubject,
        now: DateTime<Utc>,
    ) -> Result<Step, StoreError> {
        let due_at = now + self.config.reescalation_interval;
        Ok(match subject {
            IntentSubject::Alert(id) => match self.store.escalate_alert(&id)? {
                Escalation::Escalated(alert) => {
                    Step::Raised(intent.reescalated(due_at, alert.severity, intent.priority))
                }
                Escalation::AtMaximum(alert) => Step::AtMaximum {
                    severity: alert.severity,
                    priority: intent.priority,
                },
                Escalation::Settled(_) => Step::Settled,
            },
            IntentSubject::Approval(id) => match self.store.escalate_approval(&id)? {
                Escalation::Escalated(approval) => {
                    Step::Raised(intent.reescalated(due_at, intent.severity, approval.priority))
                }
                Escalation::AtMaximum(approval) => Step::AtMaximum {
                    severity: intent.severity,
                    priority: approval.priority,
                },
                Escalation::Settled(_) => Step::Settled,
            },
        })
    }
}

impl std::fmt::Debug for EscalationMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EscalationMonitor")
            .field("ledger", &self.ledger.len())
            .field("config", &self.config)
            .finish()
    }
}
