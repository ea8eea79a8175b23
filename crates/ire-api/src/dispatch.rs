//! # Notification Dispatcher
//!
//! Intents reach people through a [`Notifier`]. Calls go through a bounded
//! `tokio::mpsc` queue drained by a single worker, and each call runs on
//! the blocking pool under a timeout. Rule evaluation only ever does a
//! non-blocking `try_send`; a full queue drops the notification and counts
//! it as failed.
//!
//! The worker marks an intent delivered in the [`IntentLedger`] only when
//! the notifier accepts it. A dropped, failed or timed-out intent stays
//! undelivered: the escalation monitor re-fires it as the next ladder step,
//! or re-sends it once at the same level when the work item is already
//! critical or urgent.

use std::sync::Arc;
use std::time::Duration;

use ire_routing::{Intent, IntentLedger};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::metrics::NOTIFICATIONS_FAILED;

/// A notification collaborator failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("recipient rejected: {0}")]
    Rejected(String),
    #[error("notifier unavailable: {0}")]
    Unavailable(String),
}

/// Delivers intents to their recipients (email, SMS, push...).
pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, intent: &Intent) -> Result<(), NotifyError>;
}

/// Default notifier: writes each intent to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, intent: &Intent) -> Result<(), NotifyError> {
        tracing::info!(
            intent_id = %intent.id,
            rule_id = %intent.rule_id,
            recipient = %intent.recipient,
            action = intent.action_type.as_str(),
            attempt = intent.attempt,
            severity = %intent.severity,
            priority = %intent.priority,
            due_at = %ire_core::format_iso8601(&intent.due_at),
            message = %intent.message,
            "notification"
        );
        Ok(())
    }
}

/// Why an intent could not be queued.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("notification queue full")]
    QueueFull,
    #[error("notification dispatcher stopped")]
    Closed,
}

/// Outcome counts of a worker's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub delivered: u64,
    pub failed: u64,
    pub timed_out: u64,
}

/// Sending half; cheap to clone.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    tx: mpsc::Sender<Intent>,
}

/// Receiving half, consumed by [`DispatchQueue::run`].
#[derive(Debug)]
pub struct DispatchQueue {
    rx: mpsc::Receiver<Intent>,
}

impl Dispatcher {
    /// A dispatcher and its not-yet-running queue.
    pub fn channel(capacity: usize) -> (Self, DispatchQueue) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, DispatchQueue { rx })
    }

    /// A dispatcher with its worker already spawned on the current runtime.
    /// Accepted intents are marked delivered in `ledger`.
    pub fn spawn(
        notifier: Arc<dyn Notifier>,
        ledger: Arc<IntentLedger>,
        capacity: usize,
        timeout: Duration,
    ) -> (Self, JoinHandle<DispatchStats>) {
        let (dispatcher, queue) = Self::channel(capacity);
        let worker = tokio::spawn(queue.run(notifier, ledger, timeout));
        (dispatcher, worker)
    }

    /// Queue one intent without waiting.
    pub fn enqueue(&self, intent: Intent) -> Result<(), DispatchError> {
        self.tx.try_send(intent).map_err(|e| {
            metrics::counter!(NOTIFICATIONS_FAILED, "reason" => "queue_full").increment(1);
            match e {
                TrySendError::Full(intent) => {
                    tracing::warn!(intent_id = %intent.id, recipient = %intent.recipient, "notification queue full; dropped");
                    DispatchError::QueueFull
                }
                TrySendError::Closed(intent) => {
                    tracing::error!(intent_id = %intent.id, "notification dispatcher stopped; dropped");
                    DispatchError::Closed
                }
            }
        })
    }

    /// False once the worker has exited.
    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Queue every intent; returns how many were accepted.
    pub fn enqueue_all<'a>(&self, intents: impl IntoIterator<Item = &'a Intent>) -> usize {
        intents
            .into_iter()
            .filter(|intent| self.enqueue((*intent).clone()).is_ok())
            .count()
    }
}

impl DispatchQueue {
    /// Drain the queue until every [`Dispatcher`] handle is dropped.
    pub async fn run(
        mut self,
        notifier: Arc<dyn Notifier>,
        ledger: Arc<IntentLedger>,
        timeout: Duration,
    ) -> DispatchStats {
        let mut stats = DispatchStats::default();
        while let Some(intent) = self.rx.recv().await {
            let intent_id = intent.id;
            let n = Arc::clone(&notifier);
            let call = tokio::task::spawn_blocking(move || {
                let result = n.notify(&intent);
                (intent, result)
            });
            match tokio::time::timeout(timeout, call).await {
                Ok(Ok((intent, Ok(())))) => {
                    stats.delivered += 1;
                    ledger.mark_delivered(&intent);
                }
                Ok(Ok((_, Err(e)))) => {
                    stats.failed += 1;
                    metrics::counter!(NOTIFICATIONS_FAILED, "reason" => "error").increment(1);
                    tracing::warn!(intent_id = %intent_id, error = %e, "notification failed");
                }
                Ok(Err(join)) => {
                    stats.failed += 1;
                    metrics::counter!(NOTIFICATIONS_FAILED, "reason" => "panic").increment(1);
                    tracing::error!(intent_id = %intent_id, error = %join, "notifier panicked");
                }
                Err(_) => {
                    stats.timed_out += 1;
                    metrics::counter!(NOTIFICATIONS_FAILED, "reason" => "timeout").increment(1);
                    tracing::warn!(
                        intent_id = %intent_id,
                        timeout_ms = timeout.as_millis() as u64,
                        "notification timed out"
                    );
                }
            }
        }
        tracing::debug!(?stats, "notification dispatcher drained");
        stats
    }
}
