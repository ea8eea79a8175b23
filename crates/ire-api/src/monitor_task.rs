//! # Periodic Escalation Sweep
//!
//! A background task runs one escalation sweep every `SWEEP_INTERVAL_SECS`
//! on the blocking pool and queues the re-emitted intents for
//! notification. A sweep that overruns its interval delays the next tick
//! rather than stacking sweeps.

use chrono::{DateTime, Utc};
use ire_routing::SweepReport;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::metrics::{ESCALATIONS, INTENTS_EMITTED};
use crate::state::AppState;

/// Run one sweep as of `now` and dispatch what it emits.
pub fn run_sweep(state: &AppState, now: DateTime<Utc>) -> SweepReport {
    let report = state.engine.sweep(now);
    let emitted = report.emitted.len() as u64;
    if emitted > 0 {
        metrics::counter!(ESCALATIONS).increment(emitted - report.redelivered as u64);
        metrics::counter!(INTENTS_EMITTED, "source" => "escalation").increment(emitted);
        state.dispatcher.enqueue_all(&report.emitted);
    }
    if emitted > 0 || report.deferred > 0 || report.failed > 0 {
        tracing::info!(
            emitted,
            deferred = report.deferred,
            retired = report.retired,
            at_maximum = report.at_maximum,
            redelivered = report.redelivered,
            failed = report.failed,
            "escalation sweep"
        );
    } else {
        tracing::debug!(retired = report.retired, at_maximum = report.at_maximum, "escalation sweep idle");
    }
    report
}

/// Spawn the periodic sweep on the current runtime.
pub fn spawn(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(state.config.sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so startup is quiet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let sweep_state = state.clone();
            if let Err(e) =
                tokio::task::spawn_blocking(move || run_sweep(&sweep_state, Utc::now())).await
            {
                tracing::error!(error = %e, "escalation sweep panicked");
            }
        }
    })
}
