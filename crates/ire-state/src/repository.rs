//! # Alert & Approval Repository
//!
//! [`RoutingStore`] is the narrow persistence interface the routing engine
//! and the escalation monitor write through. [`MemoryStore`] is the
//! in-process implementation backed by two [`Store`]s.
//!
//! ## Compare-and-set
//!
//! Every mutating operation runs its read-validate-write inside
//! [`Store::try_update`], i.e. under the per-store write lock. Two racing
//! acknowledgements (or an approve racing a reject) therefore resolve to
//! exactly one applied transition; the loser observes
//! [`TransitionOutcome::AlreadySettled`] carrying the winner's record.

use chrono::{DateTime, Utc};
use ire_core::{AlertId, ApprovalId, Severity, StateError, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::alert::Alert;
use crate::approval::{validate_rejection_reason, ApprovalKind, PendingApproval};
use crate::store::Store;

/// Errors surfaced by a [`RoutingStore`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No record with this id.
    #[error("{entity} {id} not found")]
    NotFound {
        /// `alert` or `approval`.
        entity: &'static str,
        id: String,
    },

    /// The backing store could not be reached. Retryable.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Input rejected before any state was touched.
    #[error("validation error: {0}")]
    Validation(String),
}

impl StoreError {
    /// Whether the caller may retry the same operation later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<StateError> for StoreError {
    fn from(err: StateError) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Result of a lifecycle transition request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome<T> {
    /// This call performed the transition.
    Applied(T),
    /// The record was already settled; nothing changed.
    AlreadySettled(T),
}

impl<T> TransitionOutcome<T> {
    pub fn record(&self) -> &T {
        match self {
            Self::Applied(r) | Self::AlreadySettled(r) => r,
        }
    }

    pub fn into_record(self) -> T {
        match self {
            Self::Applied(r) | Self::AlreadySettled(r) => r,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    /// Wire name: `applied` or `already_settled`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Applied(_) => "applied",
            Self::AlreadySettled(_) => "already_settled",
        }
    }
}

/// Result of an escalation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Escalation<T> {
    /// Raised one step; carries the updated record.
    Escalated(T),
    /// Still open but already at the ceiling. Nothing changed.
    AtMaximum(T),
    /// Acknowledged, approved or rejected. Nothing changed.
    Settled(T),
}

/// Filter for [`RoutingStore::list_unacknowledged`]. Empty matches all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertFilter {
    #[serde(default)]
    pub facility_id: Option<String>,
    #[serde(default)]
    pub participant_id: Option<String>,
    /// Only alerts at or above this severity.
    #[serde(default)]
    pub min_severity: Option<Severity>,
}

impl AlertFilter {
    pub fn matches(&self, alert: &Alert) -> bool {
        if let Some(f) = &self.facility_id {
            if alert.facility_id.as_deref() != Some(f.as_str()) {
                return false;
            }
        }
        if let Some(p) = &self.participant_id {
            if alert.participant_id.as_deref() != Some(p.as_str()) {
                return false;
            }
        }
        self.min_severity.map_or(true, |min| alert.severity >= min)
    }
}

/// Filter for [`RoutingStore::list_pending`]. Empty matches all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalFilter {
    /// Assigned role, compared case-insensitively.
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub kind: Option<ApprovalKind>,
}

impl ApprovalFilter {
    pub fn matches(&self, approval: &PendingApproval) -> bool {
        if let Some(role) = &self.role {
            match &approval.assigned_role {
                Some(assigned) if assigned.eq_ignore_ascii_case(role.trim()) => {}
                _ => return false,
            }
        }
        self.kind.map_or(true, |k| approval.kind == k)
    }
}

/// Persistence interface for alerts and pending approvals.
///
/// Implementations must make each mutating call atomic per entity.
pub trait RoutingStore: Send + Sync {
    fn insert_alert(&self, alert: Alert) -> Result<Alert, StoreError>;

    fn get_alert(&self, id: &AlertId) -> Result<Alert, StoreError>;

    /// Unacknowledged → acknowledged. A repeat by anyone is `AlreadySettled`
    /// and reports the original acknowledger.
    fn acknowledge(
        &self,
        id: &AlertId,
        user: &UserId,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutcome<Alert>, StoreError>;

    /// Raise an open alert's severity one step.
    fn escalate_alert(&self, id: &AlertId) -> Result<Escalation<Alert>, StoreError>;

    /// Unacknowledged alerts, newest first.
    fn list_unacknowledged(&self, filter: &AlertFilter) -> Result<Vec<Alert>, StoreError>;

    fn insert_approval(&self, approval: PendingApproval) -> Result<PendingApproval, StoreError>;

    fn get_approval(&self, id: &ApprovalId) -> Result<PendingApproval, StoreError>;

    fn approve(
        &self,
        id: &ApprovalId,
        user: &UserId,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutcome<PendingApproval>, StoreError>;

    /// Pending → rejected. A blank reason is a `Validation` error and the
    /// record is not touched.
    fn reject(
        &self,
        id: &ApprovalId,
        user: &UserId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutcome<PendingApproval>, StoreError>;

    /// Raise a pending approval's priority one step.
    fn escalate_approval(&self, id: &ApprovalId)
        -> Result<Escalation<PendingApproval>, StoreError>;

    /// Pending approvals, most urgent first, then oldest first.
    fn list_pending(&self, filter: &ApprovalFilter) -> Result<Vec<PendingApproval>, StoreError>;
}

/// In-memory [`RoutingStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    alerts: Store<AlertId, Alert>,
    approvals: Store<ApprovalId, PendingApproval>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alert_count(&self) -> usize {
        self.alerts.len()
    }

    pub fn approval_count(&self) -> usize {
        self.approvals.len()
    }
}

fn alert_not_found(id: &AlertId) -> StoreError {
    StoreError::NotFound {
        entity: "alert",
        id: id.0.to_string(),
    }
}

fn approval_not_found(id: &ApprovalId) -> StoreError {
    StoreError::NotFound {
        entity: "approval",
        id: id.0.to_string(),
    }
}

impl RoutingStore for MemoryStore {
    fn insert_alert(&self, alert: Alert) -> Result<Alert, StoreError> {
        self.alerts.insert(alert.id, alert.clone());
        Ok(alert)
    }

    fn get_alert(&self, id: &AlertId) -> Result<Alert, StoreError> {
        self.alerts.get(id).ok_or_else(|| alert_not_found(id))
    }

    fn acknowledge(
        &self,
        id: &AlertId,
        user: &UserId,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutcome<Alert>, StoreError> {
        let outcome = self
            .alerts
            .try_update(id, |alert| match alert.acknowledge(user, at) {
                Ok(()) => Ok::<_, StoreError>(TransitionOutcome::Applied(alert.clone())),
                Err(StateError::InvalidTransition { .. }) => {
                    Ok(TransitionOutcome::AlreadySettled(alert.clone()))
                }
                Err(e) => Err(e.into()),
            })
            .ok_or_else(|| alert_not_found(id))??;

        if let TransitionOutcome::AlreadySettled(alert) = &outcome {
            tracing::debug!(
                alert_id = %id,
                requested_by = %user,
                acknowledged_by = ?alert.acknowledged_by.as_ref().map(UserId::as_str),
                "acknowledge on settled alert"
            );
        }
        Ok(outcome)
    }

    fn escalate_alert(&self, id: &AlertId) -> Result<Escalation<Alert>, StoreError> {
        self.alerts
            .try_update(id, |alert| {
                Ok(if alert.acknowledged {
                    Escalation::Settled(alert.clone())
                } else if alert.escalate().is_some() {
                    Escalation::Escalated(alert.clone())
                } else {
                    Escalation::AtMaximum(alert.clone())
                })
            })
            .ok_or_else(|| alert_not_found(id))?
    }

    fn list_unacknowledged(&self, filter: &AlertFilter) -> Result<Vec<Alert>, StoreError> {
        let mut alerts = self
            .alerts
            .filter(|a| !a.acknowledged && filter.matches(a));
        alerts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(a.id.cmp(&b.id)));
        Ok(alerts)
    }

    fn insert_approval(&self, approval: PendingApproval) -> Result<PendingApproval, StoreError> {
        self.approvals.insert(approval.id, approval.clone());
        Ok(approval)
    }

    fn get_approval(&self, id: &ApprovalId) -> Result<PendingApproval, StoreError> {
        self.approvals.get(id).ok_or_else(|| approval_not_found(id))
    }

    fn approve(
        &self,
        id: &ApprovalId,
        user: &UserId,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutcome<PendingApproval>, StoreError> {
        self.approvals
            .try_update(id, |approval| match approval.approve(user, at) {
                Ok(()) => Ok(TransitionOutcome::Applied(approval.clone())),
                Err(StateError::InvalidTransition { .. }) => {
                    Ok(TransitionOutcome::AlreadySettled(approval.clone()))
                }
                Err(e) => Err(e.into()),
            })
            .ok_or_else(|| approval_not_found(id))?
    }

    fn reject(
        &self,
        id: &ApprovalId,
        user: &UserId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<TransitionOutcome<PendingApproval>, StoreError> {
        let reason = validate_rejection_reason(reason)?;
        self.approvals
            .try_update(id, |approval| match approval.reject(user, reason, at) {
                Ok(()) => Ok(TransitionOutcome::Applied(approval.clone())),
                Err(StateError::InvalidTransition { .. }) => {
                    Ok(TransitionOutcome::AlreadySettled(approval.clone()))
                }
                Err(e) => Err(e.into()),
            })
            .ok_or_else(|| approval_not_found(id))?
    }

    fn escalate_approval(
        &self,
        id: &ApprovalId,
    ) -> Result<Escalation<PendingApproval>, StoreError> {
        self.approvals
            .try_update(id, |approval| {
                Ok(if !approval.is_pending() {
                    Escalation::Settled(approval.clone())
                } else if approval.escalate().is_some() {
                    Escalation::Escalated(approval.clone())
                } else {
                    Escalation::AtMaximum(approval.clone())
                })
            })
            .ok_or_else(|| approval_not_found(id))?
    }

    fn list_pending(&self, filter: &ApprovalFilter) -> Result<Vec<PendingApproval>, StoreError> {
        let mut pending = self
            .approvals
            .filter(|a| a.is_pending() && filter.matches(a));
        pending.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.timestamp.cmp(&b.timestamp))
                .then(a.id.cmp(&b.id))
        });
        Ok(pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::ApprovalStatus;
    use chrono::{Duration, TimeZone};
    use ire_core::Priority;
    use std::sync::{Arc, Barrier};

    fn user(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 7, 14, 0, 0).unwrap()
    }

    fn approval(priority: Priority, ts: DateTime<Utc>) -> PendingApproval {
        PendingApproval::new(
            ApprovalKind::IncidentReport,
            priority,
            "s-1",
            "Sam Taylor",
            "Fall in bathroom",
            ts,
        )
        .with_assigned_role("team_leader")
    }

    #[test]
    fn acknowledge_same_user_is_idempotent() {
        let store = MemoryStore::new();
        let alert = store
            .insert_alert(Alert::new("fall", Severity::Warning, "Fall", t0()))
            .unwrap();
        let tl = user("tl-1");

        let first = store.acknowledge(&alert.id, &tl, t0()).unwrap();
        assert!(first.is_applied());
        let second = store
            .acknowledge(&alert.id, &tl, t0() + Duration::minutes(5))
            .unwrap();
        assert_eq!(second.as_str(), "already_settled");
        assert_eq!(second.record(), first.record());
    }

    #[test]
    fn acknowledge_by_other_reports_original() {
        let store = MemoryStore::new();
        let alert = store
            .insert_alert(Alert::new("fall", Severity::Info, "Fall", t0()))
            .unwrap();
        store.acknowledge(&alert.id, &user("a"), t0()).unwrap();
        let outcome = store.acknowledge(&alert.id, &user("b"), t0()).unwrap();
        match outcome {
            TransitionOutcome::AlreadySettled(a) => {
                assert_eq!(a.acknowledged_by, Some(user("a")));
            }
            other => panic!("expected settled, got {other:?}"),
        }
    }

    #[test]
    fn missing_records_are_not_found() {
        let store = MemoryStore::new();
        let err = store.acknowledge(&AlertId::new(), &user("a"), t0()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "alert", .. }));
        let err = store.approve(&ApprovalId::new(), &user("a"), t0()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "approval", .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn blank_reject_reason_is_validation_error() {
        let store = MemoryStore::new();
        let a = store.insert_approval(approval(Priority::Normal, t0())).unwrap();
        let err = store.reject(&a.id, &user("tl"), "  ", t0()).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(store.get_approval(&a.id).unwrap().status, ApprovalStatus::Pending);
    }

    #[test]
    fn approve_after_reject_is_settled() {
        let store = MemoryStore::new();
        let a = store.insert_approval(approval(Priority::Normal, t0())).unwrap();
        store.reject(&a.id, &user("tl"), "incomplete", t0()).unwrap();
        let outcome = store.approve(&a.id, &user("tl2"), t0()).unwrap();
        assert!(!outcome.is_applied());
        assert_eq!(outcome.record().status, ApprovalStatus::Rejected);
    }

    #[test]
    fn escalation_caps_and_respects_settlement() {
        let store = MemoryStore::new();
        let alert = store
            .insert_alert(Alert::new("fall", Severity::Warning, "Fall", t0()))
            .unwrap();
        assert!(matches!(
            store.escalate_alert(&alert.id).unwrap(),
            Escalation::Escalated(a) if a.severity == Severity::Critical
        ));
        assert!(matches!(
            store.escalate_alert(&alert.id).unwrap(),
            Escalation::AtMaximum(a) if a.escalation_level == 1
        ));
        store.acknowledge(&alert.id, &user("u"), t0()).unwrap();
        assert!(matches!(
            store.escalate_alert(&alert.id).unwrap(),
            Escalation::Settled(_)
        ));

        let ap = store.insert_approval(approval(Priority::High, t0())).unwrap();
        assert!(matches!(
            store.escalate_approval(&ap.id).unwrap(),
            Escalation::Escalated(a) if a.priority == Priority::Urgent
        ));
        assert!(matches!(
            store.escalate_approval(&ap.id).unwrap(),
            Escalation::AtMaximum(_)
        ));
    }

    #[test]
    fn list_unacknowledged_filters_and_orders_newest_first() {
        let store = MemoryStore::new();
        let old = store
            .insert_alert(
                Alert::new("fall", Severity::Critical, "old", t0()).with_facility("f-1"),
            )
            .unwrap();
        let new = store
            .insert_alert(
                Alert::new("fall", Severity::Warning, "new", t0() + Duration::hours(1))
                    .with_facility("f-1")
                    .with_participant("p-9"),
            )
            .unwrap();
        store
            .insert_alert(Alert::new("fall", Severity::Info, "other", t0()).with_facility("f-2"))
            .unwrap();
        let acked = store
            .insert_alert(Alert::new("fall", Severity::Critical, "done", t0()).with_facility("f-1"))
            .unwrap();
        store.acknowledge(&acked.id, &user("u"), t0()).unwrap();

        let filter = AlertFilter {
            facility_id: Some("f-1".into()),
            ..Default::default()
        };
        let ids: Vec<_> = store
            .list_unacknowledged(&filter)
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec![new.id, old.id]);

        let filter = AlertFilter {
            min_severity: Some(Severity::Critical),
            ..Default::default()
        };
        assert_eq!(store.list_unacknowledged(&filter).unwrap().len(), 1);

        let filter = AlertFilter {
            participant_id: Some("p-9".into()),
            ..Default::default()
        };
        assert_eq!(store.list_unacknowledged(&filter).unwrap()[0].id, new.id);
        assert_eq!(store.list_unacknowledged(&AlertFilter::default()).unwrap().len(), 3);
    }

    #[test]
    fn list_pending_orders_by_priority_then_age() {
        let store = MemoryStore::new();
        let normal_old = store.insert_approval(approval(Priority::Normal, t0())).unwrap();
        let urgent = store
            .insert_approval(approval(Priority::Urgent, t0() + Duration::hours(2)))
            .unwrap();
        let normal_new = store
            .insert_approval(approval(Priority::Normal, t0() + Duration::hours(1)))
            .unwrap();
        let handover = store
            .insert_approval(
                PendingApproval::new(
                    ApprovalKind::ShiftHandover,
                    Priority::High,
                    "s-2",
                    "Ari",
                    "handover",
                    t0(),
                )
                .with_assigned_role("coordinator"),
            )
            .unwrap();

        let ids: Vec<_> = store
            .list_pending(&ApprovalFilter::default())
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec![urgent.id, handover.id, normal_old.id, normal_new.id]);

        let by_role = store
            .list_pending(&ApprovalFilter {
                role: Some("Team_Leader".into()),
                kind: None,
            })
            .unwrap();
        assert_eq!(by_role.len(), 3);

        let by_kind = store
            .list_pending(&ApprovalFilter {
                role: None,
                kind: Some(ApprovalKind::ShiftHandover),
            })
            .unwrap();
        assert_eq!(by_kind.len(), 1);
        assert_eq!(by_kind[0].id, handover.id);
    }

    #[test]
    fn concurrent_approve_and_reject_have_one_winner() {
        for _ in 0..50 {
            let store = Arc::new(MemoryStore::new());
            let id = store
                .insert_approval(approval(Priority::Normal, t0()))
                .unwrap()
                .id;
            let barrier = Arc::new(Barrier::new(2));

            let s1 = Arc::clone(&store);
            let b1 = Arc::clone(&barrier);
            let approver = std::thread::spawn(move || {
                b1.wait();
                s1.approve(&id, &user("tl-a"), t0()).unwrap()
            });
            let s2 = Arc::clone(&store);
            let b2 = Arc::clone(&barrier);
            let rejecter = std::thread::spawn(move || {
                b2.wait();
                s2.reject(&id, &user("tl-b"), "duplicate", t0()).unwrap()
            });

            let a = approver.join().unwrap();
            let r = rejecter.join().unwrap();
            assert_ne!(a.is_applied(), r.is_applied());

            let stored = store.get_approval(&id).unwrap();
            let winner = if a.is_applied() { &a } else { &r };
            let loser = if a.is_applied() { &r } else { &a };
            assert_eq!(winner.record(), &stored);
            assert_eq!(loser.record(), &stored);
        }
    }

    #[test]
    fn concurrent_acknowledgements_have_one_winner() {
        let store = Arc::new(MemoryStore::new());
        let alert = store
            .insert_alert(Alert::new("fall", Severity::Critical, "Fall", t0()))
            .unwrap();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let s = Arc::clone(&store);
                let id = alert.id;
                std::thread::spawn(move || {
                    s.acknowledge(&id, &user(&format!("u-{i}")), t0()).unwrap()
                })
            })
            .collect();
        let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(outcomes.iter().filter(|o| o.is_applied()).count(), 1);
        let stored = store.get_alert(&alert.id).unwrap();
        assert!(outcomes.iter().all(|o| o.record() == &stored));
    }
}
