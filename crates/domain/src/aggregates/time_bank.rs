//! Time bank - a per-session integer budget of seconds with an append-only
//! ledger.
//!
//! The balance is always the sum of the *applied* deltas in the ledger. The
//! computation here is pure; storage adapters are responsible for running
//! [`TimeBankBalance::apply`] and the ledger append as one atomic unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::actor::Actor;
use crate::error::DomainError;
use crate::ids::{LedgerEntryId, SessionId};
use crate::value_objects::LedgerReason;

/// Default bound on a single requested delta, in either direction.
pub const DEFAULT_MAX_DELTA_SECONDS: i64 = 86_400;

const MAX_EVENT_ID_LENGTH: usize = 200;

/// Largest magnitude accepted for `minBalance` and `maxBalance`. Keeps the
/// difference between any two in-range balances representable.
pub const MAX_BALANCE_BOUND: i64 = i64::MAX / 2;

/// Inclusive balance bounds for one delta call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceBounds {
    min: i64,
    max: Option<i64>,
}

impl Default for BalanceBounds {
    fn default() -> Self {
        Self { min: 0, max: None }
    }
}

impl BalanceBounds {
    /// `min` defaults to 0, `max` to unbounded. Both must lie within
    /// ±[`MAX_BALANCE_BOUND`].
    pub fn new(min: Option<i64>, max: Option<i64>) -> Result<Self, DomainError> {
        let min = min.unwrap_or(0);
        for (name, bound) in [("minBalance", Some(min)), ("maxBalance", max)] {
            if bound.is_some_and(|b| !(-MAX_BALANCE_BOUND..=MAX_BALANCE_BOUND).contains(&b)) {
                return Err(DomainError::validation(format!(
                    "{} must be within ±{}",
                    name, MAX_BALANCE_BOUND
                )));
            }
        }
        if let Some(max) = max {
            if min > max {
                return Err(DomainError::validation(format!(
                    "minBalance ({}) cannot exceed maxBalance ({})",
                    min, max
                )));
            }
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> i64 {
        self.min
    }

    pub fn max(&self) -> Option<i64> {
        self.max
    }

    pub fn clamp(&self, value: i64) -> i64 {
        let value = value.max(self.min);
        match self.max {
            Some(max) => value.min(max),
            None => value,
        }
    }
}

/// A validated delta request.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeBankDelta {
    delta_seconds: i64,
    reason: LedgerReason,
    bounds: BalanceBounds,
    event_id: Option<String>,
    metadata: serde_json::Value,
    actor: Actor,
}

impl TimeBankDelta {
    pub fn new(
        delta_seconds: i64,
        reason: LedgerReason,
        bounds: BalanceBounds,
        max_abs_delta: i64,
        actor: Actor,
    ) -> Result<Self, DomainError> {
        if delta_seconds.checked_abs().map_or(true, |abs| abs > max_abs_delta) {
            return Err(DomainError::validation(format!(
                "deltaSeconds must be within ±{}",
                max_abs_delta
            )));
        }
        Ok(Self {
            delta_seconds,
            reason,
            bounds,
            event_id: None,
            metadata: serde_json::Value::Null,
            actor,
        })
    }

    /// Idempotency key. A second delta with the same key on the same session
    /// is not applied.
    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Result<Self, DomainError> {
        let event_id = event_id.into().trim().to_string();
        if event_id.is_empty() || event_id.len() > MAX_EVENT_ID_LENGTH {
            return Err(DomainError::validation(format!(
                "eventId must be 1-{} characters",
                MAX_EVENT_ID_LENGTH
            )));
        }
        self.event_id = Some(event_id);
        Ok(self)
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn delta_seconds(&self) -> i64 {
        self.delta_seconds
    }

    pub fn reason(&self) -> &LedgerReason {
        &self.reason
    }

    pub fn bounds(&self) -> BalanceBounds {
        self.bounds
    }

    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref()
    }

    pub fn metadata(&self) -> &serde_json::Value {
        &self.metadata
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }
}

/// Immutable audit record. `delta_seconds` is the applied delta, never the
/// requested one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    pub session_id: SessionId,
    pub delta_seconds: i64,
    pub reason: LedgerReason,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub actor: Actor,
    #[serde(default)]
    pub event_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaStatus {
    Applied,
    Clamped,
    /// The event id was already recorded; nothing was written.
    Duplicate,
}

/// Result of an apply-delta call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedDelta {
    pub status: DeltaStatus,
    pub new_balance: i64,
    pub applied_delta: i64,
    pub entry_id: LedgerEntryId,
}

impl AppliedDelta {
    /// Replay of an already-recorded event.
    pub fn duplicate(current_balance: i64, original: &LedgerEntry) -> Self {
        Self {
            status: DeltaStatus::Duplicate,
            new_balance: current_balance,
            applied_delta: original.delta_seconds,
            entry_id: original.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBankBalance {
    pub session_id: SessionId,
    pub balance_seconds: i64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TimeBankBalance {
    /// Balance of a session that has never received a delta.
    pub fn empty(session_id: SessionId) -> Self {
        Self {
            session_id,
            balance_seconds: 0,
            updated_at: None,
        }
    }

    /// Apply a delta, returning the outcome and the ledger entry to append.
    pub fn apply(
        &mut self,
        delta: &TimeBankDelta,
        entry_id: LedgerEntryId,
        now: DateTime<Utc>,
    ) -> (AppliedDelta, LedgerEntry) {
        let current = self.balance_seconds;
        let raw = current.saturating_add(delta.delta_seconds);
        let applied = delta.bounds.clamp(raw);
        let applied_delta = applied.saturating_sub(current);

        self.balance_seconds = applied;
        self.updated_at = Some(now);

        let status = if applied_delta == delta.delta_seconds {
            DeltaStatus::Applied
        } else {
            DeltaStatus::Clamped
        };
        let entry = LedgerEntry {
            id: entry_id,
            session_id: self.session_id,
            delta_seconds: applied_delta,
            reason: delta.reason.clone(),
            metadata: delta.metadata.clone(),
            actor: delta.actor.clone(),
            event_id: delta.event_id.clone(),
            created_at: now,
        };
        (
            AppliedDelta {
                status,
                new_balance: applied,
                applied_delta,
                entry_id,
            },
            entry,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::UserId;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn delta(seconds: i64, min: Option<i64>, max: Option<i64>) -> TimeBankDelta {
        TimeBankDelta::new(
            seconds,
            LedgerReason::new("bonus").unwrap(),
            BalanceBounds::new(min, max).unwrap(),
            DEFAULT_MAX_DELTA_SECONDS,
            Actor::host(UserId::new("host-1").unwrap()),
        )
        .unwrap()
    }

    #[test]
    fn unclamped_delta_is_applied() {
        let mut balance = TimeBankBalance::empty(SessionId::new());
        let (result, entry) = balance.apply(&delta(60, None, None), LedgerEntryId::new(), now());
        assert_eq!(result.status, DeltaStatus::Applied);
        assert_eq!(result.new_balance, 60);
        assert_eq!(entry.delta_seconds, 60);
    }

    #[test]
    fn clamp_at_min_records_applied_delta() {
        let mut balance = TimeBankBalance::empty(SessionId::new());
        balance.balance_seconds = 60;
        let (result, entry) =
            balance.apply(&delta(-9999, Some(0), None), LedgerEntryId::new(), now());
        assert_eq!(result.status, DeltaStatus::Clamped);
        assert_eq!(result.new_balance, 0);
        assert_eq!(result.applied_delta, -60);
        assert_eq!(entry.delta_seconds, -60);
    }

    #[test]
    fn clamp_at_max() {
        let mut balance = TimeBankBalance::empty(SessionId::new());
        let (result, _) = balance.apply(&delta(5000, None, Some(100)), LedgerEntryId::new(), now());
        assert_eq!(result.status, DeltaStatus::Clamped);
        assert_eq!(result.new_balance, 100);
        assert_eq!(result.applied_delta, 100);
    }

    #[test]
    fn ledger_sum_tracks_balance() {
        let mut balance = TimeBankBalance::empty(SessionId::new());
        let mut sum = 0;
        for d in [30, -100, 500, -20, 7, 4000, -4000] {
            let (_, entry) = balance.apply(&delta(d, Some(0), Some(600)), LedgerEntryId::new(), now());
            sum += entry.delta_seconds;
            assert!((0..=600).contains(&balance.balance_seconds));
        }
        assert_eq!(sum, balance.balance_seconds);
    }

    #[test]
    fn bounds_reject_inverted_range() {
        assert!(BalanceBounds::new(Some(10), Some(5)).is_err());
        assert!(BalanceBounds::new(Some(5), Some(5)).is_ok());
    }

    #[test]
    fn bounds_outside_the_balance_range_are_rejected() {
        for (min, max) in [
            (Some(i64::MIN), Some(i64::MIN)),
            (None, Some(i64::MAX)),
            (Some(-MAX_BALANCE_BOUND - 1), None),
        ] {
            assert!(
                matches!(BalanceBounds::new(min, max), Err(DomainError::Validation(_))),
                "{min:?}..{max:?} accepted"
            );
        }
        assert!(BalanceBounds::new(Some(-MAX_BALANCE_BOUND), Some(MAX_BALANCE_BOUND)).is_ok());
    }

    #[test]
    fn extreme_bounds_clamp_without_overflow() {
        let mut balance = TimeBankBalance::empty(SessionId::new());
        balance.balance_seconds = MAX_BALANCE_BOUND;
        let (result, entry) = balance.apply(
            &delta(-1, Some(-MAX_BALANCE_BOUND), Some(-MAX_BALANCE_BOUND)),
            LedgerEntryId::new(),
            now(),
        );
        assert_eq!(result.status, DeltaStatus::Clamped);
        assert_eq!(result.new_balance, -MAX_BALANCE_BOUND);
        assert_eq!(entry.delta_seconds, -2 * MAX_BALANCE_BOUND);
    }

    #[test]
    fn oversized_delta_rejected() {
        let result = TimeBankDelta::new(
            3601,
            LedgerReason::new("abuse").unwrap(),
            BalanceBounds::default(),
            3600,
            Actor::System,
        );
        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert!(TimeBankDelta::new(
            i64::MIN,
            LedgerReason::new("overflow").unwrap(),
            BalanceBounds::default(),
            3600,
            Actor::System,
        )
        .is_err());
    }

    #[test]
    fn blank_event_id_rejected() {
        assert!(delta(1, None, None).with_event_id("  ").is_err());
        let d = delta(1, None, None).with_event_id("evt-1").unwrap();
        assert_eq!(d.event_id(), Some("evt-1"));
    }
}
