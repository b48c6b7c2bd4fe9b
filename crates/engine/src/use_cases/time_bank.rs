//! Session time bank: clamped, idempotent deltas over an append-only ledger.

use std::sync::Arc;

use serde_json::json;

use liveplay_domain::{
    ActivityKind, AppliedDelta, BalanceBounds, DeltaStatus, LedgerEntry, LedgerEntryId,
    LedgerReason, PlayEvent, TimeBankBalance, TimeBankDelta,
};

use crate::infrastructure::ports::{ClockPort, TimeBankRepo};

use super::activity::ActivityLog;
use super::auth::{HostViewer, Viewer};
use super::broadcast::EventBroadcaster;
use super::error::PlayError;

/// Raw delta request, validated by [`TimeBankLedger::apply_delta`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeltaInput {
    pub delta_seconds: i64,
    pub reason: String,
    pub min_balance: Option<i64>,
    pub max_balance: Option<i64>,
    pub event_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Balance plus the most recent ledger entries, newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeBankView {
    pub balance: TimeBankBalance,
    pub entries: Vec<LedgerEntry>,
}

pub struct TimeBankLedger {
    repo: Arc<dyn TimeBankRepo>,
    broadcaster: Arc<EventBroadcaster>,
    activity: Arc<ActivityLog>,
    clock: Arc<dyn ClockPort>,
    max_delta_seconds: i64,
}

impl TimeBankLedger {
    pub fn new(
        repo: Arc<dyn TimeBankRepo>,
        broadcaster: Arc<EventBroadcaster>,
        activity: Arc<ActivityLog>,
        clock: Arc<dyn ClockPort>,
        max_delta_seconds: i64,
    ) -> Self {
        Self {
            repo,
            broadcaster,
            activity,
            clock,
            max_delta_seconds,
        }
    }

    /// Apply a host delta. The balance is clamped into `[min, max]` and the
    /// ledger records the delta actually applied. A replayed `event_id`
    /// returns the original outcome without writing.
    pub async fn apply_delta(
        &self,
        host: &HostViewer,
        input: DeltaInput,
    ) -> Result<AppliedDelta, PlayError> {
        let session = host.session();
        if session.status().is_terminal() {
            return Err(PlayError::SessionEnded);
        }

        let reason = LedgerReason::new(input.reason)?;
        let bounds = BalanceBounds::new(input.min_balance, input.max_balance)?;
        let mut delta = TimeBankDelta::new(
            input.delta_seconds,
            reason,
            bounds,
            self.max_delta_seconds,
            host.actor(),
        )?;
        if let Some(event_id) = input.event_id {
            delta = delta.with_event_id(event_id)?;
        }
        if let Some(metadata) = input.metadata {
            delta = delta.with_metadata(metadata);
        }

        let outcome = self
            .repo
            .apply_delta(session.id(), &delta, LedgerEntryId::new(), self.clock.now())
            .await?;

        if outcome.status == DeltaStatus::Duplicate {
            tracing::debug!(
                session_id = %session.id(),
                event_id = delta.event_id().unwrap_or_default(),
                "Time bank delta already applied"
            );
            return Ok(outcome);
        }

        tracing::info!(
            session_id = %session.id(),
            requested = delta.delta_seconds(),
            applied = outcome.applied_delta,
            balance = outcome.new_balance,
            "Time bank delta applied"
        );
        self.activity
            .record(
                session.id(),
                ActivityKind::TimeBankDelta,
                host.actor(),
                json!({
                    "requested_delta": delta.delta_seconds(),
                    "applied_delta": outcome.applied_delta,
                    "new_balance": outcome.new_balance,
                    "status": outcome.status,
                    "reason": delta.reason().as_str(),
                }),
            )
            .await;
        self.broadcaster
            .publish(
                session.id(),
                PlayEvent::TimeBankChanged {
                    balance_seconds: outcome.new_balance,
                    applied_delta: outcome.applied_delta,
                    status: outcome.status,
                    reason: delta.reason().as_str().to_string(),
                },
            )
            .await;

        Ok(outcome)
    }

    pub async fn get(&self, viewer: &Viewer, limit: u32) -> Result<TimeBankView, PlayError> {
        let session_id = viewer.session().id();
        let balance = self.repo.get_balance(session_id).await?;
        let entries = self.repo.recent_entries(session_id, limit).await?;
        Ok(TimeBankView { balance, entries })
    }
}
