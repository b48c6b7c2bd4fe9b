//! Repository port traits for session runtime storage.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use liveplay_domain::*;

use super::error::RepoError;

// =============================================================================
// Sessions
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionRepo: Send + Sync {
    async fn get(&self, id: SessionId) -> Result<Option<PlaySession>, RepoError>;
    /// Codes are stored uppercase; callers pass a parsed [`SessionCode`].
    async fn get_by_code(&self, code: &SessionCode) -> Result<Option<PlaySession>, RepoError>;
    /// Fails with `ConstraintViolation` when the join code is taken.
    async fn insert(&self, session: &PlaySession) -> Result<(), RepoError>;
    /// Replace the stored session with `updated` only while it still equals
    /// `current`, as one atomic check-and-write. Returns `false` when another
    /// write landed since `current` was read.
    async fn save_if_unchanged(
        &self,
        current: &PlaySession,
        updated: &PlaySession,
    ) -> Result<bool, RepoError>;
    /// Newest first.
    async fn list_for_host(&self, host_id: &UserId) -> Result<Vec<PlaySession>, RepoError>;
}

// =============================================================================
// Participants
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ParticipantRepo: Send + Sync {
    async fn get(&self, id: ParticipantId) -> Result<Option<Participant>, RepoError>;
    /// Token lookup is always scoped to one session.
    async fn get_by_token(
        &self,
        session_id: SessionId,
        token: &ParticipantToken,
    ) -> Result<Option<Participant>, RepoError>;
    /// Insert if fewer than `max_seats` non-revoked participants exist.
    ///
    /// Returns `false` when the session is full. The seat count and the
    /// insert happen in one atomic unit.
    async fn insert_seated(
        &self,
        participant: &Participant,
        max_seats: u32,
    ) -> Result<bool, RepoError>;
    /// Replace the stored participant with `updated` only while it still
    /// equals `current`, as one atomic check-and-write. Returns `false` when
    /// another write landed since `current` was read.
    async fn save_if_unchanged(
        &self,
        current: &Participant,
        updated: &Participant,
    ) -> Result<bool, RepoError>;
    /// Join order.
    async fn list_in_session(&self, session_id: SessionId) -> Result<Vec<Participant>, RepoError>;
    /// Clear the next-starter flag on everyone in the session and set it on
    /// `participant_id`, as one update. Returns the updated participant, or
    /// `None` when it is not part of the session.
    async fn assign_next_starter(
        &self,
        session_id: SessionId,
        participant_id: ParticipantId,
    ) -> Result<Option<Participant>, RepoError>;
    /// Active participants whose last heartbeat is older than `cutoff`.
    async fn list_active_seen_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Participant>, RepoError>;
}

// =============================================================================
// Time bank
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TimeBankRepo: Send + Sync {
    /// Read balance, clamp, write balance and append the ledger entry as one
    /// serialized unit per session. A repeated `event_id` yields a
    /// `Duplicate` result without writing.
    async fn apply_delta(
        &self,
        session_id: SessionId,
        delta: &TimeBankDelta,
        entry_id: LedgerEntryId,
        now: DateTime<Utc>,
    ) -> Result<AppliedDelta, RepoError>;
    /// Zero balance when the session never received a delta.
    async fn get_balance(&self, session_id: SessionId) -> Result<TimeBankBalance, RepoError>;
    /// Newest first.
    async fn recent_entries(
        &self,
        session_id: SessionId,
        limit: u32,
    ) -> Result<Vec<LedgerEntry>, RepoError>;
}

// =============================================================================
// Decisions
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DecisionRepo: Send + Sync {
    async fn get(&self, id: DecisionId) -> Result<Option<Decision>, RepoError>;
    async fn save(&self, decision: &Decision) -> Result<(), RepoError>;
    /// Creation order.
    async fn list_in_session(&self, session_id: SessionId) -> Result<Vec<Decision>, RepoError>;
    /// Store a voter's ballot. With `replace` false, a second ballot from the
    /// same voter fails with `ConstraintViolation`; with `replace` true the
    /// previous rows are swapped out. Returns whether a ballot was replaced.
    async fn cast_ballot(&self, ballot: &Ballot, replace: bool) -> Result<bool, RepoError>;
    async fn list_votes(&self, decision_id: DecisionId) -> Result<Vec<Vote>, RepoError>;
    async fn has_votes(&self, decision_id: DecisionId) -> Result<bool, RepoError>;
}

// =============================================================================
// Artifacts & outcomes
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArtifactRepo: Send + Sync {
    async fn get(&self, id: ArtifactVariantId) -> Result<Option<ArtifactVariant>, RepoError>;
    async fn save(&self, variant: &ArtifactVariant) -> Result<(), RepoError>;
    /// Ordered by `variant_order`, then creation.
    async fn list_in_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<ArtifactVariant>, RepoError>;
    /// Make `variant_id` the session's only highlighted variant (or clear the
    /// highlight with `None`). Returns the variants whose highlight changed.
    async fn set_highlight(
        &self,
        session_id: SessionId,
        variant_id: Option<ArtifactVariantId>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ArtifactVariant>, RepoError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OutcomeRepo: Send + Sync {
    async fn get(&self, id: OutcomeId) -> Result<Option<Outcome>, RepoError>;
    async fn save(&self, outcome: &Outcome) -> Result<(), RepoError>;
    /// Creation order.
    async fn list_in_session(&self, session_id: SessionId) -> Result<Vec<Outcome>, RepoError>;
}

// =============================================================================
// Activity log
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActivityLogRepo: Send + Sync {
    async fn append(&self, entry: &ActivityLogEntry) -> Result<(), RepoError>;
    /// Newest first.
    async fn list_recent(
        &self,
        session_id: SessionId,
        limit: u32,
    ) -> Result<Vec<ActivityLogEntry>, RepoError>;
}

/// All storage ports, as handed out by a store backend.
#[derive(Clone)]
pub struct Repositories {
    pub sessions: Arc<dyn SessionRepo>,
    pub participants: Arc<dyn ParticipantRepo>,
    pub time_bank: Arc<dyn TimeBankRepo>,
    pub decisions: Arc<dyn DecisionRepo>,
    pub artifacts: Arc<dyn ArtifactRepo>,
    pub outcomes: Arc<dyn OutcomeRepo>,
    pub activity: Arc<dyn ActivityLogRepo>,
}
