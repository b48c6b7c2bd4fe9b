//! Play events - notifications fanned out to connected clients after a
//! successful mutation.
//!
//! Events are a latency hint, not a source of truth: they may be dropped or
//! reordered, and clients re-fetch authoritative snapshots. Payloads never
//! carry participant tokens or unrevealed content.

use serde::{Deserialize, Serialize};

use crate::aggregates::{
    BoardState, DecisionStatus, DeltaStatus, Participant, ParticipantProgress, ParticipantRole,
    ParticipantStatus, SessionAction, SessionStatus, TimerState,
};
use crate::ids::{ArtifactVariantId, DecisionId, OutcomeId, ParticipantId, SessionId};

/// Token-free view of a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantSummary {
    pub id: ParticipantId,
    pub display_name: String,
    pub role: ParticipantRole,
    pub status: ParticipantStatus,
}

impl From<&Participant> for ParticipantSummary {
    fn from(p: &Participant) -> Self {
        Self {
            id: p.id(),
            display_name: p.display_name().as_str().to_string(),
            role: p.role(),
            status: p.status(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum PlayEvent {
    SessionStatusChanged {
        session_id: SessionId,
        action: SessionAction,
        from: SessionStatus,
        to: SessionStatus,
    },
    StepChanged {
        step_index: u32,
    },
    PhaseChanged {
        phase_index: u32,
    },
    TimerChanged {
        timer: Option<TimerState>,
    },
    BoardUpdated {
        board: BoardState,
    },
    ParticipantJoined {
        participant: ParticipantSummary,
    },
    ParticipantRejoined {
        participant: ParticipantSummary,
    },
    ParticipantStatusChanged {
        participant_id: ParticipantId,
        from: ParticipantStatus,
        to: ParticipantStatus,
    },
    ParticipantUpdated {
        participant_id: ParticipantId,
        progress: ParticipantProgress,
    },
    /// Role names stay off the shared channel; holders refetch their view.
    RoleChanged {
        participant_id: ParticipantId,
    },
    TimeBankChanged {
        balance_seconds: i64,
        applied_delta: i64,
        status: DeltaStatus,
        reason: String,
    },
    DecisionUpdated {
        decision_id: DecisionId,
        status: DecisionStatus,
    },
    VoteCast {
        decision_id: DecisionId,
    },
    ArtifactUpdated {
        variant_id: ArtifactVariantId,
        revealed: bool,
        highlighted: bool,
    },
    OutcomeRevealed {
        outcome_id: OutcomeId,
    },
}

impl PlayEvent {
    /// Wire name used as the envelope `type`.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SessionStatusChanged { .. } => "session_status_changed",
            Self::StepChanged { .. } => "step_changed",
            Self::PhaseChanged { .. } => "phase_changed",
            Self::TimerChanged { .. } => "timer_changed",
            Self::BoardUpdated { .. } => "board_updated",
            Self::ParticipantJoined { .. } => "participant_joined",
            Self::ParticipantRejoined { .. } => "participant_rejoined",
            Self::ParticipantStatusChanged { .. } => "participant_status_changed",
            Self::ParticipantUpdated { .. } => "participant_updated",
            Self::RoleChanged { .. } => "role_changed",
            Self::TimeBankChanged { .. } => "time_bank_changed",
            Self::DecisionUpdated { .. } => "decision_updated",
            Self::VoteCast { .. } => "vote_cast",
            Self::ArtifactUpdated { .. } => "artifact_updated",
            Self::OutcomeRevealed { .. } => "outcome_revealed",
        }
    }

    /// Split into the envelope `type` and `payload`.
    pub fn into_parts(self) -> Result<(&'static str, serde_json::Value), serde_json::Error> {
        let event_type = self.event_type();
        let mut value = serde_json::to_value(self)?;
        let payload = value
            .get_mut("payload")
            .map(serde_json::Value::take)
            .unwrap_or(serde_json::Value::Null);
        Ok((event_type, payload))
    }
}
