//! Audit trail of session activity (joins, rejoin attempts, host actions).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::actor::Actor;
use crate::ids::{ActivityLogId, SessionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    SessionCreated,
    SessionStatusChanged,
    RuntimeUpdated,
    ParticipantJoined,
    /// Recorded for every rejoin attempt, successful or not.
    RejoinAttempt,
    ParticipantLeft,
    ParticipantApproved,
    ParticipantKicked,
    ParticipantBlocked,
    ParticipantUpdated,
    RoleAssigned,
    RoleUnassigned,
    PresenceTimeout,
    TimeBankDelta,
    DecisionChanged,
    VoteCast,
    ArtifactChanged,
    OutcomeChanged,
}

impl ActivityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SessionCreated => "session_created",
            Self::SessionStatusChanged => "session_status_changed",
            Self::RuntimeUpdated => "runtime_updated",
            Self::ParticipantJoined => "participant_joined",
            Self::RejoinAttempt => "rejoin_attempt",
            Self::ParticipantLeft => "participant_left",
            Self::ParticipantApproved => "participant_approved",
            Self::ParticipantKicked => "participant_kicked",
            Self::ParticipantBlocked => "participant_blocked",
            Self::ParticipantUpdated => "participant_updated",
            Self::RoleAssigned => "role_assigned",
            Self::RoleUnassigned => "role_unassigned",
            Self::PresenceTimeout => "presence_timeout",
            Self::TimeBankDelta => "time_bank_delta",
            Self::DecisionChanged => "decision_changed",
            Self::VoteCast => "vote_cast",
            Self::ArtifactChanged => "artifact_changed",
            Self::OutcomeChanged => "outcome_changed",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub id: ActivityLogId,
    pub session_id: SessionId,
    pub kind: ActivityKind,
    pub actor: Actor,
    #[serde(default)]
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl ActivityLogEntry {
    pub fn new(
        session_id: SessionId,
        kind: ActivityKind,
        actor: Actor,
        data: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ActivityLogId::new(),
            session_id,
            kind,
            actor,
            data,
            created_at: now,
        }
    }
}
