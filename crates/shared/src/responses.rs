//! HTTP response DTOs.
//!
//! Participant tokens appear only in [`JoinResponse`], returned once to the
//! participant who joined.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use liveplay_domain::{
    ActivityId, ArtifactVariant, ArtifactVariantId, BoardState, Decision, DecisionId,
    DecisionOption, DecisionStatus, LedgerEntry, Outcome, OutcomeId, Participant, ParticipantId,
    ParticipantProgress, ParticipantRole, ParticipantStatus, PlaySession, SessionId,
    SessionSettings, SessionStatus, TimerState, VariantVisibility,
};

/// JSON error body for every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    /// Whether the same request may succeed later.
    pub retryable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResponse {
    pub id: SessionId,
    pub code: String,
    pub name: String,
    pub status: SessionStatus,
    pub activity_id: Option<ActivityId>,
    pub current_step_index: u32,
    pub current_phase_index: u32,
    pub timer: Option<TimerState>,
    pub board: BoardState,
    /// Host-only; omitted from participant views.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<SessionSettings>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl SessionResponse {
    pub fn for_host(session: &PlaySession) -> Self {
        Self {
            settings: Some(session.settings().clone()),
            ..Self::for_participant(session)
        }
    }

    pub fn for_participant(session: &PlaySession) -> Self {
        Self {
            id: session.id(),
            code: session.code().as_str().to_string(),
            name: session.name().as_str().to_string(),
            status: session.status(),
            activity_id: session.activity_id(),
            current_step_index: session.current_step_index(),
            current_phase_index: session.current_phase_index(),
            timer: session.timer().cloned(),
            board: session.board().clone(),
            settings: None,
            created_at: session.created_at(),
            updated_at: session.updated_at(),
            started_at: session.started_at(),
            paused_at: session.paused_at(),
            ended_at: session.ended_at(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantResponse {
    pub id: ParticipantId,
    pub session_id: SessionId,
    pub display_name: String,
    pub role: ParticipantRole,
    pub status: ParticipantStatus,
    pub progress: ParticipantProgress,
    pub joined_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub disconnected_at: Option<DateTime<Utc>>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub session_role: Option<String>,
}

impl From<&Participant> for ParticipantResponse {
    fn from(p: &Participant) -> Self {
        Self {
            id: p.id(),
            session_id: p.session_id(),
            display_name: p.display_name().as_str().to_string(),
            role: p.role(),
            status: p.status(),
            progress: p.progress().clone(),
            joined_at: p.joined_at(),
            last_seen_at: p.last_seen_at(),
            disconnected_at: p.disconnected_at(),
            token_expires_at: p.token_expires_at(),
            session_role: p.session_role().map(|r| r.as_str().to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignmentResponse {
    pub participant_id: ParticipantId,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinResponse {
    pub participant: ParticipantResponse,
    /// Bearer token for `x-participant-token`. Shown only here.
    pub participant_token: String,
    pub session_status: SessionStatus,
}

/// A returning participant and the session as they now see it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejoinResponse {
    pub participant: ParticipantResponse,
    pub session: SessionResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeBankResponse {
    pub session_id: SessionId,
    pub balance_seconds: i64,
    pub updated_at: Option<DateTime<Utc>>,
    /// Newest first.
    pub entries: Vec<LedgerEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionResponse {
    pub id: DecisionId,
    pub session_id: SessionId,
    pub title: String,
    pub prompt: Option<String>,
    pub options: Vec<DecisionOption>,
    pub status: DecisionStatus,
    pub allow_anonymous: bool,
    pub max_choices: u32,
    pub opened_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub revealed_at: Option<DateTime<Utc>>,
}

impl From<&Decision> for DecisionResponse {
    fn from(d: &Decision) -> Self {
        Self {
            id: d.id(),
            session_id: d.session_id(),
            title: d.title().as_str().to_string(),
            prompt: d.prompt().map(str::to_string),
            options: d.options().to_vec(),
            status: d.status(),
            allow_anonymous: d.allow_anonymous(),
            max_choices: d.max_choices(),
            opened_at: d.opened_at(),
            closed_at: d.closed_at(),
            revealed_at: d.revealed_at(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteResponse {
    pub decision_id: DecisionId,
    pub option_keys: Vec<String>,
    /// A previous ballot from the same voter was replaced.
    pub replaced: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactVariantResponse {
    pub id: ArtifactVariantId,
    pub title: String,
    pub body: Option<String>,
    pub media_ref: Option<serde_json::Value>,
    pub variant_order: u32,
    pub visibility: VariantVisibility,
    pub visible_to_role: Option<String>,
    pub revealed_at: Option<DateTime<Utc>>,
    pub highlighted_at: Option<DateTime<Utc>>,
}

impl From<&ArtifactVariant> for ArtifactVariantResponse {
    fn from(v: &ArtifactVariant) -> Self {
        Self {
            id: v.id(),
            title: v.title().as_str().to_string(),
            body: v.body().map(str::to_string),
            media_ref: v.media_ref().cloned(),
            variant_order: v.variant_order(),
            visibility: v.visibility(),
            visible_to_role: v.visible_to_role().map(|r| r.as_str().to_string()),
            revealed_at: v.revealed_at(),
            highlighted_at: v.highlighted_at(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeResponse {
    pub id: OutcomeId,
    pub title: String,
    pub body: Option<String>,
    pub outcome_type: Option<String>,
    pub revealed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&Outcome> for OutcomeResponse {
    fn from(o: &Outcome) -> Self {
        Self {
            id: o.id(),
            title: o.title().as_str().to_string(),
            body: o.body().map(str::to_string),
            outcome_type: o.outcome_type().map(str::to_string),
            revealed_at: o.revealed_at(),
            created_at: o.created_at(),
        }
    }
}
