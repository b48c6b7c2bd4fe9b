//! HTTP routes.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, get, patch, post, put},
    Json, Router,
};
use uuid::Uuid;

use liveplay_domain::{
    ActivityId, ActivityLogEntry, AppliedDelta, ArtifactVariantId, DecisionId, DecisionPatch,
    DomainError, OutcomeId, Participant, ParticipantId, RoleName, SessionId, Tally, Title,
};
use liveplay_shared::requests::{
    AssignRolesRequest, CreateArtifactVariantRequest, CreateDecisionRequest,
    CreateOutcomeRequest, CreateSessionRequest, JoinRequest, LimitQuery, RoleAssignmentRequest,
    SessionActionRequest, SetBoardRequest, SetIndexRequest, SetPositionRequest,
    TimeBankDeltaRequest, TimerRequest, UpdateDecisionRequest, VoteRequest,
};
use liveplay_shared::responses::{
    ArtifactVariantResponse, DecisionResponse, HealthResponse, JoinResponse, OutcomeResponse,
    ParticipantResponse, RejoinResponse, RoleAssignmentResponse, SessionResponse,
    TimeBankResponse, VoteResponse,
};
use liveplay_shared::ErrorBody;

use crate::app::App;
use crate::use_cases::{
    BoardSnapshot, Credentials, DeltaInput, ErrorKind, HostViewer, NewDecision, NewOutcome,
    NewVariant, ParticipantViewer, PlayError, RoleAssignment, Viewer,
};

/// Participant bearer token.
pub const PARTICIPANT_TOKEN_HEADER: &str = "x-participant-token";
/// Host identity, set by the upstream gateway.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Create all HTTP routes.
pub fn routes() -> Router<Arc<App>> {
    Router::new()
        .route("/api/health", get(health))
        // Sessions
        .route("/api/sessions", get(list_sessions).post(create_session))
        .route("/api/sessions/{id}", get(get_session).patch(update_session))
        .route("/api/sessions/{id}/step", put(set_step))
        .route("/api/sessions/{id}/phase", put(set_phase))
        .route("/api/sessions/{id}/board", put(set_board).get(get_board))
        .route("/api/sessions/{id}/timer", post(timer))
        .route("/api/sessions/{id}/activity", get(list_activity))
        // Participants
        .route("/api/play/join", post(join))
        .route("/api/sessions/{id}/rejoin", post(rejoin))
        .route("/api/sessions/{id}/heartbeat", post(heartbeat))
        .route("/api/sessions/{id}/leave", post(leave))
        .route("/api/sessions/{id}/participants", get(list_participants))
        .route(
            "/api/sessions/{id}/participants/{pid}/approve",
            post(approve_participant),
        )
        .route(
            "/api/sessions/{id}/participants/{pid}/kick",
            post(kick_participant),
        )
        .route(
            "/api/sessions/{id}/participants/{pid}/block",
            post(block_participant),
        )
        .route(
            "/api/sessions/{id}/participants/{pid}/next-starter",
            post(set_next_starter),
        )
        .route(
            "/api/sessions/{id}/participants/{pid}/position",
            put(set_position),
        )
        .route(
            "/api/sessions/{id}/assignments",
            get(list_assignments)
                .post(assign_roles)
                .delete(unassign_role),
        )
        // Time bank
        .route(
            "/api/sessions/{id}/time-bank",
            get(get_time_bank).post(apply_time_bank_delta),
        )
        // Decisions
        .route(
            "/api/sessions/{id}/decisions",
            get(list_decisions).post(create_decision),
        )
        .route(
            "/api/sessions/{id}/decisions/{did}",
            patch(update_decision),
        )
        .route("/api/sessions/{id}/decisions/{did}/votes", post(vote))
        .route("/api/sessions/{id}/decisions/{did}/tally", get(tally))
        // Artifacts & outcomes
        .route(
            "/api/sessions/{id}/artifacts",
            get(list_artifacts).post(create_artifact),
        )
        .route(
            "/api/sessions/{id}/artifacts/{vid}/reveal",
            post(reveal_artifact),
        )
        .route("/api/sessions/{id}/artifacts/{vid}/hide", post(hide_artifact))
        .route(
            "/api/sessions/{id}/artifacts/{vid}/highlight",
            post(highlight_artifact),
        )
        .route(
            "/api/sessions/{id}/outcomes",
            get(list_outcomes).post(create_outcome),
        )
        .route(
            "/api/sessions/{id}/outcomes/{oid}/reveal",
            post(reveal_outcome),
        )
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

// =============================================================================
// Caller resolution
// =============================================================================

/// Read both credential headers; [`crate::use_cases::AuthResolver`] decides
/// which one applies.
pub fn credentials(headers: &HeaderMap) -> Credentials {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    Credentials {
        participant_token: header(PARTICIPANT_TOKEN_HEADER),
        host_user_id: header(USER_ID_HEADER),
    }
}

async fn viewer(app: &App, id: Uuid, headers: &HeaderMap) -> Result<Viewer, ApiError> {
    Ok(app
        .use_cases
        .auth
        .resolve(SessionId::from_uuid(id), &credentials(headers))
        .await?)
}

async fn host(app: &App, id: Uuid, headers: &HeaderMap) -> Result<HostViewer, ApiError> {
    Ok(app
        .use_cases
        .auth
        .resolve_host(SessionId::from_uuid(id), &credentials(headers))
        .await?)
}

async fn participant(
    app: &App,
    id: Uuid,
    headers: &HeaderMap,
) -> Result<ParticipantViewer, ApiError> {
    Ok(app
        .use_cases
        .auth
        .resolve_participant(SessionId::from_uuid(id), &credentials(headers))
        .await?)
}

fn session_response(viewer: &Viewer) -> SessionResponse {
    match viewer {
        Viewer::Host(host) => SessionResponse::for_host(host.session()),
        Viewer::Participant(p) => SessionResponse::for_participant(&p.session),
    }
}

fn participant_responses(participants: &[Participant]) -> Vec<ParticipantResponse> {
    participants.iter().map(ParticipantResponse::from).collect()
}

// =============================================================================
// Sessions
// =============================================================================

async fn create_session(
    State(app): State<Arc<App>>,
    headers: HeaderMap,
    Json(body): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let host_id = app.use_cases.auth.authenticate_host(&credentials(&headers))?;
    let session = app
        .use_cases
        .sessions
        .create(
            host_id,
            &body.name,
            body.activity_id.map(ActivityId::from_uuid),
            body.settings,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(SessionResponse::for_host(&session))))
}

async fn list_sessions(
    State(app): State<Arc<App>>,
    headers: HeaderMap,
) -> Result<Json<Vec<SessionResponse>>, ApiError> {
    let host_id = app.use_cases.auth.authenticate_host(&credentials(&headers))?;
    let sessions = app.use_cases.sessions.list_for_host(&host_id).await?;
    Ok(Json(sessions.iter().map(SessionResponse::for_host).collect()))
}

async fn get_session(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<SessionResponse>, ApiError> {
    let viewer = viewer(&app, id, &headers).await?;
    Ok(Json(session_response(&viewer)))
}

async fn update_session(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<SessionActionRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let host = host(&app, id, &headers).await?;
    let session = app
        .use_cases
        .sessions
        .apply_action(&host, body.action)
        .await?;
    Ok(Json(SessionResponse::for_host(&session)))
}

async fn set_step(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<SetIndexRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let host = host(&app, id, &headers).await?;
    let session = app.use_cases.sessions.set_step(&host, body.index).await?;
    Ok(Json(SessionResponse::for_host(&session)))
}

async fn set_phase(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<SetIndexRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let host = host(&app, id, &headers).await?;
    let session = app.use_cases.sessions.set_phase(&host, body.index).await?;
    Ok(Json(SessionResponse::for_host(&session)))
}

async fn set_board(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<SetBoardRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let host = host(&app, id, &headers).await?;
    let session = app
        .use_cases
        .sessions
        .set_board(&host, body.message, body.overrides)
        .await?;
    Ok(Json(SessionResponse::for_host(&session)))
}

async fn timer(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<TimerRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let host = host(&app, id, &headers).await?;
    let session = app.use_cases.sessions.timer(&host, body).await?;
    Ok(Json(SessionResponse::for_host(&session)))
}

async fn get_board(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<BoardSnapshot>, ApiError> {
    let viewer = viewer(&app, id, &headers).await?;
    Ok(Json(app.use_cases.board.snapshot(&viewer).await?))
}

async fn list_activity(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<ActivityLogEntry>>, ApiError> {
    let host = host(&app, id, &headers).await?;
    let limit = app.settings.list_limit(query.limit);
    Ok(Json(app.use_cases.activity.list(&host, limit).await?))
}

// =============================================================================
// Participants
// =============================================================================

async fn join(
    State(app): State<Arc<App>>,
    Json(body): Json<JoinRequest>,
) -> Result<(StatusCode, Json<JoinResponse>), ApiError> {
    let (participant, session) = app
        .use_cases
        .participants
        .join(&body.code, &body.display_name, body.role)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(JoinResponse {
            participant: ParticipantResponse::from(&participant),
            participant_token: participant.token().expose().to_string(),
            session_status: session.status(),
        }),
    ))
}

async fn rejoin(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<RejoinResponse>, ApiError> {
    let viewer = app
        .use_cases
        .participants
        .rejoin(SessionId::from_uuid(id), &credentials(&headers))
        .await?;
    Ok(Json(RejoinResponse {
        participant: ParticipantResponse::from(&viewer.participant),
        session: SessionResponse::for_participant(&viewer.session),
    }))
}

async fn heartbeat(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<ParticipantResponse>, ApiError> {
    let viewer = participant(&app, id, &headers).await?;
    let updated = app.use_cases.participants.heartbeat(&viewer).await?;
    Ok(Json(ParticipantResponse::from(&updated)))
}

async fn leave(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<ParticipantResponse>, ApiError> {
    let viewer = participant(&app, id, &headers).await?;
    let updated = app.use_cases.participants.leave(&viewer).await?;
    Ok(Json(ParticipantResponse::from(&updated)))
}

async fn list_participants(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Vec<ParticipantResponse>>, ApiError> {
    let host = host(&app, id, &headers).await?;
    let participants = app.use_cases.participants.list(&host).await?;
    Ok(Json(participant_responses(&participants)))
}

async fn approve_participant(
    State(app): State<Arc<App>>,
    Path((id, pid)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
) -> Result<Json<ParticipantResponse>, ApiError> {
    let host = host(&app, id, &headers).await?;
    let updated = app
        .use_cases
        .participants
        .approve(&host, ParticipantId::from_uuid(pid))
        .await?;
    Ok(Json(ParticipantResponse::from(&updated)))
}

async fn kick_participant(
    State(app): State<Arc<App>>,
    Path((id, pid)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
) -> Result<Json<ParticipantResponse>, ApiError> {
    let host = host(&app, id, &headers).await?;
    let updated = app
        .use_cases
        .participants
        .kick(&host, ParticipantId::from_uuid(pid))
        .await?;
    Ok(Json(ParticipantResponse::from(&updated)))
}

async fn block_participant(
    State(app): State<Arc<App>>,
    Path((id, pid)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
) -> Result<Json<ParticipantResponse>, ApiError> {
    let host = host(&app, id, &headers).await?;
    let updated = app
        .use_cases
        .participants
        .block(&host, ParticipantId::from_uuid(pid))
        .await?;
    Ok(Json(ParticipantResponse::from(&updated)))
}

async fn set_next_starter(
    State(app): State<Arc<App>>,
    Path((id, pid)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
) -> Result<Json<ParticipantResponse>, ApiError> {
    let host = host(&app, id, &headers).await?;
    let updated = app
        .use_cases
        .participants
        .set_next_starter(&host, ParticipantId::from_uuid(pid))
        .await?;
    Ok(Json(ParticipantResponse::from(&updated)))
}

async fn set_position(
    State(app): State<Arc<App>>,
    Path((id, pid)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
    Json(body): Json<SetPositionRequest>,
) -> Result<Json<ParticipantResponse>, ApiError> {
    let host = host(&app, id, &headers).await?;
    let updated = app
        .use_cases
        .participants
        .set_position(&host, ParticipantId::from_uuid(pid), body.position)
        .await?;
    Ok(Json(ParticipantResponse::from(&updated)))
}

async fn list_assignments(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Vec<RoleAssignmentResponse>>, ApiError> {
    let host = host(&app, id, &headers).await?;
    let assignments = app.use_cases.participants.list_assignments(&host).await?;
    Ok(Json(assignments.iter().map(assignment_response).collect()))
}

async fn assign_roles(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<AssignRolesRequest>,
) -> Result<Json<Vec<ParticipantResponse>>, ApiError> {
    let host = host(&app, id, &headers).await?;
    let assignments = body
        .assignments
        .into_iter()
        .map(role_assignment)
        .collect::<Result<Vec<_>, _>>()?;
    let assigned = app
        .use_cases
        .participants
        .assign_roles(&host, assignments)
        .await?;
    Ok(Json(participant_responses(&assigned)))
}

async fn unassign_role(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<RoleAssignmentRequest>,
) -> Result<Json<ParticipantResponse>, ApiError> {
    let host = host(&app, id, &headers).await?;
    let RoleAssignment {
        participant_id,
        role,
    } = role_assignment(body)?;
    let updated = app
        .use_cases
        .participants
        .unassign_role(&host, participant_id, role)
        .await?;
    Ok(Json(ParticipantResponse::from(&updated)))
}

fn role_assignment(body: RoleAssignmentRequest) -> Result<RoleAssignment, DomainError> {
    Ok(RoleAssignment {
        participant_id: ParticipantId::from_uuid(body.participant_id),
        role: RoleName::new(body.role)?,
    })
}

fn assignment_response(assignment: &RoleAssignment) -> RoleAssignmentResponse {
    RoleAssignmentResponse {
        participant_id: assignment.participant_id,
        role: assignment.role.as_str().to_string(),
    }
}

// =============================================================================
// Time bank
// =============================================================================

async fn get_time_bank(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Query(query): Query<LimitQuery>,
) -> Result<Json<TimeBankResponse>, ApiError> {
    let viewer = viewer(&app, id, &headers).await?;
    let limit = app.settings.list_limit(query.limit);
    let view = app.use_cases.time_bank.get(&viewer, limit).await?;
    Ok(Json(TimeBankResponse {
        session_id: view.balance.session_id,
        balance_seconds: view.balance.balance_seconds,
        updated_at: view.balance.updated_at,
        entries: view.entries,
    }))
}

async fn apply_time_bank_delta(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<TimeBankDeltaRequest>,
) -> Result<Json<AppliedDelta>, ApiError> {
    let host = host(&app, id, &headers).await?;
    let input = DeltaInput {
        delta_seconds: body.delta_seconds,
        reason: body.reason,
        min_balance: body.min_balance,
        max_balance: body.max_balance,
        event_id: body.event_id,
        metadata: body.metadata,
    };
    Ok(Json(app.use_cases.time_bank.apply_delta(&host, input).await?))
}

// =============================================================================
// Decisions
// =============================================================================

async fn list_decisions(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Vec<DecisionResponse>>, ApiError> {
    let viewer = viewer(&app, id, &headers).await?;
    let decisions = app.use_cases.decisions.list(&viewer).await?;
    Ok(Json(decisions.iter().map(DecisionResponse::from).collect()))
}

async fn create_decision(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<CreateDecisionRequest>,
) -> Result<(StatusCode, Json<DecisionResponse>), ApiError> {
    let host = host(&app, id, &headers).await?;
    let input = NewDecision {
        title: Title::new(body.title)?,
        prompt: body.prompt,
        options: body.options,
        allow_anonymous: body.allow_anonymous,
        max_choices: body.max_choices,
    };
    let decision = app.use_cases.decisions.create(&host, input).await?;
    Ok((StatusCode::CREATED, Json(DecisionResponse::from(&decision))))
}

async fn update_decision(
    State(app): State<Arc<App>>,
    Path((id, did)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
    Json(body): Json<UpdateDecisionRequest>,
) -> Result<Json<DecisionResponse>, ApiError> {
    let host = host(&app, id, &headers).await?;
    let patch = DecisionPatch {
        title: body.title.map(Title::new).transpose()?,
        prompt: body.prompt,
        options: body.options,
        allow_anonymous: body.allow_anonymous,
        max_choices: body.max_choices,
    };
    let decision = app
        .use_cases
        .decisions
        .update(&host, DecisionId::from_uuid(did), patch, body.action)
        .await?;
    Ok(Json(DecisionResponse::from(&decision)))
}

async fn vote(
    State(app): State<Arc<App>>,
    Path((id, did)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
    Json(body): Json<VoteRequest>,
) -> Result<Json<VoteResponse>, ApiError> {
    let viewer = participant(&app, id, &headers).await?;
    let receipt = app
        .use_cases
        .decisions
        .vote(&viewer, DecisionId::from_uuid(did), body.option_keys)
        .await?;
    Ok(Json(VoteResponse {
        decision_id: receipt.decision_id,
        option_keys: receipt.option_keys,
        replaced: receipt.replaced,
    }))
}

async fn tally(
    State(app): State<Arc<App>>,
    Path((id, did)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
) -> Result<Json<Tally>, ApiError> {
    let viewer = viewer(&app, id, &headers).await?;
    Ok(Json(
        app.use_cases
            .decisions
            .tally(&viewer, DecisionId::from_uuid(did))
            .await?,
    ))
}

// =============================================================================
// Artifacts & outcomes
// =============================================================================

async fn list_artifacts(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Vec<ArtifactVariantResponse>>, ApiError> {
    let viewer = viewer(&app, id, &headers).await?;
    let variants = app.use_cases.reveals.list_variants(&viewer).await?;
    Ok(Json(
        variants.iter().map(ArtifactVariantResponse::from).collect(),
    ))
}

async fn create_artifact(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<CreateArtifactVariantRequest>,
) -> Result<(StatusCode, Json<ArtifactVariantResponse>), ApiError> {
    let host = host(&app, id, &headers).await?;
    let input = NewVariant {
        title: Title::new(body.title)?,
        body: body.body,
        media_ref: body.media_ref,
        variant_order: body.variant_order,
        visibility: body.visibility,
        visible_to_role: body.visible_to_role.map(RoleName::new).transpose()?,
    };
    let variant = app.use_cases.reveals.create_variant(&host, input).await?;
    Ok((
        StatusCode::CREATED,
        Json(ArtifactVariantResponse::from(&variant)),
    ))
}

async fn reveal_artifact(
    State(app): State<Arc<App>>,
    Path((id, vid)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
) -> Result<Json<ArtifactVariantResponse>, ApiError> {
    let host = host(&app, id, &headers).await?;
    let variant = app
        .use_cases
        .reveals
        .reveal_variant(&host, ArtifactVariantId::from_uuid(vid))
        .await?;
    Ok(Json(ArtifactVariantResponse::from(&variant)))
}

async fn hide_artifact(
    State(app): State<Arc<App>>,
    Path((id, vid)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
) -> Result<Json<ArtifactVariantResponse>, ApiError> {
    let host = host(&app, id, &headers).await?;
    let variant = app
        .use_cases
        .reveals
        .hide_variant(&host, ArtifactVariantId::from_uuid(vid))
        .await?;
    Ok(Json(ArtifactVariantResponse::from(&variant)))
}

async fn highlight_artifact(
    State(app): State<Arc<App>>,
    Path((id, vid)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
) -> Result<Json<ArtifactVariantResponse>, ApiError> {
    let host = host(&app, id, &headers).await?;
    let variant = app
        .use_cases
        .reveals
        .highlight_variant(&host, ArtifactVariantId::from_uuid(vid))
        .await?;
    Ok(Json(ArtifactVariantResponse::from(&variant)))
}

async fn list_outcomes(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Vec<OutcomeResponse>>, ApiError> {
    let viewer = viewer(&app, id, &headers).await?;
    let outcomes = app.use_cases.reveals.list_outcomes(&viewer).await?;
    Ok(Json(outcomes.iter().map(OutcomeResponse::from).collect()))
}

async fn create_outcome(
    State(app): State<Arc<App>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<CreateOutcomeRequest>,
) -> Result<(StatusCode, Json<OutcomeResponse>), ApiError> {
    let host = host(&app, id, &headers).await?;
    let input = NewOutcome {
        title: Title::new(body.title)?,
        body: body.body,
        outcome_type: body.outcome_type,
    };
    let outcome = app.use_cases.reveals.create_outcome(&host, input).await?;
    Ok((StatusCode::CREATED, Json(OutcomeResponse::from(&outcome))))
}

async fn reveal_outcome(
    State(app): State<Arc<App>>,
    Path((id, oid)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
) -> Result<Json<OutcomeResponse>, ApiError> {
    let host = host(&app, id, &headers).await?;
    let outcome = app
        .use_cases
        .reveals
        .reveal_outcome(&host, OutcomeId::from_uuid(oid))
        .await?;
    Ok(Json(OutcomeResponse::from(&outcome)))
}

// =============================================================================
// Errors
// =============================================================================

/// A [`PlayError`] on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(PlayError);

impl From<PlayError> for ApiError {
    fn from(e: PlayError) -> Self {
        Self(e)
    }
}

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        Self(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let kind = self.0.kind();
        let status =
            StatusCode::from_u16(kind.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let internal = kind == ErrorKind::Internal;
        let retryable = internal || matches!(self.0, PlayError::WriteConflict(_));

        // Internal details stay in the logs.
        let message = if internal {
            tracing::error!(error = %self.0, "Request failed");
            "Internal error".to_string()
        } else {
            self.0.to_string()
        };

        let body = ErrorBody {
            code: self.0.code().to_string(),
            message,
            retryable,
        };
        (status, Json(body)).into_response()
    }
}
