//! Participant registry: join, rejoin, presence and host moderation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use liveplay_domain::{
    ActivityKind, Actor, DisplayName, Participant, ParticipantId, ParticipantRole,
    ParticipantStatus, ParticipantSummary, ParticipantToken, PlayEvent, PlaySession, RoleName,
    SessionCode, SessionId, SessionStatus,
};

use crate::infrastructure::ports::{ClockPort, ParticipantRepo, RandomPort, SessionRepo};

use super::activity::ActivityLog;
use super::auth::{AuthResolver, Credentials, HostViewer, ParticipantViewer};
use super::broadcast::EventBroadcaster;
use super::error::PlayError;

/// Write attempts before a contended participant row is reported as a
/// conflict.
const MAX_WRITE_ATTEMPTS: usize = 3;

/// A participant as written by [`ParticipantRegistry::update`].
struct Updated<T> {
    previous: ParticipantStatus,
    participant: Participant,
    outcome: T,
}

/// One participant's role within the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAssignment {
    pub participant_id: ParticipantId,
    pub role: RoleName,
}

/// Kicked and blocked rows are out of reach for the participant.
fn unrevoked(participant: &Participant) -> Result<(), PlayError> {
    let status = participant.status();
    if status.is_revoked() {
        Err(PlayError::ParticipantRevoked(status))
    } else {
        Ok(())
    }
}

pub struct ParticipantRegistry {
    sessions: Arc<dyn SessionRepo>,
    participants: Arc<dyn ParticipantRepo>,
    auth: Arc<AuthResolver>,
    broadcaster: Arc<EventBroadcaster>,
    activity: Arc<ActivityLog>,
    clock: Arc<dyn ClockPort>,
    random: Arc<dyn RandomPort>,
    presence_timeout: Duration,
}

impl ParticipantRegistry {
    pub fn new(
        sessions: Arc<dyn SessionRepo>,
        participants: Arc<dyn ParticipantRepo>,
        auth: Arc<AuthResolver>,
        broadcaster: Arc<EventBroadcaster>,
        activity: Arc<ActivityLog>,
        clock: Arc<dyn ClockPort>,
        random: Arc<dyn RandomPort>,
        presence_timeout: Duration,
    ) -> Self {
        Self {
            sessions,
            participants,
            auth,
            broadcaster,
            activity,
            clock,
            random,
            presence_timeout,
        }
    }

    // =========================================================================
    // Join & rejoin
    // =========================================================================

    /// Join by code. The returned participant carries the freshly minted
    /// token; it is never shown again.
    pub async fn join(
        &self,
        code: &str,
        display_name: &str,
        role: Option<ParticipantRole>,
    ) -> Result<(Participant, PlaySession), PlayError> {
        let display_name = DisplayName::new(display_name)?;
        let code = SessionCode::parse(code).map_err(|_| PlayError::InvalidCode)?;
        let session = self
            .sessions
            .get_by_code(&code)
            .await?
            .ok_or(PlayError::InvalidCode)?;

        match session.status() {
            SessionStatus::Draft => return Err(PlayError::SessionNotPublished),
            SessionStatus::Locked => return Err(PlayError::SessionLocked),
            status if status.is_terminal() => return Err(PlayError::SessionEnded),
            _ => {}
        }

        let now = self.clock.now();
        let settings = session.settings();
        let token = ParticipantToken::new(self.random.gen_token())?;
        let participant = Participant::join(
            session.id(),
            display_name,
            role.unwrap_or(ParticipantRole::Player),
            token,
            settings.token_expiry_from(now),
            settings.require_approval,
            now,
        )?;

        if !self
            .participants
            .insert_seated(&participant, settings.max_participants)
            .await?
        {
            tracing::info!(session_id = %session.id(), "Join refused, session is full");
            return Err(PlayError::SessionFull);
        }

        tracing::info!(
            session_id = %session.id(),
            participant_id = %participant.id(),
            role = %participant.role(),
            status = %participant.status(),
            "Participant joined"
        );
        self.activity
            .record(
                session.id(),
                ActivityKind::ParticipantJoined,
                Actor::participant(participant.id()),
                json!({
                    "display_name": participant.display_name().as_str(),
                    "role": participant.role(),
                    "status": participant.status(),
                }),
            )
            .await;
        self.broadcaster
            .publish(
                session.id(),
                PlayEvent::ParticipantJoined {
                    participant: ParticipantSummary::from(&participant),
                },
            )
            .await;

        Ok((participant, session))
    }

    /// Token-based return. Every attempt lands in the activity log with its
    /// outcome, except attempts against unknown sessions.
    pub async fn rejoin(
        &self,
        session_id: SessionId,
        credentials: &Credentials,
    ) -> Result<ParticipantViewer, PlayError> {
        let result = match self.auth.resolve_participant(session_id, credentials).await {
            Ok(viewer) => self.complete_rejoin(viewer).await,
            Err(e) => Err((e, None)),
        };

        match result {
            Ok(viewer) => {
                self.record_rejoin(session_id, Some(viewer.participant.id()), "ok")
                    .await;
                Ok(viewer)
            }
            Err((e, participant_id)) => {
                if !matches!(e, PlayError::NotFound { .. }) {
                    self.record_rejoin(session_id, participant_id, e.code())
                        .await;
                }
                tracing::info!(session_id = %session_id, code = e.code(), "Rejoin refused");
                Err(e)
            }
        }
    }

    async fn complete_rejoin(
        &self,
        viewer: ParticipantViewer,
    ) -> Result<ParticipantViewer, (PlayError, Option<ParticipantId>)> {
        let ParticipantViewer {
            participant,
            session,
        } = viewer;
        let participant_id = participant.id();
        let refuse = |e: PlayError| (e, Some(participant_id));

        if session.status().is_terminal() {
            return Err(refuse(PlayError::SessionEnded));
        }
        if !session.settings().allow_rejoin {
            return Err(refuse(PlayError::RejoinDisabled));
        }

        let require_approval = session.settings().require_approval;
        let now = self.clock.now();
        let Updated {
            previous,
            participant,
            ..
        } = self
            .update(participant, |p| {
                unrevoked(p)?;
                Ok(p.mark_rejoined(require_approval, now)?)
            })
            .await
            .map_err(refuse)?;

        tracing::info!(
            session_id = %session.id(),
            participant_id = %participant_id,
            from = %previous,
            to = %participant.status(),
            "Participant rejoined"
        );
        self.broadcaster
            .publish(
                session.id(),
                PlayEvent::ParticipantRejoined {
                    participant: ParticipantSummary::from(&participant),
                },
            )
            .await;

        Ok(ParticipantViewer {
            participant,
            session,
        })
    }

    async fn record_rejoin(
        &self,
        session_id: SessionId,
        participant_id: Option<ParticipantId>,
        outcome: &str,
    ) {
        let actor = participant_id.map_or(Actor::System, Actor::participant);
        self.activity
            .record(
                session_id,
                ActivityKind::RejoinAttempt,
                actor,
                json!({ "outcome": outcome }),
            )
            .await;
    }

    // =========================================================================
    // Presence
    // =========================================================================

    /// Refresh `last_seen_at`. Revives a disconnected participant.
    pub async fn heartbeat(&self, viewer: &ParticipantViewer) -> Result<Participant, PlayError> {
        let now = self.clock.now();
        let Updated {
            previous,
            participant,
            outcome: revived,
        } = self
            .update(viewer.participant.clone(), |p| {
                unrevoked(p)?;
                Ok(p.touch(now)?)
            })
            .await?;

        if revived {
            self.status_changed(
                &participant,
                previous,
                ActivityKind::ParticipantUpdated,
                viewer.actor(),
            )
            .await;
        }
        Ok(participant)
    }

    pub async fn leave(&self, viewer: &ParticipantViewer) -> Result<Participant, PlayError> {
        let now = self.clock.now();
        let Updated {
            previous,
            participant,
            ..
        } = self
            .update(viewer.participant.clone(), |p| {
                unrevoked(p)?;
                Ok(p.disconnect(now)?)
            })
            .await?;

        tracing::info!(
            session_id = %participant.session_id(),
            participant_id = %participant.id(),
            "Participant left"
        );
        self.status_changed(
            &participant,
            previous,
            ActivityKind::ParticipantLeft,
            viewer.actor(),
        )
        .await;
        Ok(participant)
    }

    /// Mark active participants silent for longer than the presence timeout
    /// as disconnected. Returns how many were swept.
    pub async fn sweep_presence(&self) -> Result<usize, PlayError> {
        let now = self.clock.now();
        let timeout = chrono::Duration::from_std(self.presence_timeout)
            .map_err(|e| PlayError::validation(e.to_string()))?;
        let cutoff = now - timeout;

        let mut swept = 0;
        for stale in self.participants.list_active_seen_before(cutoff).await? {
            // A heartbeat that lands after the scan wins.
            let Updated {
                participant,
                outcome: timed_out,
                ..
            } = self
                .update(stale, |p| {
                    if p.status() != ParticipantStatus::Active || p.last_seen_at() >= cutoff {
                        return Ok(false);
                    }
                    Ok(p.disconnect(now)?)
                })
                .await?;
            if !timed_out {
                continue;
            }

            self.status_changed(
                &participant,
                ParticipantStatus::Active,
                ActivityKind::PresenceTimeout,
                Actor::System,
            )
            .await;
            swept += 1;
        }

        if swept > 0 {
            tracing::info!(swept, "Presence sweep disconnected participants");
        }
        Ok(swept)
    }

    // =========================================================================
    // Host actions
    // =========================================================================

    pub async fn list(&self, host: &HostViewer) -> Result<Vec<Participant>, PlayError> {
        Ok(self
            .participants
            .list_in_session(host.session().id())
            .await?)
    }

    /// Admit an `idle` participant in an approval-gated session.
    pub async fn approve(
        &self,
        host: &HostViewer,
        participant_id: ParticipantId,
    ) -> Result<Participant, PlayError> {
        let current = self.load(host, participant_id).await?;
        let now = self.clock.now();
        let Updated {
            previous,
            participant,
            ..
        } = self.update(current, |p| Ok(p.approve(now)?)).await?;

        self.status_changed(
            &participant,
            previous,
            ActivityKind::ParticipantApproved,
            host.actor(),
        )
        .await;
        Ok(participant)
    }

    /// Revoke access. The token stops working immediately and live
    /// subscriptions are closed.
    pub async fn kick(
        &self,
        host: &HostViewer,
        participant_id: ParticipantId,
    ) -> Result<Participant, PlayError> {
        let current = self.load(host, participant_id).await?;
        let now = self.clock.now();
        let Updated {
            previous,
            participant,
            outcome: kicked,
        } = self.update(current, |p| Ok(p.kick(now)?)).await?;
        if kicked {
            self.revoked(host, &participant, previous, ActivityKind::ParticipantKicked)
                .await;
        }
        Ok(participant)
    }

    pub async fn block(
        &self,
        host: &HostViewer,
        participant_id: ParticipantId,
    ) -> Result<Participant, PlayError> {
        let current = self.load(host, participant_id).await?;
        let now = self.clock.now();
        let Updated {
            previous,
            participant,
            outcome: blocked,
        } = self.update(current, |p| Ok(p.block(now))).await?;
        if blocked {
            self.revoked(host, &participant, previous, ActivityKind::ParticipantBlocked)
                .await;
        }
        Ok(participant)
    }

    /// Move the next-starter flag to `participant_id` in one scoped update.
    pub async fn set_next_starter(
        &self,
        host: &HostViewer,
        participant_id: ParticipantId,
    ) -> Result<Participant, PlayError> {
        let participant = self
            .participants
            .assign_next_starter(host.session().id(), participant_id)
            .await?
            .ok_or_else(|| PlayError::not_found("Participant", participant_id))?;

        self.progress_changed(host, &participant).await;
        Ok(participant)
    }

    /// Record a final placing. Only allowed once the session has ended.
    pub async fn set_position(
        &self,
        host: &HostViewer,
        participant_id: ParticipantId,
        position: Option<u32>,
    ) -> Result<Participant, PlayError> {
        let status = host.session().status();
        if status != SessionStatus::Ended {
            return Err(PlayError::InvalidTransition {
                from: status.to_string(),
                action: "set_position".into(),
            });
        }

        let current = self.load(host, participant_id).await?;
        let Updated { participant, .. } = self
            .update(current, |p| Ok(p.set_final_position(position)?))
            .await?;

        self.progress_changed(host, &participant).await;
        Ok(participant)
    }

    // =========================================================================
    // Role assignments
    // =========================================================================

    /// Give each listed participant a role, replacing the one they held.
    /// Every id is checked against the roster before the first write.
    pub async fn assign_roles(
        &self,
        host: &HostViewer,
        assignments: Vec<RoleAssignment>,
    ) -> Result<Vec<Participant>, PlayError> {
        if assignments.is_empty() {
            return Err(PlayError::validation("At least one assignment is required"));
        }
        let session = host.session();
        if session.status().is_terminal() {
            return Err(PlayError::SessionEnded);
        }

        let roster: HashMap<ParticipantId, Participant> = self
            .participants
            .list_in_session(session.id())
            .await?
            .into_iter()
            .map(|p| (p.id(), p))
            .collect();

        let mut unknown = Vec::new();
        for assignment in &assignments {
            match roster.get(&assignment.participant_id) {
                Some(participant) => {
                    participant.clone().assign_role(assignment.role.clone())?;
                }
                None => unknown.push(assignment.participant_id.to_string()),
            }
        }
        if !unknown.is_empty() {
            return Err(PlayError::validation(format!(
                "Unknown participants: {}",
                unknown.join(", ")
            )));
        }

        let mut assigned = Vec::with_capacity(assignments.len());
        for RoleAssignment {
            participant_id,
            role,
        } in assignments
        {
            let current = self.load(host, participant_id).await?;
            let previous_role = current.session_role().cloned();
            let Updated {
                participant,
                outcome: changed,
                ..
            } = self
                .update(current, |p| Ok(p.assign_role(role.clone())?))
                .await?;
            if changed {
                self.role_changed(
                    host,
                    &participant,
                    ActivityKind::RoleAssigned,
                    json!({
                        "participant_id": participant_id,
                        "role": role,
                        "previous_role": previous_role,
                    }),
                )
                .await;
            }
            assigned.push(participant);
        }

        tracing::info!(
            session_id = %session.id(),
            count = assigned.len(),
            "Roles assigned"
        );
        Ok(assigned)
    }

    /// Take `role` away from a participant. Holding a different role, or
    /// none, leaves the participant unchanged.
    pub async fn unassign_role(
        &self,
        host: &HostViewer,
        participant_id: ParticipantId,
        role: RoleName,
    ) -> Result<Participant, PlayError> {
        let current = self.load(host, participant_id).await?;
        let Updated {
            participant,
            outcome: removed,
            ..
        } = self
            .update(current, |p| Ok(p.unassign_role(&role)))
            .await?;
        if removed {
            self.role_changed(
                host,
                &participant,
                ActivityKind::RoleUnassigned,
                json!({ "participant_id": participant_id, "role": role }),
            )
            .await;
        }
        Ok(participant)
    }

    pub async fn list_assignments(
        &self,
        host: &HostViewer,
    ) -> Result<Vec<RoleAssignment>, PlayError> {
        Ok(self
            .participants
            .list_in_session(host.session().id())
            .await?
            .into_iter()
            .filter_map(|p| {
                p.session_role().cloned().map(|role| RoleAssignment {
                    participant_id: p.id(),
                    role,
                })
            })
            .collect())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// A participant of the host's session. Ids from other sessions are
    /// reported as missing.
    async fn load(
        &self,
        host: &HostViewer,
        participant_id: ParticipantId,
    ) -> Result<Participant, PlayError> {
        self.participants
            .get(participant_id)
            .await?
            .filter(|p| p.session_id() == host.session().id())
            .ok_or_else(|| PlayError::not_found("Participant", participant_id))
    }

    /// Apply `change` to `current` and write the result only if the stored
    /// row still equals `current`. After a lost race the row is re-read and
    /// `change` runs again on it, so every attempt is validated against the
    /// latest state.
    async fn update<T, F>(
        &self,
        mut current: Participant,
        mut change: F,
    ) -> Result<Updated<T>, PlayError>
    where
        F: FnMut(&mut Participant) -> Result<T, PlayError> + Send,
        T: Send,
    {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let mut next = current.clone();
            let outcome = change(&mut next)?;
            if self.participants.save_if_unchanged(&current, &next).await? {
                return Ok(Updated {
                    previous: current.status(),
                    participant: next,
                    outcome,
                });
            }
            current = self
                .participants
                .get(current.id())
                .await?
                .ok_or_else(|| PlayError::not_found("Participant", current.id()))?;
        }

        tracing::warn!(
            session_id = %current.session_id(),
            participant_id = %current.id(),
            "Participant write kept losing to concurrent updates"
        );
        Err(PlayError::WriteConflict("participant"))
    }

    async fn revoked(
        &self,
        host: &HostViewer,
        participant: &Participant,
        previous: ParticipantStatus,
        kind: ActivityKind,
    ) {
        tracing::info!(
            session_id = %participant.session_id(),
            participant_id = %participant.id(),
            status = %participant.status(),
            "Participant revoked"
        );
        self.status_changed(participant, previous, kind, host.actor())
            .await;
        self.broadcaster
            .disconnect_participant(
                participant.session_id(),
                participant.id(),
                participant.status().as_str(),
            )
            .await;
    }

    async fn status_changed(
        &self,
        participant: &Participant,
        previous: ParticipantStatus,
        kind: ActivityKind,
        actor: Actor,
    ) {
        let status = participant.status();
        self.activity
            .record(
                participant.session_id(),
                kind,
                actor,
                json!({
                    "participant_id": participant.id(),
                    "from": previous,
                    "to": status,
                }),
            )
            .await;
        if previous != status {
            self.broadcaster
                .publish(
                    participant.session_id(),
                    PlayEvent::ParticipantStatusChanged {
                        participant_id: participant.id(),
                        from: previous,
                        to: status,
                    },
                )
                .await;
        }
    }

    async fn role_changed(
        &self,
        host: &HostViewer,
        participant: &Participant,
        kind: ActivityKind,
        data: serde_json::Value,
    ) {
        self.activity
            .record(participant.session_id(), kind, host.actor(), data)
            .await;
        self.broadcaster
            .publish(
                participant.session_id(),
                PlayEvent::RoleChanged {
                    participant_id: participant.id(),
                },
            )
            .await;
    }

    async fn progress_changed(&self, host: &HostViewer, participant: &Participant) {
        self.activity
            .record(
                participant.session_id(),
                ActivityKind::ParticipantUpdated,
                host.actor(),
                json!({
                    "participant_id": participant.id(),
                    "progress": participant.progress(),
                }),
            )
            .await;
        self.broadcaster
            .publish(
                participant.session_id(),
                PlayEvent::ParticipantUpdated {
                    participant_id: participant.id(),
                    progress: participant.progress().clone(),
                },
            )
            .await;
    }
}
