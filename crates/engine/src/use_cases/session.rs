//! Session lifecycle and runtime controls.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use liveplay_domain::{
    ActivityId, ActivityKind, Actor, BoardState, PlayEvent, PlaySession, SessionAction,
    SessionCode, SessionSettings, SessionStatus, TimerCommand, Title, UserId,
};

use crate::infrastructure::ports::{
    ClockPort, GamificationPort, ParticipantRepo, RandomPort, RepoError, SessionCompleted,
    SessionRepo,
};

use super::activity::ActivityLog;
use super::auth::{HostViewer, Viewer};
use super::broadcast::EventBroadcaster;
use super::error::PlayError;

/// Join code allocation gives up after this many collisions.
const MAX_CODE_ATTEMPTS: usize = 5;

/// Write attempts before a contended session row is reported as a conflict.
const MAX_WRITE_ATTEMPTS: usize = 3;

pub struct SessionStore {
    sessions: Arc<dyn SessionRepo>,
    participants: Arc<dyn ParticipantRepo>,
    gamification: Arc<dyn GamificationPort>,
    broadcaster: Arc<EventBroadcaster>,
    activity: Arc<ActivityLog>,
    clock: Arc<dyn ClockPort>,
    random: Arc<dyn RandomPort>,
    gamification_timeout: Duration,
}

impl SessionStore {
    pub fn new(
        sessions: Arc<dyn SessionRepo>,
        participants: Arc<dyn ParticipantRepo>,
        gamification: Arc<dyn GamificationPort>,
        broadcaster: Arc<EventBroadcaster>,
        activity: Arc<ActivityLog>,
        clock: Arc<dyn ClockPort>,
        random: Arc<dyn RandomPort>,
        gamification_timeout: Duration,
    ) -> Self {
        Self {
            sessions,
            participants,
            gamification,
            broadcaster,
            activity,
            clock,
            random,
            gamification_timeout,
        }
    }

    /// Create a `draft` session with a fresh join code.
    pub async fn create(
        &self,
        host_id: UserId,
        name: &str,
        activity_id: Option<ActivityId>,
        settings: Option<SessionSettings>,
    ) -> Result<PlaySession, PlayError> {
        let name = Title::new(name)?;
        let settings = settings.unwrap_or_default();
        settings.validate()?;
        let now = self.clock.now();

        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let code = SessionCode::generate(|n| self.random.gen_index(n));
            let session = PlaySession::new(
                code,
                host_id.clone(),
                name.clone(),
                activity_id,
                settings.clone(),
                now,
            );

            match self.sessions.insert(&session).await {
                Ok(()) => {
                    tracing::info!(
                        session_id = %session.id(),
                        code = %session.code(),
                        host_id = %host_id.as_str(),
                        "Session created"
                    );
                    self.activity
                        .record(
                            session.id(),
                            ActivityKind::SessionCreated,
                            Actor::host(host_id),
                            json!({ "code": session.code().as_str(), "name": session.name().as_str() }),
                        )
                        .await;
                    return Ok(session);
                }
                Err(e) if e.is_constraint() => {
                    tracing::debug!(attempt, code = %session.code(), "Session code taken, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(RepoError::constraint("could not allocate a unique session code").into())
    }

    pub fn get(&self, viewer: &Viewer) -> PlaySession {
        viewer.session().clone()
    }

    /// Newest first.
    pub async fn list_for_host(&self, host_id: &UserId) -> Result<Vec<PlaySession>, PlayError> {
        Ok(self.sessions.list_for_host(host_id).await?)
    }

    /// Drive the state machine. Ending a session notifies gamification.
    pub async fn apply_action(
        &self,
        host: &HostViewer,
        action: SessionAction,
    ) -> Result<PlaySession, PlayError> {
        let now = self.clock.now();
        let (session, previous) = self
            .update(host, |s| Ok(s.apply(action, now)?))
            .await?;

        let status = session.status();
        tracing::info!(
            session_id = %session.id(),
            action = %action,
            from = %previous,
            to = %status,
            "Session status changed"
        );
        self.activity
            .record(
                session.id(),
                ActivityKind::SessionStatusChanged,
                host.actor(),
                json!({ "action": action, "from": previous, "to": status }),
            )
            .await;
        self.broadcaster
            .publish(
                session.id(),
                PlayEvent::SessionStatusChanged {
                    session_id: session.id(),
                    action,
                    from: previous,
                    to: status,
                },
            )
            .await;

        if status == SessionStatus::Ended {
            self.notify_completed(&session).await;
        }
        Ok(session)
    }

    pub async fn set_step(&self, host: &HostViewer, index: u32) -> Result<PlaySession, PlayError> {
        let now = self.clock.now();
        let (session, ()) = self
            .update(host, |s| Ok(s.set_step(index, now)?))
            .await?;

        self.runtime_updated(host, json!({ "step_index": index }))
            .await;
        self.broadcaster
            .publish(session.id(), PlayEvent::StepChanged { step_index: index })
            .await;
        Ok(session)
    }

    pub async fn set_phase(&self, host: &HostViewer, index: u32) -> Result<PlaySession, PlayError> {
        let now = self.clock.now();
        let (session, ()) = self
            .update(host, |s| Ok(s.set_phase(index, now)?))
            .await?;

        self.runtime_updated(host, json!({ "phase_index": index }))
            .await;
        self.broadcaster
            .publish(session.id(), PlayEvent::PhaseChanged { phase_index: index })
            .await;
        Ok(session)
    }

    pub async fn set_board(
        &self,
        host: &HostViewer,
        message: Option<String>,
        overrides: BTreeMap<String, bool>,
    ) -> Result<PlaySession, PlayError> {
        let board = BoardState::new(message, overrides)?;
        let now = self.clock.now();
        let (session, ()) = self
            .update(host, |s| Ok(s.set_board(board.clone(), now)?))
            .await?;

        self.runtime_updated(host, json!({ "board": &board })).await;
        self.broadcaster
            .publish(session.id(), PlayEvent::BoardUpdated { board })
            .await;
        Ok(session)
    }

    /// Pause and resume are idempotent; a no-op command is not broadcast.
    pub async fn timer(
        &self,
        host: &HostViewer,
        command: TimerCommand,
    ) -> Result<PlaySession, PlayError> {
        let now = self.clock.now();
        let (session, changed) = self
            .update(host, |s| Ok(s.apply_timer(command, now)?))
            .await?;
        if !changed {
            return Ok(session);
        }

        self.runtime_updated(host, json!({ "timer": command })).await;
        self.broadcaster
            .publish(
                session.id(),
                PlayEvent::TimerChanged {
                    timer: session.timer().cloned(),
                },
            )
            .await;
        Ok(session)
    }

    /// Apply `change` to the host's view of the session and write the result
    /// only if the stored row still matches it. After a lost race the row is
    /// re-read and `change` runs again, so a stale caller is judged by the
    /// session's current state.
    async fn update<T, F>(
        &self,
        host: &HostViewer,
        mut change: F,
    ) -> Result<(PlaySession, T), PlayError>
    where
        F: FnMut(&mut PlaySession) -> Result<T, PlayError> + Send,
        T: Send,
    {
        let mut current = host.session().clone();
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let mut next = current.clone();
            let outcome = change(&mut next)?;
            if self.sessions.save_if_unchanged(&current, &next).await? {
                return Ok((next, outcome));
            }
            current = self
                .sessions
                .get(current.id())
                .await?
                .ok_or_else(|| PlayError::not_found("Session", current.id()))?;
        }

        tracing::warn!(session_id = %current.id(), "Session write kept losing to concurrent updates");
        Err(PlayError::WriteConflict("session"))
    }

    async fn runtime_updated(&self, host: &HostViewer, data: serde_json::Value) {
        tracing::debug!(session_id = %host.session().id(), change = %data, "Session runtime updated");
        self.activity
            .record(
                host.session().id(),
                ActivityKind::RuntimeUpdated,
                host.actor(),
                data,
            )
            .await;
    }

    async fn notify_completed(&self, session: &PlaySession) {
        let participant_count = match self.participants.list_in_session(session.id()).await {
            Ok(participants) => participants.len() as u32,
            Err(e) => {
                tracing::warn!(session_id = %session.id(), error = %e, "Could not count participants");
                0
            }
        };
        let event = SessionCompleted {
            session_id: session.id(),
            host_id: session.host_id().clone(),
            activity_id: session.activity_id(),
            participant_count,
            started_at: session.started_at(),
            ended_at: session.ended_at().unwrap_or_else(|| self.clock.now()),
        };

        match tokio::time::timeout(
            self.gamification_timeout,
            self.gamification.session_completed(&event),
        )
        .await
        {
            Ok(Ok(())) => {
                tracing::info!(session_id = %session.id(), "Session completion reported");
            }
            Ok(Err(e)) => {
                tracing::warn!(session_id = %session.id(), error = %e, "Session completion report failed");
            }
            Err(_) => {
                tracing::warn!(session_id = %session.id(), "Session completion report timed out");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ports::{GamificationError, MockGamificationPort};
    use crate::test_fixtures::TestApp;
    use liveplay_shared::PlayEnvelope;

    #[tokio::test]
    async fn create_starts_in_draft_with_unique_code() {
        let app = TestApp::new();
        let a = app.create_session().await;
        let b = app.create_session().await;

        assert_eq!(a.status(), SessionStatus::Draft);
        assert_eq!(a.code().as_str().len(), 6);
        assert_ne!(a.code(), b.code());
    }

    #[tokio::test]
    async fn create_rejects_blank_name() {
        let app = TestApp::new();
        let result = app
            .use_cases
            .sessions
            .create(UserId::new("host-1").unwrap(), "   ", None, None)
            .await;
        assert!(matches!(result, Err(PlayError::Validation(_))));
    }

    #[tokio::test]
    async fn lifecycle_follows_transition_table() {
        let app = TestApp::new();
        let session = app.create_session().await;
        let store = &app.use_cases.sessions;

        let s = store
            .apply_action(&app.host(session.id()).await, SessionAction::Publish)
            .await
            .unwrap();
        assert_eq!(s.status(), SessionStatus::Lobby);

        let err = store
            .apply_action(&app.host(session.id()).await, SessionAction::Pause)
            .await
            .unwrap_err();
        assert!(matches!(err, PlayError::InvalidTransition { .. }));

        let started = store
            .apply_action(&app.host(session.id()).await, SessionAction::Start)
            .await
            .unwrap();
        let first_start = started.started_at();
        store
            .apply_action(&app.host(session.id()).await, SessionAction::Pause)
            .await
            .unwrap();
        app.clock.advance(chrono::Duration::seconds(30));
        let resumed = store
            .apply_action(&app.host(session.id()).await, SessionAction::Start)
            .await
            .unwrap();
        assert_eq!(resumed.status(), SessionStatus::Active);
        assert_eq!(resumed.started_at(), first_start);

        let types: Vec<String> = app
            .broadcasts()
            .into_iter()
            .map(|(_, e): (String, PlayEnvelope)| e.event_type)
            .collect();
        assert_eq!(types.len(), 4);
        assert!(types.iter().all(|t| t == "session_status_changed"));
    }

    #[tokio::test]
    async fn runtime_edits_rejected_after_end() {
        let app = TestApp::new();
        let session = app.live_session().await;
        app.use_cases
            .sessions
            .apply_action(&app.host(session.id()).await, SessionAction::End)
            .await
            .unwrap();

        let err = app
            .use_cases
            .sessions
            .set_step(&app.host(session.id()).await, 2)
            .await
            .unwrap_err();
        assert!(matches!(err, PlayError::InvalidTransition { .. }));
    }

    /// A host tab still holding the pre-end session keeps editing.
    async fn ended_session_stays_ended_for_stale_hosts(app: TestApp) {
        let session = app.live_session().await;
        let store = &app.use_cases.sessions;
        let stale = app.host(session.id()).await;
        app.act(&session, SessionAction::End).await;
        app.clear_broadcasts();

        let err = store.set_step(&stale, 3).await.unwrap_err();
        assert!(matches!(err, PlayError::InvalidTransition { .. }));
        let err = store.set_phase(&stale, 1).await.unwrap_err();
        assert!(matches!(err, PlayError::InvalidTransition { .. }));
        let err = store
            .set_board(&stale, Some("Back again".into()), BTreeMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PlayError::InvalidTransition { .. }));
        let err = store
            .timer(
                &stale,
                TimerCommand::Start {
                    duration_seconds: 60,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PlayError::InvalidTransition { .. }));
        let err = store
            .apply_action(&stale, SessionAction::Pause)
            .await
            .unwrap_err();
        assert!(matches!(err, PlayError::InvalidTransition { .. }));

        let stored = app.host(session.id()).await;
        assert_eq!(stored.session().status(), SessionStatus::Ended);
        assert_eq!(stored.session().current_step_index(), 0);
        assert!(app.broadcasts().is_empty());
    }

    #[tokio::test]
    async fn ended_session_stays_ended_in_memory() {
        ended_session_stays_ended_for_stale_hosts(TestApp::new()).await;
    }

    #[tokio::test]
    async fn ended_session_stays_ended_in_sqlite() {
        ended_session_stays_ended_for_stale_hosts(TestApp::with_sqlite().await).await;
    }

    /// Two tabs resolved against the same `active` session both pause.
    async fn racing_actions_are_validated_against_the_latest_status(app: TestApp) {
        let session = app.live_session().await;
        let store = &app.use_cases.sessions;
        let first = app.host(session.id()).await;
        let second = app.host(session.id()).await;
        app.clear_broadcasts();

        let paused = store
            .apply_action(&first, SessionAction::Pause)
            .await
            .unwrap();
        assert_eq!(paused.status(), SessionStatus::Paused);

        let err = store
            .apply_action(&second, SessionAction::Pause)
            .await
            .unwrap_err();
        assert!(matches!(err, PlayError::InvalidTransition { .. }));

        let ended = store
            .apply_action(&second, SessionAction::End)
            .await
            .unwrap();
        assert_eq!(ended.status(), SessionStatus::Ended);
        assert_eq!(app.broadcasts().len(), 2);
    }

    #[tokio::test]
    async fn racing_actions_in_memory() {
        racing_actions_are_validated_against_the_latest_status(TestApp::new()).await;
    }

    #[tokio::test]
    async fn racing_actions_in_sqlite() {
        racing_actions_are_validated_against_the_latest_status(TestApp::with_sqlite().await)
            .await;
    }

    #[tokio::test]
    async fn timer_pause_is_idempotent_and_broadcast_once() {
        let app = TestApp::new();
        let session = app.live_session().await;
        let store = &app.use_cases.sessions;
        app.clear_broadcasts();

        store
            .timer(
                &app.host(session.id()).await,
                TimerCommand::Start {
                    duration_seconds: 300,
                },
            )
            .await
            .unwrap();
        store
            .timer(&app.host(session.id()).await, TimerCommand::Pause)
            .await
            .unwrap();
        let again = store
            .timer(&app.host(session.id()).await, TimerCommand::Pause)
            .await
            .unwrap();

        assert!(again.timer().unwrap().is_paused());
        assert_eq!(app.broadcasts().len(), 2);
    }

    #[tokio::test]
    async fn ending_notifies_gamification_even_when_it_fails() {
        let mut gamification = MockGamificationPort::new();
        gamification
            .expect_session_completed()
            .times(1)
            .returning(|_| Err(GamificationError::Rejected(503)));

        let app = TestApp::with_gamification(Arc::new(gamification));
        let session = app.live_session().await;
        let ended = app
            .use_cases
            .sessions
            .apply_action(&app.host(session.id()).await, SessionAction::End)
            .await
            .unwrap();

        assert_eq!(ended.status(), SessionStatus::Ended);
        assert!(ended.ended_at().is_some());
    }
}
