//! Participant-safe board snapshot.
//!
//! The snapshot is what clients re-fetch after a missed broadcast, so it is
//! assembled from the stores on every read and never cached.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use liveplay_domain::{
    ActivityId, ArtifactVariant, BoardState, Outcome, SessionId, SessionStatus, Tally, TimerState,
};

use crate::infrastructure::ports::{
    ActivityContent, ArtifactRepo, ClockPort, ContentPort, DecisionRepo, OutcomeRepo,
};

use super::auth::Viewer;
use super::error::PlayError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardSnapshot {
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub title: String,
    pub board_config: serde_json::Value,
    pub current_step_index: u32,
    pub current_phase_index: u32,
    pub current_phase_name: Option<String>,
    pub timer: Option<TimerState>,
    pub timer_remaining_seconds: Option<i64>,
    pub board: BoardState,
    pub artifacts: Vec<ArtifactVariant>,
    pub highlighted_variant: Option<ArtifactVariant>,
    pub decisions: Vec<Tally>,
    pub outcomes: Vec<Outcome>,
    pub generated_at: DateTime<Utc>,
}

pub struct BoardAggregator {
    content: Arc<dyn ContentPort>,
    artifacts: Arc<dyn ArtifactRepo>,
    decisions: Arc<dyn DecisionRepo>,
    outcomes: Arc<dyn OutcomeRepo>,
    clock: Arc<dyn ClockPort>,
}

impl BoardAggregator {
    pub fn new(
        content: Arc<dyn ContentPort>,
        artifacts: Arc<dyn ArtifactRepo>,
        decisions: Arc<dyn DecisionRepo>,
        outcomes: Arc<dyn OutcomeRepo>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            content,
            artifacts,
            decisions,
            outcomes,
            clock,
        }
    }

    /// Build the public board. Hosts get the same view participants do.
    pub async fn snapshot(&self, viewer: &Viewer) -> Result<BoardSnapshot, PlayError> {
        let session = viewer.session();
        if !session.status().is_live() {
            return Err(PlayError::SessionNotActive(session.status()));
        }
        let now = self.clock.now();

        let content = self.content_for(session.id(), session.activity_id()).await;
        let title = content
            .as_ref()
            .map(|c| c.title.clone())
            .unwrap_or_else(|| session.name().as_str().to_string());
        let current_phase_name = content
            .as_ref()
            .and_then(|c| c.phase_name(session.current_phase_index()))
            .map(str::to_string);
        let board_config = content
            .map(|c| c.board_config)
            .unwrap_or(serde_json::Value::Null);

        let artifacts: Vec<ArtifactVariant> = self
            .artifacts
            .list_in_session(session.id())
            .await?
            .into_iter()
            .filter(ArtifactVariant::is_board_visible)
            .collect();
        let highlighted_variant = artifacts
            .iter()
            .find(|v| v.highlighted_at().is_some())
            .cloned();

        let mut decisions = Vec::new();
        for decision in self.decisions.list_in_session(session.id()).await? {
            if !decision.is_revealed() {
                continue;
            }
            let votes = self.decisions.list_votes(decision.id()).await?;
            decisions.extend(decision.tally(&votes));
        }

        let outcomes = self
            .outcomes
            .list_in_session(session.id())
            .await?
            .into_iter()
            .filter(Outcome::is_revealed)
            .collect();

        Ok(BoardSnapshot {
            session_id: session.id(),
            status: session.status(),
            title,
            board_config,
            current_step_index: session.current_step_index(),
            current_phase_index: session.current_phase_index(),
            current_phase_name,
            timer: session.timer().cloned(),
            timer_remaining_seconds: session.timer().map(|t| t.remaining_seconds(now)),
            board: session.board().clone(),
            artifacts,
            highlighted_variant,
            decisions,
            outcomes,
            generated_at: now,
        })
    }

    async fn content_for(
        &self,
        session_id: SessionId,
        activity_id: Option<ActivityId>,
    ) -> Option<ActivityContent> {
        let activity_id = activity_id?;
        match self.content.get_activity(activity_id).await {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(
                    session_id = %session_id,
                    activity_id = %activity_id,
                    error = %e,
                    "Activity content unavailable, using session name"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::content::StaticContentProvider;
    use crate::infrastructure::ports::{ContentError, MockContentPort, PhaseContent};
    use crate::test_fixtures::TestApp;
    use crate::use_cases::decisions::NewDecision;
    use crate::use_cases::reveals::{NewOutcome, NewVariant};
    use liveplay_domain::{DecisionAction, DecisionOption, SessionAction, Title, VariantVisibility};
    use serde_json::json;
    use uuid::Uuid;

    fn activity() -> ActivityId {
        ActivityId::from_uuid(Uuid::from_u128(42))
    }

    #[tokio::test]
    async fn unavailable_outside_active_or_paused() {
        let app = TestApp::new();
        let session = app.create_session().await;
        let host = Viewer::Host(app.host(session.id()).await);

        let err = app.use_cases.board.snapshot(&host).await.unwrap_err();
        assert!(matches!(
            err,
            PlayError::SessionNotActive(SessionStatus::Draft)
        ));

        let session = app.act(&session, SessionAction::Publish).await;
        let session = app.act(&session, SessionAction::Start).await;
        let session = app.act(&session, SessionAction::Pause).await;
        let host = Viewer::Host(app.host(session.id()).await);
        assert!(app.use_cases.board.snapshot(&host).await.is_ok());
    }

    #[tokio::test]
    async fn only_revealed_content_reaches_the_board() {
        let app = TestApp::new();
        let session = app.live_session().await;
        let host = app.host(session.id()).await;
        let reveals = &app.use_cases.reveals;
        let decisions = &app.use_cases.decisions;

        let public = reveals
            .create_variant(
                &host,
                NewVariant {
                    title: Title::new("Letter").unwrap(),
                    body: None,
                    media_ref: None,
                    variant_order: 0,
                    visibility: VariantVisibility::Public,
                    visible_to_role: None,
                },
            )
            .await
            .unwrap();
        reveals.reveal_variant(&host, public.id()).await.unwrap();
        reveals.highlight_variant(&host, public.id()).await.unwrap();
        let secret = reveals
            .create_variant(
                &host,
                NewVariant {
                    title: Title::new("Secret").unwrap(),
                    body: None,
                    media_ref: None,
                    variant_order: 1,
                    visibility: VariantVisibility::LeaderOnly,
                    visible_to_role: None,
                },
            )
            .await
            .unwrap();
        reveals.reveal_variant(&host, secret.id()).await.unwrap();

        let open = decisions
            .create(
                &host,
                NewDecision {
                    title: Title::new("Which door?").unwrap(),
                    prompt: None,
                    options: vec![DecisionOption::new("a", "Left"), DecisionOption::new("b", "Right")],
                    allow_anonymous: false,
                    max_choices: 1,
                },
            )
            .await
            .unwrap();
        decisions
            .transition(&host, open.id(), DecisionAction::Open)
            .await
            .unwrap();
        let shown = decisions
            .create(
                &host,
                NewDecision {
                    title: Title::new("Who leads?").unwrap(),
                    prompt: None,
                    options: vec![DecisionOption::new("x", "Ada"), DecisionOption::new("y", "Bo")],
                    allow_anonymous: false,
                    max_choices: 1,
                },
            )
            .await
            .unwrap();
        for action in [DecisionAction::Open, DecisionAction::Close, DecisionAction::Reveal] {
            decisions.transition(&host, shown.id(), action).await.unwrap();
        }

        reveals
            .create_outcome(
                &host,
                NewOutcome {
                    title: Title::new("Hidden ending").unwrap(),
                    body: None,
                    outcome_type: None,
                },
            )
            .await
            .unwrap();

        let ada = app.join(&session, "Ada").await;
        let viewer = Viewer::Participant(app.participant(session.id(), &ada).await);
        let snapshot = app.use_cases.board.snapshot(&viewer).await.unwrap();

        assert_eq!(snapshot.artifacts.len(), 1);
        assert_eq!(snapshot.artifacts[0].id(), public.id());
        assert_eq!(
            snapshot.highlighted_variant.as_ref().map(|v| v.id()),
            Some(public.id())
        );
        assert_eq!(snapshot.decisions.len(), 1);
        assert_eq!(snapshot.decisions[0].decision_id, shown.id());
        assert_eq!(snapshot.decisions[0].count_for("x"), Some(0));
        assert!(snapshot.outcomes.is_empty());
        assert_eq!(snapshot.title, "Friday Mystery");
        assert_eq!(snapshot.board_config, serde_json::Value::Null);
    }

    #[tokio::test]
    async fn content_supplies_title_and_phase_name() {
        let content = StaticContentProvider::empty().with_activity(
            activity(),
            ActivityContent {
                title: "Escape Room".into(),
                board_config: json!({ "theme": "dark" }),
                phases: vec![
                    PhaseContent { name: "Intro".into() },
                    PhaseContent { name: "Puzzle".into() },
                ],
            },
        );
        let app = TestApp::with_content(Arc::new(content));
        let session = app.live_session_for(Some(activity())).await;
        let host = app.host(session.id()).await;
        app.use_cases.sessions.set_phase(&host, 1).await.unwrap();

        let host = Viewer::Host(app.host(session.id()).await);
        let snapshot = app.use_cases.board.snapshot(&host).await.unwrap();
        assert_eq!(snapshot.title, "Escape Room");
        assert_eq!(snapshot.current_phase_name.as_deref(), Some("Puzzle"));
        assert_eq!(snapshot.board_config["theme"], "dark");
    }

    #[tokio::test]
    async fn content_failure_degrades_to_session_name() {
        let mut content = MockContentPort::new();
        content
            .expect_get_activity()
            .returning(|_| Err(ContentError::RequestFailed("connection refused".into())));

        let app = TestApp::with_content(Arc::new(content));
        let session = app.live_session_for(Some(activity())).await;
        let host = Viewer::Host(app.host(session.id()).await);

        let snapshot = app.use_cases.board.snapshot(&host).await.unwrap();
        assert_eq!(snapshot.title, "Friday Mystery");
        assert_eq!(snapshot.current_phase_name, None);
        assert_eq!(snapshot.board_config, serde_json::Value::Null);
    }
}
