//! Host-run votes: authoring, the open/close/reveal lifecycle, ballots and
//! tallies.

use std::sync::Arc;

use serde_json::json;

use liveplay_domain::{
    ActivityKind, Actor, Ballot, Decision, DecisionAction, DecisionId, DecisionOption,
    DecisionPatch, DecisionStatus, ParticipantStatus, PlayEvent, SessionId, Tally, Title,
};

use crate::infrastructure::ports::{ClockPort, DecisionRepo};

use super::activity::ActivityLog;
use super::auth::{HostViewer, ParticipantViewer, Viewer};
use super::broadcast::EventBroadcaster;
use super::error::PlayError;

#[derive(Debug, Clone, PartialEq)]
pub struct NewDecision {
    pub title: Title,
    pub prompt: Option<String>,
    pub options: Vec<DecisionOption>,
    pub allow_anonymous: bool,
    pub max_choices: u32,
}

/// Outcome of a stored ballot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteReceipt {
    pub decision_id: DecisionId,
    pub option_keys: Vec<String>,
    pub replaced: bool,
}

pub struct DecisionEngine {
    repo: Arc<dyn DecisionRepo>,
    broadcaster: Arc<EventBroadcaster>,
    activity: Arc<ActivityLog>,
    clock: Arc<dyn ClockPort>,
    allow_revote: bool,
}

impl DecisionEngine {
    pub fn new(
        repo: Arc<dyn DecisionRepo>,
        broadcaster: Arc<EventBroadcaster>,
        activity: Arc<ActivityLog>,
        clock: Arc<dyn ClockPort>,
        allow_revote: bool,
    ) -> Self {
        Self {
            repo,
            broadcaster,
            activity,
            clock,
            allow_revote,
        }
    }

    pub async fn create(
        &self,
        host: &HostViewer,
        input: NewDecision,
    ) -> Result<Decision, PlayError> {
        let session = host.session();
        if session.status().is_terminal() {
            return Err(PlayError::SessionEnded);
        }
        if input.allow_anonymous {
            self.ensure_anonymous_allowed(host)?;
        }

        let decision = Decision::new(
            session.id(),
            input.title,
            input.prompt,
            input.options,
            input.allow_anonymous,
            input.max_choices,
            self.clock.now(),
        )?;
        self.repo.save(&decision).await?;

        tracing::info!(
            session_id = %session.id(),
            decision_id = %decision.id(),
            options = decision.options().len(),
            "Decision created"
        );
        self.changed(host, &decision, "create").await;
        Ok(decision)
    }

    /// Apply a field edit, then a status action. Both are checked before
    /// anything is written.
    pub async fn update(
        &self,
        host: &HostViewer,
        decision_id: DecisionId,
        patch: DecisionPatch,
        action: Option<DecisionAction>,
    ) -> Result<Decision, PlayError> {
        let mut decision = self.load(host.session().id(), decision_id).await?;
        let now = self.clock.now();

        if patch != DecisionPatch::default() {
            if patch.allow_anonymous == Some(true) {
                self.ensure_anonymous_allowed(host)?;
            }
            let has_votes = patch.options.is_some() && self.repo.has_votes(decision_id).await?;
            decision.update(patch, has_votes, now)?;
        }
        if let Some(action) = action {
            let previous = decision.apply(action, now)?;
            tracing::info!(
                decision_id = %decision_id,
                action = %action,
                from = %previous,
                to = %decision.status(),
                "Decision status changed"
            );
        }
        self.repo.save(&decision).await?;

        let label = action.map_or("update", DecisionAction::as_str);
        self.changed(host, &decision, label).await;
        Ok(decision)
    }

    /// `open`, `close` or `reveal`.
    pub async fn transition(
        &self,
        host: &HostViewer,
        decision_id: DecisionId,
        action: DecisionAction,
    ) -> Result<Decision, PlayError> {
        self.update(host, decision_id, DecisionPatch::default(), Some(action))
            .await
    }

    /// Creation order. Drafts are only listed for the host.
    pub async fn list(&self, viewer: &Viewer) -> Result<Vec<Decision>, PlayError> {
        let decisions = self.repo.list_in_session(viewer.session().id()).await?;
        if viewer.is_host() {
            return Ok(decisions);
        }
        Ok(decisions
            .into_iter()
            .filter(|d| d.status() != DecisionStatus::Draft)
            .collect())
    }

    /// Store a participant's ballot while the decision is open.
    pub async fn vote(
        &self,
        viewer: &ParticipantViewer,
        decision_id: DecisionId,
        option_keys: Vec<String>,
    ) -> Result<VoteReceipt, PlayError> {
        if viewer.participant.status() == ParticipantStatus::Idle {
            return Err(PlayError::AwaitingApproval);
        }
        if viewer.session.status().is_terminal() {
            return Err(PlayError::SessionEnded);
        }

        let decision = self.load(viewer.session.id(), decision_id).await?;
        let option_keys = decision.validate_ballot(&option_keys)?;
        let anonymous = decision.allow_anonymous();
        let ballot = Ballot {
            decision_id,
            voter_id: viewer.participant.id(),
            anonymous,
            option_keys,
            created_at: self.clock.now(),
        };

        let replaced = match self.repo.cast_ballot(&ballot, self.allow_revote).await {
            Ok(replaced) => replaced,
            Err(e) if e.is_constraint() => return Err(PlayError::AlreadyVoted),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(
            decision_id = %decision_id,
            choices = ballot.option_keys.len(),
            replaced,
            "Vote cast"
        );
        let actor = if anonymous {
            Actor::System
        } else {
            viewer.actor()
        };
        self.activity
            .record(
                viewer.session.id(),
                ActivityKind::VoteCast,
                actor,
                json!({ "decision_id": decision_id, "replaced": replaced }),
            )
            .await;
        self.broadcaster
            .publish(viewer.session.id(), PlayEvent::VoteCast { decision_id })
            .await;

        Ok(VoteReceipt {
            decision_id,
            option_keys: ballot.option_keys,
            replaced,
        })
    }

    /// Per-option counts, every key present. Only after reveal.
    pub async fn tally(&self, viewer: &Viewer, decision_id: DecisionId) -> Result<Tally, PlayError> {
        let decision = self.load(viewer.session().id(), decision_id).await?;
        if !decision.is_revealed() {
            return Err(PlayError::NotRevealed);
        }
        let votes = self.repo.list_votes(decision_id).await?;
        decision.tally(&votes).ok_or(PlayError::NotRevealed)
    }

    fn ensure_anonymous_allowed(&self, host: &HostViewer) -> Result<(), PlayError> {
        if host.session().settings().allow_anonymous {
            Ok(())
        } else {
            Err(PlayError::validation(
                "Anonymous decisions are disabled for this session",
            ))
        }
    }

    async fn load(
        &self,
        session_id: SessionId,
        decision_id: DecisionId,
    ) -> Result<Decision, PlayError> {
        self.repo
            .get(decision_id)
            .await?
            .filter(|d| d.session_id() == session_id)
            .ok_or_else(|| PlayError::not_found("Decision", decision_id))
    }

    async fn changed(&self, host: &HostViewer, decision: &Decision, action: &str) {
        self.activity
            .record(
                decision.session_id(),
                ActivityKind::DecisionChanged,
                host.actor(),
                json!({
                    "decision_id": decision.id(),
                    "action": action,
                    "status": decision.status(),
                }),
            )
            .await;
        self.broadcaster
            .publish(
                decision.session_id(),
                PlayEvent::DecisionUpdated {
                    decision_id: decision.id(),
                    status: decision.status(),
                },
            )
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::RuntimeSettings;
    use crate::test_fixtures::TestApp;
    use liveplay_domain::{Participant, PlaySession, SessionAction, SessionSettings};

    fn options(keys: &[&str]) -> Vec<DecisionOption> {
        keys.iter()
            .map(|k| DecisionOption::new(*k, k.to_uppercase()))
            .collect()
    }

    fn new_decision(keys: &[&str]) -> NewDecision {
        NewDecision {
            title: Title::new("Which door?").unwrap(),
            prompt: None,
            options: options(keys),
            allow_anonymous: false,
            max_choices: 1,
        }
    }

    async fn open_decision(app: &TestApp, session: &PlaySession, keys: &[&str]) -> Decision {
        let engine = &app.use_cases.decisions;
        let decision = engine
            .create(&app.host(session.id()).await, new_decision(keys))
            .await
            .unwrap();
        engine
            .transition(&app.host(session.id()).await, decision.id(), DecisionAction::Open)
            .await
            .unwrap()
    }

    async fn vote(
        app: &TestApp,
        session: &PlaySession,
        voter: &Participant,
        decision: &Decision,
        keys: &[&str],
    ) -> Result<VoteReceipt, PlayError> {
        let viewer = app.participant(session.id(), voter).await;
        app.use_cases
            .decisions
            .vote(
                &viewer,
                decision.id(),
                keys.iter().map(|k| k.to_string()).collect(),
            )
            .await
    }

    #[tokio::test]
    async fn revealed_tally_counts_every_option() {
        let app = TestApp::new();
        let session = app.live_session().await;
        let decision = open_decision(&app, &session, &["a", "b", "c"]).await;

        for (name, key) in [("Ada", "a"), ("Bob", "a"), ("Cy", "b")] {
            let voter = app.join(&session, name).await;
            vote(&app, &session, &voter, &decision, &[key]).await.unwrap();
        }

        let host = Viewer::Host(app.host(session.id()).await);
        let err = app
            .use_cases
            .decisions
            .tally(&host, decision.id())
            .await
            .unwrap_err();
        assert!(matches!(err, PlayError::NotRevealed));

        app.use_cases
            .decisions
            .transition(&app.host(session.id()).await, decision.id(), DecisionAction::Reveal)
            .await
            .unwrap();
        let tally = app
            .use_cases
            .decisions
            .tally(&host, decision.id())
            .await
            .unwrap();
        assert_eq!(tally.count_for("a"), Some(2));
        assert_eq!(tally.count_for("b"), Some(1));
        assert_eq!(tally.count_for("c"), Some(0));
        assert_eq!(tally.total_voters, 3);
    }

    #[tokio::test]
    async fn second_ballot_is_rejected_unless_revote_enabled() {
        let app = TestApp::new();
        let session = app.live_session().await;
        let decision = open_decision(&app, &session, &["a", "b"]).await;
        let voter = app.join(&session, "Ada").await;

        vote(&app, &session, &voter, &decision, &["a"]).await.unwrap();
        let err = vote(&app, &session, &voter, &decision, &["b"])
            .await
            .unwrap_err();
        assert!(matches!(err, PlayError::AlreadyVoted));

        let app = TestApp::with_settings(RuntimeSettings {
            allow_revote: true,
            ..RuntimeSettings::default()
        });
        let session = app.live_session().await;
        let decision = open_decision(&app, &session, &["a", "b"]).await;
        let voter = app.join(&session, "Ada").await;

        vote(&app, &session, &voter, &decision, &["a"]).await.unwrap();
        let receipt = vote(&app, &session, &voter, &decision, &["b"]).await.unwrap();
        assert!(receipt.replaced);
    }

    #[tokio::test]
    async fn ballots_are_validated() {
        let app = TestApp::new();
        let session = app.live_session().await;
        let decision = open_decision(&app, &session, &["a", "b"]).await;
        let voter = app.join(&session, "Ada").await;

        for keys in [&[][..], &["z"][..], &["a", "b"][..], &["a", "a"][..]] {
            let err = vote(&app, &session, &voter, &decision, keys)
                .await
                .unwrap_err();
            assert!(matches!(err, PlayError::Validation(_)), "keys {keys:?}");
        }
    }

    #[tokio::test]
    async fn idle_participants_cannot_vote() {
        let app = TestApp::new();
        let session = app
            .lobby_session(SessionSettings {
                require_approval: true,
                ..SessionSettings::default()
            })
            .await;
        let voter = app.join(&session, "Ada").await;
        let session = app.act(&session, SessionAction::Start).await;
        let decision = open_decision(&app, &session, &["a", "b"]).await;

        let err = vote(&app, &session, &voter, &decision, &["a"])
            .await
            .unwrap_err();
        assert!(matches!(err, PlayError::AwaitingApproval));
    }

    #[tokio::test]
    async fn transitions_follow_the_strict_table() {
        let app = TestApp::new();
        let session = app.live_session().await;
        let engine = &app.use_cases.decisions;
        let decision = engine
            .create(&app.host(session.id()).await, new_decision(&["a", "b"]))
            .await
            .unwrap();
        assert_eq!(decision.status(), DecisionStatus::Draft);

        let err = engine
            .transition(&app.host(session.id()).await, decision.id(), DecisionAction::Close)
            .await
            .unwrap_err();
        assert!(matches!(err, PlayError::InvalidTransition { .. }));

        let err = engine
            .transition(&app.host(session.id()).await, decision.id(), DecisionAction::Reveal)
            .await
            .unwrap_err();
        assert!(matches!(err, PlayError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn options_freeze_after_the_first_vote() {
        let app = TestApp::new();
        let session = app.live_session().await;
        let decision = open_decision(&app, &session, &["a", "b"]).await;
        let voter = app.join(&session, "Ada").await;
        vote(&app, &session, &voter, &decision, &["a"]).await.unwrap();

        let err = app
            .use_cases
            .decisions
            .update(
                &app.host(session.id()).await,
                decision.id(),
                DecisionPatch {
                    options: Some(options(&["a", "b", "c"])),
                    ..DecisionPatch::default()
                },
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PlayError::Validation(_)));

        let renamed = app
            .use_cases
            .decisions
            .update(
                &app.host(session.id()).await,
                decision.id(),
                DecisionPatch {
                    title: Some(Title::new("Which window?").unwrap()),
                    ..DecisionPatch::default()
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!(renamed.title().as_str(), "Which window?");
    }

    #[tokio::test]
    async fn participants_do_not_see_drafts() {
        let app = TestApp::new();
        let session = app.live_session().await;
        app.use_cases
            .decisions
            .create(&app.host(session.id()).await, new_decision(&["a", "b"]))
            .await
            .unwrap();
        open_decision(&app, &session, &["x", "y"]).await;
        let voter = app.join(&session, "Ada").await;

        let as_host = app
            .use_cases
            .decisions
            .list(&Viewer::Host(app.host(session.id()).await))
            .await
            .unwrap();
        let as_participant = app
            .use_cases
            .decisions
            .list(&Viewer::Participant(app.participant(session.id(), &voter).await))
            .await
            .unwrap();
        assert_eq!(as_host.len(), 2);
        assert_eq!(as_participant.len(), 1);
    }

    #[tokio::test]
    async fn anonymous_decisions_respect_session_settings() {
        let app = TestApp::new();
        let session = app
            .lobby_session(SessionSettings {
                allow_anonymous: false,
                ..SessionSettings::default()
            })
            .await;

        let err = app
            .use_cases
            .decisions
            .create(
                &app.host(session.id()).await,
                NewDecision {
                    allow_anonymous: true,
                    ..new_decision(&["a", "b"])
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PlayError::Validation(_)));
    }
}
