//! Host-controlled reveals: artifact variants on the board and outcomes.

use std::sync::Arc;

use serde_json::json;

use liveplay_domain::{
    ActivityKind, ArtifactVariant, ArtifactVariantId, Outcome, OutcomeId, PlayEvent, RoleName,
    Title, VariantVisibility,
};

use crate::infrastructure::ports::{ArtifactRepo, ClockPort, OutcomeRepo};

use super::activity::ActivityLog;
use super::auth::{HostViewer, Viewer};
use super::broadcast::EventBroadcaster;
use super::error::PlayError;

#[derive(Debug, Clone, PartialEq)]
pub struct NewVariant {
    pub title: Title,
    pub body: Option<String>,
    pub media_ref: Option<serde_json::Value>,
    pub variant_order: u32,
    pub visibility: VariantVisibility,
    pub visible_to_role: Option<RoleName>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOutcome {
    pub title: Title,
    pub body: Option<String>,
    pub outcome_type: Option<String>,
}

pub struct Reveals {
    artifacts: Arc<dyn ArtifactRepo>,
    outcomes: Arc<dyn OutcomeRepo>,
    broadcaster: Arc<EventBroadcaster>,
    activity: Arc<ActivityLog>,
    clock: Arc<dyn ClockPort>,
}

impl Reveals {
    pub fn new(
        artifacts: Arc<dyn ArtifactRepo>,
        outcomes: Arc<dyn OutcomeRepo>,
        broadcaster: Arc<EventBroadcaster>,
        activity: Arc<ActivityLog>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            artifacts,
            outcomes,
            broadcaster,
            activity,
            clock,
        }
    }

    // =========================================================================
    // Artifact variants
    // =========================================================================

    pub async fn create_variant(
        &self,
        host: &HostViewer,
        input: NewVariant,
    ) -> Result<ArtifactVariant, PlayError> {
        let session = host.session();
        if session.status().is_terminal() {
            return Err(PlayError::SessionEnded);
        }

        let variant = ArtifactVariant::new(
            session.id(),
            input.title,
            input.body,
            input.media_ref,
            input.variant_order,
            input.visibility,
            input.visible_to_role,
            self.clock.now(),
        )?;
        self.artifacts.save(&variant).await?;

        tracing::info!(
            session_id = %session.id(),
            variant_id = %variant.id(),
            visibility = %variant.visibility(),
            "Artifact variant created"
        );
        self.variant_logged(host, &variant, "create").await;
        Ok(variant)
    }

    /// Hosts see every variant; participants see revealed public ones and
    /// those addressed to their assigned role.
    pub async fn list_variants(&self, viewer: &Viewer) -> Result<Vec<ArtifactVariant>, PlayError> {
        let variants = self.artifacts.list_in_session(viewer.session().id()).await?;
        match viewer {
            Viewer::Host(_) => Ok(variants),
            Viewer::Participant(pv) => {
                let role = pv.participant.session_role();
                Ok(variants
                    .into_iter()
                    .filter(|v| v.is_visible_to(role))
                    .collect())
            }
        }
    }

    pub async fn reveal_variant(
        &self,
        host: &HostViewer,
        variant_id: ArtifactVariantId,
    ) -> Result<ArtifactVariant, PlayError> {
        let mut variant = self.load_variant(host, variant_id).await?;
        if variant.reveal(self.clock.now()) {
            self.artifacts.save(&variant).await?;
            self.variant_logged(host, &variant, "reveal").await;
            self.variant_changed(&variant).await;
        }
        Ok(variant)
    }

    /// Hiding also drops the highlight.
    pub async fn hide_variant(
        &self,
        host: &HostViewer,
        variant_id: ArtifactVariantId,
    ) -> Result<ArtifactVariant, PlayError> {
        let mut variant = self.load_variant(host, variant_id).await?;
        if variant.hide() {
            self.artifacts.save(&variant).await?;
            self.variant_logged(host, &variant, "hide").await;
            self.variant_changed(&variant).await;
        }
        Ok(variant)
    }

    /// Make this the session's only highlighted variant.
    pub async fn highlight_variant(
        &self,
        host: &HostViewer,
        variant_id: ArtifactVariantId,
    ) -> Result<ArtifactVariant, PlayError> {
        let variant = self.load_variant(host, variant_id).await?;
        let now = self.clock.now();

        // Check eligibility before the store swaps highlights.
        let mut candidate = variant.clone();
        candidate.highlight(now)?;

        let changed = self
            .artifacts
            .set_highlight(host.session().id(), Some(variant_id), now)
            .await?;
        for updated in &changed {
            self.variant_changed(updated).await;
        }

        let highlighted = changed
            .into_iter()
            .find(|v| v.id() == variant_id)
            .unwrap_or(variant);
        self.variant_logged(host, &highlighted, "highlight").await;
        Ok(highlighted)
    }

    async fn load_variant(
        &self,
        host: &HostViewer,
        variant_id: ArtifactVariantId,
    ) -> Result<ArtifactVariant, PlayError> {
        self.artifacts
            .get(variant_id)
            .await?
            .filter(|v| v.session_id() == host.session().id())
            .ok_or_else(|| PlayError::not_found("ArtifactVariant", variant_id))
    }

    async fn variant_logged(&self, host: &HostViewer, variant: &ArtifactVariant, action: &str) {
        self.activity
            .record(
                variant.session_id(),
                ActivityKind::ArtifactChanged,
                host.actor(),
                json!({ "variant_id": variant.id(), "action": action }),
            )
            .await;
    }

    async fn variant_changed(&self, variant: &ArtifactVariant) {
        self.broadcaster
            .publish(
                variant.session_id(),
                PlayEvent::ArtifactUpdated {
                    variant_id: variant.id(),
                    revealed: variant.is_revealed(),
                    highlighted: variant.highlighted_at().is_some(),
                },
            )
            .await;
    }

    // =========================================================================
    // Outcomes
    // =========================================================================

    pub async fn create_outcome(
        &self,
        host: &HostViewer,
        input: NewOutcome,
    ) -> Result<Outcome, PlayError> {
        let outcome = Outcome::new(
            host.session().id(),
            input.title,
            input.body,
            input.outcome_type,
            self.clock.now(),
        )?;
        self.outcomes.save(&outcome).await?;

        tracing::info!(
            session_id = %outcome.session_id(),
            outcome_id = %outcome.id(),
            "Outcome created"
        );
        self.outcome_logged(host, &outcome, "create").await;
        Ok(outcome)
    }

    /// Participants only see revealed outcomes.
    pub async fn list_outcomes(&self, viewer: &Viewer) -> Result<Vec<Outcome>, PlayError> {
        let outcomes = self.outcomes.list_in_session(viewer.session().id()).await?;
        if viewer.is_host() {
            return Ok(outcomes);
        }
        Ok(outcomes.into_iter().filter(Outcome::is_revealed).collect())
    }

    pub async fn reveal_outcome(
        &self,
        host: &HostViewer,
        outcome_id: OutcomeId,
    ) -> Result<Outcome, PlayError> {
        let mut outcome = self
            .outcomes
            .get(outcome_id)
            .await?
            .filter(|o| o.session_id() == host.session().id())
            .ok_or_else(|| PlayError::not_found("Outcome", outcome_id))?;

        if outcome.reveal(self.clock.now()) {
            self.outcomes.save(&outcome).await?;
            self.outcome_logged(host, &outcome, "reveal").await;
            self.broadcaster
                .publish(
                    outcome.session_id(),
                    PlayEvent::OutcomeRevealed { outcome_id },
                )
                .await;
        }
        Ok(outcome)
    }

    async fn outcome_logged(&self, host: &HostViewer, outcome: &Outcome, action: &str) {
        self.activity
            .record(
                outcome.session_id(),
                ActivityKind::OutcomeChanged,
                host.actor(),
                json!({ "outcome_id": outcome.id(), "action": action }),
            )
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::TestApp;
    use crate::use_cases::participants::RoleAssignment;
    use liveplay_domain::PlaySession;

    fn variant(title: &str, order: u32, visibility: VariantVisibility) -> NewVariant {
        NewVariant {
            title: Title::new(title).unwrap(),
            body: Some("Meet at dawn".into()),
            media_ref: None,
            variant_order: order,
            visibility,
            visible_to_role: None,
        }
    }

    async fn revealed(app: &TestApp, session: &PlaySession, title: &str) -> ArtifactVariant {
        let reveals = &app.use_cases.reveals;
        let created = reveals
            .create_variant(
                &app.host(session.id()).await,
                variant(title, 0, VariantVisibility::Public),
            )
            .await
            .unwrap();
        reveals
            .reveal_variant(&app.host(session.id()).await, created.id())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn participants_only_see_revealed_public_variants() {
        let app = TestApp::new();
        let session = app.live_session().await;
        let reveals = &app.use_cases.reveals;

        revealed(&app, &session, "Letter").await;
        let leader = reveals
            .create_variant(
                &app.host(session.id()).await,
                variant("Secret", 1, VariantVisibility::LeaderOnly),
            )
            .await
            .unwrap();
        reveals
            .reveal_variant(&app.host(session.id()).await, leader.id())
            .await
            .unwrap();
        reveals
            .create_variant(
                &app.host(session.id()).await,
                variant("Map", 2, VariantVisibility::Public),
            )
            .await
            .unwrap();

        let ada = app.join(&session, "Ada").await;
        let seen = reveals
            .list_variants(&Viewer::Participant(app.participant(session.id(), &ada).await))
            .await
            .unwrap();
        let titles: Vec<&str> = seen.iter().map(|v| v.title().as_str()).collect();
        assert_eq!(titles, vec!["Letter"]);

        let all = reveals
            .list_variants(&Viewer::Host(app.host(session.id()).await))
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn role_private_variants_reach_their_role_unrevealed() {
        let app = TestApp::new();
        let session = app.live_session().await;
        let reveals = &app.use_cases.reveals;
        let detective = RoleName::new("Detective").unwrap();

        reveals
            .create_variant(
                &app.host(session.id()).await,
                NewVariant {
                    visible_to_role: Some(detective.clone()),
                    ..variant("Case file", 0, VariantVisibility::RolePrivate)
                },
            )
            .await
            .unwrap();

        let ada = app.join(&session, "Ada").await;
        let bob = app.join(&session, "Bob").await;
        app.use_cases
            .participants
            .assign_roles(
                &app.host(session.id()).await,
                vec![RoleAssignment {
                    participant_id: ada.id(),
                    role: detective,
                }],
            )
            .await
            .unwrap();

        let titles = |seen: Vec<ArtifactVariant>| {
            seen.iter()
                .map(|v| v.title().as_str().to_owned())
                .collect::<Vec<_>>()
        };
        let for_ada = reveals
            .list_variants(&Viewer::Participant(app.participant(session.id(), &ada).await))
            .await
            .unwrap();
        assert_eq!(titles(for_ada), vec!["Case file"]);

        let for_bob = reveals
            .list_variants(&Viewer::Participant(app.participant(session.id(), &bob).await))
            .await
            .unwrap();
        assert!(for_bob.is_empty());
    }

    #[tokio::test]
    async fn only_one_variant_is_highlighted() {
        let app = TestApp::new();
        let session = app.live_session().await;
        let reveals = &app.use_cases.reveals;
        let first = revealed(&app, &session, "Letter").await;
        let second = revealed(&app, &session, "Map").await;

        reveals
            .highlight_variant(&app.host(session.id()).await, first.id())
            .await
            .unwrap();
        let now_highlighted = reveals
            .highlight_variant(&app.host(session.id()).await, second.id())
            .await
            .unwrap();
        assert!(now_highlighted.highlighted_at().is_some());

        let highlighted: Vec<ArtifactVariantId> = reveals
            .list_variants(&Viewer::Host(app.host(session.id()).await))
            .await
            .unwrap()
            .iter()
            .filter(|v| v.highlighted_at().is_some())
            .map(|v| v.id())
            .collect();
        assert_eq!(highlighted, vec![second.id()]);
    }

    #[tokio::test]
    async fn hidden_variants_cannot_be_highlighted() {
        let app = TestApp::new();
        let session = app.live_session().await;
        let reveals = &app.use_cases.reveals;
        let letter = revealed(&app, &session, "Letter").await;

        let hidden = reveals
            .hide_variant(&app.host(session.id()).await, letter.id())
            .await
            .unwrap();
        assert!(!hidden.is_revealed());

        let err = reveals
            .highlight_variant(&app.host(session.id()).await, letter.id())
            .await
            .unwrap_err();
        assert!(matches!(err, PlayError::Validation(_)));
    }

    #[tokio::test]
    async fn outcomes_stay_hidden_until_revealed() {
        let app = TestApp::new();
        let session = app.live_session().await;
        let reveals = &app.use_cases.reveals;
        let ada = app.join(&session, "Ada").await;

        let outcome = reveals
            .create_outcome(
                &app.host(session.id()).await,
                NewOutcome {
                    title: Title::new("The butler did it").unwrap(),
                    body: None,
                    outcome_type: Some("ending".into()),
                },
            )
            .await
            .unwrap();

        let viewer = Viewer::Participant(app.participant(session.id(), &ada).await);
        assert!(reveals.list_outcomes(&viewer).await.unwrap().is_empty());

        reveals
            .reveal_outcome(&app.host(session.id()).await, outcome.id())
            .await
            .unwrap();
        assert_eq!(reveals.list_outcomes(&viewer).await.unwrap().len(), 1);
        assert!(app
            .broadcasts()
            .iter()
            .any(|(_, e)| e.event_type == "outcome_revealed"));
    }
}
