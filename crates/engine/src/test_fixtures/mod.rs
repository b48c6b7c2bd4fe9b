//! Shared test harness: an [`App`] over in-memory stores (or a throwaway
//! SQLite file) with a settable clock and a recording broadcast port.
//!
//! # Usage
//!
//! ```rust,ignore
//! let app = TestApp::new();
//! let session = app.live_session().await;
//! let ada = app.join(&session, "Ada").await;
//! ```

pub mod broadcast_mocks;

use std::ops::Deref;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use liveplay_domain::{
    ActivityId, Participant, ParticipantId, PlaySession, SessionAction, SessionId,
    SessionSettings, UserId,
};
use liveplay_shared::PlayEnvelope;

use crate::app::{App, Collaborators};
use crate::infrastructure::clock::{ManualClock, SequenceRandom};
use crate::infrastructure::config::RuntimeSettings;
use crate::infrastructure::content::StaticContentProvider;
use crate::infrastructure::gamification::LoggingGamificationSink;
use crate::infrastructure::ports::{ContentPort, GamificationPort, Repositories};
use crate::infrastructure::{memory, sqlite};
use crate::use_cases::{Credentials, HostViewer, ParticipantViewer};

pub use broadcast_mocks::RecordingBroadcast;

/// User id of the host that owns every fixture session.
pub const HOST: &str = "host-1";

/// Session name used by the fixture helpers.
pub const SESSION_NAME: &str = "Friday Mystery";

pub struct TestApp {
    app: Arc<App>,
    pub clock: Arc<ManualClock>,
    broadcast: Arc<RecordingBroadcast>,
    _db: Option<TempDir>,
}

impl Deref for TestApp {
    type Target = App;

    fn deref(&self) -> &App {
        &self.app
    }
}

struct Overrides {
    repos: Option<Repositories>,
    content: Arc<dyn ContentPort>,
    gamification: Arc<dyn GamificationPort>,
    settings: RuntimeSettings,
}

impl Default for Overrides {
    fn default() -> Self {
        Self {
            repos: None,
            content: Arc::new(StaticContentProvider::empty()),
            gamification: Arc::new(LoggingGamificationSink),
            settings: RuntimeSettings::default(),
        }
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(Overrides::default())
    }

    pub fn with_gamification(gamification: Arc<dyn GamificationPort>) -> Self {
        Self::build(Overrides {
            gamification,
            ..Overrides::default()
        })
    }

    pub fn with_content(content: Arc<dyn ContentPort>) -> Self {
        Self::build(Overrides {
            content,
            ..Overrides::default()
        })
    }

    pub fn with_settings(settings: RuntimeSettings) -> Self {
        Self::build(Overrides {
            settings,
            ..Overrides::default()
        })
    }

    /// Same harness over the SQLite store in a temporary directory.
    pub async fn with_sqlite() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let repos = sqlite::connect(&dir.path().join("liveplay.db"))
            .await
            .unwrap();
        let mut app = Self::build(Overrides {
            repos: Some(repos),
            ..Overrides::default()
        });
        app._db = Some(dir);
        app
    }

    fn build(overrides: Overrides) -> Self {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 19, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let broadcast = Arc::new(RecordingBroadcast::new());

        let app = App::new(
            overrides.repos.unwrap_or_else(memory::repositories),
            Collaborators {
                content: overrides.content,
                gamification: overrides.gamification,
                broadcast: broadcast.clone(),
                clock: clock.clone(),
                random: Arc::new(SequenceRandom::new()),
            },
            overrides.settings,
        );

        Self {
            app: Arc::new(app),
            clock,
            broadcast,
            _db: None,
        }
    }

    /// The composed app, for router tests.
    pub fn shared(&self) -> Arc<App> {
        self.app.clone()
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// A `draft` session owned by [`HOST`].
    pub async fn create_session(&self) -> PlaySession {
        self.create(None, None).await
    }

    /// A published session accepting joins.
    pub async fn lobby_session(&self, settings: SessionSettings) -> PlaySession {
        let session = self.create(None, Some(settings)).await;
        self.act(&session, SessionAction::Publish).await
    }

    /// A started session with default settings.
    pub async fn live_session(&self) -> PlaySession {
        self.live_session_for(None).await
    }

    pub async fn live_session_for(&self, activity_id: Option<ActivityId>) -> PlaySession {
        let session = self.create(activity_id, None).await;
        let session = self.act(&session, SessionAction::Publish).await;
        self.act(&session, SessionAction::Start).await
    }

    pub async fn act(&self, session: &PlaySession, action: SessionAction) -> PlaySession {
        self.use_cases
            .sessions
            .apply_action(&self.host(session.id()).await, action)
            .await
            .unwrap()
    }

    async fn create(
        &self,
        activity_id: Option<ActivityId>,
        settings: Option<SessionSettings>,
    ) -> PlaySession {
        self.use_cases
            .sessions
            .create(
                UserId::new(HOST).unwrap(),
                SESSION_NAME,
                activity_id,
                settings,
            )
            .await
            .unwrap()
    }

    // =========================================================================
    // Callers
    // =========================================================================

    /// Resolve [`HOST`] against the session's current state.
    pub async fn host(&self, session_id: SessionId) -> HostViewer {
        self.use_cases
            .auth
            .resolve_host(session_id, &Credentials::host(HOST))
            .await
            .unwrap()
    }

    pub async fn participant(
        &self,
        session_id: SessionId,
        participant: &Participant,
    ) -> ParticipantViewer {
        self.use_cases
            .auth
            .resolve_participant(
                session_id,
                &Credentials::participant(participant.token().expose()),
            )
            .await
            .unwrap()
    }

    pub async fn join(&self, session: &PlaySession, name: &str) -> Participant {
        let (participant, _) = self
            .use_cases
            .participants
            .join(session.code().as_str(), name, None)
            .await
            .unwrap();
        participant
    }

    // =========================================================================
    // Broadcasts
    // =========================================================================

    pub fn broadcasts(&self) -> Vec<(String, PlayEnvelope)> {
        self.broadcast.published()
    }

    pub fn clear_broadcasts(&self) {
        self.broadcast.clear();
    }

    /// Participants whose live connections were closed.
    pub fn closed(&self) -> Vec<ParticipantId> {
        self.broadcast.closed()
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}
