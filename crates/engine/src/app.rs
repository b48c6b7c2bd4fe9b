//! Application state and composition.

use std::sync::Arc;

use crate::infrastructure::{
    config::RuntimeSettings,
    ports::{BroadcastPort, ClockPort, ContentPort, GamificationPort, RandomPort, Repositories},
};
use crate::use_cases;

/// Main application state.
///
/// Holds the storage ports and use cases.
/// Passed to HTTP/WebSocket handlers via Axum state.
pub struct App {
    pub repositories: Repositories,
    pub use_cases: UseCases,
    pub settings: RuntimeSettings,
}

/// Container for all use cases.
pub struct UseCases {
    pub auth: Arc<use_cases::AuthResolver>,
    pub broadcaster: Arc<use_cases::EventBroadcaster>,
    pub activity: Arc<use_cases::ActivityLog>,
    pub sessions: use_cases::SessionStore,
    pub participants: use_cases::ParticipantRegistry,
    pub time_bank: use_cases::TimeBankLedger,
    pub decisions: use_cases::DecisionEngine,
    pub reveals: use_cases::Reveals,
    pub board: use_cases::BoardAggregator,
}

/// External collaborators the use cases talk to.
pub struct Collaborators {
    pub content: Arc<dyn ContentPort>,
    pub gamification: Arc<dyn GamificationPort>,
    pub broadcast: Arc<dyn BroadcastPort>,
    pub clock: Arc<dyn ClockPort>,
    pub random: Arc<dyn RandomPort>,
}

impl App {
    /// Create a new App with all dependencies wired up.
    pub fn new(repos: Repositories, external: Collaborators, settings: RuntimeSettings) -> Self {
        let Collaborators {
            content,
            gamification,
            broadcast,
            clock,
            random,
        } = external;

        // Shared services
        let broadcaster = Arc::new(use_cases::EventBroadcaster::new(
            broadcast,
            clock.clone(),
            settings.broadcast_timeout,
        ));
        let activity = Arc::new(use_cases::ActivityLog::new(
            repos.activity.clone(),
            clock.clone(),
        ));
        let auth = Arc::new(use_cases::AuthResolver::new(
            repos.sessions.clone(),
            repos.participants.clone(),
            clock.clone(),
        ));

        let sessions = use_cases::SessionStore::new(
            repos.sessions.clone(),
            repos.participants.clone(),
            gamification,
            broadcaster.clone(),
            activity.clone(),
            clock.clone(),
            random.clone(),
            settings.gamification_timeout,
        );
        let participants = use_cases::ParticipantRegistry::new(
            repos.sessions.clone(),
            repos.participants.clone(),
            auth.clone(),
            broadcaster.clone(),
            activity.clone(),
            clock.clone(),
            random,
            settings.presence_timeout,
        );
        let time_bank = use_cases::TimeBankLedger::new(
            repos.time_bank.clone(),
            broadcaster.clone(),
            activity.clone(),
            clock.clone(),
            settings.max_delta_seconds,
        );
        let decisions = use_cases::DecisionEngine::new(
            repos.decisions.clone(),
            broadcaster.clone(),
            activity.clone(),
            clock.clone(),
            settings.allow_revote,
        );
        let reveals = use_cases::Reveals::new(
            repos.artifacts.clone(),
            repos.outcomes.clone(),
            broadcaster.clone(),
            activity.clone(),
            clock.clone(),
        );
        let board = use_cases::BoardAggregator::new(
            content,
            repos.artifacts.clone(),
            repos.decisions.clone(),
            repos.outcomes.clone(),
            clock,
        );

        let use_cases = UseCases {
            auth,
            broadcaster,
            activity,
            sessions,
            participants,
            time_bank,
            decisions,
            reveals,
            board,
        };

        Self {
            repositories: repos,
            use_cases,
            settings,
        }
    }
}
