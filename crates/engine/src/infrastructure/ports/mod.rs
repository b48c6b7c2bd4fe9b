//! Port traits for infrastructure boundaries.
//!
//! These are the ONLY abstractions in the engine. Everything else is concrete types.
//! Ports exist for:
//! - Session runtime storage (in-memory or SQLite)
//! - Activity content (HTTP catalogue or static file)
//! - Gamification notifications
//! - Event fan-out to connected clients
//! - Clock/Random (for testing)

mod error;
mod external;
mod repos;
mod testing;

// =============================================================================
// Repository Ports
// =============================================================================
pub use repos::{
    ActivityLogRepo, ArtifactRepo, DecisionRepo, OutcomeRepo, ParticipantRepo, Repositories,
    SessionRepo, TimeBankRepo,
};

// =============================================================================
// Errors
// =============================================================================
pub use error::{BroadcastError, ContentError, GamificationError, RepoError};

// =============================================================================
// External Service Ports
// =============================================================================
pub use external::{
    ActivityContent, BroadcastPort, ContentPort, GamificationPort, PhaseContent, SessionCompleted,
};

// =============================================================================
// Test-Only Mocks (only available during test builds)
// =============================================================================
#[cfg(test)]
pub use repos::{
    MockActivityLogRepo, MockArtifactRepo, MockDecisionRepo, MockOutcomeRepo,
    MockParticipantRepo, MockSessionRepo, MockTimeBankRepo,
};

#[cfg(test)]
pub use external::{MockBroadcastPort, MockContentPort, MockGamificationPort};

#[cfg(test)]
pub use testing::MockClockPort;

// =============================================================================
// Testing Ports
// =============================================================================
pub use testing::{ClockPort, RandomPort};
