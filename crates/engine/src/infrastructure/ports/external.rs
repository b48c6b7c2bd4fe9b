//! External collaborator ports: activity content, gamification, fan-out.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use liveplay_domain::{ActivityId, ParticipantId, SessionId, UserId};
use liveplay_shared::PlayEnvelope;

use super::error::{BroadcastError, ContentError, GamificationError};

// =============================================================================
// Content
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseContent {
    pub name: String,
}

/// Authoring-side data the board needs: title, board configuration, phases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityContent {
    pub title: String,
    #[serde(default)]
    pub board_config: serde_json::Value,
    #[serde(default)]
    pub phases: Vec<PhaseContent>,
}

impl ActivityContent {
    pub fn phase_name(&self, index: u32) -> Option<&str> {
        self.phases.get(index as usize).map(|p| p.name.as_str())
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentPort: Send + Sync {
    async fn get_activity(&self, id: ActivityId) -> Result<Option<ActivityContent>, ContentError>;
}

// =============================================================================
// Gamification
// =============================================================================

/// Sent once when a session reaches `ended`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCompleted {
    pub session_id: SessionId,
    pub host_id: UserId,
    pub activity_id: Option<ActivityId>,
    pub participant_count: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: DateTime<Utc>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GamificationPort: Send + Sync {
    async fn session_completed(&self, event: &SessionCompleted) -> Result<(), GamificationError>;
}

// =============================================================================
// Broadcast
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BroadcastPort: Send + Sync {
    /// Publish to every subscriber of `topic`. Returns the number of
    /// subscribers the envelope was handed to.
    async fn publish(&self, topic: &str, envelope: PlayEnvelope) -> Result<usize, BroadcastError>;

    /// Drop every live subscription `participant_id` holds on `topic`.
    /// Returns how many were closed.
    async fn disconnect_participant(
        &self,
        topic: &str,
        participant_id: ParticipantId,
        reason: &str,
    ) -> Result<usize, BroadcastError>;
}
