//! Who caused a change - recorded on ledger and activity entries.

use serde::{Deserialize, Serialize};

use crate::ids::ParticipantId;
use crate::value_objects::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Actor {
    Host { user_id: UserId },
    Participant { participant_id: ParticipantId },
    /// Background jobs (presence sweep) and unauthenticated attempts.
    System,
}

impl Actor {
    pub fn host(user_id: UserId) -> Self {
        Self::Host { user_id }
    }

    pub fn participant(participant_id: ParticipantId) -> Self {
        Self::Participant { participant_id }
    }
}
