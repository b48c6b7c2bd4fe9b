//! Recording broadcast port for testing.

use std::sync::Mutex;

use async_trait::async_trait;
use liveplay_domain::ParticipantId;
use liveplay_shared::PlayEnvelope;

use crate::infrastructure::ports::{BroadcastError, BroadcastPort};

/// Keeps every published envelope and every closed participant.
#[derive(Default)]
pub struct RecordingBroadcast {
    published: Mutex<Vec<(String, PlayEnvelope)>>,
    closed: Mutex<Vec<ParticipantId>>,
}

impl RecordingBroadcast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<(String, PlayEnvelope)> {
        self.published.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.published.lock().unwrap().clear();
    }

    pub fn closed(&self) -> Vec<ParticipantId> {
        self.closed.lock().unwrap().clone()
    }
}

#[async_trait]
impl BroadcastPort for RecordingBroadcast {
    async fn publish(&self, topic: &str, envelope: PlayEnvelope) -> Result<usize, BroadcastError> {
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), envelope));
        Ok(1)
    }

    async fn disconnect_participant(
        &self,
        _topic: &str,
        participant_id: ParticipantId,
        _reason: &str,
    ) -> Result<usize, BroadcastError> {
        self.closed.lock().unwrap().push(participant_id);
        Ok(1)
    }
}
