//! Best-effort, time-boxed fan-out of session events.

use std::sync::Arc;
use std::time::Duration;

use liveplay_domain::{ParticipantId, PlayEvent, SessionId};
use liveplay_shared::{channel_name, PlayEnvelope};

use crate::infrastructure::ports::{BroadcastPort, ClockPort};

pub struct EventBroadcaster {
    port: Arc<dyn BroadcastPort>,
    clock: Arc<dyn ClockPort>,
    timeout: Duration,
}

impl EventBroadcaster {
    pub fn new(port: Arc<dyn BroadcastPort>, clock: Arc<dyn ClockPort>, timeout: Duration) -> Self {
        Self {
            port,
            clock,
            timeout,
        }
    }

    /// Publish `event` on the session's topic. Never fails: encoding errors,
    /// channel errors and timeouts are logged and dropped.
    pub async fn publish(&self, session_id: SessionId, event: PlayEvent) {
        let (event_type, payload) = match event.into_parts() {
            Ok(parts) => parts,
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "Failed to encode play event");
                return;
            }
        };
        let envelope = PlayEnvelope::new(event_type, payload, self.clock.now());
        let topic = channel_name(session_id);

        match tokio::time::timeout(self.timeout, self.port.publish(&topic, envelope)).await {
            Ok(Ok(delivered)) => {
                tracing::debug!(topic = %topic, event_type, delivered, "Broadcast event");
            }
            Ok(Err(e)) => {
                tracing::warn!(topic = %topic, event_type, error = %e, "Broadcast failed");
            }
            Err(_) => {
                tracing::warn!(
                    topic = %topic,
                    event_type,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Broadcast timed out"
                );
            }
        }
    }

    /// Close a revoked participant's live subscriptions. Best-effort like
    /// [`Self::publish`].
    pub async fn disconnect_participant(
        &self,
        session_id: SessionId,
        participant_id: ParticipantId,
        reason: &str,
    ) {
        let topic = channel_name(session_id);
        match tokio::time::timeout(
            self.timeout,
            self.port.disconnect_participant(&topic, participant_id, reason),
        )
        .await
        {
            Ok(Ok(closed)) => {
                tracing::debug!(
                    topic = %topic,
                    participant_id = %participant_id,
                    closed,
                    "Closed participant subscriptions"
                );
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    topic = %topic,
                    participant_id = %participant_id,
                    error = %e,
                    "Failed to close participant subscriptions"
                );
            }
            Err(_) => {
                tracing::warn!(
                    topic = %topic,
                    participant_id = %participant_id,
                    "Closing participant subscriptions timed out"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::FixedClock;
    use crate::infrastructure::ports::{BroadcastError, MockBroadcastPort};
    use chrono::Utc;

    #[tokio::test]
    async fn publishes_envelope_on_session_topic() {
        let session_id = SessionId::new();
        let expected_topic = format!("play:{session_id}");

        let mut port = MockBroadcastPort::new();
        port.expect_publish()
            .withf(move |topic, envelope| {
                topic == expected_topic
                    && envelope.event_type == "step_changed"
                    && envelope.payload["step_index"] == 3
            })
            .times(1)
            .returning(|_, _| Ok(2));

        let broadcaster = EventBroadcaster::new(
            Arc::new(port),
            Arc::new(FixedClock(Utc::now())),
            Duration::from_millis(250),
        );
        broadcaster
            .publish(session_id, PlayEvent::StepChanged { step_index: 3 })
            .await;
    }

    #[tokio::test]
    async fn channel_errors_are_swallowed() {
        let mut port = MockBroadcastPort::new();
        port.expect_publish()
            .returning(|_, _| Err(BroadcastError::Unavailable("down".into())));

        let broadcaster = EventBroadcaster::new(
            Arc::new(port),
            Arc::new(FixedClock(Utc::now())),
            Duration::from_millis(250),
        );
        broadcaster
            .publish(SessionId::new(), PlayEvent::PhaseChanged { phase_index: 1 })
            .await;
    }
}
