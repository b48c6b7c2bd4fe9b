//! Connection management for WebSocket subscribers.
//!
//! Tracks live subscriptions per session topic and is the engine's
//! [`BroadcastPort`]: publishing hands the envelope to every subscriber's
//! bounded queue without waiting.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use liveplay_domain::{ParticipantId, SessionId};
use liveplay_shared::{channel_name, PlayEnvelope, ServerMessage};

use crate::infrastructure::ports::{BroadcastError, BroadcastPort};

/// Information about a live subscription.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    /// Unique ID for this connection
    pub connection_id: Uuid,
    pub session_id: SessionId,
    /// `play:<session id>`
    pub topic: String,
    /// `None` for host connections
    pub participant_id: Option<ParticipantId>,
}

impl ConnectionInfo {
    pub fn new(
        connection_id: Uuid,
        session_id: SessionId,
        participant_id: Option<ParticipantId>,
    ) -> Self {
        Self {
            connection_id,
            session_id,
            topic: channel_name(session_id),
            participant_id,
        }
    }
}

/// Manages all active WebSocket connections.
#[derive(Default)]
pub struct ConnectionManager {
    /// Map of connection_id -> (ConnectionInfo, sender channel)
    connections: RwLock<HashMap<Uuid, (ConnectionInfo, mpsc::Sender<ServerMessage>)>>,
}

impl ConnectionManager {
    /// Create a new connection manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection.
    pub async fn register(&self, info: ConnectionInfo, sender: mpsc::Sender<ServerMessage>) {
        let connection_id = info.connection_id;
        let topic = info.topic.clone();
        let mut connections = self.connections.write().await;
        connections.insert(connection_id, (info, sender));
        tracing::debug!(connection_id = %connection_id, topic = %topic, "Connection registered");
    }

    /// Unregister a connection.
    pub async fn unregister(&self, connection_id: Uuid) {
        let mut connections = self.connections.write().await;
        if connections.remove(&connection_id).is_some() {
            tracing::debug!(connection_id = %connection_id, "Connection unregistered");
        }
    }

    /// Number of live subscriptions on a topic.
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        let connections = self.connections.read().await;
        connections
            .values()
            .filter(|(info, _)| info.topic == topic)
            .count()
    }
}

#[async_trait]
impl BroadcastPort for ConnectionManager {
    async fn publish(&self, topic: &str, envelope: PlayEnvelope) -> Result<usize, BroadcastError> {
        let message = ServerMessage::Event { envelope };
        let connections = self.connections.read().await;
        let mut delivered = 0;
        for (info, sender) in connections.values() {
            if info.topic != topic {
                continue;
            }
            match sender.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        connection_id = %info.connection_id,
                        topic = %topic,
                        error = %e,
                        "Failed to broadcast message"
                    );
                }
            }
        }
        Ok(delivered)
    }

    async fn disconnect_participant(
        &self,
        topic: &str,
        participant_id: ParticipantId,
        reason: &str,
    ) -> Result<usize, BroadcastError> {
        let mut connections = self.connections.write().await;
        let doomed: Vec<Uuid> = connections
            .iter()
            .filter(|(_, (info, _))| {
                info.topic == topic && info.participant_id == Some(participant_id)
            })
            .map(|(id, _)| *id)
            .collect();

        for connection_id in &doomed {
            if let Some((_, sender)) = connections.remove(connection_id) {
                let closing = ServerMessage::Closing {
                    reason: reason.to_string(),
                };
                if sender.try_send(closing).is_err() {
                    tracing::debug!(
                        connection_id = %connection_id,
                        "Closing notice dropped, connection already gone"
                    );
                }
            }
        }

        if !doomed.is_empty() {
            tracing::info!(
                topic = %topic,
                participant_id = %participant_id,
                closed = doomed.len(),
                reason,
                "Closed participant connections"
            );
        }
        Ok(doomed.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn envelope() -> PlayEnvelope {
        PlayEnvelope::new("step_changed", serde_json::json!({ "step_index": 2 }), Utc::now())
    }

    async fn connect(
        manager: &ConnectionManager,
        session_id: SessionId,
        participant_id: Option<ParticipantId>,
        buffer: usize,
    ) -> (Uuid, mpsc::Receiver<ServerMessage>) {
        let connection_id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(buffer);
        manager
            .register(ConnectionInfo::new(connection_id, session_id, participant_id), tx)
            .await;
        (connection_id, rx)
    }

    #[tokio::test]
    async fn publish_reaches_only_the_topic() {
        let manager = ConnectionManager::new();
        let session = SessionId::new();
        let (_, mut host_rx) = connect(&manager, session, None, 8).await;
        let (_, mut player_rx) = connect(&manager, session, Some(ParticipantId::new()), 8).await;
        let (_, mut other_rx) = connect(&manager, SessionId::new(), None, 8).await;

        let delivered = manager
            .publish(&channel_name(session), envelope())
            .await
            .unwrap();

        assert_eq!(delivered, 2);
        assert!(matches!(host_rx.try_recv(), Ok(ServerMessage::Event { .. })));
        assert!(matches!(player_rx.try_recv(), Ok(ServerMessage::Event { .. })));
        assert!(other_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn full_queues_drop_instead_of_blocking() {
        let manager = ConnectionManager::new();
        let session = SessionId::new();
        let (_, _rx) = connect(&manager, session, None, 1).await;
        let topic = channel_name(session);

        assert_eq!(manager.publish(&topic, envelope()).await.unwrap(), 1);
        assert_eq!(manager.publish(&topic, envelope()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn disconnect_closes_only_that_participant() {
        let manager = ConnectionManager::new();
        let session = SessionId::new();
        let kicked = ParticipantId::new();
        let (_, mut kicked_rx) = connect(&manager, session, Some(kicked), 8).await;
        let (_, mut other_rx) = connect(&manager, session, Some(ParticipantId::new()), 8).await;
        let topic = channel_name(session);

        let closed = manager
            .disconnect_participant(&topic, kicked, "kicked")
            .await
            .unwrap();

        assert_eq!(closed, 1);
        assert_eq!(
            kicked_rx.try_recv().ok(),
            Some(ServerMessage::Closing {
                reason: "kicked".into()
            })
        );
        assert!(other_rx.try_recv().is_err());
        assert_eq!(manager.subscriber_count(&topic).await, 1);
    }
}
