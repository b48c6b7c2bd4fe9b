//! WebSocket message types for session subscriptions
//!
//! The socket is a read-mostly channel: the server forwards broadcast
//! envelopes for one session, the client only sends liveness messages.
//!
//! ## Versioning Policy
//!
//! - New variants can be added at the end (forward compatible)
//! - Unknown variants deserialize to `Unknown`

use serde::{Deserialize, Serialize};

use liveplay_domain::{ParticipantId, SessionId};

use crate::envelope::PlayEnvelope;

/// Messages from a subscriber to the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Participant presence heartbeat (refreshes `last_seen_at`)
    Heartbeat,
    /// Transport-level keepalive
    Ping,
    #[serde(other)]
    Unknown,
}

/// Messages from the engine to a subscriber
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once after the subscription is accepted
    Welcome {
        session_id: SessionId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        participant_id: Option<ParticipantId>,
    },
    /// A broadcast event for the subscribed session
    Event { envelope: PlayEnvelope },
    Pong,
    Error { code: String, message: String },
    /// Connection is being closed by the server (kicked, blocked)
    Closing { reason: String },
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_client_message_is_tolerated() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"time_travel"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Unknown);
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"heartbeat"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Heartbeat);
    }
}
