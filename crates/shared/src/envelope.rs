//! Broadcast envelope published on a session's topic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use liveplay_domain::SessionId;

/// Topic prefix for per-session broadcast channels.
pub const CHANNEL_PREFIX: &str = "play:";

/// `play:<session id>`
pub fn channel_name(session_id: SessionId) -> String {
    format!("{}{}", CHANNEL_PREFIX, session_id)
}

/// `{type, payload, timestamp}` as seen by subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayEnvelope {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl PlayEnvelope {
    pub fn new(
        event_type: impl Into<String>,
        payload: serde_json::Value,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            timestamp,
        }
    }
}
