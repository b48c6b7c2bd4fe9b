//! Session-completed notifications.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::infrastructure::ports::{GamificationError, GamificationPort, SessionCompleted};

/// Posts `SessionCompleted` to `{base_url}/events/session-completed`.
#[derive(Clone)]
pub struct HttpGamificationSink {
    client: Client,
    base_url: String,
}

impl HttpGamificationSink {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl GamificationPort for HttpGamificationSink {
    async fn session_completed(&self, event: &SessionCompleted) -> Result<(), GamificationError> {
        let response = self
            .client
            .post(format!("{}/events/session-completed", self.base_url))
            .json(event)
            .send()
            .await
            .map_err(|e| GamificationError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GamificationError::Rejected(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Used when no gamification service is configured.
#[derive(Debug, Clone, Default)]
pub struct LoggingGamificationSink;

#[async_trait]
impl GamificationPort for LoggingGamificationSink {
    async fn session_completed(&self, event: &SessionCompleted) -> Result<(), GamificationError> {
        tracing::info!(
            session_id = %event.session_id,
            participant_count = event.participant_count,
            "Session completed (no gamification service configured)"
        );
        Ok(())
    }
}
