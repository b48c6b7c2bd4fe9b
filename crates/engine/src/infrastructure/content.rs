//! Activity content providers.
//!
//! The board reads titles, board configuration and phase names from the
//! authoring catalogue. Either an HTTP catalogue or a static JSON file.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use liveplay_domain::ActivityId;

use crate::infrastructure::ports::{ActivityContent, ContentError, ContentPort};

/// Client for the authoring catalogue: `GET {base_url}/activities/{id}`.
#[derive(Clone)]
pub struct HttpContentProvider {
    client: Client,
    base_url: String,
}

impl HttpContentProvider {
    pub fn new(base_url: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ContentPort for HttpContentProvider {
    async fn get_activity(&self, id: ActivityId) -> Result<Option<ActivityContent>, ContentError> {
        let response = self
            .client
            .get(format!("{}/activities/{}", self.base_url, id))
            .send()
            .await
            .map_err(|e| ContentError::RequestFailed(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(ContentError::RequestFailed(format!(
                "catalogue returned {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map(Some)
            .map_err(|e| ContentError::InvalidResponse(e.to_string()))
    }
}

/// Content loaded once from a JSON object keyed by activity id.
#[derive(Debug, Clone, Default)]
pub struct StaticContentProvider {
    activities: HashMap<ActivityId, ActivityContent>,
}

impl StaticContentProvider {
    /// No content; every activity resolves to nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_json(raw: &str) -> Result<Self, ContentError> {
        let activities = serde_json::from_str(raw)
            .map_err(|e| ContentError::InvalidResponse(e.to_string()))?;
        Ok(Self { activities })
    }

    pub async fn from_file(path: &Path) -> Result<Self, ContentError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ContentError::RequestFailed(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&raw)
    }

    pub fn with_activity(mut self, id: ActivityId, content: ActivityContent) -> Self {
        self.activities.insert(id, content);
        self
    }
}

#[async_trait]
impl ContentPort for StaticContentProvider {
    async fn get_activity(&self, id: ActivityId) -> Result<Option<ActivityContent>, ContentError> {
        Ok(self.activities.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn static_content_parses_keyed_json() {
        let id = ActivityId::from_uuid(Uuid::from_u128(7));
        let raw = format!(
            r#"{{ "{id}": {{ "title": "Escape Room", "phases": [{{ "name": "Intro" }}, {{ "name": "Puzzle" }}] }} }}"#
        );
        let provider = StaticContentProvider::from_json(&raw).unwrap();

        let content = provider.get_activity(id).await.unwrap().unwrap();
        assert_eq!(content.title, "Escape Room");
        assert_eq!(content.phase_name(1), Some("Puzzle"));
        assert_eq!(content.phase_name(2), None);
        assert!(content.board_config.is_null());

        assert!(provider
            .get_activity(ActivityId::new())
            .await
            .unwrap()
            .is_none());
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(StaticContentProvider::from_json("[1, 2]").is_err());
    }
}
