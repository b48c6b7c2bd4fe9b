use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;

use liveplay_domain::{ArtifactVariant, ArtifactVariantId, Outcome, OutcomeId, SessionId};

use crate::infrastructure::ports::{ArtifactRepo, OutcomeRepo, RepoError};

type Variants = Arc<Mutex<Vec<ArtifactVariant>>>;

#[derive(Default)]
pub struct MemoryArtifactRepo {
    sessions: DashMap<SessionId, Variants>,
    by_id: DashMap<ArtifactVariantId, SessionId>,
}

impl MemoryArtifactRepo {
    pub fn new() -> Self {
        Self::default()
    }

    fn variants(&self, session_id: SessionId) -> Option<Variants> {
        self.sessions.get(&session_id).map(|v| v.clone())
    }
}

#[async_trait]
impl ArtifactRepo for MemoryArtifactRepo {
    async fn get(&self, id: ArtifactVariantId) -> Result<Option<ArtifactVariant>, RepoError> {
        let Some(session_id) = self.by_id.get(&id).map(|s| *s) else {
            return Ok(None);
        };
        let Some(variants) = self.variants(session_id) else {
            return Ok(None);
        };
        let variants = variants.lock().await;
        Ok(variants.iter().find(|v| v.id() == id).cloned())
    }

    async fn save(&self, variant: &ArtifactVariant) -> Result<(), RepoError> {
        let variants = self
            .sessions
            .entry(variant.session_id())
            .or_default()
            .clone();
        let mut variants = variants.lock().await;
        match variants.iter_mut().find(|v| v.id() == variant.id()) {
            Some(slot) => *slot = variant.clone(),
            None => {
                self.by_id.insert(variant.id(), variant.session_id());
                variants.push(variant.clone());
            }
        }
        Ok(())
    }

    async fn list_in_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<ArtifactVariant>, RepoError> {
        let Some(variants) = self.variants(session_id) else {
            return Ok(Vec::new());
        };
        let mut variants = variants.lock().await.clone();
        variants.sort_by_key(|v| (v.variant_order(), v.created_at()));
        Ok(variants)
    }

    async fn set_highlight(
        &self,
        session_id: SessionId,
        variant_id: Option<ArtifactVariantId>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ArtifactVariant>, RepoError> {
        let Some(variants) = self.variants(session_id) else {
            return match variant_id {
                Some(id) => Err(RepoError::not_found("ArtifactVariant", id)),
                None => Ok(Vec::new()),
            };
        };
        let mut variants = variants.lock().await;

        if let Some(id) = variant_id {
            if !variants.iter().any(|v| v.id() == id) {
                return Err(RepoError::not_found("ArtifactVariant", id));
            }
        }

        let mut changed = Vec::new();
        for variant in variants.iter_mut() {
            if Some(variant.id()) == variant_id {
                if variant.highlighted_at().is_none() {
                    variant
                        .highlight(now)
                        .map_err(|e| RepoError::constraint(e.to_string()))?;
                    changed.push(variant.clone());
                }
            } else if variant.clear_highlight() {
                changed.push(variant.clone());
            }
        }
        Ok(changed)
    }
}

#[derive(Default)]
pub struct MemoryOutcomeRepo {
    outcomes: DashMap<OutcomeId, Outcome>,
}

impl MemoryOutcomeRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OutcomeRepo for MemoryOutcomeRepo {
    async fn get(&self, id: OutcomeId) -> Result<Option<Outcome>, RepoError> {
        Ok(self.outcomes.get(&id).map(|o| o.clone()))
    }

    async fn save(&self, outcome: &Outcome) -> Result<(), RepoError> {
        self.outcomes.insert(outcome.id(), outcome.clone());
        Ok(())
    }

    async fn list_in_session(&self, session_id: SessionId) -> Result<Vec<Outcome>, RepoError> {
        let mut outcomes: Vec<Outcome> = self
            .outcomes
            .iter()
            .filter(|o| o.session_id() == session_id)
            .map(|o| o.clone())
            .collect();
        outcomes.sort_by_key(|o| o.created_at());
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liveplay_domain::{Title, VariantVisibility};

    fn revealed_variant(session_id: SessionId, order: u32) -> ArtifactVariant {
        let mut v = ArtifactVariant::new(
            session_id,
            Title::new(format!("Clue {order}")).unwrap(),
            None,
            None,
            order,
            VariantVisibility::Public,
            None,
            Utc::now(),
        )
        .unwrap();
        v.reveal(Utc::now());
        v
    }

    #[tokio::test]
    async fn highlight_moves_between_variants() {
        let repo = MemoryArtifactRepo::new();
        let session_id = SessionId::new();
        let a = revealed_variant(session_id, 1);
        let b = revealed_variant(session_id, 2);
        repo.save(&a).await.unwrap();
        repo.save(&b).await.unwrap();

        let changed = repo
            .set_highlight(session_id, Some(a.id()), Utc::now())
            .await
            .unwrap();
        assert_eq!(changed.len(), 1);

        let changed = repo
            .set_highlight(session_id, Some(b.id()), Utc::now())
            .await
            .unwrap();
        assert_eq!(changed.len(), 2);

        let highlighted: Vec<_> = repo
            .list_in_session(session_id)
            .await
            .unwrap()
            .into_iter()
            .filter(|v| v.highlighted_at().is_some())
            .map(|v| v.id())
            .collect();
        assert_eq!(highlighted, vec![b.id()]);
    }

    #[tokio::test]
    async fn variants_list_in_order() {
        let repo = MemoryArtifactRepo::new();
        let session_id = SessionId::new();
        let late = revealed_variant(session_id, 5);
        let early = revealed_variant(session_id, 1);
        repo.save(&late).await.unwrap();
        repo.save(&early).await.unwrap();

        let ids: Vec<_> = repo
            .list_in_session(session_id)
            .await
            .unwrap()
            .iter()
            .map(|v| v.id())
            .collect();
        assert_eq!(ids, vec![early.id(), late.id()]);
    }
}
