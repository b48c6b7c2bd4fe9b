use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};

use liveplay_domain::{PlaySession, SessionCode, SessionId, UserId};

use crate::infrastructure::ports::{RepoError, SessionRepo};

#[derive(Default)]
pub struct MemorySessionRepo {
    sessions: DashMap<SessionId, PlaySession>,
    codes: DashMap<String, SessionId>,
}

impl MemorySessionRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRepo for MemorySessionRepo {
    async fn get(&self, id: SessionId) -> Result<Option<PlaySession>, RepoError> {
        Ok(self.sessions.get(&id).map(|s| s.clone()))
    }

    async fn get_by_code(&self, code: &SessionCode) -> Result<Option<PlaySession>, RepoError> {
        let Some(id) = self.codes.get(code.as_str()).map(|id| *id) else {
            return Ok(None);
        };
        self.get(id).await
    }

    async fn insert(&self, session: &PlaySession) -> Result<(), RepoError> {
        match self.codes.entry(session.code().as_str().to_string()) {
            Entry::Occupied(_) => Err(RepoError::constraint(format!(
                "session code {} already in use",
                session.code()
            ))),
            Entry::Vacant(slot) => {
                slot.insert(session.id());
                self.sessions.insert(session.id(), session.clone());
                Ok(())
            }
        }
    }

    async fn save_if_unchanged(
        &self,
        current: &PlaySession,
        updated: &PlaySession,
    ) -> Result<bool, RepoError> {
        let Some(mut existing) = self.sessions.get_mut(&current.id()) else {
            return Err(RepoError::not_found("Session", current.id()));
        };
        if *existing != *current {
            return Ok(false);
        }
        *existing = updated.clone();
        Ok(true)
    }

    async fn list_for_host(&self, host_id: &UserId) -> Result<Vec<PlaySession>, RepoError> {
        let mut sessions: Vec<PlaySession> = self
            .sessions
            .iter()
            .filter(|s| s.is_hosted_by(host_id))
            .map(|s| s.clone())
            .collect();
        sessions.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(sessions)
    }
}
