use async_trait::async_trait;
use dashmap::DashMap;

use liveplay_domain::{ActivityLogEntry, SessionId};

use crate::infrastructure::ports::{ActivityLogRepo, RepoError};

#[derive(Default)]
pub struct MemoryActivityLogRepo {
    entries: DashMap<SessionId, Vec<ActivityLogEntry>>,
}

impl MemoryActivityLogRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ActivityLogRepo for MemoryActivityLogRepo {
    async fn append(&self, entry: &ActivityLogEntry) -> Result<(), RepoError> {
        self.entries
            .entry(entry.session_id)
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    async fn list_recent(
        &self,
        session_id: SessionId,
        limit: u32,
    ) -> Result<Vec<ActivityLogEntry>, RepoError> {
        Ok(self
            .entries
            .get(&session_id)
            .map(|entries| {
                entries
                    .iter()
                    .rev()
                    .take(limit as usize)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
