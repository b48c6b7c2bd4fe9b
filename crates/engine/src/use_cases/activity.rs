//! Session activity log.

use std::sync::Arc;

use liveplay_domain::{ActivityKind, ActivityLogEntry, Actor, SessionId};

use crate::infrastructure::ports::{ActivityLogRepo, ClockPort};

use super::auth::HostViewer;
use super::error::PlayError;

pub struct ActivityLog {
    repo: Arc<dyn ActivityLogRepo>,
    clock: Arc<dyn ClockPort>,
}

impl ActivityLog {
    pub fn new(repo: Arc<dyn ActivityLogRepo>, clock: Arc<dyn ClockPort>) -> Self {
        Self { repo, clock }
    }

    /// Append an entry. Failures are logged and never reach the caller.
    pub async fn record(
        &self,
        session_id: SessionId,
        kind: ActivityKind,
        actor: Actor,
        data: serde_json::Value,
    ) {
        let entry = ActivityLogEntry::new(session_id, kind, actor, data, self.clock.now());
        if let Err(e) = self.repo.append(&entry).await {
            tracing::warn!(
                session_id = %session_id,
                kind = %kind,
                error = %e,
                "Failed to record session activity"
            );
        }
    }

    /// Newest first.
    pub async fn list(
        &self,
        host: &HostViewer,
        limit: u32,
    ) -> Result<Vec<ActivityLogEntry>, PlayError> {
        Ok(self.repo.list_recent(host.session().id(), limit).await?)
    }
}
