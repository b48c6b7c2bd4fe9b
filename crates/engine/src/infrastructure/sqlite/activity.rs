use async_trait::async_trait;
use sqlx::SqlitePool;

use liveplay_domain::{ActivityLogEntry, SessionId};

use super::{decode_all, encode};
use crate::infrastructure::ports::{ActivityLogRepo, RepoError};

pub struct SqliteActivityLogRepo {
    pool: SqlitePool,
}

impl SqliteActivityLogRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivityLogRepo for SqliteActivityLogRepo {
    async fn append(&self, entry: &ActivityLogEntry) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO activity_log (id, session_id, created_at, doc) VALUES (?, ?, ?, ?)",
        )
        .bind(entry.id.to_string())
        .bind(entry.session_id.to_string())
        .bind(entry.created_at.timestamp_micros())
        .bind(encode(entry)?)
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("append_activity", e))?;
        Ok(())
    }

    async fn list_recent(
        &self,
        session_id: SessionId,
        limit: u32,
    ) -> Result<Vec<ActivityLogEntry>, RepoError> {
        let rows = sqlx::query(
            "SELECT doc FROM activity_log WHERE session_id = ? ORDER BY rowid DESC LIMIT ?",
        )
        .bind(session_id.to_string())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::database("list_activity", e))?;
        decode_all(&rows)
    }
}
