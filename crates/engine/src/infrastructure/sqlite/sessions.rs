use async_trait::async_trait;
use sqlx::SqlitePool;

use liveplay_domain::{PlaySession, SessionCode, SessionId, UserId};

use super::{decode, decode_all, encode, is_unique_violation};
use crate::infrastructure::ports::{RepoError, SessionRepo};

pub struct SqliteSessionRepo {
    pool: SqlitePool,
}

impl SqliteSessionRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepo for SqliteSessionRepo {
    async fn get(&self, id: SessionId) -> Result<Option<PlaySession>, RepoError> {
        let row = sqlx::query("SELECT doc FROM play_sessions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database("get_session", e))?;
        row.as_ref().map(decode).transpose()
    }

    async fn get_by_code(&self, code: &SessionCode) -> Result<Option<PlaySession>, RepoError> {
        let row = sqlx::query("SELECT doc FROM play_sessions WHERE code = ?")
            .bind(code.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database("get_session_by_code", e))?;
        row.as_ref().map(decode).transpose()
    }

    async fn insert(&self, session: &PlaySession) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO play_sessions (id, code, host_id, created_at, doc)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(session.id().to_string())
        .bind(session.code().as_str())
        .bind(session.host_id().as_str())
        .bind(session.created_at().timestamp_micros())
        .bind(encode(session)?)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                RepoError::constraint(format!("session code {} already in use", session.code()))
            } else {
                RepoError::database("insert_session", e)
            }
        })?;
        Ok(())
    }

    async fn save_if_unchanged(
        &self,
        current: &PlaySession,
        updated: &PlaySession,
    ) -> Result<bool, RepoError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::database("save_session", e))?;

        let row = sqlx::query("SELECT doc FROM play_sessions WHERE id = ?")
            .bind(current.id().to_string())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| RepoError::database("save_session", e))?
            .ok_or_else(|| RepoError::not_found("Session", current.id()))?;
        let stored: PlaySession = decode(&row)?;
        if stored != *current {
            return Ok(false);
        }

        sqlx::query("UPDATE play_sessions SET doc = ? WHERE id = ?")
            .bind(encode(updated)?)
            .bind(updated.id().to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| RepoError::database("save_session", e))?;

        tx.commit()
            .await
            .map_err(|e| RepoError::database("save_session", e))?;
        Ok(true)
    }

    async fn list_for_host(&self, host_id: &UserId) -> Result<Vec<PlaySession>, RepoError> {
        let rows = sqlx::query(
            "SELECT doc FROM play_sessions WHERE host_id = ? ORDER BY created_at DESC",
        )
        .bind(host_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::database("list_sessions_for_host", e))?;
        decode_all(&rows)
    }
}
