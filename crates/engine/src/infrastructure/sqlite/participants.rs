use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use liveplay_domain::{
    Participant, ParticipantId, ParticipantStatus, ParticipantToken, SessionId,
};

use super::{decode, decode_all, encode, is_unique_violation};
use crate::infrastructure::ports::{ParticipantRepo, RepoError};

pub struct SqliteParticipantRepo {
    pool: SqlitePool,
}

impl SqliteParticipantRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const UPDATE_PARTICIPANT: &str =
    "UPDATE participants SET status = ?, last_seen_at = ?, doc = ? WHERE id = ?";

#[async_trait]
impl ParticipantRepo for SqliteParticipantRepo {
    async fn get(&self, id: ParticipantId) -> Result<Option<Participant>, RepoError> {
        let row = sqlx::query("SELECT doc FROM participants WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database("get_participant", e))?;
        row.as_ref().map(decode).transpose()
    }

    async fn get_by_token(
        &self,
        session_id: SessionId,
        token: &ParticipantToken,
    ) -> Result<Option<Participant>, RepoError> {
        let row = sqlx::query("SELECT doc FROM participants WHERE session_id = ? AND token = ?")
            .bind(session_id.to_string())
            .bind(token.expose())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database("get_participant_by_token", e))?;
        row.as_ref().map(decode).transpose()
    }

    async fn insert_seated(
        &self,
        participant: &Participant,
        max_seats: u32,
    ) -> Result<bool, RepoError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::database("insert_participant", e))?;

        let seated: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM participants WHERE session_id = ? AND status NOT IN (?, ?)",
        )
        .bind(participant.session_id().to_string())
        .bind(ParticipantStatus::Kicked.as_str())
        .bind(ParticipantStatus::Blocked.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepoError::database("count_seats", e))?;

        if seated >= i64::from(max_seats) {
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO participants (id, session_id, token, status, last_seen_at, doc)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(participant.id().to_string())
        .bind(participant.session_id().to_string())
        .bind(participant.token().expose())
        .bind(participant.status().as_str())
        .bind(participant.last_seen_at().timestamp_micros())
        .bind(encode(participant)?)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                RepoError::constraint("participant token already issued")
            } else {
                RepoError::database("insert_participant", e)
            }
        })?;

        tx.commit()
            .await
            .map_err(|e| RepoError::database("insert_participant", e))?;
        Ok(true)
    }

    async fn save_if_unchanged(
        &self,
        current: &Participant,
        updated: &Participant,
    ) -> Result<bool, RepoError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::database("save_participant", e))?;

        let row = sqlx::query("SELECT doc FROM participants WHERE id = ?")
            .bind(current.id().to_string())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| RepoError::database("save_participant", e))?
            .ok_or_else(|| RepoError::not_found("Participant", current.id()))?;
        let stored: Participant = decode(&row)?;
        if stored != *current {
            return Ok(false);
        }

        sqlx::query(UPDATE_PARTICIPANT)
            .bind(updated.status().as_str())
            .bind(updated.last_seen_at().timestamp_micros())
            .bind(encode(updated)?)
            .bind(updated.id().to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| RepoError::database("save_participant", e))?;

        tx.commit()
            .await
            .map_err(|e| RepoError::database("save_participant", e))?;
        Ok(true)
    }

    async fn list_in_session(&self, session_id: SessionId) -> Result<Vec<Participant>, RepoError> {
        let rows = sqlx::query("SELECT doc FROM participants WHERE session_id = ? ORDER BY rowid")
            .bind(session_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::database("list_participants", e))?;
        decode_all(&rows)
    }

    async fn assign_next_starter(
        &self,
        session_id: SessionId,
        participant_id: ParticipantId,
    ) -> Result<Option<Participant>, RepoError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::database("assign_next_starter", e))?;

        let rows = sqlx::query("SELECT doc FROM participants WHERE session_id = ? ORDER BY rowid")
            .bind(session_id.to_string())
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| RepoError::database("assign_next_starter", e))?;
        let roster: Vec<Participant> = decode_all(&rows)?;

        if !roster.iter().any(|p| p.id() == participant_id) {
            return Ok(None);
        }

        let mut target = None;
        for mut participant in roster {
            let is_target = participant.id() == participant_id;
            if participant.progress().next_starter != is_target {
                participant.set_next_starter(is_target);
                sqlx::query(UPDATE_PARTICIPANT)
                    .bind(participant.status().as_str())
                    .bind(participant.last_seen_at().timestamp_micros())
                    .bind(encode(&participant)?)
                    .bind(participant.id().to_string())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| RepoError::database("assign_next_starter", e))?;
            }
            if is_target {
                target = Some(participant);
            }
        }

        tx.commit()
            .await
            .map_err(|e| RepoError::database("assign_next_starter", e))?;
        Ok(target)
    }

    async fn list_active_seen_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Participant>, RepoError> {
        let rows = sqlx::query(
            "SELECT doc FROM participants WHERE status = ? AND last_seen_at < ? ORDER BY rowid",
        )
        .bind(ParticipantStatus::Active.as_str())
        .bind(cutoff.timestamp_micros())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::database("list_stale_participants", e))?;
        decode_all(&rows)
    }
}
