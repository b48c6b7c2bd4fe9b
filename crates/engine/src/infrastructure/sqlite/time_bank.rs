use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use liveplay_domain::{
    AppliedDelta, LedgerEntry, LedgerEntryId, SessionId, TimeBankBalance, TimeBankDelta,
};

use super::{decode, decode_all, encode};
use crate::infrastructure::ports::{RepoError, TimeBankRepo};

pub struct SqliteTimeBankRepo {
    pool: SqlitePool,
}

impl SqliteTimeBankRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TimeBankRepo for SqliteTimeBankRepo {
    async fn apply_delta(
        &self,
        session_id: SessionId,
        delta: &TimeBankDelta,
        entry_id: LedgerEntryId,
        now: DateTime<Utc>,
    ) -> Result<AppliedDelta, RepoError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::database("apply_delta", e))?;

        let row = sqlx::query("SELECT doc FROM time_bank_accounts WHERE session_id = ?")
            .bind(session_id.to_string())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| RepoError::database("apply_delta", e))?;
        let mut balance: TimeBankBalance = match row {
            Some(row) => decode(&row)?,
            None => TimeBankBalance::empty(session_id),
        };

        if let Some(event_id) = delta.event_id() {
            let original = sqlx::query(
                "SELECT doc FROM time_bank_ledger WHERE session_id = ? AND event_id = ?",
            )
            .bind(session_id.to_string())
            .bind(event_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| RepoError::database("apply_delta", e))?;
            if let Some(row) = original {
                let original: LedgerEntry = decode(&row)?;
                return Ok(AppliedDelta::duplicate(balance.balance_seconds, &original));
            }
        }

        let (result, entry) = balance.apply(delta, entry_id, now);

        sqlx::query(
            r#"
            INSERT INTO time_bank_accounts (session_id, doc) VALUES (?, ?)
            ON CONFLICT(session_id) DO UPDATE SET doc = excluded.doc
            "#,
        )
        .bind(session_id.to_string())
        .bind(encode(&balance)?)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepoError::database("apply_delta", e))?;

        sqlx::query(
            "INSERT INTO time_bank_ledger (id, session_id, event_id, doc) VALUES (?, ?, ?, ?)",
        )
        .bind(entry.id.to_string())
        .bind(session_id.to_string())
        .bind(entry.event_id.as_deref())
        .bind(encode(&entry)?)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepoError::database("apply_delta", e))?;

        tx.commit()
            .await
            .map_err(|e| RepoError::database("apply_delta", e))?;
        Ok(result)
    }

    async fn get_balance(&self, session_id: SessionId) -> Result<TimeBankBalance, RepoError> {
        let row = sqlx::query("SELECT doc FROM time_bank_accounts WHERE session_id = ?")
            .bind(session_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database("get_balance", e))?;
        match row {
            Some(row) => decode(&row),
            None => Ok(TimeBankBalance::empty(session_id)),
        }
    }

    async fn recent_entries(
        &self,
        session_id: SessionId,
        limit: u32,
    ) -> Result<Vec<LedgerEntry>, RepoError> {
        let rows = sqlx::query(
            "SELECT doc FROM time_bank_ledger WHERE session_id = ? ORDER BY rowid DESC LIMIT ?",
        )
        .bind(session_id.to_string())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::database("recent_ledger_entries", e))?;
        decode_all(&rows)
    }
}
