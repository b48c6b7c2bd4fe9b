use async_trait::async_trait;
use sqlx::SqlitePool;

use liveplay_domain::{Ballot, Decision, DecisionId, SessionId, Vote};

use super::{decode, decode_all, encode};
use crate::infrastructure::ports::{DecisionRepo, RepoError};

pub struct SqliteDecisionRepo {
    pool: SqlitePool,
}

impl SqliteDecisionRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DecisionRepo for SqliteDecisionRepo {
    async fn get(&self, id: DecisionId) -> Result<Option<Decision>, RepoError> {
        let row = sqlx::query("SELECT doc FROM decisions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database("get_decision", e))?;
        row.as_ref().map(decode).transpose()
    }

    async fn save(&self, decision: &Decision) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO decisions (id, session_id, created_at, doc) VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET doc = excluded.doc
            "#,
        )
        .bind(decision.id().to_string())
        .bind(decision.session_id().to_string())
        .bind(decision.created_at().timestamp_micros())
        .bind(encode(decision)?)
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("save_decision", e))?;
        Ok(())
    }

    async fn list_in_session(&self, session_id: SessionId) -> Result<Vec<Decision>, RepoError> {
        let rows = sqlx::query(
            "SELECT doc FROM decisions WHERE session_id = ? ORDER BY created_at, rowid",
        )
        .bind(session_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::database("list_decisions", e))?;
        decode_all(&rows)
    }

    async fn cast_ballot(&self, ballot: &Ballot, replace: bool) -> Result<bool, RepoError> {
        let decision_id = ballot.decision_id.to_string();
        let voter_id = ballot.voter_id.to_string();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::database("cast_ballot", e))?;

        let existing: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM decision_votes WHERE decision_id = ? AND voter_id = ?",
        )
        .bind(&decision_id)
        .bind(&voter_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepoError::database("cast_ballot", e))?;

        let replaced = existing > 0;
        if replaced && !replace {
            return Err(RepoError::constraint(format!(
                "participant {} already voted on decision {}",
                ballot.voter_id, ballot.decision_id
            )));
        }
        if replaced {
            sqlx::query("DELETE FROM decision_votes WHERE decision_id = ? AND voter_id = ?")
                .bind(&decision_id)
                .bind(&voter_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| RepoError::database("cast_ballot", e))?;
        }

        for vote in ballot.votes() {
            sqlx::query(
                "INSERT INTO decision_votes (decision_id, voter_id, option_key, doc) VALUES (?, ?, ?, ?)",
            )
            .bind(&decision_id)
            .bind(&voter_id)
            .bind(&vote.option_key)
            .bind(encode(&vote)?)
            .execute(&mut *tx)
            .await
            .map_err(|e| RepoError::database("cast_ballot", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| RepoError::database("cast_ballot", e))?;
        Ok(replaced)
    }

    async fn list_votes(&self, decision_id: DecisionId) -> Result<Vec<Vote>, RepoError> {
        let rows = sqlx::query("SELECT doc FROM decision_votes WHERE decision_id = ? ORDER BY rowid")
            .bind(decision_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::database("list_votes", e))?;
        decode_all(&rows)
    }

    async fn has_votes(&self, decision_id: DecisionId) -> Result<bool, RepoError> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM decision_votes WHERE decision_id = ? LIMIT 1")
                .bind(decision_id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| RepoError::database("has_votes", e))?;
        Ok(found.is_some())
    }
}
