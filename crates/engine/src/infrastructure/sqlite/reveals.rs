use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use liveplay_domain::{ArtifactVariant, ArtifactVariantId, Outcome, OutcomeId, SessionId};

use super::{decode, decode_all, encode};
use crate::infrastructure::ports::{ArtifactRepo, OutcomeRepo, RepoError};

const UPSERT_VARIANT: &str = r#"
    INSERT INTO artifact_variants (id, session_id, variant_order, created_at, doc)
    VALUES (?, ?, ?, ?, ?)
    ON CONFLICT(id) DO UPDATE SET variant_order = excluded.variant_order, doc = excluded.doc
"#;

pub struct SqliteArtifactRepo {
    pool: SqlitePool,
}

impl SqliteArtifactRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ArtifactRepo for SqliteArtifactRepo {
    async fn get(&self, id: ArtifactVariantId) -> Result<Option<ArtifactVariant>, RepoError> {
        let row = sqlx::query("SELECT doc FROM artifact_variants WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database("get_artifact_variant", e))?;
        row.as_ref().map(decode).transpose()
    }

    async fn save(&self, variant: &ArtifactVariant) -> Result<(), RepoError> {
        sqlx::query(UPSERT_VARIANT)
            .bind(variant.id().to_string())
            .bind(variant.session_id().to_string())
            .bind(i64::from(variant.variant_order()))
            .bind(variant.created_at().timestamp_micros())
            .bind(encode(variant)?)
            .execute(&self.pool)
            .await
            .map_err(|e| RepoError::database("save_artifact_variant", e))?;
        Ok(())
    }

    async fn list_in_session(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<ArtifactVariant>, RepoError> {
        let rows = sqlx::query(
            r#"
            SELECT doc FROM artifact_variants
            WHERE session_id = ?
            ORDER BY variant_order, created_at, rowid
            "#,
        )
        .bind(session_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::database("list_artifact_variants", e))?;
        decode_all(&rows)
    }

    async fn set_highlight(
        &self,
        session_id: SessionId,
        variant_id: Option<ArtifactVariantId>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ArtifactVariant>, RepoError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepoError::database("set_highlight", e))?;

        let rows = sqlx::query("SELECT doc FROM artifact_variants WHERE session_id = ?")
            .bind(session_id.to_string())
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| RepoError::database("set_highlight", e))?;
        let variants: Vec<ArtifactVariant> = decode_all(&rows)?;

        if let Some(id) = variant_id {
            if !variants.iter().any(|v| v.id() == id) {
                return Err(RepoError::not_found("ArtifactVariant", id));
            }
        }

        let mut changed = Vec::new();
        for mut variant in variants {
            let updated = if Some(variant.id()) == variant_id {
                if variant.highlighted_at().is_some() {
                    false
                } else {
                    variant
                        .highlight(now)
                        .map_err(|e| RepoError::constraint(e.to_string()))?;
                    true
                }
            } else {
                variant.clear_highlight()
            };
            if !updated {
                continue;
            }
            sqlx::query("UPDATE artifact_variants SET doc = ? WHERE id = ?")
                .bind(encode(&variant)?)
                .bind(variant.id().to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| RepoError::database("set_highlight", e))?;
            changed.push(variant);
        }

        tx.commit()
            .await
            .map_err(|e| RepoError::database("set_highlight", e))?;
        Ok(changed)
    }
}

pub struct SqliteOutcomeRepo {
    pool: SqlitePool,
}

impl SqliteOutcomeRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OutcomeRepo for SqliteOutcomeRepo {
    async fn get(&self, id: OutcomeId) -> Result<Option<Outcome>, RepoError> {
        let row = sqlx::query("SELECT doc FROM outcomes WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database("get_outcome", e))?;
        row.as_ref().map(decode).transpose()
    }

    async fn save(&self, outcome: &Outcome) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO outcomes (id, session_id, created_at, doc) VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET doc = excluded.doc
            "#,
        )
        .bind(outcome.id().to_string())
        .bind(outcome.session_id().to_string())
        .bind(outcome.created_at().timestamp_micros())
        .bind(encode(outcome)?)
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("save_outcome", e))?;
        Ok(())
    }

    async fn list_in_session(&self, session_id: SessionId) -> Result<Vec<Outcome>, RepoError> {
        let rows = sqlx::query(
            "SELECT doc FROM outcomes WHERE session_id = ? ORDER BY created_at, rowid",
        )
        .bind(session_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::database("list_outcomes", e))?;
        decode_all(&rows)
    }
}
