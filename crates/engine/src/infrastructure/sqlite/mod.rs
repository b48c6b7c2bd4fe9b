//! SQLite store.
//!
//! Each aggregate is kept as a JSON document next to the columns the
//! queries filter or sort on. Timestamps used for ordering are stored as
//! INTEGER microseconds.
//!
//! The pool holds a single connection. Every multi-statement unit
//! (seat-limited joins, conditional saves, time bank deltas, ballots,
//! highlight moves) runs in
//! one transaction on it, so those units are serialized without relying on
//! SQLite lock upgrades.

mod activity;
mod decisions;
mod participants;
mod reveals;
mod sessions;
mod time_bank;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

pub use activity::SqliteActivityLogRepo;
pub use decisions::SqliteDecisionRepo;
pub use participants::SqliteParticipantRepo;
pub use reveals::{SqliteArtifactRepo, SqliteOutcomeRepo};
pub use sessions::SqliteSessionRepo;
pub use time_bank::SqliteTimeBankRepo;

use crate::infrastructure::ports::{RepoError, Repositories};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS play_sessions (
        id TEXT PRIMARY KEY,
        code TEXT NOT NULL UNIQUE,
        host_id TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        doc TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_play_sessions_host ON play_sessions(host_id, created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS participants (
        id TEXT PRIMARY KEY,
        session_id TEXT NOT NULL,
        token TEXT NOT NULL UNIQUE,
        status TEXT NOT NULL,
        last_seen_at INTEGER NOT NULL,
        doc TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_participants_session ON participants(session_id)",
    "CREATE INDEX IF NOT EXISTS idx_participants_presence ON participants(status, last_seen_at)",
    r#"
    CREATE TABLE IF NOT EXISTS time_bank_accounts (
        session_id TEXT PRIMARY KEY,
        doc TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS time_bank_ledger (
        id TEXT PRIMARY KEY,
        session_id TEXT NOT NULL,
        event_id TEXT,
        doc TEXT NOT NULL,
        UNIQUE (session_id, event_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_time_bank_ledger_session ON time_bank_ledger(session_id)",
    r#"
    CREATE TABLE IF NOT EXISTS decisions (
        id TEXT PRIMARY KEY,
        session_id TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        doc TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_decisions_session ON decisions(session_id, created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS decision_votes (
        decision_id TEXT NOT NULL,
        voter_id TEXT NOT NULL,
        option_key TEXT NOT NULL,
        doc TEXT NOT NULL,
        PRIMARY KEY (decision_id, voter_id, option_key)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS artifact_variants (
        id TEXT PRIMARY KEY,
        session_id TEXT NOT NULL,
        variant_order INTEGER NOT NULL,
        created_at INTEGER NOT NULL,
        doc TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_artifact_variants_session ON artifact_variants(session_id, variant_order, created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS outcomes (
        id TEXT PRIMARY KEY,
        session_id TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        doc TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_outcomes_session ON outcomes(session_id, created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS activity_log (
        id TEXT PRIMARY KEY,
        session_id TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        doc TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_activity_log_session ON activity_log(session_id)",
];

/// Open (or create) the database at `path` and hand out its repositories.
pub async fn connect(path: &Path) -> Result<Repositories, RepoError> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .map_err(|e| RepoError::database("connect", e))?;

    migrate(&pool).await?;
    tracing::info!(path = %path.display(), "SQLite store ready");

    Ok(repositories(pool))
}

async fn migrate(pool: &SqlitePool) -> Result<(), RepoError> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| RepoError::database("migrate", e))?;
    }
    Ok(())
}

fn repositories(pool: SqlitePool) -> Repositories {
    Repositories {
        sessions: Arc::new(SqliteSessionRepo::new(pool.clone())),
        participants: Arc::new(SqliteParticipantRepo::new(pool.clone())),
        time_bank: Arc::new(SqliteTimeBankRepo::new(pool.clone())),
        decisions: Arc::new(SqliteDecisionRepo::new(pool.clone())),
        artifacts: Arc::new(SqliteArtifactRepo::new(pool.clone())),
        outcomes: Arc::new(SqliteOutcomeRepo::new(pool.clone())),
        activity: Arc::new(SqliteActivityLogRepo::new(pool)),
    }
}

// =============================================================================
// Row helpers
// =============================================================================

fn encode<T: Serialize>(value: &T) -> Result<String, RepoError> {
    serde_json::to_string(value).map_err(RepoError::serialization)
}

fn decode<T: DeserializeOwned>(row: &SqliteRow) -> Result<T, RepoError> {
    let doc: String = row
        .try_get("doc")
        .map_err(|e| RepoError::database("decode", e))?;
    serde_json::from_str(&doc).map_err(RepoError::serialization)
}

fn decode_all<T: DeserializeOwned>(rows: &[SqliteRow]) -> Result<Vec<T>, RepoError> {
    rows.iter().map(decode).collect()
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}
