use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::info;

use super::catalog_repository::DEFAULT_MODELS;
use super::error::{RepositoryError, RepositoryResult};

/// Migrations applied in order. Each entry is (version, sql).
/// Append new entries with the next version number; never edit existing ones.
const MIGRATIONS: &[(i64, &str)] = &[(
    1,
    "CREATE TABLE IF NOT EXISTS api_keys (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        name        TEXT    NOT NULL,
        key         TEXT    NOT NULL,
        is_default  INTEGER NOT NULL DEFAULT 0,
        created_at  INTEGER NOT NULL DEFAULT 0
    );
    CREATE TABLE IF NOT EXISTS favorite_models (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        model_id     TEXT    NOT NULL,
        display_name TEXT    NOT NULL,
        is_active    INTEGER NOT NULL DEFAULT 1,
        sort_order   INTEGER NOT NULL DEFAULT 0
    );
    CREATE TABLE IF NOT EXISTS saved_prompts (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        name        TEXT    NOT NULL,
        kind        TEXT    NOT NULL,
        content     TEXT    NOT NULL,
        category    TEXT,
        created_at  INTEGER NOT NULL DEFAULT 0,
        updated_at  INTEGER NOT NULL DEFAULT 0
    );
    CREATE TABLE IF NOT EXISTS sessions (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        name          TEXT,
        api_key_id    INTEGER,
        system_prompt TEXT,
        mode          TEXT    NOT NULL,
        created_at    INTEGER NOT NULL DEFAULT 0
    );
    CREATE TABLE IF NOT EXISTS threads (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id       INTEGER NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
        model_id         TEXT    NOT NULL,
        iteration_number INTEGER,
        created_at       INTEGER NOT NULL DEFAULT 0
    );
    CREATE TABLE IF NOT EXISTS messages (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        thread_id     INTEGER NOT NULL REFERENCES threads(id) ON DELETE CASCADE,
        role          TEXT    NOT NULL,
        content       TEXT    NOT NULL,
        attachments   TEXT,
        tokens_input  INTEGER,
        tokens_output INTEGER,
        cost          REAL,
        latency_ms    INTEGER,
        created_at    INTEGER NOT NULL DEFAULT 0
    );
    CREATE INDEX IF NOT EXISTS idx_threads_session_id ON threads (session_id);
    CREATE INDEX IF NOT EXISTS idx_messages_thread_id ON messages (thread_id);
    CREATE INDEX IF NOT EXISTS idx_sessions_created_at ON sessions (created_at DESC)",
)];

/// Shared SQLite handle for every repository.
///
/// Uses WAL journal mode so listings can read while the persistence writer
/// appends messages. `SqlitePool` is reference-counted and cheap to clone.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the database at `path`, apply migrations and seed the
    /// default catalog when it is empty.
    pub async fn open(path: &Path) -> RepositoryResult<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.initialize().await?;

        info!(path = %path.display(), "Opened prompt tester database");
        Ok(db)
    }

    /// Private in-memory database. A single connection keeps every query on
    /// the same memory store.
    pub async fn in_memory() -> RepositoryResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.initialize().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// `<config_dir>/prompt-tester/prompt-tester.db`
    pub fn default_path() -> RepositoryResult<PathBuf> {
        dirs::config_dir()
            .ok_or_else(|| RepositoryError::InitializationError {
                message: "Cannot find config directory".into(),
            })
            .map(|p| p.join("prompt-tester").join("prompt-tester.db"))
    }

    async fn initialize(&self) -> RepositoryResult<()> {
        Self::run_migrations(&self.pool).await?;
        Self::seed_catalog(&self.pool).await
    }

    /// Create the schema_version table if absent, then apply any pending migrations.
    async fn run_migrations(pool: &SqlitePool) -> RepositoryResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER NOT NULL
            )",
        )
        .execute(pool)
        .await?;

        sqlx::query("INSERT INTO schema_version (version) SELECT 0 WHERE NOT EXISTS (SELECT 1 FROM schema_version)")
            .execute(pool)
            .await?;

        let current: i64 = sqlx::query_scalar("SELECT version FROM schema_version")
            .fetch_one(pool)
            .await?;

        for (version, sql) in MIGRATIONS {
            if *version > current {
                info!(version, "Applying schema migration");
                // One statement per query call.
                for statement in sql.split(';') {
                    let trimmed = statement.trim();
                    if !trimmed.is_empty() {
                        sqlx::query(trimmed).execute(pool).await?;
                    }
                }
                sqlx::query("UPDATE schema_version SET version = ?")
                    .bind(version)
                    .execute(pool)
                    .await?;
            }
        }

        Ok(())
    }

    async fn seed_catalog(pool: &SqlitePool) -> RepositoryResult<()> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM favorite_models")
            .fetch_one(pool)
            .await?;
        if count > 0 {
            return Ok(());
        }

        let mut tx = pool.begin().await?;
        for (index, (model_id, display_name)) in DEFAULT_MODELS.iter().enumerate() {
            sqlx::query(
                "INSERT INTO favorite_models (model_id, display_name, is_active, sort_order)
                 VALUES (?1, ?2, 1, ?3)",
            )
            .bind(model_id)
            .bind(display_name)
            .bind(index as i64 + 1)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        info!(count = DEFAULT_MODELS.len(), "Seeded default model catalog");
        Ok(())
    }
}

pub(crate) fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub(crate) fn from_millis(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database_is_seeded() {
        let db = Database::in_memory().await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM favorite_models")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 6);
    }

    #[tokio::test]
    async fn test_reopening_does_not_reseed_or_remigrate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("test.db");

        let db = Database::open(&path).await.unwrap();
        sqlx::query("DELETE FROM favorite_models WHERE id = 1")
            .execute(db.pool())
            .await
            .unwrap();
        db.pool().close().await;

        let db = Database::open(&path).await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM favorite_models")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 5);

        let version: i64 = sqlx::query_scalar("SELECT version FROM schema_version")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_millis_round_trip() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).single().unwrap();
        assert_eq!(from_millis(to_millis(at)), at);
    }
}
