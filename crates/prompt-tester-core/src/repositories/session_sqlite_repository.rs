use std::collections::HashMap;

use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};

use crate::models::{
    MessageRole, PersistedMessage, PersistedThread, Session, SessionDetail, SessionMode,
    SessionSummary, ThreadDetail,
};

use super::BoxFuture;
use super::database::{Database, from_millis, to_millis};
use super::error::{RepositoryError, RepositoryResult};
use super::session_repository::{NewMessage, NewSession, SessionRepository};

/// SQLite-backed store for sessions, threads and messages
#[derive(Clone)]
pub struct SessionSqliteRepository {
    pool: SqlitePool,
}

impl SessionSqliteRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }
}

fn row_to_session(row: &SqliteRow) -> RepositoryResult<Session> {
    let mode: String = row.get("mode");
    Ok(Session {
        id: row.get("id"),
        name: row.get("name"),
        credential_id: row.get("api_key_id"),
        system_prompt: row.get("system_prompt"),
        mode: mode
            .parse::<SessionMode>()
            .map_err(|message| RepositoryError::InvalidData { message })?,
        created_at: from_millis(row.get("created_at")),
    })
}

fn row_to_thread(row: &SqliteRow) -> PersistedThread {
    PersistedThread {
        id: row.get("id"),
        session_id: row.get("session_id"),
        model_id: row.get("model_id"),
        iteration: row
            .get::<Option<i64>, _>("iteration_number")
            .map(|i| i as u32),
        created_at: from_millis(row.get("created_at")),
    }
}

fn row_to_message(row: &SqliteRow) -> RepositoryResult<PersistedMessage> {
    let role: String = row.get("role");
    let attachments = row
        .get::<Option<String>, _>("attachments")
        .map(|raw| serde_json::from_str(&raw))
        .transpose()?;
    Ok(PersistedMessage {
        id: row.get("id"),
        thread_id: row.get("thread_id"),
        role: role
            .parse::<MessageRole>()
            .map_err(|message| RepositoryError::InvalidData { message })?,
        content: row.get("content"),
        attachments,
        input_tokens: row.get::<Option<i64>, _>("tokens_input").map(|t| t as u32),
        output_tokens: row.get::<Option<i64>, _>("tokens_output").map(|t| t as u32),
        cost: row.get("cost"),
        latency_ms: row.get::<Option<i64>, _>("latency_ms").map(|l| l as u64),
        created_at: from_millis(row.get("created_at")),
    })
}

impl SessionRepository for SessionSqliteRepository {
    fn create_session(&self, session: NewSession) -> BoxFuture<'static, RepositoryResult<Session>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let created_at = from_millis(to_millis(Utc::now()));
            let id = sqlx::query(
                "INSERT INTO sessions (name, api_key_id, system_prompt, mode, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(session.name.as_deref())
            .bind(session.credential_id)
            .bind(session.system_prompt.as_deref())
            .bind(session.mode.as_str())
            .bind(to_millis(created_at))
            .execute(&pool)
            .await?
            .last_insert_rowid();

            Ok(Session {
                id,
                name: session.name,
                credential_id: session.credential_id,
                system_prompt: session.system_prompt,
                mode: session.mode,
                created_at,
            })
        })
    }

    fn list_sessions(&self) -> BoxFuture<'static, RepositoryResult<Vec<SessionSummary>>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let rows = sqlx::query(
                "SELECT s.id, s.name, s.api_key_id, s.system_prompt, s.mode, s.created_at,
                        (SELECT COUNT(*) FROM threads t WHERE t.session_id = s.id) AS thread_count
                 FROM sessions s
                 ORDER BY s.created_at DESC, s.id DESC",
            )
            .fetch_all(&pool)
            .await?;

            rows.iter()
                .map(|row| {
                    Ok(SessionSummary {
                        session: row_to_session(row)?,
                        thread_count: row.get::<i64, _>("thread_count") as usize,
                    })
                })
                .collect()
        })
    }

    fn get_session(&self, id: i64) -> BoxFuture<'static, RepositoryResult<Option<SessionDetail>>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let Some(row) = sqlx::query(
                "SELECT id, name, api_key_id, system_prompt, mode, created_at
                 FROM sessions WHERE id = ?",
            )
            .bind(id)
            .fetch_optional(&pool)
            .await?
            else {
                return Ok(None);
            };
            let session = row_to_session(&row)?;

            let thread_rows = sqlx::query(
                "SELECT id, session_id, model_id, iteration_number, created_at
                 FROM threads WHERE session_id = ? ORDER BY id",
            )
            .bind(id)
            .fetch_all(&pool)
            .await?;

            let message_rows = sqlx::query(
                "SELECT m.id, m.thread_id, m.role, m.content, m.attachments, m.tokens_input,
                        m.tokens_output, m.cost, m.latency_ms, m.created_at
                 FROM messages m
                 JOIN threads t ON t.id = m.thread_id
                 WHERE t.session_id = ?
                 ORDER BY m.id",
            )
            .bind(id)
            .fetch_all(&pool)
            .await?;

            let mut by_thread: HashMap<i64, Vec<PersistedMessage>> = HashMap::new();
            for row in &message_rows {
                let message = row_to_message(row)?;
                by_thread.entry(message.thread_id).or_default().push(message);
            }

            let threads = thread_rows
                .iter()
                .map(|row| {
                    let thread = row_to_thread(row);
                    let messages = by_thread.remove(&thread.id).unwrap_or_default();
                    ThreadDetail { thread, messages }
                })
                .collect();

            Ok(Some(SessionDetail { session, threads }))
        })
    }

    fn rename_session(
        &self,
        id: i64,
        name: Option<String>,
    ) -> BoxFuture<'static, RepositoryResult<bool>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let result = sqlx::query("UPDATE sessions SET name = ?1 WHERE id = ?2")
                .bind(name.as_deref())
                .bind(id)
                .execute(&pool)
                .await?;
            Ok(result.rows_affected() > 0)
        })
    }

    fn delete_session(&self, id: i64) -> BoxFuture<'static, RepositoryResult<bool>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            // Threads and messages cascade.
            let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
                .bind(id)
                .execute(&pool)
                .await?;
            Ok(result.rows_affected() > 0)
        })
    }

    fn create_thread(
        &self,
        session_id: i64,
        model_id: &str,
        iteration: Option<u32>,
    ) -> BoxFuture<'static, RepositoryResult<PersistedThread>> {
        let pool = self.pool.clone();
        let model_id = model_id.to_string();
        Box::pin(async move {
            let created_at = from_millis(to_millis(Utc::now()));
            let id = sqlx::query(
                "INSERT INTO threads (session_id, model_id, iteration_number, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(session_id)
            .bind(&model_id)
            .bind(iteration.map(i64::from))
            .bind(to_millis(created_at))
            .execute(&pool)
            .await?
            .last_insert_rowid();

            Ok(PersistedThread {
                id,
                session_id,
                model_id,
                iteration,
                created_at,
            })
        })
    }

    fn append_message(
        &self,
        message: NewMessage,
    ) -> BoxFuture<'static, RepositoryResult<PersistedMessage>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let attachments = message
                .attachments
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;

            let id = sqlx::query(
                "INSERT INTO messages
                    (thread_id, role, content, attachments, tokens_input, tokens_output,
                     cost, latency_ms, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )
            .bind(message.thread_id)
            .bind(message.role.as_str())
            .bind(&message.content)
            .bind(attachments)
            .bind(message.input_tokens.map(i64::from))
            .bind(message.output_tokens.map(i64::from))
            .bind(message.cost)
            .bind(message.latency_ms.map(|l| l as i64))
            .bind(to_millis(message.created_at))
            .execute(&pool)
            .await?
            .last_insert_rowid();

            Ok(PersistedMessage {
                id,
                thread_id: message.thread_id,
                role: message.role,
                content: message.content,
                attachments: message.attachments,
                input_tokens: message.input_tokens,
                output_tokens: message.output_tokens,
                cost: message.cost,
                latency_ms: message.latency_ms,
                created_at: from_millis(to_millis(message.created_at)),
            })
        })
    }
}
