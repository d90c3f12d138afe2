use chrono::{DateTime, Utc};

use crate::models::{
    MessageRole, PersistedMessage, PersistedThread, Session, SessionDetail, SessionMode,
    SessionSummary,
};

use super::BoxFuture;
use super::error::RepositoryResult;

#[derive(Debug, Clone)]
pub struct NewSession {
    pub name: Option<String>,
    pub credential_id: Option<i64>,
    pub system_prompt: Option<String>,
    pub mode: SessionMode,
}

/// A message row to append. `created_at` is supplied by the caller so that
/// queue order and timestamp order agree.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub thread_id: i64,
    pub role: MessageRole,
    pub content: String,
    pub attachments: Option<serde_json::Value>,
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
    pub cost: Option<f64>,
    pub latency_ms: Option<u64>,
    pub created_at: DateTime<Utc>,
}

impl NewMessage {
    pub fn user(thread_id: i64, content: impl Into<String>) -> Self {
        Self {
            thread_id,
            role: MessageRole::User,
            content: content.into(),
            attachments: None,
            input_tokens: None,
            output_tokens: None,
            cost: None,
            latency_ms: None,
            created_at: Utc::now(),
        }
    }
}

/// Repository trait for sessions, their threads and messages.
///
/// Messages are append-only. Deleting a session removes its threads and
/// their messages.
pub trait SessionRepository: Send + Sync + 'static {
    fn create_session(&self, session: NewSession) -> BoxFuture<'static, RepositoryResult<Session>>;

    /// Sessions newest first, with thread counts
    fn list_sessions(&self) -> BoxFuture<'static, RepositoryResult<Vec<SessionSummary>>>;

    fn get_session(&self, id: i64) -> BoxFuture<'static, RepositoryResult<Option<SessionDetail>>>;

    /// `None` clears the name. Returns whether the session exists.
    fn rename_session(
        &self,
        id: i64,
        name: Option<String>,
    ) -> BoxFuture<'static, RepositoryResult<bool>>;

    fn delete_session(&self, id: i64) -> BoxFuture<'static, RepositoryResult<bool>>;

    fn create_thread(
        &self,
        session_id: i64,
        model_id: &str,
        iteration: Option<u32>,
    ) -> BoxFuture<'static, RepositoryResult<PersistedThread>>;

    fn append_message(
        &self,
        message: NewMessage,
    ) -> BoxFuture<'static, RepositoryResult<PersistedMessage>>;
}
