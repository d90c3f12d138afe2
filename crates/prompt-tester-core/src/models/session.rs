use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a submission fans out
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// The same model called N times
    #[default]
    SingleRepeat,
    /// Several models called once each
    MultiModel,
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::SingleRepeat => "single_repeat",
            SessionMode::MultiModel => "multi_model",
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single_repeat" => Ok(SessionMode::SingleRepeat),
            "multi_model" => Ok(SessionMode::MultiModel),
            other => Err(format!("unknown session mode '{}'", other)),
        }
    }
}

/// Role of a persisted message. System prompts live on the session, never
/// as message rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("unknown message role '{}'", other)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub name: Option<String>,
    /// Weak reference: the credential may have been deleted since
    pub credential_id: Option<i64>,
    pub system_prompt: Option<String>,
    pub mode: SessionMode,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn title(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("Session {}", self.id))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersistedThread {
    pub id: i64,
    pub session_id: i64,
    pub model_id: String,
    /// Only set in `single_repeat` mode
    pub iteration: Option<u32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersistedMessage {
    pub id: i64,
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

/// A thread with its messages, as returned by `SessionRepository::get_session`.
/// Message order is whatever the store returned.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThreadDetail {
    pub thread: PersistedThread,
    pub messages: Vec<PersistedMessage>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionDetail {
    pub session: Session,
    pub threads: Vec<ThreadDetail>,
}

/// Lightweight session row for listings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session: Session,
    pub thread_count: usize,
}
