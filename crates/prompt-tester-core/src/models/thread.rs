use serde::{Deserialize, Serialize};

use super::token_usage::ThreadStats;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One entry of a thread's history, in the shape sent to the provider
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Live state of one model conversation.
///
/// `id` is local to the process. `persisted_id` is set once the thread has a
/// database record; threads without one are never written.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub persisted_id: Option<i64>,
    pub model_id: String,
    pub display_name: String,
    pub messages: Vec<ChatMessage>,
    pub is_loading: bool,
    pub error: Option<String>,
    /// Assistant text received so far for the in-flight turn
    pub streaming: String,
    pub stats: ThreadStats,
}

impl Thread {
    pub fn new(model_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: format!("thread-{}", uuid::Uuid::new_v4()),
            persisted_id: None,
            model_id: model_id.into(),
            display_name: display_name.into(),
            messages: Vec::new(),
            is_loading: false,
            error: None,
            streaming: String::new(),
            stats: ThreadStats::default(),
        }
    }

    /// Number of completed assistant turns
    pub fn assistant_turns(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.role == ChatRole::Assistant)
            .count()
    }

    /// Whether the thread can take another turn
    pub fn is_idle(&self) -> bool {
        !self.is_loading && self.error.is_none()
    }
}
