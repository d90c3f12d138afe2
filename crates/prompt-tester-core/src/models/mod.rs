pub mod catalog;
pub mod credential;
pub mod session;
pub mod thread;
pub mod token_usage;

pub use catalog::{CatalogModel, PromptKind, PromptSnippet, sort_catalog};
pub use credential::{Credential, CredentialRef, MaskedCredential, mask_secret};
pub use session::{
    MessageRole, PersistedMessage, PersistedThread, Session, SessionDetail, SessionMode,
    SessionSummary, ThreadDetail,
};
pub use thread::{ChatMessage, ChatRole, Thread};
pub use token_usage::{SessionTotals, ThreadStats, TokenUsage};
