use thiserror::Error;

use crate::repositories::RepositoryError;

/// Errors that abort a whole engine operation. Per-thread model failures are
/// recorded on the thread instead.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("prompt is empty")]
    EmptyPrompt,

    #[error("no model selected")]
    NoModelSelected,

    #[error("repeat count must be between 1 and {max}, got {got}")]
    InvalidRepeatCount { got: u32, max: u32 },

    #[error("credential {0} not found")]
    CredentialNotFound(i64),

    #[error("no default credential configured")]
    NoDefaultCredential,

    #[error("failed to read credentials: {0}")]
    CredentialStore(#[source] RepositoryError),

    #[error("failed to create session: {0}")]
    SessionCreation(#[source] RepositoryError),

    #[error("session {0} not found")]
    SessionNotFound(i64),

    #[error("thread {0} not found")]
    ThreadNotFound(String),

    #[error("thread {0} already has a request in flight")]
    ThreadBusy(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
