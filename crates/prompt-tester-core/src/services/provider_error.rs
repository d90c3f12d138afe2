use thiserror::Error;

/// Failure of one model request. Scoped to a single thread.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("{0}")]
    Upstream(String),

    #[error("model returned an empty response")]
    EmptyResponse,

    #[error("request cancelled")]
    Cancelled,

    #[error("stream exceeded {0}s")]
    TimedOut(u64),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        ProviderError::Transport(e.to_string())
    }
}
