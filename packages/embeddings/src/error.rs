/// Error types for embedding providers
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Embedding API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Rate limited by embedding API (retry after {0}s)")]
    RateLimited(u64),

    #[error("Embedding API returned no vectors")]
    EmptyResponse,
}

impl EmbeddingError {
    /// Whether a retry of the same request could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited(_) => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, EmbeddingError>;
