//! Error types for the encoders.

use thiserror::Error;

/// Result type alias for encoder operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Errors that can occur while turning text into vectors.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// The model could not be reached or loaded.
    #[error("encoder unavailable: {0}")]
    Unavailable(String),

    /// The encoder has not completed `init`.
    #[error("encoder not ready: {0}")]
    NotReady(String),

    /// Invalid response from the model server.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Dimension mismatch.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Nothing to encode.
    #[error("cannot encode empty text")]
    EmptyInput,

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}
