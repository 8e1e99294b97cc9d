//! Error types for the dictionary service.

use lexicon_embeddings::EmbeddingError;
use lexicon_index::IndexError;
use thiserror::Error;

/// Result type alias for dictionary operations.
pub type Result<T> = std::result::Result<T, DictionaryError>;

/// Errors surfaced to callers of the dictionary service.
#[derive(Error, Debug)]
pub enum DictionaryError {
    /// Query text or limit failed validation.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Word or definition failed validation.
    #[error("invalid entry: {0}")]
    InvalidEntry(String),

    /// The embedding model is not loaded or did not answer.
    #[error("encoding unavailable: {0}")]
    EncodingUnavailable(String),

    /// The vector store cannot be reached or did not answer.
    #[error("index unavailable: {0}")]
    IndexUnavailable(String),

    /// Vector dimension or collection parameters disagree with the
    /// configuration.
    #[error("index inconsistent: {0}")]
    IndexInconsistent(String),

    /// `initialize` has not completed, or the service was closed.
    #[error("dictionary service not initialized")]
    NotInitialized,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl DictionaryError {
    /// Caller input was rejected. Never worth retrying.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidQuery(_) | Self::InvalidEntry(_))
    }

    /// A dependency is down. The request may succeed later.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::EncodingUnavailable(_) | Self::IndexUnavailable(_) | Self::NotInitialized
        )
    }
}

impl From<EmbeddingError> for DictionaryError {
    fn from(err: EmbeddingError) -> Self {
        match err {
            EmbeddingError::DimensionMismatch { .. } => Self::IndexInconsistent(err.to_string()),
            EmbeddingError::EmptyInput => Self::InvalidQuery(err.to_string()),
            EmbeddingError::Unavailable(detail) | EmbeddingError::NotReady(detail) => {
                Self::EncodingUnavailable(detail)
            }
            other => Self::EncodingUnavailable(other.to_string()),
        }
    }
}

impl From<IndexError> for DictionaryError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::Unavailable(detail) => Self::IndexUnavailable(detail),
            err if err.is_inconsistent() => Self::IndexInconsistent(err.to_string()),
            other => Self::IndexUnavailable(other.to_string()),
        }
    }
}

impl From<toml::de::Error> for DictionaryError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}
