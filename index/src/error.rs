//! Error types for the vector index.

use thiserror::Error;

/// Result type alias for index operations.
pub type Result<T> = std::result::Result<T, IndexError>;

/// Errors that can occur in the vector index.
#[derive(Error, Debug)]
pub enum IndexError {
    /// Backing store cannot be reached, timed out, or failed server-side.
    #[error("index unavailable: {0}")]
    Unavailable(String),

    /// A vector does not match the collection's configured size.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    Inconsistent { expected: usize, actual: usize },

    /// The collection exists with parameters other than the requested ones.
    #[error("inconsistent collection configuration: {0}")]
    InconsistentConfig(String),

    /// The collection has not been created.
    #[error("collection not found: {0}")]
    CollectionMissing(String),

    /// The store answered with something we could not interpret.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IndexError {
    /// Whether the error means a configuration problem rather than a
    /// transient outage.
    pub fn is_inconsistent(&self) -> bool {
        matches!(self, Self::Inconsistent { .. } | Self::InconsistentConfig(_))
    }
}
