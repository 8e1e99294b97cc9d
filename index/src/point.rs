//! Records stored in and returned by the index.

use lexicon_embeddings::Embedding;
use serde::{Deserialize, Serialize};

/// A record to upsert: id, vector, and opaque JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Unique identifier within the collection.
    pub id: u64,

    /// The vector.
    pub vector: Embedding,

    /// Associated payload.
    pub payload: serde_json::Value,
}

impl Point {
    pub fn new(id: u64, vector: Embedding, payload: serde_json::Value) -> Self {
        Self {
            id,
            vector,
            payload,
        }
    }
}

/// A search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub id: u64,

    /// Similarity to the query, higher is closer.
    pub score: f32,

    pub payload: serde_json::Value,
}

/// A stored record without its vector, as returned by a scroll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPoint {
    pub id: u64,
    pub payload: serde_json::Value,
}
