//! # Embeddings
//!
//! Text encoders and similarity math for the semantic dictionary.
//!
//! ## Features
//!
//! - **Encoders**: turn text into dense vectors in one shared space
//! - **HTTP encoder**: any OpenAI-compatible `/embeddings` server
//! - **Hashing encoder**: deterministic local fallback with no model download
//! - **Similarity**: cosine and dot scoring with deterministic ranking
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                     Embeddings                        │
//! ├──────────────────────────────────────────────────────┤
//! │  text ──► Encoder ──► Embedding ──► similarity       │
//! │              │                                        │
//! │              ▼                                        │
//! │     HttpEncoder / HashingEncoder                      │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod encoder;
pub mod error;
pub mod hashing;
pub mod similarity;

pub use encoder::{Encoder, HttpEncoder};
pub use error::{EmbeddingError, Result};
pub use hashing::{HASHING_MODEL, HashingEncoder};
pub use similarity::{
    SimilarityResult, cosine_similarity, dot_product, normalize, rank_key, rank_top_k, sort_ranked,
};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;

/// Dimension of `paraphrase-multilingual-MiniLM-L12-v2`.
pub const DEFAULT_DIMENSION: usize = 384;

/// Multilingual sentence-transformers model the dictionary was built around.
pub const DEFAULT_MODEL: &str = "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2";
