//! # Dictionary Service
//!
//! Semantic lookup over a Portuguese word→definition collection. Callers
//! describe a meaning in free text and get back the closest headwords.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  DictionaryService                       │
//! ├─────────────────────────────────────────────────────────┤
//! │                                                          │
//! │  search ──► SearchRequest ──► Encoder ──► VectorIndex    │
//! │                                              │           │
//! │  add ──► AddRequest ──► writer lock ─────────┘           │
//! │                          (id counter)                    │
//! │                                                          │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lexicon_service::{DictionaryConfig, DictionaryService, SEED_ENTRIES};
//!
//! let service = DictionaryService::from_config(DictionaryConfig::default()).await?;
//! service.initialize(SEED_ENTRIES).await?;
//!
//! let hits = service.search("local onde alguém vive", 5).await?;
//! let added = service.add("cachorro", "animal doméstico que late").await?;
//! ```

pub mod config;
pub mod entry;
pub mod error;
pub mod schema;
pub mod seed;
pub mod service;

pub use config::{
    DictionaryConfig, EncoderConfig, EncoderProvider, IndexBackend, IndexConfig, QueryConfig,
    ServiceConfig,
};
pub use entry::EntryPayload;
pub use error::{DictionaryError, Result};
pub use schema::{
    AddRequest, AddResponse, SearchHit, SearchRequest, SearchResponse, StatisticsResponse,
    StatusResponse,
};
pub use seed::SEED_ENTRIES;
pub use service::{DictionaryService, SeedReport};

// Re-export the component contracts so callers can plug in their own.
pub use lexicon_embeddings::{Encoder, HashingEncoder, HttpEncoder};
pub use lexicon_index::{CollectionParams, Distance, MemoryIndex, QdrantIndex, VectorIndex};
