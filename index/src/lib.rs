//! # Index
//!
//! The persistence boundary of the semantic dictionary: one named collection
//! of `(vector, payload)` records with upsert-by-id and nearest-neighbour
//! search.
//!
//! ## Backends
//!
//! - [`MemoryIndex`]: in-process, for tests and offline use
//! - [`QdrantIndex`]: a Qdrant server over its REST API
//!
//! ```rust,ignore
//! use lexicon_index::{CollectionParams, Distance, MemoryIndex, VectorIndex};
//!
//! let index = MemoryIndex::new("dicionario_pt");
//! index.ensure_collection(CollectionParams::new(384, Distance::Cosine)).await?;
//! let hits = index.search(&query_vector, 5).await?;
//! ```

pub mod collection;
pub mod error;
pub mod memory;
pub mod point;
pub mod qdrant;
pub mod vector_index;

pub use collection::{CollectionInfo, CollectionParams, CollectionStatus, Distance};
pub use error::{IndexError, Result};
pub use memory::MemoryIndex;
pub use point::{Point, ScoredPoint, StoredPoint};
pub use qdrant::{QdrantConfig, QdrantIndex};
pub use vector_index::VectorIndex;
