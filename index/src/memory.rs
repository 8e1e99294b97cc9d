//! In-process vector index.

use std::collections::BTreeMap;

use async_trait::async_trait;
use lexicon_embeddings::{cosine_similarity, dot_product, normalize, rank_top_k};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::collection::{CollectionInfo, CollectionParams, CollectionStatus, Distance};
use crate::error::{IndexError, Result};
use crate::point::{Point, ScoredPoint, StoredPoint};
use crate::vector_index::VectorIndex;

/// A collection held in memory.
///
/// Records live in a `BTreeMap` keyed by id behind a read-write lock, so a
/// reader sees either the old or the new version of a record, never a mix.
/// Cosine collections store unit vectors, as Qdrant does.
pub struct MemoryIndex {
    /// Collection name.
    name: String,

    /// `None` until `ensure_collection` runs.
    collection: RwLock<Option<MemoryCollection>>,
}

struct MemoryCollection {
    params: CollectionParams,
    points: BTreeMap<u64, Point>,
}

impl MemoryIndex {
    /// Create an index with no collection yet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collection: RwLock::new(None),
        }
    }

    fn missing(&self) -> IndexError {
        IndexError::CollectionMissing(self.name.clone())
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    fn backend(&self) -> &str {
        "memory"
    }

    fn collection_name(&self) -> &str {
        &self.name
    }

    async fn ensure_collection(&self, params: CollectionParams) -> Result<bool> {
        let mut collection = self.collection.write().await;
        if let Some(existing) = collection.as_ref() {
            params.check_matches(&existing.params, &self.name)?;
            return Ok(false);
        }

        *collection = Some(MemoryCollection {
            params,
            points: BTreeMap::new(),
        });
        info!(
            "Created in-memory collection {} ({} / {})",
            self.name, params.vector_size, params.distance
        );
        Ok(true)
    }

    async fn upsert_batch(&self, mut points: Vec<Point>) -> Result<()> {
        let mut guard = self.collection.write().await;
        let collection = guard.as_mut().ok_or_else(|| self.missing())?;

        for point in &points {
            collection.params.check_vector(&point.vector)?;
        }
        if collection.params.distance == Distance::Cosine {
            for point in &mut points {
                normalize(&mut point.vector);
            }
        }

        let count = points.len();
        for point in points {
            collection.points.insert(point.id, point);
        }
        debug!("Upserted {count} points into {}", self.name);
        Ok(())
    }

    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<ScoredPoint>> {
        let guard = self.collection.read().await;
        let collection = guard.as_ref().ok_or_else(|| self.missing())?;
        collection.params.check_vector(vector)?;

        let candidates = collection
            .points
            .values()
            .map(|p| (p.id, p.vector.as_slice()));
        let ranked = match collection.params.distance {
            Distance::Cosine => rank_top_k(vector, candidates, limit, cosine_similarity),
            Distance::Dot => rank_top_k(vector, candidates, limit, dot_product),
        }
        .map_err(|err| IndexError::InvalidResponse(err.to_string()))?;

        Ok(ranked
            .into_iter()
            .filter_map(|hit| {
                collection.points.get(&hit.id).map(|p| ScoredPoint {
                    id: hit.id,
                    score: hit.score,
                    payload: p.payload.clone(),
                })
            })
            .collect())
    }

    async fn count(&self) -> Result<u64> {
        let guard = self.collection.read().await;
        let collection = guard.as_ref().ok_or_else(|| self.missing())?;
        Ok(collection.points.len() as u64)
    }

    async fn info(&self) -> Result<CollectionInfo> {
        let guard = self.collection.read().await;
        let collection = guard.as_ref().ok_or_else(|| self.missing())?;
        Ok(CollectionInfo {
            name: self.name.clone(),
            record_count: collection.points.len() as u64,
            status: CollectionStatus::Green,
            params: collection.params,
        })
    }

    async fn max_id(&self) -> Result<Option<u64>> {
        let guard = self.collection.read().await;
        let collection = guard.as_ref().ok_or_else(|| self.missing())?;
        Ok(collection.points.keys().next_back().copied())
    }

    async fn points(&self) -> Result<Vec<StoredPoint>> {
        let guard = self.collection.read().await;
        let collection = guard.as_ref().ok_or_else(|| self.missing())?;
        Ok(collection
            .points
            .values()
            .map(|p| StoredPoint {
                id: p.id,
                payload: p.payload.clone(),
            })
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
