//! The index contract shared by every backend.

use async_trait::async_trait;

use crate::collection::{CollectionInfo, CollectionParams};
use crate::error::Result;
use crate::point::{Point, ScoredPoint, StoredPoint};

/// A single named collection of `(vector, payload)` records.
///
/// Every write is validated against the collection's vector size before it
/// reaches the store. Reads never mutate state.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Name of the backend, for logs and status output.
    fn backend(&self) -> &str;

    /// Name of the collection this index manages.
    fn collection_name(&self) -> &str;

    /// Create the collection if it does not exist. Returns `true` when it was
    /// created by this call.
    async fn ensure_collection(&self, params: CollectionParams) -> Result<bool>;

    /// Insert or replace the record with `point.id`.
    async fn upsert(&self, point: Point) -> Result<()> {
        self.upsert_batch(vec![point]).await
    }

    /// Insert or replace several records. Either every vector passes
    /// validation and all are written, or none are.
    async fn upsert_batch(&self, points: Vec<Point>) -> Result<()>;

    /// Up to `limit` nearest records, descending score, ties by ascending id.
    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<ScoredPoint>>;

    /// Number of stored records.
    async fn count(&self) -> Result<u64>;

    /// Collection snapshot.
    async fn info(&self) -> Result<CollectionInfo>;

    /// Highest stored id, `None` when empty.
    async fn max_id(&self) -> Result<Option<u64>>;

    /// Every stored record in ascending id order, without vectors.
    async fn points(&self) -> Result<Vec<StoredPoint>>;

    /// Reachability probe.
    async fn ping(&self) -> Result<()>;
}
