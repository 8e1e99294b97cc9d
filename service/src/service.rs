//! Dictionary service implementation.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use lexicon_embeddings::{EmbeddingError, Encoder, HashingEncoder, HttpEncoder};
use lexicon_index::{MemoryIndex, Point, QdrantIndex, VectorIndex};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::{DictionaryConfig, EncoderProvider, IndexBackend};
use crate::entry::EntryPayload;
use crate::error::{DictionaryError, Result};
use crate::schema::{
    AddRequest, AddResponse, SearchHit, SearchRequest, SearchResponse, StatisticsResponse,
    StatusResponse,
};

/// Entries re-encoded per batch by [`DictionaryService::reindex`].
const REINDEX_BATCH: usize = 64;

/// Semantic lookup over a word→definition collection.
///
/// This is the only component with business rules. It coordinates:
/// - an [`Encoder`] turning text into vectors
/// - a [`VectorIndex`] storing vectors with their payloads
///
/// Searches run without coordination. Every write path (`initialize`, `add`,
/// `reindex`) goes through one writer lock, which owns the id counter, so id
/// assignment and the matching upsert happen as one step.
pub struct DictionaryService {
    /// Configuration.
    config: DictionaryConfig,

    /// Text encoder.
    encoder: Arc<dyn Encoder>,

    /// Vector store.
    index: Arc<dyn VectorIndex>,

    /// Single-writer guard and id counter.
    writer: Mutex<IdAllocator>,

    /// Set once `initialize` has completed.
    initialized: AtomicBool,

    /// Set by `close`.
    closed: AtomicBool,
}

/// The next id to hand out. Only meaningful after initialization.
#[derive(Debug)]
struct IdAllocator {
    next_id: u64,
}

/// Outcome of [`DictionaryService::initialize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedReport {
    /// The collection did not exist and was created.
    pub created_collection: bool,

    /// Number of seed entries written. Zero when the collection already had
    /// data or the service was already initialized.
    pub seeded: usize,

    /// Id the next `add` will receive.
    pub next_id: u64,
}

impl DictionaryService {
    /// Wire a service from already-built components.
    pub fn new(
        config: DictionaryConfig,
        encoder: Arc<dyn Encoder>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            config,
            encoder,
            index,
            writer: Mutex::new(IdAllocator { next_id: 1 }),
            initialized: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Build the encoder and index described by `config`.
    ///
    /// Neither dependency has to be up. An encoder that fails to initialize or
    /// a Qdrant server that stays unreachable is logged and reported through
    /// [`status`](Self::status), and later calls fail with the matching
    /// unavailable error.
    pub async fn from_config(config: DictionaryConfig) -> Result<Self> {
        config.validate()?;
        info!("Starting dictionary service for collection {}", config.collection);

        let encoder: Arc<dyn Encoder> = match config.encoder.provider {
            EncoderProvider::Http => {
                let mut encoder = HttpEncoder::new(
                    config.encoder.base_url.clone(),
                    config.encoder.model.clone(),
                    config.encoder.dimension,
                    Duration::from_millis(config.encoder.timeout_ms),
                )
                .map_err(|err| DictionaryError::Config(err.to_string()))?;
                if let Some(key) = &config.encoder.api_key {
                    encoder = encoder.with_api_key(key.clone());
                }
                Arc::new(encoder)
            }
            EncoderProvider::Hashing => Arc::new(HashingEncoder::new(config.encoder.dimension)),
        };
        if let Err(err) = encoder.init().await {
            warn!("{} encoder {} is not ready: {err}", encoder.name(), encoder.model());
        }

        let index: Arc<dyn VectorIndex> = match config.index.backend {
            IndexBackend::Qdrant => {
                let index = QdrantIndex::new(config.qdrant_config(), config.collection.clone())?;
                if let Err(err) = index.wait_until_reachable().await {
                    warn!("Continuing without a reachable index: {err}");
                }
                Arc::new(index)
            }
            IndexBackend::Memory => Arc::new(MemoryIndex::new(config.collection.clone())),
        };

        Ok(Self::new(config, encoder, index))
    }

    /// Create the collection and load `seeds` if it is empty.
    ///
    /// Idempotent: a second call in the same process returns immediately, and
    /// a collection that already holds entries is never re-seeded. Holds the
    /// writer lock throughout, so an `add` issued concurrently waits for it.
    pub async fn initialize(&self, seeds: &[(&str, &str)]) -> Result<SeedReport> {
        let mut writer = self.writer.lock().await;
        if self.closed.load(Ordering::Acquire) {
            return Err(DictionaryError::NotInitialized);
        }
        if self.initialized.load(Ordering::Acquire) {
            debug!("Dictionary service already initialized");
            return Ok(SeedReport {
                created_collection: false,
                seeded: 0,
                next_id: writer.next_id,
            });
        }

        let params = self.config.collection_params();
        let created_collection = self
            .bounded_index(self.index.ensure_collection(params))
            .await?;

        let existing = self.bounded_index(self.index.count()).await?;
        let mut seeded = 0;
        if existing == 0 && !seeds.is_empty() {
            seeded = self.write_seeds(seeds).await?;
        } else if existing > 0 {
            info!(
                "Collection {} already holds {existing} entries, skipping seed data",
                self.index.collection_name()
            );
            self.warn_on_stale_embeddings().await?;
        }

        let max_id = self.bounded_index(self.index.max_id()).await?;
        writer.next_id = max_id.map_or(1, |id| id + 1);
        self.initialized.store(true, Ordering::Release);

        info!(
            "Dictionary service initialized (collection {}, next id {})",
            self.index.collection_name(),
            writer.next_id
        );
        Ok(SeedReport {
            created_collection,
            seeded,
            next_id: writer.next_id,
        })
    }

    async fn write_seeds(&self, seeds: &[(&str, &str)]) -> Result<usize> {
        let entries = seeds
            .iter()
            .map(|(word, definition)| AddRequest::new(word, definition))
            .collect::<Result<Vec<_>>>()?;
        self.require_encoder()?;

        let texts: Vec<String> = entries.iter().map(AddRequest::embedding_text).collect();
        let vectors = self
            .bounded_encoder(self.encoder.encode_batch(&texts))
            .await
            .map_err(entry_error)?;

        let model = self.encoder.model();
        let points = entries
            .iter()
            .zip(vectors)
            .zip(1u64..)
            .map(|((entry, vector), id)| {
                let payload = EntryPayload::new(entry.word(), entry.definition(), model);
                Ok(Point::new(id, vector, payload.to_value()?))
            })
            .collect::<Result<Vec<_>>>()?;

        self.bounded_index(self.index.upsert_batch(points)).await?;
        info!("Inserted {} seed entries", entries.len());
        Ok(entries.len())
    }

    async fn warn_on_stale_embeddings(&self) -> Result<()> {
        let model = self.encoder.model();
        let stored = self.bounded_index(self.index.points()).await?;
        let stale = stored
            .into_iter()
            .filter_map(|p| EntryPayload::from_value(p.id, p.payload).ok())
            .filter(|payload| !payload.is_current(model))
            .count();
        if stale > 0 {
            warn!("{stale} entries were embedded by a model other than {model}; run reindex");
        }
        Ok(())
    }

    /// Rank entries by similarity to `text`, best first.
    ///
    /// Results come back in the index's order: descending score, ties by
    /// ascending id. An empty collection yields an empty list.
    pub async fn search(&self, text: &str, limit: usize) -> Result<SearchResponse> {
        self.require_initialized()?;
        let request = SearchRequest::with_max_limit(text, limit, self.config.query.max_limit)?;
        self.search_request(&request).await
    }

    /// [`search`](Self::search) with an already-validated request.
    pub async fn search_request(&self, request: &SearchRequest) -> Result<SearchResponse> {
        self.require_initialized()?;
        if request.limit() > self.config.query.max_limit {
            return Err(DictionaryError::InvalidQuery(format!(
                "limit must be between 1 and {}, got {}",
                self.config.query.max_limit,
                request.limit()
            )));
        }
        self.require_encoder()?;

        debug!("Searching for {:?} (limit {})", request.query(), request.limit());

        let vector = self
            .bounded_encoder(self.encoder.encode(request.query()))
            .await?;
        let hits = self
            .bounded_index(self.index.search(&vector, request.limit()))
            .await?;

        let results = hits
            .into_iter()
            .map(|hit| {
                let payload = EntryPayload::from_value(hit.id, hit.payload)?;
                Ok(SearchHit {
                    word: payload.word,
                    definitions: vec![payload.definition],
                    score: hit.score,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(SearchResponse {
            query: request.query().to_string(),
            results,
        })
    }

    /// Search with the configured default limit.
    pub async fn search_default(&self, text: &str) -> Result<SearchResponse> {
        self.search(text, self.config.query.default_limit).await
    }

    /// Insert a new entry and return the id it was stored under.
    ///
    /// Duplicate words are allowed; each call creates a new entry. The id is
    /// only consumed when the upsert succeeds.
    pub async fn add(&self, word: &str, definition: &str) -> Result<AddResponse> {
        let request = AddRequest::new(word, definition)?;
        self.add_request(&request).await
    }

    /// [`add`](Self::add) with an already-validated request.
    pub async fn add_request(&self, request: &AddRequest) -> Result<AddResponse> {
        self.require_initialized()?;
        self.require_encoder()?;

        let mut writer = self.writer.lock().await;
        if self.closed.load(Ordering::Acquire) {
            return Err(DictionaryError::NotInitialized);
        }
        let id = writer.next_id;

        let vector = self
            .bounded_encoder(self.encoder.encode(&request.embedding_text()))
            .await
            .map_err(entry_error)?;
        let payload = EntryPayload::new(request.word(), request.definition(), self.encoder.model());
        self.bounded_index(
            self.index
                .upsert(Point::new(id, vector, payload.to_value()?)),
        )
        .await?;

        writer.next_id = id + 1;
        info!("Added {:?} with id {id}", request.word());

        Ok(AddResponse {
            message: "word added".to_string(),
            word: request.word().to_string(),
            definition: request.definition().to_string(),
            id,
        })
    }

    /// Encoder readiness and index reachability, probed independently.
    pub async fn status(&self) -> StatusResponse {
        let encoder_ready = self.encoder.ready();
        let index_reachable = match self.bounded_index(self.index.ping()).await {
            Ok(()) => true,
            Err(err) => {
                warn!("Index {} unreachable: {err}", self.index.backend());
                false
            }
        };
        let initialized =
            self.initialized.load(Ordering::Acquire) && !self.closed.load(Ordering::Acquire);

        StatusResponse {
            status: if encoder_ready && index_reachable {
                "ok".to_string()
            } else {
                "degraded".to_string()
            },
            encoder_ready,
            index_reachable,
            initialized,
            model: self.encoder.model().to_string(),
            backend: self.index.backend().to_string(),
        }
    }

    /// Record count and collection parameters.
    pub async fn statistics(&self) -> Result<StatisticsResponse> {
        self.require_initialized()?;
        let info = self.bounded_index(self.index.info()).await?;
        Ok(StatisticsResponse {
            collection: info.name,
            record_count: info.record_count,
            vector_size: info.params.vector_size,
            distance: info.params.distance.to_string(),
            index_status: info.status.as_str().to_string(),
        })
    }

    /// Re-encode every stored entry with the current encoder.
    ///
    /// Needed after a model change. Runs under the writer lock; searches keep
    /// working and see each record either before or after its rewrite.
    pub async fn reindex(&self) -> Result<usize> {
        self.require_initialized()?;
        self.require_encoder()?;
        let _writer = self.writer.lock().await;

        let stored = self.bounded_index(self.index.points()).await?;
        let model = self.encoder.model();
        let total = stored.len();
        info!("Re-encoding {total} entries with {model}");

        let mut entries = Vec::with_capacity(total);
        for point in stored {
            let payload = EntryPayload::from_value(point.id, point.payload)?;
            entries.push((point.id, payload));
        }

        for batch in entries.chunks(REINDEX_BATCH) {
            let texts = batch
                .iter()
                .map(|(_, payload)| {
                    AddRequest::new(&payload.word, &payload.definition)
                        .map(|request| request.embedding_text())
                })
                .collect::<Result<Vec<_>>>()?;
            let vectors = self
                .bounded_encoder(self.encoder.encode_batch(&texts))
                .await
                .map_err(entry_error)?;

            let points = batch
                .iter()
                .zip(vectors)
                .map(|((id, payload), vector)| {
                    let payload = EntryPayload::new(&payload.word, &payload.definition, model);
                    Ok(Point::new(*id, vector, payload.to_value()?))
                })
                .collect::<Result<Vec<_>>>()?;
            self.bounded_index(self.index.upsert_batch(points)).await?;
            debug!("Re-encoded batch of {}", batch.len());
        }

        info!("Reindex complete: {total} entries");
        Ok(total)
    }

    /// Stop accepting traffic and release the encoder. Waits for an
    /// in-flight write to finish.
    pub async fn close(&self) {
        let _writer = self.writer.lock().await;
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.encoder.close().await;
        info!("Dictionary service closed");
    }

    /// The active configuration.
    pub fn config(&self) -> &DictionaryConfig {
        &self.config
    }

    fn require_initialized(&self) -> Result<()> {
        if !self.initialized.load(Ordering::Acquire) || self.closed.load(Ordering::Acquire) {
            return Err(DictionaryError::NotInitialized);
        }
        Ok(())
    }

    fn require_encoder(&self) -> Result<()> {
        if !self.encoder.ready() {
            return Err(EmbeddingError::NotReady(format!(
                "{} model {} is not loaded",
                self.encoder.name(),
                self.encoder.model()
            ))
            .into());
        }
        Ok(())
    }

    async fn bounded_encoder<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = lexicon_embeddings::Result<T>>,
    {
        let timeout = self.config.operation_timeout();
        match tokio::time::timeout(timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(DictionaryError::EncodingUnavailable(format!(
                "encoder did not answer within {timeout:?}"
            ))),
        }
    }

    async fn bounded_index<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = lexicon_index::Result<T>>,
    {
        let timeout = self.config.operation_timeout();
        match tokio::time::timeout(timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(DictionaryError::IndexUnavailable(format!(
                "index did not answer within {timeout:?}"
            ))),
        }
    }
}

/// Text the encoder refuses while writing is a bad entry, not a bad query.
fn entry_error(err: DictionaryError) -> DictionaryError {
    match err {
        DictionaryError::InvalidQuery(detail) => DictionaryError::InvalidEntry(detail),
        other => other,
    }
}
