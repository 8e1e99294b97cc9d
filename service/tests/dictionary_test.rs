//! End-to-end behaviour of the dictionary service over the in-memory index.
//!
//! Covers seeding, ranking, id assignment under concurrency, and how
//! dependency outages surface to callers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lexicon_embeddings::{Embedding, EmbeddingError};
use lexicon_index::{
    CollectionInfo, CollectionParams, IndexError, Point, QdrantConfig, ScoredPoint, StoredPoint,
};
use lexicon_service::{
    DictionaryConfig, DictionaryError, DictionaryService, Encoder, EncoderProvider, EntryPayload,
    HashingEncoder, IndexBackend, MemoryIndex, QdrantIndex, SEED_ENTRIES, VectorIndex,
};
use pretty_assertions::assert_eq;

const DIMENSION: usize = 128;

fn config() -> DictionaryConfig {
    let mut config = DictionaryConfig::default();
    config.encoder.dimension = DIMENSION;
    config
}

fn hashing() -> Arc<HashingEncoder> {
    Arc::new(HashingEncoder::new(DIMENSION))
}

async fn seeded(index: Arc<MemoryIndex>) -> DictionaryService {
    let service = DictionaryService::new(config(), hashing(), index);
    service.initialize(SEED_ENTRIES).await.unwrap();
    service
}

/// Hashing encoder that can be switched into failure or stall modes, and
/// can report a different model name.
struct ControlledEncoder {
    inner: HashingEncoder,
    model: String,
    ready: AtomicBool,
    failing: AtomicBool,
    refuse_input: AtomicBool,
    stall: Option<Duration>,
}

impl ControlledEncoder {
    fn new(model: &str) -> Self {
        Self {
            inner: HashingEncoder::new(DIMENSION),
            model: model.to_string(),
            ready: AtomicBool::new(true),
            failing: AtomicBool::new(false),
            refuse_input: AtomicBool::new(false),
            stall: None,
        }
    }
}

#[async_trait]
impl Encoder for ControlledEncoder {
    fn name(&self) -> &str {
        "controlled"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        DIMENSION
    }

    async fn init(&self) -> lexicon_embeddings::Result<()> {
        Ok(())
    }

    fn ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn encode(&self, text: &str) -> lexicon_embeddings::Result<Embedding> {
        if let Some(stall) = self.stall {
            tokio::time::sleep(stall).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(EmbeddingError::Unavailable("model crashed".to_string()));
        }
        if self.refuse_input.load(Ordering::SeqCst) {
            return Err(EmbeddingError::EmptyInput);
        }
        self.inner.encode_text(text)
    }
}

/// In-memory index that can be taken offline.
struct SwitchableIndex {
    inner: MemoryIndex,
    down: AtomicBool,
}

impl SwitchableIndex {
    fn new() -> Self {
        Self {
            inner: MemoryIndex::new("dicionario_pt"),
            down: AtomicBool::new(false),
        }
    }

    fn check(&self) -> lexicon_index::Result<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(IndexError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for SwitchableIndex {
    fn backend(&self) -> &str {
        "switchable"
    }

    fn collection_name(&self) -> &str {
        self.inner.collection_name()
    }

    async fn ensure_collection(&self, params: CollectionParams) -> lexicon_index::Result<bool> {
        self.check()?;
        self.inner.ensure_collection(params).await
    }

    async fn upsert_batch(&self, points: Vec<Point>) -> lexicon_index::Result<()> {
        self.check()?;
        self.inner.upsert_batch(points).await
    }

    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
    ) -> lexicon_index::Result<Vec<ScoredPoint>> {
        self.check()?;
        self.inner.search(vector, limit).await
    }

    async fn count(&self) -> lexicon_index::Result<u64> {
        self.check()?;
        self.inner.count().await
    }

    async fn info(&self) -> lexicon_index::Result<CollectionInfo> {
        self.check()?;
        self.inner.info().await
    }

    async fn max_id(&self) -> lexicon_index::Result<Option<u64>> {
        self.check()?;
        self.inner.max_id().await
    }

    async fn points(&self) -> lexicon_index::Result<Vec<StoredPoint>> {
        self.check()?;
        self.inner.points().await
    }

    async fn ping(&self) -> lexicon_index::Result<()> {
        self.check()
    }
}

#[tokio::test]
async fn test_search_ranks_related_entries_first() {
    let service = seeded(Arc::new(MemoryIndex::new("dicionario_pt"))).await;

    let response = service.search("fruta tropical", 3).await.unwrap();
    assert_eq!(response.results.len(), 3);
    for hit in &response.results {
        assert!(
            hit.definitions[0].contains("fruta"),
            "unexpected hit {}",
            hit.word
        );
    }
    for pair in response.results.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[tokio::test]
async fn test_search_is_deterministic() {
    let service = seeded(Arc::new(MemoryIndex::new("dicionario_pt"))).await;

    let first = service.search("local onde alguém mora", 10).await.unwrap();
    let second = service.search("local onde alguém mora", 10).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_duplicate_entries_score_equally() {
    let index = Arc::new(MemoryIndex::new("dicionario_pt"));
    let service = DictionaryService::new(config(), hashing(), index);
    service.initialize(&[]).await.unwrap();

    for word in ["lar", "lar", "lar"] {
        service.add(word, "local onde alguém mora").await.unwrap();
    }

    let response = service.search("lar: local onde alguém mora", 3).await.unwrap();
    let scores: Vec<f32> = response.results.iter().map(|hit| hit.score).collect();
    assert_eq!(scores[0], scores[1]);
    assert_eq!(scores[1], scores[2]);
}

#[tokio::test]
async fn test_added_entry_is_found_by_its_meaning() {
    let service = seeded(Arc::new(MemoryIndex::new("dicionario_pt"))).await;

    let added = service
        .add("cachorro", "animal doméstico que late")
        .await
        .unwrap();
    assert_eq!(added.id, 13);

    let response = service.search("animal que late", 5).await.unwrap();
    assert_eq!(response.results[0].word, "cachorro");
    assert!(response.results[0].score > 0.5);
    assert_eq!(
        response.results[0].definitions,
        vec!["animal doméstico que late"]
    );
}

#[tokio::test]
async fn test_initialize_is_idempotent_across_restarts() {
    let index = Arc::new(MemoryIndex::new("dicionario_pt"));

    let first = seeded(index.clone()).await;
    first.add("cachorro", "animal doméstico que late").await.unwrap();
    let report = first.initialize(SEED_ENTRIES).await.unwrap();
    assert_eq!(report.seeded, 0);
    first.close().await;

    let restarted = DictionaryService::new(config(), hashing(), index.clone());
    let report = restarted.initialize(SEED_ENTRIES).await.unwrap();
    assert!(!report.created_collection);
    assert_eq!(report.seeded, 0);
    assert_eq!(report.next_id, 14);
    assert_eq!(index.count().await.unwrap(), 13);

    let added = restarted.add("gato", "felino doméstico").await.unwrap();
    assert_eq!(added.id, 14);
}

#[tokio::test]
async fn test_concurrent_adds_get_distinct_contiguous_ids() {
    let service = Arc::new(seeded(Arc::new(MemoryIndex::new("dicionario_pt"))).await);

    let handles: Vec<_> = (0..16)
        .map(|n| {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .add(&format!("palavra{n}"), "definição de teste")
                    .await
            })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap().id);
    }
    ids.sort_unstable();

    assert_eq!(ids, (13..29).collect::<Vec<u64>>());
    assert_eq!(service.statistics().await.unwrap().record_count, 28);
}

#[tokio::test]
async fn test_empty_collection_returns_no_results() {
    let service = DictionaryService::new(config(), hashing(), Arc::new(MemoryIndex::new("vazio")));
    let report = service.initialize(&[]).await.unwrap();
    assert_eq!(report.seeded, 0);
    assert_eq!(report.next_id, 1);

    let response = service.search("qualquer coisa", 5).await.unwrap();
    assert!(response.results.is_empty());
}

#[tokio::test]
async fn test_validation_boundaries() {
    let service = seeded(Arc::new(MemoryIndex::new("dicionario_pt"))).await;

    assert!(service.search(&"a".repeat(200), 1).await.is_ok());
    assert!(service.search(&"a".repeat(201), 1).await.is_err());
    assert!(service.search("casa", 50).await.is_ok());
    let err = service.search("casa", 0).await.unwrap_err();
    assert!(err.is_client_error());

    let err = service.add("", "definição").await.unwrap_err();
    assert!(matches!(err, DictionaryError::InvalidEntry(_)));
    let err = service.add("palavra", &"d".repeat(501)).await.unwrap_err();
    assert!(matches!(err, DictionaryError::InvalidEntry(_)));
}

#[tokio::test]
async fn test_symbol_only_text_is_valid_input() {
    let index = Arc::new(MemoryIndex::new("dicionario_pt"));
    let service = seeded(index.clone()).await;

    let response = service.search("?!", 5).await.unwrap();
    assert_eq!(response.query, "?!");
    assert_eq!(response.results.len(), 5);

    let added = service.add("🐶", "❤️").await.unwrap();
    assert_eq!(added.id, 13);
    assert_eq!(index.count().await.unwrap(), 13);
}

#[tokio::test]
async fn test_unencodable_entry_is_an_entry_error() {
    let index = Arc::new(MemoryIndex::new("dicionario_pt"));
    let encoder = Arc::new(ControlledEncoder::new("controlled-v1"));
    let service = DictionaryService::new(config(), encoder.clone(), index.clone());
    service.initialize(SEED_ENTRIES).await.unwrap();

    encoder.refuse_input.store(true, Ordering::SeqCst);
    let err = service.add("gato", "felino doméstico").await.unwrap_err();
    assert!(matches!(err, DictionaryError::InvalidEntry(_)));
    assert!(err.is_client_error());
    assert_eq!(index.count().await.unwrap(), 12);

    let err = service.search("gato", 5).await.unwrap_err();
    assert!(matches!(err, DictionaryError::InvalidQuery(_)));
}

#[tokio::test]
async fn test_encoder_failure_writes_nothing() {
    let index = Arc::new(MemoryIndex::new("dicionario_pt"));
    let encoder = Arc::new(ControlledEncoder::new("controlled-v1"));
    let service = DictionaryService::new(config(), encoder.clone(), index.clone());
    service.initialize(SEED_ENTRIES).await.unwrap();

    encoder.failing.store(true, Ordering::SeqCst);
    let err = service.add("gato", "felino doméstico").await.unwrap_err();
    assert!(matches!(err, DictionaryError::EncodingUnavailable(_)));
    assert_eq!(index.count().await.unwrap(), 12);

    encoder.failing.store(false, Ordering::SeqCst);
    let added = service.add("gato", "felino doméstico").await.unwrap();
    assert_eq!(added.id, 13);
}

#[tokio::test]
async fn test_unready_encoder_is_reported_and_rejected() {
    let encoder = Arc::new(ControlledEncoder::new("controlled-v1"));
    let service = DictionaryService::new(
        config(),
        encoder.clone(),
        Arc::new(MemoryIndex::new("dicionario_pt")),
    );
    service.initialize(SEED_ENTRIES).await.unwrap();

    encoder.ready.store(false, Ordering::SeqCst);
    let status = service.status().await;
    assert_eq!(status.status, "degraded");
    assert!(!status.encoder_ready);
    assert!(status.index_reachable);

    let err = service.search("casa", 5).await.unwrap_err();
    assert!(matches!(err, DictionaryError::EncodingUnavailable(_)));
    assert!(err.is_unavailable());
}

#[tokio::test]
async fn test_slow_encoder_times_out() {
    let mut config = config();
    config.service.operation_timeout_ms = 20;
    let mut encoder = ControlledEncoder::new("controlled-v1");
    encoder.stall = Some(Duration::from_secs(2));

    let service = DictionaryService::new(
        config,
        Arc::new(encoder),
        Arc::new(MemoryIndex::new("dicionario_pt")),
    );
    service.initialize(&[]).await.unwrap();

    let err = service.search("casa", 5).await.unwrap_err();
    assert!(matches!(err, DictionaryError::EncodingUnavailable(_)));
}

#[tokio::test]
async fn test_unreachable_index_is_reported() {
    let qdrant = QdrantConfig {
        url: "http://127.0.0.1:1".to_string(),
        timeout: Duration::from_millis(500),
        connect_attempts: 1,
        ..QdrantConfig::default()
    };
    let index = Arc::new(QdrantIndex::new(qdrant, "dicionario_pt").unwrap());
    let service = DictionaryService::new(config(), hashing(), index);

    let status = service.status().await;
    assert!(status.encoder_ready);
    assert!(!status.index_reachable);
    assert_eq!(status.status, "degraded");

    let err = service.initialize(SEED_ENTRIES).await.unwrap_err();
    assert!(matches!(err, DictionaryError::IndexUnavailable(_)));
}

#[tokio::test]
async fn test_service_starts_with_qdrant_down() {
    let mut config = config();
    config.encoder.provider = EncoderProvider::Hashing;
    config.index.backend = IndexBackend::Qdrant;
    config.index.url = "http://127.0.0.1:1".to_string();
    config.index.timeout_ms = 500;
    config.index.connect_attempts = 2;
    config.index.connect_backoff_ms = 10;

    let service = DictionaryService::from_config(config).await.unwrap();
    let status = service.status().await;
    assert_eq!(status.status, "degraded");
    assert!(status.encoder_ready);
    assert!(!status.index_reachable);
    assert!(!status.initialized);

    let err = service.initialize(SEED_ENTRIES).await.unwrap_err();
    assert!(matches!(err, DictionaryError::IndexUnavailable(_)));
    assert!(matches!(
        service.search("casa", 5).await,
        Err(DictionaryError::NotInitialized)
    ));
}

#[tokio::test]
async fn test_index_outage_after_startup_fails_requests() {
    let index = Arc::new(SwitchableIndex::new());
    let service = DictionaryService::new(config(), hashing(), index.clone());
    service.initialize(SEED_ENTRIES).await.unwrap();

    index.down.store(true, Ordering::SeqCst);
    assert!(!service.status().await.index_reachable);

    let err = service.search("casa", 5).await.unwrap_err();
    assert!(matches!(err, DictionaryError::IndexUnavailable(_)));
    let err = service.add("gato", "felino doméstico").await.unwrap_err();
    assert!(matches!(err, DictionaryError::IndexUnavailable(_)));

    // The failed add must not consume an id.
    index.down.store(false, Ordering::SeqCst);
    let added = service.add("gato", "felino doméstico").await.unwrap();
    assert_eq!(added.id, 13);
}

#[tokio::test]
async fn test_reindex_refreshes_stale_entries() {
    let index = Arc::new(MemoryIndex::new("dicionario_pt"));
    seeded(index.clone()).await.close().await;

    let upgraded = DictionaryService::new(
        config(),
        Arc::new(ControlledEncoder::new("controlled-v2")),
        index.clone(),
    );
    upgraded.initialize(SEED_ENTRIES).await.unwrap();
    assert_eq!(upgraded.reindex().await.unwrap(), 12);

    for point in index.points().await.unwrap() {
        let payload = EntryPayload::from_value(point.id, point.payload).unwrap();
        assert!(payload.is_current("controlled-v2"), "stale entry {}", point.id);
    }
    assert_eq!(index.count().await.unwrap(), 12);
}

#[tokio::test]
async fn test_dimension_change_is_inconsistent() {
    let index = Arc::new(MemoryIndex::new("dicionario_pt"));
    seeded(index.clone()).await;

    let mut wider = config();
    wider.encoder.dimension = DIMENSION * 2;
    let service = DictionaryService::new(
        wider,
        Arc::new(HashingEncoder::new(DIMENSION * 2)),
        index,
    );
    let err = service.initialize(SEED_ENTRIES).await.unwrap_err();
    assert!(matches!(err, DictionaryError::IndexInconsistent(_)));
}
