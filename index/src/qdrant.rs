//! Qdrant REST adapter.
//!
//! Talks to a Qdrant server over its HTTP API. Every request carries the
//! client timeout, so an unreachable server surfaces as
//! [`IndexError::Unavailable`] instead of hanging.

use std::time::Duration;

use async_trait::async_trait;
use lexicon_embeddings::rank_key;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::collection::{CollectionInfo, CollectionParams, CollectionStatus, Distance};
use crate::error::{IndexError, Result};
use crate::point::{Point, ScoredPoint, StoredPoint};
use crate::vector_index::VectorIndex;

/// Page size used when scrolling through a collection.
const SCROLL_PAGE: usize = 256;

/// Connection settings for [`QdrantIndex`].
#[derive(Debug, Clone)]
pub struct QdrantConfig {
    /// Base URL, e.g. `http://localhost:6333`.
    pub url: String,

    /// Sent as the `api-key` header when set.
    pub api_key: Option<String>,

    /// Per-request timeout.
    pub timeout: Duration,

    /// Ping attempts made by [`QdrantIndex::connect`].
    pub connect_attempts: u32,

    /// Pause between ping attempts.
    pub connect_backoff: Duration,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6333".to_string(),
            api_key: None,
            timeout: Duration::from_secs(10),
            connect_attempts: 30,
            connect_backoff: Duration::from_secs(2),
        }
    }
}

/// A collection stored in Qdrant.
pub struct QdrantIndex {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    collection: String,
    connect_attempts: u32,
    connect_backoff: Duration,

    /// Parameters of the remote collection, fetched once.
    params: OnceCell<CollectionParams>,
}

impl QdrantIndex {
    /// Build the client without contacting the server.
    pub fn new(config: QdrantConfig, collection: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| IndexError::Unavailable(format!("http client: {err}")))?;
        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            collection: collection.into(),
            connect_attempts: config.connect_attempts.max(1),
            connect_backoff: config.connect_backoff,
            params: OnceCell::new(),
        })
    }

    /// Build the client and wait until the server answers.
    pub async fn connect(config: QdrantConfig, collection: impl Into<String>) -> Result<Self> {
        let index = Self::new(config, collection)?;
        index.wait_until_reachable().await?;
        Ok(index)
    }

    /// Ping until the server answers or the attempts run out.
    pub async fn wait_until_reachable(&self) -> Result<()> {
        let mut attempt = 1;
        loop {
            match self.ping().await {
                Ok(()) => {
                    info!("Connected to Qdrant at {}", self.base_url);
                    return Ok(());
                }
                Err(err) if attempt < self.connect_attempts => {
                    warn!(
                        "Waiting for Qdrant at {} (attempt {attempt}/{}): {err}",
                        self.base_url, self.connect_attempts
                    );
                    attempt += 1;
                    tokio::time::sleep(self.connect_backoff).await;
                }
                Err(IndexError::Unavailable(detail)) => {
                    return Err(IndexError::Unavailable(format!(
                        "gave up after {} attempts: {detail}",
                        self.connect_attempts
                    )));
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!("{}/collections/{}{suffix}", self.base_url, self.collection)
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    /// Send a request and unwrap Qdrant's `{ "result": ... }` envelope.
    async fn call<T: DeserializeOwned>(&self, builder: reqwest::RequestBuilder) -> Result<T> {
        let response = builder
            .send()
            .await
            .map_err(|err| IndexError::Unavailable(format!("{}: {err}", self.base_url)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(IndexError::CollectionMissing(self.collection.clone()));
        }
        if status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(IndexError::Unavailable(format!(
                "Qdrant returned {status}: {body}"
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IndexError::InvalidResponse(format!(
                "Qdrant returned {status}: {body}"
            )));
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|err| IndexError::InvalidResponse(err.to_string()))?;
        Ok(envelope.result)
    }

    async fn fetch_info(&self) -> Result<CollectionInfo> {
        let raw: RawCollectionInfo = self
            .call(self.request(reqwest::Method::GET, self.collection_url("")))
            .await?;
        raw.into_info(&self.collection)
    }

    /// Remote collection parameters, cached after the first fetch.
    async fn params(&self) -> Result<CollectionParams> {
        self.params
            .get_or_try_init(|| async { Ok::<_, IndexError>(self.fetch_info().await?.params) })
            .await
            .copied()
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    fn backend(&self) -> &str {
        "qdrant"
    }

    fn collection_name(&self) -> &str {
        &self.collection
    }

    async fn ensure_collection(&self, params: CollectionParams) -> Result<bool> {
        match self.fetch_info().await {
            Ok(info) => {
                params.check_matches(&info.params, &self.collection)?;
                let _ = self.params.set(info.params);
                debug!("Collection {} already exists", self.collection);
                Ok(false)
            }
            Err(IndexError::CollectionMissing(_)) => {
                let body = json!({
                    "vectors": {
                        "size": params.vector_size,
                        "distance": params.distance,
                    }
                });
                let _: serde_json::Value = self
                    .call(
                        self.request(reqwest::Method::PUT, self.collection_url(""))
                            .json(&body),
                    )
                    .await?;
                let _ = self.params.set(params);
                info!(
                    "Created Qdrant collection {} ({} / {})",
                    self.collection, params.vector_size, params.distance
                );
                Ok(true)
            }
            Err(err) => Err(err),
        }
    }

    async fn upsert_batch(&self, points: Vec<Point>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        let params = self.params().await?;
        for point in &points {
            params.check_vector(&point.vector)?;
        }

        let count = points.len();
        let body = json!({ "points": points });
        let _: serde_json::Value = self
            .call(
                self.request(reqwest::Method::PUT, self.collection_url("/points"))
                    .query(&[("wait", "true")])
                    .json(&body),
            )
            .await?;
        debug!("Upserted {count} points into {}", self.collection);
        Ok(())
    }

    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<ScoredPoint>> {
        let params = self.params().await?;
        params.check_vector(vector)?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let body = SearchRequest {
            vector,
            limit,
            with_payload: true,
        };
        let hits: Vec<RawScoredPoint> = self
            .call(
                self.request(reqwest::Method::POST, self.collection_url("/points/search"))
                    .json(&body),
            )
            .await?;

        let mut points = hits
            .into_iter()
            .map(|hit| {
                Ok(ScoredPoint {
                    id: parse_id(&hit.id)?,
                    score: hit.score,
                    payload: hit.payload.unwrap_or(serde_json::Value::Null),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        // Qdrant does not promise an order among equal scores.
        points.sort_by_key(|p| rank_key(p.score, p.id));
        Ok(points)
    }

    async fn count(&self) -> Result<u64> {
        let result: CountResult = self
            .call(
                self.request(reqwest::Method::POST, self.collection_url("/points/count"))
                    .json(&json!({ "exact": true })),
            )
            .await?;
        Ok(result.count)
    }

    async fn info(&self) -> Result<CollectionInfo> {
        let mut info = self.fetch_info().await?;
        // points_count is approximate while optimizers run.
        info.record_count = self.count().await?;
        Ok(info)
    }

    async fn max_id(&self) -> Result<Option<u64>> {
        Ok(self.points().await?.last().map(|p| p.id))
    }

    async fn points(&self) -> Result<Vec<StoredPoint>> {
        let mut points = Vec::new();
        let mut offset: Option<serde_json::Value> = None;

        loop {
            let mut body = json!({
                "limit": SCROLL_PAGE,
                "with_payload": true,
                "with_vector": false,
            });
            if let Some(offset) = offset.take() {
                body["offset"] = offset;
            }

            let page: ScrollResult = self
                .call(
                    self.request(reqwest::Method::POST, self.collection_url("/points/scroll"))
                        .json(&body),
                )
                .await?;

            for raw in page.points {
                points.push(StoredPoint {
                    id: parse_id(&raw.id)?,
                    payload: raw.payload.unwrap_or(serde_json::Value::Null),
                });
            }

            match page.next_page_offset {
                Some(next) if !next.is_null() => offset = Some(next),
                _ => break,
            }
        }

        points.sort_by_key(|p| p.id);
        debug!("Scrolled {} points from {}", points.len(), self.collection);
        Ok(points)
    }

    async fn ping(&self) -> Result<()> {
        let _: serde_json::Value = self
            .call(self.request(
                reqwest::Method::GET,
                format!("{}/collections", self.base_url),
            ))
            .await?;
        Ok(())
    }
}

fn parse_id(raw: &serde_json::Value) -> Result<u64> {
    raw.as_u64()
        .ok_or_else(|| IndexError::InvalidResponse(format!("non-numeric point id: {raw}")))
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    vector: &'a [f32],
    limit: usize,
    with_payload: bool,
}

#[derive(Debug, Deserialize)]
struct RawScoredPoint {
    id: serde_json::Value,
    score: f32,
    payload: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct CountResult {
    count: u64,
}

#[derive(Debug, Deserialize)]
struct ScrollResult {
    points: Vec<RawRecord>,
    next_page_offset: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    id: serde_json::Value,
    payload: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawCollectionInfo {
    status: CollectionStatus,
    points_count: Option<u64>,
    config: RawCollectionConfig,
}

#[derive(Debug, Deserialize)]
struct RawCollectionConfig {
    params: RawCollectionParams,
}

#[derive(Debug, Deserialize)]
struct RawCollectionParams {
    vectors: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RawVectorParams {
    size: usize,
    distance: String,
}

impl RawCollectionInfo {
    fn into_info(self, name: &str) -> Result<CollectionInfo> {
        let vectors: RawVectorParams = serde_json::from_value(self.config.params.vectors)
            .map_err(|_| {
                IndexError::InconsistentConfig(format!(
                    "collection {name} does not use a single unnamed vector"
                ))
            })?;
        let distance = match vectors.distance.as_str() {
            "Cosine" => Distance::Cosine,
            "Dot" => Distance::Dot,
            other => {
                return Err(IndexError::InconsistentConfig(format!(
                    "collection {name} uses unsupported distance {other}"
                )));
            }
        };

        Ok(CollectionInfo {
            name: name.to_string(),
            record_count: self.points_count.unwrap_or(0),
            status: self.status,
            params: CollectionParams::new(vectors.size, distance),
        })
    }
}
