//! Text encoders.
//!
//! An [`Encoder`] maps text to a fixed-length vector. Encoders are built
//! explicitly, brought up with [`Encoder::init`], probed with
//! [`Encoder::ready`] and shut down with [`Encoder::close`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};

/// Trait for text encoders.
///
/// Implementations must be deterministic for a given model and safe to share
/// between tasks once initialized.
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Short name of this encoder kind.
    fn name(&self) -> &str;

    /// Model identifier. Stored alongside every vector so stale embeddings
    /// can be detected after a model change.
    fn model(&self) -> &str;

    /// Length of every vector this encoder produces.
    fn dimension(&self) -> usize;

    /// Load or probe the model. Must be called before traffic is accepted.
    async fn init(&self) -> Result<()>;

    /// Readiness probe. Cheap; never touches the network.
    fn ready(&self) -> bool;

    /// Encode a single text.
    async fn encode(&self, text: &str) -> Result<Embedding>;

    /// Encode several texts, preserving order.
    async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.encode(text).await?);
        }
        Ok(results)
    }

    /// Release the model.
    async fn close(&self) {}
}

/// Encoder backed by an OpenAI-compatible `/embeddings` endpoint.
///
/// Works against the OpenAI API as well as self-hosted servers such as
/// text-embeddings-inference serving a sentence-transformers model.
pub struct HttpEncoder {
    /// API key, sent as a bearer token when present.
    api_key: Option<String>,

    /// API base URL, without the trailing `/embeddings`.
    base_url: String,

    /// HTTP client with the request timeout applied.
    client: reqwest::Client,

    /// Model to request.
    model: String,

    /// Expected vector length.
    dimension: usize,

    ready: AtomicBool,
}

impl HttpEncoder {
    /// Create a new HTTP encoder. No request is made until [`Encoder::init`].
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        dimension: usize,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            api_key: None,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            model: model.into(),
            dimension,
            ready: AtomicBool::new(false),
        })
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    async fn request(&self, input: serde_json::Value) -> Result<EmbeddingsResponse> {
        let body = serde_json::json!({
            "input": input,
            "model": self.model,
        });

        let mut request = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(|err| {
            EmbeddingError::Unavailable(format!("{}: {err}", self.base_url))
        })?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);

            return Err(EmbeddingError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Unavailable(format!(
                "embedding server returned {status}: {error_text}"
            )));
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|err| EmbeddingError::InvalidResponse(err.to_string()))?;
        Ok(parsed)
    }

    fn check_dimension(&self, embedding: &Embedding) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Encoder for HttpEncoder {
    fn name(&self) -> &str {
        "http"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn init(&self) -> Result<()> {
        info!("Probing embedding model {} at {}", self.model, self.base_url);
        let probe = self.request(serde_json::json!("ready")).await;
        let embedding = match probe {
            Ok(response) => response.into_embeddings()?.into_iter().next(),
            Err(err) => {
                warn!("Embedding model {} failed to initialize: {err}", self.model);
                self.ready.store(false, Ordering::Release);
                return Err(err);
            }
        };

        let embedding = embedding
            .ok_or_else(|| EmbeddingError::InvalidResponse("no embedding in probe".to_string()))?;
        self.check_dimension(&embedding)?;

        self.ready.store(true, Ordering::Release);
        info!(
            "Embedding model {} ready ({} dimensions)",
            self.model, self.dimension
        );
        Ok(())
    }

    fn ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    async fn encode(&self, text: &str) -> Result<Embedding> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        debug!("Encoding {} chars with model {}", text.len(), self.model);

        let embedding = self
            .request(serde_json::json!(text))
            .await?
            .into_embeddings()?
            .into_iter()
            .next()
            .ok_or_else(|| {
                EmbeddingError::InvalidResponse("no embedding in response".to_string())
            })?;
        self.check_dimension(&embedding)?;
        Ok(embedding)
    }

    async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(EmbeddingError::EmptyInput);
        }

        debug!(
            "Encoding batch of {} texts with model {}",
            texts.len(),
            self.model
        );

        let embeddings = self
            .request(serde_json::json!(texts))
            .await?
            .into_embeddings()?;

        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }
        for embedding in &embeddings {
            self.check_dimension(embedding)?;
        }

        info!("Encoded {} texts", embeddings.len());
        Ok(embeddings)
    }

    async fn close(&self) {
        self.ready.store(false, Ordering::Release);
        debug!("Closed HTTP encoder for {}", self.model);
    }
}

/// OpenAI-compatible response body.
#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

impl EmbeddingsResponse {
    /// Embeddings in input order. Servers may return `data` out of order.
    fn into_embeddings(mut self) -> Result<Vec<Embedding>> {
        self.data.sort_by_key(|d| d.index);
        if self.data.iter().enumerate().any(|(i, d)| d.index != i) {
            return Err(EmbeddingError::InvalidResponse(
                "embedding indices are not contiguous".to_string(),
            ));
        }
        Ok(self.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn embeddings_body(vectors: &[Vec<f32>]) -> serde_json::Value {
        let data: Vec<_> = vectors
            .iter()
            .enumerate()
            .map(|(index, embedding)| serde_json::json!({ "embedding": embedding, "index": index }))
            .collect();
        serde_json::json!({ "data": data, "model": "test-model" })
    }

    fn encoder(server: &MockServer, dimension: usize) -> HttpEncoder {
        HttpEncoder::new(server.uri(), "test-model", dimension, Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_init_marks_ready() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(embeddings_body(&[vec![0.1, 0.2, 0.3]])),
            )
            .mount(&server)
            .await;

        let encoder = encoder(&server, 3);
        assert!(!encoder.ready());
        encoder.init().await.unwrap();
        assert!(encoder.ready());

        encoder.close().await;
        assert!(!encoder.ready());
    }

    #[tokio::test]
    async fn test_init_rejects_wrong_dimension() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(embeddings_body(&[vec![0.1, 0.2]])),
            )
            .mount(&server)
            .await;

        let encoder = encoder(&server, 3);
        let err = encoder.init().await.unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::DimensionMismatch { expected: 3, actual: 2 }
        ));
        assert!(!encoder.ready());
    }

    #[tokio::test]
    async fn test_init_fails_when_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("model loading"))
            .mount(&server)
            .await;

        let encoder = encoder(&server, 3);
        let err = encoder.init().await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Unavailable(_)));
        assert!(!encoder.ready());
    }

    #[tokio::test]
    async fn test_encode_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(embeddings_body(&[vec![1.0, 0.0]])),
            )
            .mount(&server)
            .await;

        let encoder = encoder(&server, 2).with_api_key("secret");
        let embedding = encoder.encode("casa").await.unwrap();
        assert_eq!(embedding, vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_encode_batch_restores_input_order() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "data": [
                { "embedding": [0.0, 1.0], "index": 1 },
                { "embedding": [1.0, 0.0], "index": 0 },
            ],
            "model": "test-model",
        });
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let encoder = encoder(&server, 2);
        let texts = vec!["lar".to_string(), "casa".to_string()];
        let embeddings = encoder.encode_batch(&texts).await.unwrap();
        assert_eq!(embeddings, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn test_rate_limit_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .mount(&server)
            .await;

        let encoder = encoder(&server, 2);
        let err = encoder.encode("casa").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::RateLimited { retry_after_secs: 7 }));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unavailable() {
        let encoder =
            HttpEncoder::new("http://127.0.0.1:1", "test-model", 2, Duration::from_millis(500))
                .unwrap();
        let err = encoder.encode("casa").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_empty_text_is_rejected_locally() {
        let encoder =
            HttpEncoder::new("http://127.0.0.1:1", "test-model", 2, Duration::from_millis(500))
                .unwrap();
        let err = encoder.encode("   ").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::EmptyInput));
    }
}
