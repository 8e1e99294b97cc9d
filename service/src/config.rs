//! Configuration for the dictionary service.
//!
//! Values come from defaults, then an optional TOML file, then environment
//! overrides. Vector size and distance are fixed for the lifetime of a
//! collection; changing them requires a new collection name.

use std::path::Path;
use std::time::Duration;

use lexicon_embeddings::{DEFAULT_DIMENSION, DEFAULT_MODEL};
use lexicon_index::{CollectionParams, Distance, QdrantConfig};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DictionaryError, Result};
use crate::schema::{DEFAULT_LIMIT, MAX_LIMIT};

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DictionaryConfig {
    /// Name of the collection holding the dictionary.
    pub collection: String,

    /// Distance metric, fixed at collection creation.
    pub distance: Distance,

    /// Vector store settings.
    pub index: IndexConfig,

    /// Encoder settings.
    pub encoder: EncoderConfig,

    /// Query limits.
    pub query: QueryConfig,

    /// Service-wide settings.
    pub service: ServiceConfig,
}

impl Default for DictionaryConfig {
    fn default() -> Self {
        Self {
            collection: "dicionario_pt".to_string(),
            distance: Distance::Cosine,
            index: IndexConfig::default(),
            encoder: EncoderConfig::default(),
            query: QueryConfig::default(),
            service: ServiceConfig::default(),
        }
    }
}

impl DictionaryConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|err| DictionaryError::Config(format!("{}: {err}", path.display())))?;
        debug!("Loaded configuration from {}", path.display());
        Self::from_toml_str(&content)
    }

    /// Apply overrides from the process environment.
    pub fn with_env(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    ///
    /// Recognized variables: `QDRANT_URL`, or `QDRANT_HOST` plus optional
    /// `QDRANT_PORT`; `QDRANT_API_KEY`; `LEXICON_INDEX_BACKEND`;
    /// `LEXICON_ENCODER_PROVIDER`, `LEXICON_ENCODER_URL`,
    /// `LEXICON_ENCODER_MODEL`, `LEXICON_ENCODER_API_KEY`.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("QDRANT_URL") {
            self.index.url = url;
        } else if let Some(host) = lookup("QDRANT_HOST") {
            let port = lookup("QDRANT_PORT").unwrap_or_else(|| "6333".to_string());
            self.index.url = format!("http://{host}:{port}");
        }
        if let Some(key) = lookup("QDRANT_API_KEY") {
            self.index.api_key = Some(key);
        }
        if let Some(backend) = lookup("LEXICON_INDEX_BACKEND") {
            self.index.backend = match backend.to_ascii_lowercase().as_str() {
                "qdrant" => IndexBackend::Qdrant,
                "memory" => IndexBackend::Memory,
                other => {
                    return Err(DictionaryError::Config(format!(
                        "unknown index backend: {other}"
                    )));
                }
            };
        }
        if let Some(provider) = lookup("LEXICON_ENCODER_PROVIDER") {
            self.encoder.provider = match provider.to_ascii_lowercase().as_str() {
                "http" => EncoderProvider::Http,
                "hashing" => EncoderProvider::Hashing,
                other => {
                    return Err(DictionaryError::Config(format!(
                        "unknown encoder provider: {other}"
                    )));
                }
            };
        }
        if let Some(url) = lookup("LEXICON_ENCODER_URL") {
            self.encoder.base_url = url;
        }
        if let Some(model) = lookup("LEXICON_ENCODER_MODEL") {
            self.encoder.model = model;
        }
        if let Some(key) = lookup("LEXICON_ENCODER_API_KEY") {
            self.encoder.api_key = Some(key);
        }

        self.validate()?;
        Ok(self)
    }

    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.collection.trim().is_empty() {
            return Err(DictionaryError::Config(
                "collection name must not be empty".to_string(),
            ));
        }
        if self.encoder.dimension == 0 {
            return Err(DictionaryError::Config(
                "encoder dimension must be positive".to_string(),
            ));
        }
        if self.query.default_limit == 0 || self.query.default_limit > self.query.max_limit {
            return Err(DictionaryError::Config(format!(
                "default_limit must be between 1 and max_limit ({})",
                self.query.max_limit
            )));
        }
        if self.service.operation_timeout_ms == 0 {
            return Err(DictionaryError::Config(
                "operation_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Parameters the collection is created with.
    pub fn collection_params(&self) -> CollectionParams {
        CollectionParams::new(self.encoder.dimension, self.distance)
    }

    /// Connection settings for the Qdrant backend.
    pub fn qdrant_config(&self) -> QdrantConfig {
        QdrantConfig {
            url: self.index.url.clone(),
            api_key: self.index.api_key.clone(),
            timeout: Duration::from_millis(self.index.timeout_ms),
            connect_attempts: self.index.connect_attempts,
            connect_backoff: Duration::from_millis(self.index.connect_backoff_ms),
        }
    }

    /// Upper bound on any single encoder or index call.
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.service.operation_timeout_ms)
    }
}

/// Which vector store to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexBackend {
    /// A Qdrant server.
    Qdrant,
    /// In-process; contents are lost on exit.
    Memory,
}

/// Configuration for the vector store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub backend: IndexBackend,

    /// Qdrant base URL.
    pub url: String,

    /// Qdrant API key.
    pub api_key: Option<String>,

    /// Per-request timeout.
    pub timeout_ms: u64,

    /// Startup ping attempts before giving up.
    pub connect_attempts: u32,

    /// Pause between startup pings.
    pub connect_backoff_ms: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: IndexBackend::Qdrant,
            url: "http://localhost:6333".to_string(),
            api_key: None,
            timeout_ms: 10_000,
            connect_attempts: 30,
            connect_backoff_ms: 2_000,
        }
    }
}

/// Type of encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncoderProvider {
    /// OpenAI-compatible embeddings endpoint.
    Http,
    /// Local feature hashing.
    Hashing,
}

/// Configuration for the encoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub provider: EncoderProvider,

    /// Base URL of the embeddings server.
    pub base_url: String,

    /// Model to request.
    pub model: String,

    /// Bearer token for the embeddings server.
    pub api_key: Option<String>,

    /// Vector length produced by the model.
    pub dimension: usize,

    /// Per-request timeout.
    pub timeout_ms: u64,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            provider: EncoderProvider::Http,
            base_url: "http://localhost:8080/v1".to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            dimension: DEFAULT_DIMENSION,
            timeout_ms: 10_000,
        }
    }
}

/// Configuration for query processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Limit used when the caller does not give one.
    pub default_limit: usize,

    /// Largest accepted limit. Larger requests are rejected.
    pub max_limit: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
        }
    }
}

/// Service-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Deadline for each encoder or index call made by the service.
    pub operation_timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            operation_timeout_ms: 15_000,
        }
    }
}
