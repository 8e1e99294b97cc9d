//! Request and response shapes.
//!
//! Requests validate on construction and on deserialization, so a value of
//! these types is always within bounds no matter which transport built it.

use serde::{Deserialize, Serialize};

use crate::error::{DictionaryError, Result};

/// Longest accepted headword, in characters.
pub const MAX_WORD_CHARS: usize = 100;

/// Longest accepted definition, in characters.
pub const MAX_DEFINITION_CHARS: usize = 500;

/// Longest accepted query, in characters.
pub const MAX_QUERY_CHARS: usize = 200;

/// Result cap used when a request omits `limit`.
pub const DEFAULT_LIMIT: usize = 10;

/// Largest `limit` a request may ask for.
pub const MAX_LIMIT: usize = 50;

/// A validated semantic search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSearchRequest")]
pub struct SearchRequest {
    query: String,
    limit: usize,
}

#[derive(Deserialize)]
struct RawSearchRequest {
    query: String,
    limit: Option<usize>,
}

impl SearchRequest {
    /// Validate against the default [`MAX_LIMIT`].
    pub fn new(query: &str, limit: usize) -> Result<Self> {
        Self::with_max_limit(query, limit, MAX_LIMIT)
    }

    /// Validate against a configured maximum. Limits outside `1..=max_limit`
    /// are rejected rather than clamped.
    pub fn with_max_limit(query: &str, limit: usize, max_limit: usize) -> Result<Self> {
        let query = query.trim();
        if query.is_empty() {
            return Err(DictionaryError::InvalidQuery(
                "query must not be empty".to_string(),
            ));
        }
        let chars = query.chars().count();
        if chars > MAX_QUERY_CHARS {
            return Err(DictionaryError::InvalidQuery(format!(
                "query has {chars} characters, max {MAX_QUERY_CHARS}"
            )));
        }
        if limit == 0 || limit > max_limit {
            return Err(DictionaryError::InvalidQuery(format!(
                "limit must be between 1 and {max_limit}, got {limit}"
            )));
        }

        Ok(Self {
            query: query.to_string(),
            limit,
        })
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl TryFrom<RawSearchRequest> for SearchRequest {
    type Error = DictionaryError;

    fn try_from(raw: RawSearchRequest) -> Result<Self> {
        Self::new(&raw.query, raw.limit.unwrap_or(DEFAULT_LIMIT))
    }
}

/// A validated dictionary entry to insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawAddRequest")]
pub struct AddRequest {
    word: String,
    definition: String,
}

#[derive(Deserialize)]
struct RawAddRequest {
    word: String,
    definition: String,
}

impl AddRequest {
    pub fn new(word: &str, definition: &str) -> Result<Self> {
        let word = validate_field("word", word, MAX_WORD_CHARS)?;
        let definition = validate_field("definition", definition, MAX_DEFINITION_CHARS)?;
        Ok(Self { word, definition })
    }

    pub fn word(&self) -> &str {
        &self.word
    }

    pub fn definition(&self) -> &str {
        &self.definition
    }

    /// The text that is embedded for this entry: headword first, then the
    /// definition. Changing this changes every stored vector.
    pub fn embedding_text(&self) -> String {
        format!("{}: {}", self.word, self.definition)
    }
}

impl TryFrom<RawAddRequest> for AddRequest {
    type Error = DictionaryError;

    fn try_from(raw: RawAddRequest) -> Result<Self> {
        Self::new(&raw.word, &raw.definition)
    }
}

fn validate_field(name: &str, value: &str, max_chars: usize) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DictionaryError::InvalidEntry(format!(
            "{name} must not be empty"
        )));
    }
    let chars = value.chars().count();
    if chars > max_chars {
        return Err(DictionaryError::InvalidEntry(format!(
            "{name} has {chars} characters, max {max_chars}"
        )));
    }
    Ok(value.to_string())
}

/// One ranked match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub word: String,

    /// Definitions of the matched entry.
    pub definitions: Vec<String>,

    /// Similarity to the query, higher is closer.
    pub score: f32,
}

/// Ranked matches for a query, best first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchHit>,
}

/// Confirmation of an inserted entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddResponse {
    pub message: String,
    pub word: String,
    pub definition: String,
    pub id: u64,
}

/// Health of the service and its two dependencies, reported independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    /// `"ok"` when both dependencies are up, `"degraded"` otherwise.
    pub status: String,
    pub encoder_ready: bool,
    pub index_reachable: bool,
    pub initialized: bool,
    pub model: String,
    pub backend: String,
}

/// Collection statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsResponse {
    pub collection: String,
    pub record_count: u64,
    pub vector_size: usize,
    pub distance: String,
    pub index_status: String,
}
