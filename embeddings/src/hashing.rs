//! Local feature-hashing encoder.
//!
//! Projects lower-cased word tokens and padded character trigrams into a
//! fixed number of buckets with a signed hash, then normalizes to unit
//! length. It has no model to load, operates on any script, and produces the
//! same vector for the same text on every platform. Lexical overlap drives
//! the similarity, so it is a stand-in for a neural model rather than a
//! replacement.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::Embedding;
use crate::encoder::Encoder;
use crate::error::{EmbeddingError, Result};
use crate::similarity::normalize;

/// Model identifier recorded for vectors produced by [`HashingEncoder`].
pub const HASHING_MODEL: &str = "char-trigram-hash-v1";

/// Weight of a whole-word feature relative to a single trigram.
const WORD_WEIGHT: f32 = 1.0;

/// Deterministic, dependency-free encoder.
#[derive(Debug, Clone)]
pub struct HashingEncoder {
    dimension: usize,
}

impl HashingEncoder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Encode synchronously. The async trait method delegates here.
    pub fn encode_text(&self, text: &str) -> Result<Embedding> {
        if self.dimension == 0 {
            return Err(EmbeddingError::DimensionMismatch {
                expected: 1,
                actual: 0,
            });
        }

        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        let mut embedding = vec![0.0f32; self.dimension];
        let tokens = tokenize(trimmed);
        if tokens.is_empty() {
            // Symbols and emoji only: the whole text is the single feature.
            self.accumulate(&mut embedding, "r", trimmed, WORD_WEIGHT);
        }
        for token in &tokens {
            self.accumulate(&mut embedding, "w", token, WORD_WEIGHT);

            let padded: Vec<char> = std::iter::once(' ')
                .chain(token.chars())
                .chain(std::iter::once(' '))
                .collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                self.accumulate(&mut embedding, "t", &trigram, 1.0);
            }
        }

        normalize(&mut embedding);
        Ok(embedding)
    }

    fn accumulate(&self, embedding: &mut [f32], namespace: &str, feature: &str, weight: f32) {
        let digest = Sha256::new()
            .chain_update(namespace.as_bytes())
            .chain_update([0u8])
            .chain_update(feature.as_bytes())
            .finalize();

        let mut bucket_bytes = [0u8; 8];
        bucket_bytes.copy_from_slice(&digest[..8]);
        let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };

        embedding[bucket] += sign * weight;
    }
}

/// Lower-case alphanumeric tokens. Any Unicode letter or digit counts, so
/// accented Portuguese and non-Latin scripts tokenize the same way.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl Encoder for HashingEncoder {
    fn name(&self) -> &str {
        "hashing"
    }

    fn model(&self) -> &str {
        HASHING_MODEL
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn init(&self) -> Result<()> {
        debug!("Hashing encoder ready ({} dimensions)", self.dimension);
        Ok(())
    }

    fn ready(&self) -> bool {
        self.dimension > 0
    }

    async fn encode(&self, text: &str) -> Result<Embedding> {
        self.encode_text(text)
    }
}
