//! Similarity computation for embeddings.

use std::cmp::Reverse;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::error::{EmbeddingError, Result};

/// Compute the cosine similarity between two embeddings.
///
/// Returns a value between -1.0 and 1.0, where:
/// - 1.0 means identical direction
/// - 0.0 means orthogonal vectors
/// - -1.0 means opposite vectors
///
/// A zero vector is treated as orthogonal to everything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a = magnitude(a);
    let magnitude_b = magnitude(b);

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot_product / (magnitude_a * magnitude_b))
}

/// Compute the dot product between two embeddings.
pub fn dot_product(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    Ok(a.iter().zip(b.iter()).map(|(x, y)| x * y).sum())
}

fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Normalize an embedding to unit length. Zero vectors are left untouched.
pub fn normalize(embedding: &mut [f32]) {
    let magnitude = magnitude(embedding);
    if magnitude > 0.0 {
        for x in embedding.iter_mut() {
            *x /= magnitude;
        }
    }
}

/// A scored candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    /// Identifier of the matched record.
    pub id: u64,

    /// Similarity score, higher is closer.
    pub score: f32,
}

impl SimilarityResult {
    pub fn new(id: u64, score: f32) -> Self {
        Self { id, score }
    }
}

/// Sort key giving descending score, then ascending id. NaN scores sort last.
pub fn rank_key(score: f32, id: u64) -> (Reverse<OrderedFloat<f32>>, u64) {
    let score = if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score
    };
    (Reverse(OrderedFloat(score)), id)
}

/// Order results by descending score, then ascending id.
pub fn sort_ranked(results: &mut [SimilarityResult]) {
    results.sort_by_key(|r| rank_key(r.score, r.id));
}

/// Score every candidate with `score_fn` and keep the best `k`.
///
/// The ordering is total and deterministic: descending score, ties broken by
/// ascending id.
pub fn rank_top_k<'a, I, F>(
    query: &[f32],
    candidates: I,
    k: usize,
    score_fn: F,
) -> Result<Vec<SimilarityResult>>
where
    I: IntoIterator<Item = (u64, &'a [f32])>,
    F: Fn(&[f32], &[f32]) -> Result<f32>,
{
    if k == 0 {
        return Ok(Vec::new());
    }

    let mut scored = Vec::new();
    for (id, embedding) in candidates {
        scored.push(SimilarityResult::new(id, score_fn(query, embedding)?));
    }

    sort_ranked(&mut scored);
    scored.truncate(k);
    Ok(scored)
}
