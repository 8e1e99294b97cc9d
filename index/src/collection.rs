//! Collection parameters and introspection types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};

/// Distance metric of a collection. Both variants score "higher is closer".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Distance {
    /// Cosine similarity. Vectors are normalized on insert.
    #[default]
    Cosine,
    /// Raw dot product.
    Dot,
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cosine => f.write_str("Cosine"),
            Self::Dot => f.write_str("Dot"),
        }
    }
}

/// Parameters fixed at collection-creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionParams {
    /// Length of every vector in the collection.
    pub vector_size: usize,

    /// Distance metric.
    pub distance: Distance,
}

impl CollectionParams {
    pub fn new(vector_size: usize, distance: Distance) -> Self {
        Self {
            vector_size,
            distance,
        }
    }

    /// Reject a vector whose length differs from the configured size.
    pub fn check_vector(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.vector_size {
            return Err(IndexError::Inconsistent {
                expected: self.vector_size,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Fail when an existing collection was created with other parameters.
    pub fn check_matches(&self, existing: &CollectionParams, name: &str) -> Result<()> {
        if self != existing {
            return Err(IndexError::InconsistentConfig(format!(
                "collection {name} has size {} / {}, requested {} / {}",
                existing.vector_size, existing.distance, self.vector_size, self.distance
            )));
        }
        Ok(())
    }
}

/// Health of a collection as reported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionStatus {
    /// Fully operational.
    Green,
    /// Optimizing; reads and writes still succeed.
    Yellow,
    /// Failed.
    Red,
    /// Optimizations pending.
    Grey,
}

impl CollectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Red => "red",
            Self::Grey => "grey",
        }
    }
}

/// Read-only snapshot of a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    /// Collection name.
    pub name: String,

    /// Number of stored records.
    pub record_count: u64,

    /// Store-reported health.
    pub status: CollectionStatus,

    /// Creation parameters.
    pub params: CollectionParams,
}
