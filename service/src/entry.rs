//! Payload stored with every dictionary vector.

use serde::{Deserialize, Serialize};

use crate::error::{DictionaryError, Result};

/// JSON payload of a dictionary record.
///
/// `model` names the encoder that produced the vector. Records written before
/// a model change carry the old name and are stale until reindexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPayload {
    pub word: String,
    pub definition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl EntryPayload {
    pub fn new(word: &str, definition: &str, model: &str) -> Self {
        Self {
            word: word.to_string(),
            definition: definition.to_string(),
            model: Some(model.to_string()),
        }
    }

    pub fn to_value(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self)
            .map_err(|err| DictionaryError::IndexInconsistent(format!("payload encoding: {err}")))
    }

    /// Decode a stored payload. A record without `word` or `definition`
    /// means something else wrote to the collection.
    pub fn from_value(id: u64, value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|err| {
            DictionaryError::IndexInconsistent(format!("malformed payload at id {id}: {err}"))
        })
    }

    /// Whether the vector was produced by `model`.
    pub fn is_current(&self, model: &str) -> bool {
        self.model.as_deref() == Some(model)
    }
}
