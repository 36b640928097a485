use serde::{Deserialize, Serialize};

use crate::types::ChoiceDelta;

/// One choice inside a streamed chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkChoice {
    /// Index of the choice.
    #[serde(default)]
    pub index: u32,

    /// The incremental content.
    #[serde(default)]
    pub delta: ChoiceDelta,

    /// Why generation stopped, on the final chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

impl ChunkChoice {
    /// Create a choice carrying a text piece.
    pub fn text(index: u32, content: impl Into<String>) -> Self {
        Self {
            index,
            delta: ChoiceDelta::text(content),
            finish_reason: None,
        }
    }
}
