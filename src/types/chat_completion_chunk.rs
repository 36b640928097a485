use serde::{Deserialize, Serialize};

use crate::types::ChunkChoice;

/// One fragment event of a streamed chat completion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    /// Server-assigned completion id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// The model that produced the chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Server creation time in unix seconds.
    #[serde(default)]
    pub created: i64,

    /// The content pieces of this fragment.
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

impl ChatCompletionChunk {
    /// Create a chunk with one text piece per entry of `pieces`.
    pub fn new<S: Into<String>>(created: i64, pieces: impl IntoIterator<Item = S>) -> Self {
        let choices = pieces
            .into_iter()
            .enumerate()
            .map(|(index, piece)| ChunkChoice::text(index as u32, piece))
            .collect();
        Self {
            id: None,
            model: None,
            created,
            choices,
        }
    }
}
