use serde::{Deserialize, Serialize};

use crate::types::Author;

/// The incremental content carried by one streamed choice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceDelta {
    /// Present on the first delta of a reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Author>,

    /// The text piece; absent or null on role-only and final deltas.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ChoiceDelta {
    /// Create a delta carrying a text piece.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            role: None,
            content: Some(content.into()),
        }
    }

    /// Returns the text piece, treating a missing piece as empty.
    pub fn content_or_empty(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn delta_with_null_content() {
        let delta: ChoiceDelta =
            serde_json::from_value(json!({"role": "assistant", "content": null})).unwrap();
        assert_eq!(delta.role, Some(Author::Assistant));
        assert_eq!(delta.content_or_empty(), "");
    }

    #[test]
    fn delta_without_fields() {
        let delta: ChoiceDelta = serde_json::from_value(json!({})).unwrap();
        assert_eq!(delta, ChoiceDelta::default());
    }
}
