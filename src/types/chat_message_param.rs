use serde::{Deserialize, Serialize};

use crate::transcript::Turn;
use crate::types::Author;

/// One message of the conversation history sent with a request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessageParam {
    /// The role of the message.
    pub role: Author,

    /// The text of the message.
    pub content: String,
}

impl ChatMessageParam {
    /// Create a new `ChatMessageParam` with the given role and content.
    pub fn new(role: Author, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a new user `ChatMessageParam`.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Author::User, content)
    }

    /// Create a new assistant `ChatMessageParam`.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Author::Assistant, content)
    }
}

impl From<&Turn> for ChatMessageParam {
    fn from(turn: &Turn) -> Self {
        Self::new(turn.author, turn.text.clone())
    }
}
