//! The ordered record of a chat session.
//!
//! The [`Transcript`] is append-only: every user submission and every streamed
//! content piece becomes its own [`Turn`], and nothing is ever edited, merged,
//! or removed.  Grouping consecutive turns for display is the job of
//! [`aggregate`](crate::aggregate), and bounding what is sent back to the
//! server is the job of [`window`].

use time::OffsetDateTime;

use crate::types::{Author, ChatMessageParam};

/// Number of most recent turns sent as request context.
pub const HISTORY_WINDOW: usize = 200;

/// One authored unit of the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    /// Who wrote this turn.
    pub author: Author,
    /// The text exactly as submitted or received.
    pub text: String,
    /// When the turn was created.  A display hint only; transcript order is
    /// authoritative.
    pub timestamp: OffsetDateTime,
}

impl Turn {
    /// Creates a new turn.
    pub fn new(author: Author, text: impl Into<String>, timestamp: OffsetDateTime) -> Self {
        Self {
            author,
            text: text.into(),
            timestamp,
        }
    }

    /// Creates a user turn.
    pub fn user(text: impl Into<String>, timestamp: OffsetDateTime) -> Self {
        Self::new(Author::User, text, timestamp)
    }

    /// Creates an assistant turn.
    pub fn assistant(text: impl Into<String>, timestamp: OffsetDateTime) -> Self {
        Self::new(Author::Assistant, text, timestamp)
    }
}

/// Append-only, ordered sequence of turns.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    /// Creates an empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a turn to the end of the transcript.
    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Returns every turn, oldest first.
    pub fn snapshot(&self) -> &[Turn] {
        &self.turns
    }

    /// Returns the bounded suffix of the transcript sent as request context.
    pub fn window(&self) -> &[Turn] {
        window(&self.turns)
    }

    /// Returns the number of turns.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Returns true if no turn has been appended yet.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Returns the most recent turn.
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }
}

/// Returns the last `min(turns.len(), HISTORY_WINDOW)` turns in their original
/// order.
pub fn window(turns: &[Turn]) -> &[Turn] {
    &turns[turns.len().saturating_sub(HISTORY_WINDOW)..]
}

/// Maps a history window to outbound request messages.
pub fn to_message_params(turns: &[Turn]) -> Vec<ChatMessageParam> {
    turns.iter().map(ChatMessageParam::from).collect()
}
