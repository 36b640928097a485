use std::fmt;

use serde::{Deserialize, Serialize};

/// The author of a turn, and the role it is sent under on the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    /// The person typing into the chat.
    User,

    /// The remote model.
    Assistant,
}

impl Author {
    /// Returns the wire name of this author.
    pub fn as_str(&self) -> &'static str {
        match self {
            Author::User => "user",
            Author::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn author_serialization() {
        assert_eq!(to_value(Author::User).unwrap(), json!("user"));
        assert_eq!(to_value(Author::Assistant).unwrap(), json!("assistant"));
    }

    #[test]
    fn author_deserialization() {
        let author: Author = serde_json::from_value(json!("assistant")).unwrap();
        assert_eq!(author, Author::Assistant);
        assert!(serde_json::from_value::<Author>(json!("system")).is_err());
    }

    #[test]
    fn author_display() {
        assert_eq!(Author::User.to_string(), "user");
        assert_eq!(Author::Assistant.to_string(), "assistant");
    }
}
