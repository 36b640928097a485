use serde::{Deserialize, Serialize};

use crate::types::ChatMessageParam;

/// Request body for the chat-completions endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatCompletionParams {
    /// The model identifier.
    pub model: String,

    /// The conversation history, oldest first.
    pub messages: Vec<ChatMessageParam>,

    /// Whether the server should stream the reply.
    #[serde(default)]
    pub stream: bool,

    /// Optional sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Optional cap on generated tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ChatCompletionParams {
    /// Create streaming parameters for the given model and history.
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessageParam>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: true,
            temperature: None,
            max_tokens: None,
        }
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the maximum number of tokens to generate.
    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn params_serialization() {
        let params = ChatCompletionParams::new(
            "phi3.5",
            vec![
                ChatMessageParam::user("Hi"),
                ChatMessageParam::assistant("Hello!"),
            ],
        );

        assert_eq!(
            to_value(&params).unwrap(),
            json!({
                "model": "phi3.5",
                "messages": [
                    {"role": "user", "content": "Hi"},
                    {"role": "assistant", "content": "Hello!"}
                ],
                "stream": true
            })
        );
    }

    #[test]
    fn params_with_sampling() {
        let params = ChatCompletionParams::new("phi3.5", vec![])
            .with_temperature(Some(0.5))
            .with_max_tokens(Some(256));
        let json = to_value(&params).unwrap();
        assert_eq!(json["temperature"], json!(0.5));
        assert_eq!(json["max_tokens"], json!(256));
    }
}
