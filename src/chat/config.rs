//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and configuration
//! structures for controlling chat behavior.

use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::chat::commands::parse_temperature;
use crate::client::DEFAULT_ENDPOINT;
use crate::error::Error;

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "phi3.5";

/// Command-line arguments for the chatline tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Model to use for chat.
    #[arrrg(optional, "Model to use (default: phi3.5)", "MODEL")]
    pub model: Option<String>,

    /// Base URL of the chat-completions server.
    #[arrrg(
        optional,
        "Base URL of the server (default: http://localhost:11434/v1/)",
        "URL"
    )]
    pub endpoint: Option<String>,

    /// API key sent as a bearer token.
    #[arrrg(optional, "API key (default: $CHATLINE_API_KEY or a placeholder)", "KEY")]
    pub api_key: Option<String>,

    /// Seconds to wait for a reply to start streaming.
    #[arrrg(optional, "Seconds to wait for a reply to start (default: 60)", "SECONDS")]
    pub timeout: Option<u64>,

    /// Sampling temperature, checked when the config is built.
    #[arrrg(optional, "Sampling temperature 0.0-2.0 (default: server default)", "TEMP")]
    pub temperature: Option<String>,

    /// Maximum tokens per response.
    #[arrrg(optional, "Max tokens per response (default: server default)", "TOKENS")]
    pub max_tokens: Option<u32>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Configuration for a chat session.
///
/// Endpoint and credentials are fixed once the session's client is built; the
/// model may be changed between replies.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// The model identifier sent with every request.
    pub model: String,

    /// Base URL of the chat-completions server.
    pub endpoint: String,

    /// API key; `None` falls back to the environment, then a placeholder.
    pub api_key: Option<String>,

    /// How long to wait for the reply stream to start.
    pub timeout: Option<Duration>,

    /// Optional sampling temperature.
    pub temperature: Option<f32>,

    /// Optional cap on generated tokens.
    pub max_tokens: Option<u32>,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Model: phi3.5
    /// - Endpoint: http://localhost:11434/v1/
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            timeout: None,
            temperature: None,
            max_tokens: None,
            use_color: true,
        }
    }

    /// Sets the model to use.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the server endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the API key.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    /// Sets the time allowed for a reply to start.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the maximum tokens per response.
    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<ChatArgs> for ChatConfig {
    type Error = Error;

    fn try_from(args: ChatArgs) -> Result<Self, Error> {
        let temperature = match args.temperature.as_deref() {
            Some(raw) => Some(parse_temperature(raw).map_err(|err| {
                Error::validation(format!("--temperature {err}"), Some(raw.to_string()))
            })?),
            None => None,
        };
        let defaults = ChatConfig::new();
        Ok(ChatConfig {
            model: args.model.unwrap_or(defaults.model),
            endpoint: args.endpoint.unwrap_or(defaults.endpoint),
            api_key: args.api_key,
            timeout: args.timeout.map(Duration::from_secs),
            temperature,
            max_tokens: args.max_tokens,
            use_color: !args.no_color,
        })
    }
}
