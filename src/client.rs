use std::env;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::Stream;
use futures::stream::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};
use serde::Deserialize;
use url::Url;

use crate::client_logger::ClientLogger;
use crate::error::{Error, Result};
use crate::observability::{CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS};
use crate::sse::process_sse;
use crate::types::{ChatCompletionChunk, ChatCompletionParams};

/// Default base URL: a locally hosted OpenAI-compatible server.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434/v1/";
/// Placeholder credential; locally hosted servers require one but ignore it.
pub const DEFAULT_API_KEY: &str = "ollama";
/// Environment variable consulted when no API key is given.
pub const API_KEY_ENV: &str = "CHATLINE_API_KEY";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// A boxed stream of reply chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ChatCompletionChunk>> + Send>>;

/// A source of streamed chat completions.
///
/// Resolving the future means the reply stream is available; it does not mean
/// the reply is complete.
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    /// Submit `params` and return the reply as a stream of chunks.
    async fn stream(&self, params: ChatCompletionParams) -> Result<ChunkStream>;
}

/// Client for an OpenAI-compatible chat-completions endpoint.
#[derive(Clone)]
pub struct ChatClient {
    api_key: String,
    client: ReqwestClient,
    endpoint: Url,
    timeout: Duration,
    logger: Option<Arc<dyn ClientLogger>>,
}

impl ChatClient {
    /// Create a new client for the default endpoint.
    ///
    /// The API key can be provided directly or read from the CHATLINE_API_KEY
    /// environment variable; without either, a placeholder is sent.
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Self::with_options(api_key, None, None)
    }

    /// Create a new client with custom settings.
    ///
    /// `timeout` bounds the wait for the reply stream to start.  An open stream
    /// is never cut off by it.
    pub fn with_options(
        api_key: Option<String>,
        endpoint: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let api_key = api_key
            .or_else(|| env::var(API_KEY_ENV).ok())
            .unwrap_or_else(|| DEFAULT_API_KEY.to_string());
        let endpoint = parse_endpoint(endpoint.unwrap_or(DEFAULT_ENDPOINT))?;

        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = ReqwestClient::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| {
                Error::transport(
                    format!("Failed to build HTTP client: {e}"),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            api_key,
            client,
            endpoint,
            timeout,
            logger: None,
        })
    }

    /// Attach a logger that sees every request and decoded chunk.
    pub fn with_logger(mut self, logger: Arc<dyn ClientLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Returns the base endpoint.  It always ends in `/`.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Create and return default headers for API requests.
    fn default_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key)).map_err(|_| {
            Error::validation(
                "API key contains characters not allowed in a header",
                Some("api_key".to_string()),
            )
        })?;
        headers.insert(header::AUTHORIZATION, bearer);
        Ok(headers)
    }

    /// Converts a non-success response into an [`Error::Rejected`].
    async fn process_error_response(response: Response) -> Error {
        let status = response.status().as_u16();

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse::<u64>().ok());

        #[derive(Deserialize)]
        struct ErrorResponse {
            error: ErrorDetail,
        }

        // Some compatible servers send a bare string instead of an object.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum ErrorDetail {
            Object {
                #[serde(rename = "type")]
                error_type: Option<String>,
                message: Option<String>,
            },
            Text(String),
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::transport(
                    format!("Failed to read error response: {e}"),
                    Some(Box::new(e)),
                );
            }
        };

        let (error_type, message) = match serde_json::from_str::<ErrorResponse>(&body) {
            Ok(ErrorResponse {
                error: ErrorDetail::Object {
                    error_type,
                    message,
                },
            }) => (error_type, message.unwrap_or_else(|| body.clone())),
            Ok(ErrorResponse {
                error: ErrorDetail::Text(message),
            }) => (None, message),
            Err(_) => (None, body.clone()),
        };

        Error::rejected(status, error_type, message, retry_after)
    }

    fn map_send_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::timeout(
                format!("Request timed out: {e}"),
                Some(self.timeout.as_secs_f64()),
            )
        } else if e.is_connect() {
            Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
        } else {
            Error::transport(format!("Request failed: {e}"), Some(Box::new(e)))
        }
    }

    /// Send a chat-completion request and get a streaming response.
    ///
    /// Returns as soon as the response headers arrive; the chunks are decoded
    /// lazily as the returned stream is polled.
    pub async fn stream(&self, mut params: ChatCompletionParams) -> Result<ChunkStream> {
        params.stream = true;

        let url = self.endpoint.join("chat/completions")?;
        let headers = self.default_headers()?;

        if let Some(logger) = &self.logger {
            logger.log_request(&params);
        }
        tracing::debug!(
            url = %url,
            model = %params.model,
            messages = params.messages.len(),
            "submitting chat completion request"
        );

        CLIENT_REQUESTS.click();
        let start = Instant::now();
        let request = self.client.post(url).headers(headers).json(&params).send();
        let response = match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => result.map_err(|e| self.map_send_error(e)),
            Err(_) => Err(Error::timeout(
                "Timed out waiting for the reply stream to start",
                Some(self.timeout.as_secs_f64()),
            )),
        };
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());

        let response = match response {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                CLIENT_REQUEST_ERRORS.click();
                return Err(Self::process_error_response(response).await);
            }
            Err(err) => {
                CLIENT_REQUEST_ERRORS.click();
                return Err(err);
            }
        };

        let logger = self.logger.clone();
        let chunks = process_sse(response.bytes_stream()).inspect(move |chunk| {
            if let (Some(logger), Ok(chunk)) = (&logger, chunk) {
                logger.log_stream_chunk(chunk);
            }
        });
        Ok(Box::pin(chunks))
    }
}

#[async_trait::async_trait]
impl ChatBackend for ChatClient {
    async fn stream(&self, params: ChatCompletionParams) -> Result<ChunkStream> {
        ChatClient::stream(self, params).await
    }
}

impl fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("timeout", &self.timeout)
            .field("logger", &self.logger.is_some())
            .finish_non_exhaustive()
    }
}

/// Parses a base endpoint, making sure relative joins land beneath it.
fn parse_endpoint(endpoint: &str) -> Result<Url> {
    let mut url = Url::parse(endpoint)?;
    if url.cannot_be_a_base() {
        return Err(Error::endpoint(
            format!("endpoint {endpoint} cannot be used as a base URL"),
            None,
        ));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation() {
        let client = ChatClient::new(Some("test-key".to_string())).unwrap();
        assert_eq!(client.api_key, "test-key");
        assert_eq!(client.endpoint.as_str(), DEFAULT_ENDPOINT);
        assert_eq!(client.timeout, DEFAULT_TIMEOUT);

        let client = ChatClient::with_options(
            Some("test-key".to_string()),
            Some("https://llm.example.com/api/v1/"),
            Some(Duration::from_secs(30)),
        )
        .unwrap();
        assert_eq!(client.endpoint.as_str(), "https://llm.example.com/api/v1/");
        assert_eq!(client.timeout, Duration::from_secs(30));
    }

    #[test]
    fn endpoint_gets_trailing_slash() {
        let url = parse_endpoint("http://localhost:11434/v1").unwrap();
        assert_eq!(url.as_str(), "http://localhost:11434/v1/");
        assert_eq!(
            url.join("chat/completions").unwrap().as_str(),
            "http://localhost:11434/v1/chat/completions"
        );
    }

    #[test]
    fn invalid_endpoints_rejected() {
        assert!(matches!(
            parse_endpoint("not a url"),
            Err(Error::Endpoint { .. })
        ));
        assert!(matches!(
            parse_endpoint("mailto:bot@example.com"),
            Err(Error::Endpoint { .. })
        ));
    }

    #[test]
    fn authorization_header() {
        let client = ChatClient::new(Some("secret".to_string())).unwrap();
        let headers = client.default_headers().unwrap();
        assert_eq!(headers[header::AUTHORIZATION], "Bearer secret");
        assert_eq!(headers[header::ACCEPT], "text/event-stream");
    }

    #[test]
    fn bad_api_key_is_a_validation_error() {
        let client = ChatClient::new(Some("line\nbreak".to_string())).unwrap();
        assert!(matches!(
            client.default_headers(),
            Err(Error::Validation { .. })
        ));
    }
}
