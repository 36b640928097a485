//! Error types for chatline.
//!
//! A chat cycle fails in one of two phases.  Errors raised before the reply
//! stream is available (endpoint unreachable, request rejected, bad input) are
//! submission errors and keep their specific variant.  Errors raised while
//! iterating an open stream are always reported as [`Error::Streaming`], with
//! the underlying failure as its source.

use std::error;
use std::fmt;
use std::sync::Arc;

/// Why the server turned a chat request down, derived from the HTTP status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// 400 or 422: the request body was not acceptable.
    BadRequest,
    /// 401 or 403: the credential was refused.
    Unauthorized,
    /// 404: the endpoint does not serve the requested model.
    ModelNotFound,
    /// 429: too many requests.
    RateLimited,
    /// 500: the server failed while handling the request.
    ServerError,
    /// 502 to 504: the server or a proxy in front of it is unavailable.
    Unavailable,
    /// Any other non-success status.
    Other,
}

impl Rejection {
    /// Classifies a non-success HTTP status.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 | 422 => Rejection::BadRequest,
            401 | 403 => Rejection::Unauthorized,
            404 => Rejection::ModelNotFound,
            429 => Rejection::RateLimited,
            500 => Rejection::ServerError,
            502..=504 => Rejection::Unavailable,
            _ => Rejection::Other,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Rejection::BadRequest => "bad request",
            Rejection::Unauthorized => "unauthorized",
            Rejection::ModelNotFound => "model not found",
            Rejection::RateLimited => "rate limited",
            Rejection::ServerError => "server error",
            Rejection::Unavailable => "unavailable",
            Rejection::Other => "rejected",
        }
    }
}

type Source = Option<Arc<dyn error::Error + Send + Sync>>;

/// The error type for chatline.
#[derive(Clone, Debug)]
pub enum Error {
    /// The server answered the chat request with a non-success status.
    Rejected {
        /// HTTP status of the response.
        status: u16,
        /// Classification of `status`.
        kind: Rejection,
        /// Error type reported in the body, if any.
        error_type: Option<String>,
        /// Message from the body, or the raw body.
        message: String,
        /// Seconds the server asked us to wait, from `retry-after`.
        retry_after: Option<u64>,
    },

    /// The server reported a failure as an event inside an open reply stream.
    ServerEvent {
        /// Error type reported in the event, if any.
        error_type: Option<String>,
        /// Message reported in the event.
        message: String,
    },

    /// The reply stream did not start within the configured time.
    Timeout {
        /// Human-readable error message.
        message: String,
        /// The limit that elapsed, in seconds.
        seconds: Option<f64>,
    },

    /// The endpoint could not be reached.
    Connection {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Source,
    },

    /// Any other failure of the HTTP transport.
    Transport {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Source,
    },

    /// The configured endpoint cannot be used as a base URL.
    Endpoint {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Option<url::ParseError>,
    },

    /// Input was refused before any request was made.
    Validation {
        /// Human-readable error message.
        message: String,
        /// The offending input.
        field: Option<String>,
    },

    /// A stream event carried a payload that is not a valid chunk.
    Json {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Source,
    },

    /// The reply stream was not valid UTF-8.
    Encoding {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Source,
    },

    /// An open reply stream terminated abnormally.
    Streaming {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Source,
    },
}

impl Error {
    /// Creates an error for a non-success HTTP response.
    pub fn rejected(
        status: u16,
        error_type: Option<String>,
        message: impl Into<String>,
        retry_after: Option<u64>,
    ) -> Self {
        Error::Rejected {
            status,
            kind: Rejection::from_status(status),
            error_type,
            message: message.into(),
            retry_after,
        }
    }

    /// Creates an error for an in-stream error event.
    pub fn server_event(error_type: Option<String>, message: impl Into<String>) -> Self {
        Error::ServerEvent {
            error_type,
            message: message.into(),
        }
    }

    /// Creates a new timeout error.
    pub fn timeout(message: impl Into<String>, seconds: Option<f64>) -> Self {
        Error::Timeout {
            message: message.into(),
            seconds,
        }
    }

    /// Creates a new connection error.
    pub fn connection(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Connection {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new transport error.
    pub fn transport(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Transport {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new endpoint error.
    pub fn endpoint(message: impl Into<String>, source: Option<url::ParseError>) -> Self {
        Error::Endpoint {
            message: message.into(),
            source,
        }
    }

    /// Creates a new validation error.
    pub fn validation(message: impl Into<String>, field: Option<String>) -> Self {
        Error::Validation {
            message: message.into(),
            field,
        }
    }

    /// Creates a new JSON error.
    pub fn json(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Json {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new encoding error.
    pub fn encoding(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Encoding {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new streaming error.
    pub fn streaming(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Streaming {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Returns true if the endpoint could not be reached.
    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Connection { .. })
    }

    /// Returns true if the server does not serve the requested model.
    pub fn is_model_not_found(&self) -> bool {
        matches!(
            self,
            Error::Rejected {
                kind: Rejection::ModelNotFound,
                ..
            }
        )
    }

    /// Returns true if an open reply stream terminated abnormally.
    pub fn is_stream_error(&self) -> bool {
        matches!(self, Error::Streaming { .. })
    }

    /// Returns true if the request failed before a reply stream was available.
    pub fn is_submission_error(&self) -> bool {
        !self.is_stream_error()
    }

    /// Wraps an error raised while iterating a reply stream.
    ///
    /// Errors that already are streaming errors are returned unchanged.
    pub fn into_stream_error(self) -> Self {
        if self.is_stream_error() {
            return self;
        }
        Error::Streaming {
            message: format!("reply stream failed: {self}"),
            source: Some(Arc::new(self)),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Rejected {
                status,
                kind,
                error_type,
                message,
                retry_after,
            } => {
                write!(f, "HTTP {status} ({}): ", kind.describe())?;
                if let Some(error_type) = error_type {
                    write!(f, "{error_type}: ")?;
                }
                f.write_str(message)?;
                if let Some(retry_after) = retry_after {
                    write!(f, " (retry after {retry_after} seconds)")?;
                }
                Ok(())
            }
            Error::ServerEvent {
                error_type: Some(error_type),
                message,
            } => write!(f, "server reported {error_type}: {message}"),
            Error::ServerEvent {
                error_type: None,
                message,
            } => write!(f, "server reported an error: {message}"),
            Error::Timeout {
                message,
                seconds: Some(seconds),
            } => write!(f, "Timeout error: {message} ({seconds} seconds)"),
            Error::Timeout { message, .. } => write!(f, "Timeout error: {message}"),
            Error::Connection { message, .. } => write!(f, "Connection error: {message}"),
            Error::Transport { message, .. } => write!(f, "HTTP error: {message}"),
            Error::Endpoint { message, .. } => write!(f, "Endpoint error: {message}"),
            Error::Validation {
                message,
                field: Some(field),
            } => write!(f, "Validation error: {message} ({field})"),
            Error::Validation { message, .. } => write!(f, "Validation error: {message}"),
            Error::Json { message, .. } => write!(f, "JSON error: {message}"),
            Error::Encoding { message, .. } => write!(f, "Encoding error: {message}"),
            Error::Streaming { message, .. } => write!(f, "Streaming error: {message}"),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Connection { source, .. }
            | Error::Transport { source, .. }
            | Error::Json { source, .. }
            | Error::Encoding { source, .. }
            | Error::Streaming { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Endpoint { source, .. } => {
                source.as_ref().map(|e| e as &(dyn error::Error + 'static))
            }
            _ => None,
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::endpoint(format!("invalid URL: {err}"), Some(err))
    }
}

/// A specialized Result type for chatline operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_and_stream_phases() {
        let refused = Error::connection("connection refused", None);
        assert!(refused.is_submission_error());
        assert!(!refused.is_stream_error());

        let wrapped = refused.into_stream_error();
        assert!(wrapped.is_stream_error());
        assert!(wrapped.to_string().contains("connection refused"));
        assert!(error::Error::source(&wrapped).is_some());
    }

    #[test]
    fn stream_error_not_double_wrapped() {
        let err = Error::streaming("eof", None).into_stream_error();
        assert_eq!(err.to_string(), "Streaming error: eof");
    }

    #[test]
    fn rejection_from_status() {
        assert_eq!(Rejection::from_status(422), Rejection::BadRequest);
        assert_eq!(Rejection::from_status(403), Rejection::Unauthorized);
        assert_eq!(Rejection::from_status(404), Rejection::ModelNotFound);
        assert_eq!(Rejection::from_status(503), Rejection::Unavailable);
        assert_eq!(Rejection::from_status(418), Rejection::Other);
    }

    #[test]
    fn rejected_display() {
        let err = Error::rejected(429, None, "slow down", Some(3));
        assert_eq!(
            err.to_string(),
            "HTTP 429 (rate limited): slow down (retry after 3 seconds)"
        );
        let err = Error::rejected(404, Some("not_found".to_string()), "no phi", None);
        assert!(err.is_model_not_found());
        assert_eq!(err.to_string(), "HTTP 404 (model not found): not_found: no phi");
    }

    #[test]
    fn server_event_has_no_status() {
        let err = Error::server_event(None, "out of memory");
        assert!(!matches!(err, Error::Rejected { .. }));
        assert_eq!(err.to_string(), "server reported an error: out of memory");
    }
}
