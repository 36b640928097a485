//! Logging trait for chat-completion traffic.
//!
//! This module provides the [`ClientLogger`] trait that allows users to capture
//! every request sent by a [`ChatClient`](crate::ChatClient) and every chunk
//! decoded from its reply streams.

use crate::{ChatCompletionChunk, ChatCompletionParams};

/// A trait for logging chat-completion traffic.
///
/// # Example
///
/// ```rust,ignore
/// use chatline::{ChatCompletionChunk, ChatCompletionParams, ClientLogger};
///
/// struct StderrLogger;
///
/// impl ClientLogger for StderrLogger {
///     fn log_request(&self, params: &ChatCompletionParams) {
///         eprintln!("request: {} messages", params.messages.len());
///     }
///
///     fn log_stream_chunk(&self, chunk: &ChatCompletionChunk) {
///         eprintln!("chunk: {:?}", chunk);
///     }
/// }
/// ```
pub trait ClientLogger: Send + Sync {
    /// Log an outbound request, right before it is sent.
    fn log_request(&self, params: &ChatCompletionParams);

    /// Log one decoded chunk of a reply stream.
    ///
    /// Called in stream order, before the chunk is handed to the consumer.
    fn log_stream_chunk(&self, chunk: &ChatCompletionChunk);
}
