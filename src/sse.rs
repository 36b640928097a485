//! Server-Sent Events (SSE) processing for streaming chat completions.
//!
//! This module converts the raw byte stream of an OpenAI-compatible
//! chat-completions response into a stream of [`ChatCompletionChunk`] values.
//! Events are separated by a blank line, payloads arrive on `data:` lines, and
//! the literal payload `[DONE]` ends the stream.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;

use crate::{ChatCompletionChunk, Error, Result};

/// Payload that marks the normal end of a reply stream.
const DONE_MARKER: &str = "[DONE]";

/// Process a stream of bytes into a stream of chat-completion chunks.
///
/// The returned stream ends after `data: [DONE]` or when the byte stream is
/// exhausted, whichever comes first.  Transport failures, invalid UTF-8 and
/// undecodable payloads are yielded as errors in stream position.
pub fn process_sse<S>(byte_stream: S) -> impl Stream<Item = Result<ChatCompletionChunk>> + Send
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Unpin + Send + 'static,
{
    let stream = byte_stream.map(|result| {
        result
            .map_err(|e| Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e))))
    });

    stream::unfold(SseState::new(stream), |mut state| async move {
        loop {
            if state.finished {
                return None;
            }

            if let Some((event, remaining)) = extract_event(&state.buffer) {
                state.buffer = remaining;
                match event {
                    SseEvent::Chunk(chunk) => return Some((chunk, state)),
                    SseEvent::Done => return None,
                    SseEvent::Empty => continue,
                }
            }

            match state.stream.next().await {
                Some(Ok(bytes)) => {
                    if let Err(e) = state.push_bytes(&bytes) {
                        return Some((Err(e), state));
                    }
                }
                Some(Err(e)) => {
                    return Some((Err(e), state));
                }
                None => {
                    state.finished = true;
                    if !state.pending.is_empty() {
                        return Some((
                            Err(Error::encoding(
                                "Stream ended inside a UTF-8 sequence",
                                None,
                            )),
                            state,
                        ));
                    }
                    // A final event may lack its terminating blank line.
                    let tail = std::mem::take(&mut state.buffer);
                    return match parse_event(tail.trim_end()) {
                        SseEvent::Chunk(chunk) => Some((chunk, state)),
                        SseEvent::Done | SseEvent::Empty => None,
                    };
                }
            }
        }
    })
}

struct SseState<S> {
    stream: S,
    buffer: String,
    pending: Vec<u8>,
    finished: bool,
}

impl<S> SseState<S> {
    fn new(stream: S) -> Self {
        Self {
            stream,
            buffer: String::new(),
            pending: Vec::new(),
            finished: false,
        }
    }

    /// Appends bytes to the text buffer, holding back an incomplete trailing
    /// UTF-8 sequence until the next read completes it.
    fn push_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.pending.extend_from_slice(bytes);
        let valid_up_to = match std::str::from_utf8(&self.pending) {
            Ok(text) => text.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(e) => {
                self.pending.clear();
                return Err(Error::encoding(
                    format!("Invalid UTF-8 in stream: {e}"),
                    Some(Box::new(e)),
                ));
            }
        };
        let rest = self.pending.split_off(valid_up_to);
        let complete = std::mem::replace(&mut self.pending, rest);
        self.buffer.push_str(&String::from_utf8_lossy(&complete));
        if self.buffer.contains('\r') {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }
        Ok(())
    }
}

enum SseEvent {
    Chunk(Result<ChatCompletionChunk>),
    Done,
    Empty,
}

/// Extract a complete SSE event from a buffer string.
fn extract_event(buffer: &str) -> Option<(SseEvent, String)> {
    let (event_text, rest) = buffer.split_once("\n\n")?;
    Some((parse_event(event_text), rest.to_string()))
}

/// Parse the lines of one event.  Comment lines and fields other than `data`
/// are ignored; multiple `data` lines are joined with a newline.
fn parse_event(event_text: &str) -> SseEvent {
    let mut data: Option<String> = None;
    for line in event_text.lines() {
        if line.starts_with(':') {
            continue;
        }
        let Some(value) = line.strip_prefix("data:") else {
            continue;
        };
        let value = value.strip_prefix(' ').unwrap_or(value);
        match &mut data {
            Some(data) => {
                data.push('\n');
                data.push_str(value);
            }
            None => data = Some(value.to_string()),
        }
    }

    match data.as_deref().map(str::trim) {
        None | Some("") => SseEvent::Empty,
        Some(DONE_MARKER) => SseEvent::Done,
        Some(payload) => SseEvent::Chunk(parse_chunk(payload)),
    }
}

fn parse_chunk(payload: &str) -> Result<ChatCompletionChunk> {
    #[derive(Deserialize)]
    struct ErrorEnvelope {
        error: ErrorBody,
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ErrorBody {
        Detail {
            message: String,
            #[serde(rename = "type")]
            error_type: Option<String>,
        },
        Text(String),
    }

    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(payload) {
        return Err(match envelope.error {
            ErrorBody::Detail {
                message,
                error_type,
            } => Error::server_event(error_type, message),
            ErrorBody::Text(message) => Error::server_event(None, message),
        });
    }

    serde_json::from_str::<ChatCompletionChunk>(payload).map_err(|e| {
        Error::json(
            format!("Failed to parse chunk JSON: {e}"),
            Some(Box::new(e)),
        )
    })
}
