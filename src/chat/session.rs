//! Core chat session management.
//!
//! This module provides the `ChatSession` struct which owns the transcript of
//! one conversation and drives one request/response cycle per user message.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use futures::StreamExt;
use time::OffsetDateTime;

use crate::Error;
use crate::blocks::{Block, aggregate};
use crate::chat::config::ChatConfig;
use crate::client::{ChatBackend, ChatClient};
use crate::error::Result;
use crate::observability::{
    STREAM_DURATION, STREAM_ERRORS, STREAM_FRAGMENTS, STREAM_INTERRUPTS, STREAM_TTFF,
    STREAM_TURNS,
};
use crate::render::ChatView;
use crate::transcript::{Transcript, Turn, to_message_params};
use crate::types::ChatCompletionParams;

/// How often a waiting cycle re-checks the interrupt flag.
const INTERRUPT_POLL: Duration = Duration::from_millis(50);

/// Whether a session is waiting for a reply stream to start.
///
/// Clones share the same flag, so a UI task can observe it while a cycle runs.
#[derive(Debug, Clone, Default)]
pub struct LoadingFlag {
    flag: Arc<AtomicBool>,
}

impl LoadingFlag {
    /// Creates a flag that is not loading.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true while a request is submitted but its stream is not yet
    /// available.
    pub fn is_loading(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Sets the flag; it is cleared when the returned guard is dropped.
    #[must_use = "loading ends as soon as the guard is dropped"]
    pub fn begin(&self) -> LoadingGuard {
        self.flag.store(true, Ordering::Release);
        LoadingGuard {
            flag: Arc::clone(&self.flag),
        }
    }
}

/// Clears its [`LoadingFlag`] when dropped.
#[derive(Debug)]
pub struct LoadingGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Client-side state of one chat widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    /// Base URL requests are sent to.
    pub endpoint: String,
    /// Model identifier sent with requests.
    pub model: String,
    /// True between submission and the reply stream becoming available.
    pub loading: bool,
}

/// What one request/response cycle produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleOutcome {
    /// Fragments received from the stream.
    pub fragments: usize,
    /// Assistant turns appended; one per content piece.
    pub turns_appended: usize,
    /// True if the user stopped the reply before the stream ended.
    pub interrupted: bool,
}

/// Aggregated stats for a chat session.
#[derive(Debug, Clone)]
pub struct SessionStats {
    /// The model used for the session.
    pub model: String,
    /// The server endpoint.
    pub endpoint: String,
    /// The number of stored turns.
    pub turn_count: usize,
    /// The number of display blocks.
    pub block_count: usize,
    /// The number of turns the next request would carry.
    pub window_len: usize,
    /// The number of cycles started.
    pub cycles: u64,
    /// Total fragments received across all cycles.
    pub fragments_received: u64,
    /// Sampling temperature, if set.
    pub temperature: Option<f32>,
    /// Token cap, if set.
    pub max_tokens: Option<u32>,
}

/// A chat session that manages conversation state and streaming replies.
///
/// Cycles borrow the session mutably, so at most one cycle per session can be
/// in flight; a second submission has to wait for the first to finish.
pub struct ChatSession<B: ChatBackend = ChatClient> {
    backend: B,
    config: ChatConfig,
    transcript: Transcript,
    loading: LoadingFlag,
    cycles: u64,
    fragments_received: u64,
}

impl ChatSession<ChatClient> {
    /// Creates a session that talks to the endpoint named in `config`.
    pub fn new(config: ChatConfig) -> Result<Self> {
        let client = ChatClient::with_options(
            config.api_key.clone(),
            Some(&config.endpoint),
            config.timeout,
        )?;
        Ok(Self::with_backend(client, config))
    }
}

impl<B: ChatBackend> ChatSession<B> {
    /// Creates a session with a custom backend.
    pub fn with_backend(backend: B, config: ChatConfig) -> Self {
        Self {
            backend,
            config,
            transcript: Transcript::new(),
            loading: LoadingFlag::new(),
            cycles: 0,
            fragments_received: 0,
        }
    }

    /// Sends a user message and streams the reply into the transcript.
    ///
    /// This method:
    /// 1. Appends the user turn, so it stays visible whatever happens next
    /// 2. Sends the history window with `loading` set
    /// 3. Clears `loading` once the reply stream is available
    /// 4. Appends one assistant turn per content piece as fragments arrive
    ///
    /// `view` is re-rendered after every change.  Setting `interrupted` ends
    /// the cycle within a fraction of a second, even while waiting on a stalled
    /// server; turns already appended are kept.
    ///
    /// # Errors
    ///
    /// Returns a validation error for blank input, the submission error if
    /// the request fails before streaming, or a streaming error if the stream
    /// breaks.  Assistant turns appended before a streaming error are kept.
    pub async fn submit(
        &mut self,
        text: &str,
        view: &mut dyn ChatView,
        interrupted: &AtomicBool,
    ) -> Result<CycleOutcome> {
        if text.trim().is_empty() {
            return Err(Error::validation(
                "message is empty",
                Some("text".to_string()),
            ));
        }

        self.cycles += 1;
        self.transcript
            .append(Turn::user(text, OffsetDateTime::now_utc()));
        self.refresh(view);

        let params = ChatCompletionParams::new(
            self.config.model.clone(),
            to_message_params(self.transcript.window()),
        )
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.max_tokens);
        tracing::debug!(
            cycle = self.cycles,
            history = params.messages.len(),
            "starting chat cycle"
        );

        let started = Instant::now();
        let loading = self.loading.begin();
        self.refresh(view);
        let submitted = tokio::select! {
            biased;
            _ = interrupt_requested(interrupted) => None,
            submitted = self.backend.stream(params) => Some(submitted),
        };
        drop(loading);
        self.refresh(view);

        let mut outcome = CycleOutcome::default();
        let mut stream = match submitted {
            Some(Ok(stream)) => stream,
            Some(Err(err)) => {
                tracing::warn!(error = %err, "chat request failed before streaming");
                return Err(err);
            }
            None => {
                STREAM_INTERRUPTS.click();
                outcome.interrupted = true;
                view.print_interrupted();
                tracing::debug!("chat cycle interrupted before streaming");
                return Ok(outcome);
            }
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = interrupt_requested(interrupted) => None,
                next = stream.next() => Some(next),
            };
            let chunk = match next {
                None => {
                    STREAM_INTERRUPTS.click();
                    outcome.interrupted = true;
                    view.print_interrupted();
                    break;
                }
                Some(Some(Ok(chunk))) => chunk,
                Some(Some(Err(err))) => {
                    STREAM_ERRORS.click();
                    tracing::warn!(
                        error = %err,
                        turns_kept = outcome.turns_appended,
                        "reply stream failed"
                    );
                    return Err(err.into_stream_error());
                }
                Some(None) => break,
            };

            if outcome.fragments == 0 {
                STREAM_TTFF.add(started.elapsed().as_secs_f64());
            }
            outcome.fragments += 1;
            self.fragments_received += 1;
            STREAM_FRAGMENTS.click();

            let timestamp = fragment_timestamp(chunk.created);
            tracing::debug!(
                fragment = outcome.fragments,
                pieces = chunk.choices.len(),
                "received reply fragment"
            );
            for choice in &chunk.choices {
                self.transcript.append(Turn::assistant(
                    choice.delta.content_or_empty(),
                    timestamp,
                ));
                outcome.turns_appended += 1;
                STREAM_TURNS.click();
            }
            self.refresh(view);
        }

        STREAM_DURATION.add(started.elapsed().as_secs_f64());
        if !outcome.interrupted {
            view.finish_response();
        }
        tracing::debug!(
            fragments = outcome.fragments,
            turns = outcome.turns_appended,
            interrupted = outcome.interrupted,
            "chat cycle finished"
        );
        Ok(outcome)
    }

    /// Re-renders `view` from the current transcript and loading state.
    pub fn refresh(&self, view: &mut dyn ChatView) {
        let blocks = aggregate(self.transcript.snapshot());
        view.render(&blocks, self.loading.is_loading());
    }

    /// Returns the transcript.
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Returns the transcript grouped for display.
    pub fn blocks(&self) -> Vec<Block<'_>> {
        aggregate(self.transcript.snapshot())
    }

    /// Returns true while a submitted request waits for its stream.
    pub fn is_loading(&self) -> bool {
        self.loading.is_loading()
    }

    /// Returns a handle that observes this session's loading flag.
    pub fn loading_flag(&self) -> LoadingFlag {
        self.loading.clone()
    }

    /// Returns the endpoint, model and loading flag.
    pub fn state(&self) -> SessionState {
        SessionState {
            endpoint: self.config.endpoint.clone(),
            model: self.config.model.clone(),
            loading: self.is_loading(),
        }
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Changes the model used for later replies.
    pub fn set_model(&mut self, model: impl Into<String>) {
        self.config.model = model.into();
    }

    /// Returns the current model.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Sets the sampling temperature.
    pub fn set_temperature(&mut self, temperature: Option<f32>) {
        self.config.temperature = temperature;
    }

    /// Sets the maximum tokens per response.
    pub fn set_max_tokens(&mut self, max_tokens: Option<u32>) {
        self.config.max_tokens = max_tokens;
    }

    /// Returns the current session statistics snapshot.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            model: self.config.model.clone(),
            endpoint: self.config.endpoint.clone(),
            turn_count: self.transcript.len(),
            block_count: self.blocks().len(),
            window_len: self.transcript.window().len(),
            cycles: self.cycles,
            fragments_received: self.fragments_received,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        }
    }
}

/// Resolves once `flag` is set.
async fn interrupt_requested(flag: &AtomicBool) {
    while !flag.load(Ordering::Relaxed) {
        tokio::time::sleep(INTERRUPT_POLL).await;
    }
}

/// Converts a fragment's server time, falling back to the local clock when the
/// server sent none or an unrepresentable one.
fn fragment_timestamp(created: i64) -> OffsetDateTime {
    if created <= 0 {
        return OffsetDateTime::now_utc();
    }
    OffsetDateTime::from_unix_timestamp(created).unwrap_or_else(|_| OffsetDateTime::now_utc())
}
