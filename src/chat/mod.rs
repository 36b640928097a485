//! Interactive chat built on top of the chatline client library.
//!
//! This module provides the pieces a REPL needs to hold one conversation with
//! an OpenAI-compatible server:
//!
//! - Streaming replies, one transcript turn per received piece
//! - A loading flag covering the wait for the reply stream
//! - Slash commands for session control
//! - Configurable model, endpoint and sampling parameters
//!
//! # Architecture
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`session`]: the request/response cycle and transcript ownership
//! - [`commands`]: slash command parsing

mod commands;
mod config;
mod session;

pub use crate::render::{ChatView, LOADING_TEXT, TerminalView};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig, DEFAULT_MODEL};
pub use session::{
    ChatSession, CycleOutcome, LoadingFlag, LoadingGuard, SessionState, SessionStats,
};
