//! Streaming chat against OpenAI-compatible servers.
//!
//! The transcript is an append-only list of [`Turn`]s.  Each streamed reply
//! piece becomes its own turn, and [`aggregate`] groups consecutive turns by
//! author for display.

// Public modules
pub mod blocks;
pub mod chat;
pub mod client;
pub mod client_logger;
pub mod error;
pub mod observability;
pub mod render;
pub mod sse;
pub mod transcript;
pub mod types;

// Re-exports
pub use blocks::{Block, aggregate};
pub use client::{ChatBackend, ChatClient, ChunkStream};
pub use client_logger::ClientLogger;
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use render::{ChatView, TerminalView};
pub use transcript::{HISTORY_WINDOW, Transcript, Turn, window};
pub use types::*;
