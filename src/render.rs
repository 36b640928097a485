//! Output rendering for the chat surface.
//!
//! A [`ChatView`] is handed the full, freshly aggregated block list every time
//! the transcript or the loading flag changes.  [`TerminalView`] turns those
//! repeated snapshots into append-only terminal output by remembering how much
//! it has already printed.

use std::io::{self, Stdout, Write};

use crate::blocks::Block;
use crate::types::Author;

/// ANSI escape code for dim text (used for the loading indicator).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for bold text (used for block headers).
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code for blue text (used for the user's header).
const ANSI_BLUE: &str = "\x1b[34m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI sequence that returns to column 0 and erases the line.
const ANSI_CLEAR_LINE: &str = "\r\x1b[2K";

/// Text shown while waiting for the reply stream to start.
pub const LOADING_TEXT: &str = "🤖 I am thinking...";

/// Trait for surfaces that display the conversation.
pub trait ChatView: Send {
    /// Show the current blocks and loading state.
    ///
    /// Called after every transcript append and every loading change, always
    /// with the complete block list.
    fn render(&mut self, blocks: &[Block<'_>], loading: bool);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Called when the user stops a reply before the stream ends.
    fn print_interrupted(&mut self) {}

    /// Called when a reply stream ends normally.
    fn finish_response(&mut self) {}
}

/// How far into the block list a [`TerminalView`] has printed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Cursor {
    /// Blocks whose header has been handled; the last one may still grow.
    blocks: usize,
    /// Bytes of the last block's joined text already handled.
    bytes: usize,
}

/// Incremental terminal renderer with optional ANSI styling.
pub struct TerminalView<W: Write + Send = Stdout> {
    out: W,
    use_color: bool,
    echo_user: bool,
    cursor: Cursor,
    showing_loading: bool,
    line_start: bool,
}

impl TerminalView<Stdout> {
    /// Creates a view on stdout with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a view on stdout with the specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::with_writer(io::stdout(), use_color)
    }
}

impl Default for TerminalView<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> TerminalView<W> {
    /// Creates a view on an arbitrary writer.
    pub fn with_writer(out: W, use_color: bool) -> Self {
        Self {
            out,
            use_color,
            echo_user: true,
            cursor: Cursor::default(),
            showing_loading: false,
            line_start: true,
        }
    }

    /// Sets whether user blocks are printed.
    ///
    /// A line editor already shows what the user typed, so interactive use
    /// turns this off.
    pub fn echo_user(mut self, echo: bool) -> Self {
        self.echo_user = echo;
        self
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_raw(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let _ = self.out.write_all(text.as_bytes());
        self.line_start = text.ends_with('\n');
    }

    fn write_sanitized(&mut self, text: &str) {
        let clean: String = text
            .chars()
            .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
            .collect();
        self.write_raw(&clean);
    }

    fn end_line(&mut self) {
        if !self.line_start {
            self.write_raw("\n");
        }
    }

    fn write_header(&mut self, block: &Block<'_>) {
        self.end_line();
        let header = block.header();
        if self.use_color {
            let color = match block.author {
                Author::User => ANSI_BLUE,
                Author::Assistant => "",
            };
            self.write_raw(&format!("{ANSI_BOLD}{color}{header}{ANSI_RESET}\n"));
        } else {
            self.write_raw(&format!("{header}\n"));
        }
    }

    fn show_loading(&mut self) {
        self.end_line();
        if self.use_color {
            self.write_raw(&format!("{ANSI_DIM}{LOADING_TEXT}{ANSI_RESET}"));
        } else {
            self.write_raw(LOADING_TEXT);
        }
        self.showing_loading = true;
    }

    fn hide_loading(&mut self) {
        if self.use_color {
            self.write_raw(ANSI_CLEAR_LINE);
            self.line_start = true;
        } else {
            self.write_raw("\n");
        }
        self.showing_loading = false;
    }

    fn flush(&mut self) {
        let _ = self.out.flush();
    }
}

impl<W: Write + Send> ChatView for TerminalView<W> {
    fn render(&mut self, blocks: &[Block<'_>], loading: bool) {
        if self.showing_loading && (!loading || blocks.len() > self.cursor.blocks) {
            self.hide_loading();
        }
        if blocks.len() < self.cursor.blocks {
            self.cursor = Cursor::default();
        }

        let start = self.cursor.blocks.saturating_sub(1);
        for (index, block) in blocks.iter().enumerate().skip(start) {
            let text = block.text();
            if index >= self.cursor.blocks {
                self.cursor = Cursor {
                    blocks: index + 1,
                    bytes: 0,
                };
                if block.author == Author::User && !self.echo_user {
                    self.cursor.bytes = text.len();
                    continue;
                }
                self.write_header(block);
            }
            if let Some(fresh) = text.get(self.cursor.bytes..) {
                self.write_sanitized(fresh);
            }
            self.cursor.bytes = text.len();
        }

        if loading && !self.showing_loading {
            self.show_loading();
        }
        self.flush();
    }

    fn print_error(&mut self, error: &str) {
        self.end_line();
        self.flush();
        eprintln!("Error: {error}");
    }

    fn print_info(&mut self, info: &str) {
        self.end_line();
        self.write_raw(&format!("{info}\n"));
        self.flush();
    }

    fn print_interrupted(&mut self) {
        self.end_line();
        self.write_raw("[interrupted]\n");
        self.flush();
    }

    fn finish_response(&mut self) {
        self.end_line();
        self.flush();
    }
}
