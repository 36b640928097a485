//! Display grouping of the transcript.
//!
//! A [`Block`] is one maximal run of consecutive turns by the same author.
//! Blocks borrow their text from the transcript and are rebuilt from scratch
//! whenever the transcript changes; they carry no identity between rebuilds.

use crate::transcript::Turn;
use crate::types::Author;

/// A run of consecutive same-author turns, ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block<'a> {
    /// The author shared by every turn in the run.
    pub author: Author,
    /// The text of each turn in the run, in transcript order.
    pub segments: Vec<&'a str>,
}

impl Block<'_> {
    fn open(author: Author) -> Self {
        Self {
            author,
            segments: Vec::new(),
        }
    }

    /// Returns the segments joined with no separator.
    ///
    /// Markup that straddles a fragment boundary only parses correctly on the
    /// joined text, so renderers should format this rather than each segment.
    pub fn text(&self) -> String {
        self.segments.concat()
    }

    /// Returns the label shown above the block.
    pub fn header(&self) -> &'static str {
        header(self.author)
    }
}

/// Returns the label shown above blocks written by `author`.
pub fn header(author: Author) -> &'static str {
    match author {
        Author::User => "🧑‍💻 You",
        Author::Assistant => "🤖 Friendly Bot",
    }
}

/// Groups a transcript into blocks in a single left-to-right pass.
///
/// Every turn contributes exactly one segment, empty ones included, so the
/// concatenation of all segments equals the concatenation of all turn texts.
pub fn aggregate(turns: &[Turn]) -> Vec<Block<'_>> {
    let mut blocks = Vec::new();
    let mut current: Option<Block<'_>> = None;
    for turn in turns {
        match current.as_mut() {
            Some(block) if block.author == turn.author => {}
            _ => {
                if let Some(done) = current.take() {
                    blocks.push(done);
                }
                current = Some(Block::open(turn.author));
            }
        }
        if let Some(block) = current.as_mut() {
            block.segments.push(turn.text.as_str());
        }
    }
    if let Some(done) = current {
        blocks.push(done);
    }
    blocks
}
