//! Token type flowing through the analysis pipeline.

use serde::{Deserialize, Serialize};

/// One term and where it came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub text: String,

    /// Index in the stream, counted before any filtering.
    pub position: usize,

    /// Byte range in the source text.
    pub start_offset: usize,
    pub end_offset: usize,
}

impl Token {
    /// A token spanning `0..text.len()`.
    pub fn new<S: Into<String>>(text: S, position: usize) -> Self {
        let text = text.into();
        let end_offset = text.len();
        Token {
            text,
            position,
            start_offset: 0,
            end_offset,
        }
    }

    pub fn with_offsets<S: Into<String>>(
        text: S,
        position: usize,
        start_offset: usize,
        end_offset: usize,
    ) -> Self {
        Token {
            text: text.into(),
            position,
            start_offset,
            end_offset,
        }
    }

    /// Replace the text, keeping position and offsets.
    pub fn with_text<S: Into<String>>(mut self, text: S) -> Self {
        self.text = text.into();
        self
    }
}

/// Tokens are streamed lazily through the filter chain.
pub type TokenStream = Box<dyn Iterator<Item = Token> + Send>;
