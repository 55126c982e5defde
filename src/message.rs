//! Message body extraction.
//!
//! A raw message is a header block, a blank separator line, and a body.
//! [`MessageParser`] drops the headers and returns the trimmed body. A
//! message without a blank line has no body; that is not an error.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// An unparsed message: header lines, a blank separator line, then the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage<'a>(Cow<'a, str>);

impl RawMessage<'_> {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse with the default [`MessageParser`].
    pub fn parse(&self) -> ParsedDocument {
        MessageParser::new().parse(self.as_str())
    }

    pub fn into_owned(self) -> RawMessage<'static> {
        RawMessage(Cow::Owned(self.0.into_owned()))
    }
}

impl<'a> From<&'a str> for RawMessage<'a> {
    fn from(raw: &'a str) -> Self {
        RawMessage(Cow::Borrowed(raw))
    }
}

impl From<String> for RawMessage<'static> {
    fn from(raw: String) -> Self {
        RawMessage(Cow::Owned(raw))
    }
}

impl AsRef<str> for RawMessage<'_> {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// The body extracted from a raw message.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParsedDocument {
    /// Trimmed body text, possibly empty.
    pub body: String,
}

impl ParsedDocument {
    /// Create a document from an already extracted body.
    pub fn new<S: Into<String>>(body: S) -> Self {
        ParsedDocument { body: body.into() }
    }

    /// Whether the body is empty.
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// The body text.
    pub fn text(&self) -> &str {
        &self.body
    }
}

/// Splits raw messages into headers and body.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageParser;

impl MessageParser {
    pub fn new() -> Self {
        MessageParser
    }

    /// Extract the body of `raw`.
    ///
    /// Lines before the first whitespace-only line are headers and are
    /// dropped; the separator itself is dropped too. Every following line is
    /// kept verbatim, including later blank lines.
    pub fn parse(&self, raw: &str) -> ParsedDocument {
        let mut in_body = false;
        let mut body_lines: Vec<&str> = Vec::new();

        for line in raw.split('\n') {
            if in_body {
                body_lines.push(line);
            } else if line.trim().is_empty() {
                in_body = true;
            }
        }

        ParsedDocument {
            body: body_lines.join("\n").trim().to_string(),
        }
    }
}
