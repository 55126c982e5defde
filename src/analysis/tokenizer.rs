//! Tokenizers split raw text into tokens.

pub mod regex;
pub mod unicode_word;

use crate::analysis::token::TokenStream;
use crate::error::Result;

/// First stage of an analyzer.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Result<TokenStream>;

    /// Short identifier shown in `Debug` output.
    fn name(&self) -> &'static str;
}
