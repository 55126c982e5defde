//! Token filters transform or drop tokens from a stream.

pub mod lowercase;
pub mod stop;

use crate::analysis::token::TokenStream;
use crate::error::Result;

/// Stage applied to the tokenizer output. May rewrite or drop tokens.
pub trait Filter: Send + Sync {
    fn filter(&self, tokens: TokenStream) -> Result<TokenStream>;

    /// Short identifier shown in `Debug` output.
    fn name(&self) -> &'static str;
}
