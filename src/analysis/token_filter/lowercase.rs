//! Case folding.

use crate::analysis::token::TokenStream;
use crate::analysis::token_filter::Filter;
use crate::error::Result;

/// Lowercases token text with Unicode rules. Positions and offsets are kept.
#[derive(Clone, Debug, Default)]
pub struct LowercaseFilter;

impl LowercaseFilter {
    pub fn new() -> Self {
        LowercaseFilter
    }
}

impl Filter for LowercaseFilter {
    fn filter(&self, tokens: TokenStream) -> Result<TokenStream> {
        Ok(Box::new(tokens.map(|token| {
            if token.text.chars().any(char::is_uppercase) {
                let folded = token.text.to_lowercase();
                token.with_text(folded)
            } else {
                token
            }
        })))
    }

    fn name(&self) -> &'static str {
        "lowercase"
    }
}
