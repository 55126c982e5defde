//! Text analysis used by the feature model and the local embedder.
//!
//! An [`Analyzer`](analyzer::Analyzer) is a tokenizer followed by a chain of
//! token filters. [`StandardAnalyzer`](analyzer::StandardAnalyzer) is the
//! bag-of-words pipeline: word tokens of two or more characters, lowercased,
//! English stop words removed.

pub mod analyzer;
pub mod token;
pub mod token_filter;
pub mod tokenizer;
