//! # mailsift
//!
//! Keyword-first email classification.
//!
//! A message body is first checked against an ordered keyword table
//! (Urgent, Financial, HR). When no keyword matches, a single fallback
//! decides: either a nearest-neighbor vote over an embedded, labeled corpus
//! or a TF-IDF logistic regression model trained on the heuristic's labels.
//!
//! ## Features
//!
//! - Deterministic keyword heuristic with explicit precedence
//! - Semantic kNN fallback behind a pluggable embedding trait
//! - Supervised fallback with a stratified train/test evaluation
//! - Atomic, checksummed artifact publication on file or memory storage

pub mod analysis;
pub mod category;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod features;
pub mod heuristic;
pub mod message;
pub mod pipeline;
pub mod semantic;
pub mod storage;
pub mod training;

pub mod prelude {
    pub use crate::category::CategoryLabel;
    pub use crate::config::MailsiftConfig;
    pub use crate::error::{MailsiftError, Result};
    pub use crate::heuristic::{HeuristicOutcome, KeywordClassifier};
    pub use crate::message::MessageParser;
    pub use crate::pipeline::{ClassificationPipeline, Classification, Outcome};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
