//! Keyword heuristic, the first stage of classification.
//!
//! The heuristic scans an ordered rule table (Urgent, Financial, HR) and
//! returns the first category with a phrase contained in the lowercased
//! text. When nothing matches, the outcome is [`HeuristicOutcome::Uncertain`],
//! which is deliberately distinct from the General label: General is a
//! possible final answer, Uncertain means "ask a fallback".

pub mod classifier;
pub mod keyword_set;

pub use classifier::{HeuristicOutcome, KeywordClassifier};
pub use keyword_set::{KeywordRule, KeywordSet};
