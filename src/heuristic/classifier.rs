//! Keyword-based classifier.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::category::CategoryLabel;
use crate::error::{MailsiftError, Result};

use super::keyword_set::{KeywordRule, default_rules};

/// Result of running the keyword heuristic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeuristicOutcome {
    /// A phrase from `category`'s set occurs in the text.
    Matched {
        category: CategoryLabel,
        keyword: String,
    },
    /// No phrase matched; a fallback has to decide.
    Uncertain,
}

impl HeuristicOutcome {
    /// The matched category, if any.
    pub fn category(&self) -> Option<CategoryLabel> {
        match self {
            HeuristicOutcome::Matched { category, .. } => Some(*category),
            HeuristicOutcome::Uncertain => None,
        }
    }

    pub fn is_uncertain(&self) -> bool {
        matches!(self, HeuristicOutcome::Uncertain)
    }
}

/// Keyword-based classifier.
///
/// Rules are scanned in order and the first rule with a matching phrase
/// wins, which gives Urgent precedence over Financial and Financial over HR
/// with the default table.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    rules: Vec<KeywordRule>,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl KeywordClassifier {
    /// Create a classifier with the canonical rule table.
    pub fn new() -> Self {
        KeywordClassifier {
            rules: default_rules(),
        }
    }

    /// Create a classifier from a custom rule table.
    ///
    /// Rules must be listed in category precedence order with at most one
    /// rule per category, since the first matching rule wins.
    pub fn with_rules(rules: Vec<KeywordRule>) -> Result<Self> {
        for rule in &rules {
            rule.validate()?;
        }
        for pair in rules.windows(2) {
            let (previous, next) = (pair[0].category, pair[1].category);
            if next.precedence() <= previous.precedence() {
                return Err(MailsiftError::invalid_config(format!(
                    "keyword rule for {next} must come before {previous}, \
                     one rule per category in precedence order"
                )));
            }
        }
        Ok(KeywordClassifier { rules })
    }

    /// The rule table in scan order.
    pub fn rules(&self) -> &[KeywordRule] {
        &self.rules
    }

    /// Classify `text` by keyword containment.
    pub fn classify(&self, text: &str) -> HeuristicOutcome {
        let lowered = text.to_lowercase();

        for rule in &self.rules {
            if let Some(keyword) = rule.keywords.find_in(&lowered) {
                debug!("keyword '{keyword}' matched category {}", rule.category);
                return HeuristicOutcome::Matched {
                    category: rule.category,
                    keyword: keyword.to_string(),
                };
            }
        }

        HeuristicOutcome::Uncertain
    }

    /// Label `text` for dataset construction; Uncertain becomes General.
    pub fn label(&self, text: &str) -> CategoryLabel {
        self.classify(text)
            .category()
            .unwrap_or(CategoryLabel::General)
    }
}
