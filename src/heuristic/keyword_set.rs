//! Keyword sets and the canonical rule table.

use serde::{Deserialize, Serialize};

use crate::category::CategoryLabel;
use crate::error::{MailsiftError, Result};

const URGENT_KEYWORDS: &[&str] = &[
    "urgent",
    "immediate",
    "emergency",
    "deadline",
    "breach",
    "asap",
    "critical",
    "alert",
    "warning",
    "high priority",
    "immediate action",
];

const FINANCIAL_KEYWORDS: &[&str] = &[
    "budget",
    "invoice",
    "purchase",
    "financial",
    "report",
    "quarterly",
    "bank",
    "money",
    "expense",
    "cost",
    "payment",
    "transaction",
    "audit",
    "billing",
];

const HR_KEYWORDS: &[&str] = &[
    "hr",
    "policies",
    "performance",
    "review",
    "insurance",
    "promotion",
    "holiday",
    "leave",
    "benefits",
    "hiring",
    "salary",
    "recruitment",
    "onboarding",
    "resignation",
    "interview",
];

/// An ordered list of lowercase phrases.
///
/// Matching is plain substring containment, so short phrases also match
/// inside longer words ("hr" matches "three").
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeywordSet {
    phrases: Vec<String>,
}

impl KeywordSet {
    /// Create a keyword set from phrases, keeping their order.
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        KeywordSet {
            phrases: phrases.into_iter().map(Into::into).collect(),
        }
    }

    /// The phrases in scan order.
    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }

    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }

    /// Return the first phrase contained in `lowered`.
    ///
    /// `lowered` must already be lowercased.
    pub fn find_in(&self, lowered: &str) -> Option<&str> {
        self.phrases
            .iter()
            .find(|phrase| lowered.contains(phrase.as_str()))
            .map(String::as_str)
    }

    fn validate(&self, category: CategoryLabel) -> Result<()> {
        for phrase in &self.phrases {
            if phrase.trim().is_empty() {
                return Err(MailsiftError::invalid_config(format!(
                    "empty keyword in the {category} rule"
                )));
            }
            if phrase.to_lowercase() != *phrase {
                return Err(MailsiftError::invalid_config(format!(
                    "keyword '{phrase}' in the {category} rule must be lowercase"
                )));
            }
        }
        Ok(())
    }
}

/// A category paired with the phrases that select it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub category: CategoryLabel,
    pub keywords: KeywordSet,
}

impl KeywordRule {
    pub fn new(category: CategoryLabel, keywords: KeywordSet) -> Self {
        KeywordRule { category, keywords }
    }

    /// Check that the rule can be used by the heuristic.
    ///
    /// General is the absence of a match, so it may not carry phrases.
    pub fn validate(&self) -> Result<()> {
        if self.category == CategoryLabel::General {
            return Err(MailsiftError::invalid_config(
                "the General category cannot have keywords",
            ));
        }
        self.keywords.validate(self.category)
    }
}

/// The canonical rule table in precedence order: Urgent, Financial, HR.
pub fn default_rules() -> Vec<KeywordRule> {
    vec![
        KeywordRule::new(
            CategoryLabel::Urgent,
            KeywordSet::new(URGENT_KEYWORDS.iter().copied()),
        ),
        KeywordRule::new(
            CategoryLabel::Financial,
            KeywordSet::new(FINANCIAL_KEYWORDS.iter().copied()),
        ),
        KeywordRule::new(
            CategoryLabel::Hr,
            KeywordSet::new(HR_KEYWORDS.iter().copied()),
        ),
    ]
}
