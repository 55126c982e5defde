//! Category labels assigned to messages.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MailsiftError, Result};

/// One of the four categories a message can be assigned.
///
/// The declaration order is the heuristic precedence order: when several
/// categories could apply, the earlier one wins. The same order is used as
/// the final tie-breaker in neighbor voting and as the row/column order of
/// confusion matrices.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum CategoryLabel {
    Urgent,
    Financial,
    #[serde(rename = "HR")]
    Hr,
    General,
}

impl CategoryLabel {
    /// All labels in precedence order.
    pub const ALL: [CategoryLabel; 4] = [
        CategoryLabel::Urgent,
        CategoryLabel::Financial,
        CategoryLabel::Hr,
        CategoryLabel::General,
    ];

    /// Get the canonical name of this label.
    pub fn name(&self) -> &'static str {
        match self {
            CategoryLabel::Urgent => "Urgent",
            CategoryLabel::Financial => "Financial",
            CategoryLabel::Hr => "HR",
            CategoryLabel::General => "General",
        }
    }

    /// Position of this label in precedence order (0 is highest).
    pub fn precedence(&self) -> usize {
        match self {
            CategoryLabel::Urgent => 0,
            CategoryLabel::Financial => 1,
            CategoryLabel::Hr => 2,
            CategoryLabel::General => 3,
        }
    }

    /// Parse a label from a string, ignoring case.
    pub fn parse_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "urgent" => Ok(CategoryLabel::Urgent),
            "financial" => Ok(CategoryLabel::Financial),
            "hr" => Ok(CategoryLabel::Hr),
            "general" => Ok(CategoryLabel::General),
            _ => Err(MailsiftError::invalid_argument(format!(
                "Unknown category label: {s}"
            ))),
        }
    }
}

impl fmt::Display for CategoryLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CategoryLabel {
    type Err = MailsiftError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_order() {
        let mut labels = vec![
            CategoryLabel::General,
            CategoryLabel::Hr,
            CategoryLabel::Urgent,
            CategoryLabel::Financial,
        ];
        labels.sort();
        assert_eq!(labels, CategoryLabel::ALL.to_vec());

        for (i, label) in CategoryLabel::ALL.iter().enumerate() {
            assert_eq!(label.precedence(), i);
        }
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("hr".parse::<CategoryLabel>().unwrap(), CategoryLabel::Hr);
        assert_eq!(
            "Financial".parse::<CategoryLabel>().unwrap(),
            CategoryLabel::Financial
        );
        assert_eq!(CategoryLabel::Hr.to_string(), "HR");
        assert!("Spam".parse::<CategoryLabel>().is_err());
    }

    #[test]
    fn test_serde_uses_canonical_names() {
        let json = serde_json::to_string(&CategoryLabel::Hr).unwrap();
        assert_eq!(json, "\"HR\"");

        let label: CategoryLabel = serde_json::from_str("\"Urgent\"").unwrap();
        assert_eq!(label, CategoryLabel::Urgent);
    }
}
