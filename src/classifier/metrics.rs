//! Held-out evaluation of a trained model.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::category::CategoryLabel;
use crate::classifier::model::TrainedClassifierModel;
use crate::error::{MailsiftError, Result};
use crate::features::vector::FeatureVector;

/// Counts of (actual, predicted) pairs.
///
/// Rows are actual labels and columns predicted labels, both in
/// [`CategoryLabel::ALL`] order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    counts: [[usize; 4]; 4],
}

impl ConfusionMatrix {
    pub fn record(&mut self, actual: CategoryLabel, predicted: CategoryLabel) {
        self.counts[actual.precedence()][predicted.precedence()] += 1;
    }

    pub fn count(&self, actual: CategoryLabel, predicted: CategoryLabel) -> usize {
        self.counts[actual.precedence()][predicted.precedence()]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    /// Number of correct predictions.
    pub fn correct(&self) -> usize {
        (0..4).map(|i| self.counts[i][i]).sum()
    }

    fn row_total(&self, label: CategoryLabel) -> usize {
        self.counts[label.precedence()].iter().sum()
    }

    fn column_total(&self, label: CategoryLabel) -> usize {
        self.counts.iter().map(|row| row[label.precedence()]).sum()
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>10}", "")?;
        for label in CategoryLabel::ALL {
            write!(f, " {:>10}", label.name())?;
        }
        writeln!(f)?;
        for actual in CategoryLabel::ALL {
            write!(f, "{:>10}", actual.name())?;
            for predicted in CategoryLabel::ALL {
                write!(f, " {:>10}", self.count(actual, predicted))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Precision, recall and F1 for one label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: CategoryLabel,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Result of evaluating a model on held-out rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub accuracy: f64,
    pub confusion_matrix: ConfusionMatrix,
    /// Labels that occur in the evaluation set or its predictions.
    pub per_class: Vec<ClassMetrics>,
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Score `model` on `features` against the true `labels`.
pub fn evaluate(
    model: &TrainedClassifierModel,
    features: &[FeatureVector],
    labels: &[CategoryLabel],
) -> Result<EvaluationReport> {
    if features.len() != labels.len() {
        return Err(MailsiftError::invalid_argument(format!(
            "{} feature vectors but {} labels",
            features.len(),
            labels.len()
        )));
    }
    if features.is_empty() {
        return Err(MailsiftError::training_data("evaluation set is empty"));
    }

    let mut confusion_matrix = ConfusionMatrix::default();
    for (vector, actual) in features.iter().zip(labels) {
        let predicted = model.predict(vector)?.label;
        confusion_matrix.record(*actual, predicted);
    }

    let per_class = CategoryLabel::ALL
        .iter()
        .filter_map(|&label| {
            let support = confusion_matrix.row_total(label);
            let predicted = confusion_matrix.column_total(label);
            if support == 0 && predicted == 0 {
                return None;
            }
            let hits = confusion_matrix.count(label, label);
            let precision = ratio(hits, predicted);
            let recall = ratio(hits, support);
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            Some(ClassMetrics {
                label,
                precision,
                recall,
                f1,
                support,
            })
        })
        .collect();

    Ok(EvaluationReport {
        accuracy: ratio(confusion_matrix.correct(), confusion_matrix.total()),
        confusion_matrix,
        per_class,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confusion_matrix_counts() {
        let mut matrix = ConfusionMatrix::default();
        matrix.record(CategoryLabel::Hr, CategoryLabel::Hr);
        matrix.record(CategoryLabel::Hr, CategoryLabel::General);
        matrix.record(CategoryLabel::Urgent, CategoryLabel::Urgent);

        assert_eq!(matrix.total(), 3);
        assert_eq!(matrix.correct(), 2);
        assert_eq!(matrix.count(CategoryLabel::Hr, CategoryLabel::General), 1);
        assert_eq!(matrix.row_total(CategoryLabel::Hr), 2);
        assert_eq!(matrix.column_total(CategoryLabel::General), 1);

        let rendered = matrix.to_string();
        assert!(rendered.lines().next().unwrap().contains("Financial"));
        assert_eq!(rendered.lines().count(), 5);
    }

    #[test]
    fn test_ratio_handles_zero() {
        assert_eq!(ratio(0, 0), 0.0);
        assert_eq!(ratio(1, 4), 0.25);
    }
}
