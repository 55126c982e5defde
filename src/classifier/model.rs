//! Trained classifier and the persisted bundle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::category::CategoryLabel;
use crate::classifier::logistic::{logits, softmax_in_place};
use crate::error::{MailsiftError, Result};
use crate::features::vector::FeatureVector;
use crate::features::vocabulary::FeatureVocabulary;

/// How a model was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetadata {
    pub trained_at: DateTime<Utc>,
    pub n_samples: usize,
    pub iterations: usize,
    pub final_loss: f64,
    pub converged: bool,
}

/// Probability assigned to one category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassProbability {
    pub label: CategoryLabel,
    pub probability: f64,
}

/// The predicted label and the full distribution it was taken from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: CategoryLabel,
    /// One entry per trained class, in class order.
    pub probabilities: Vec<ClassProbability>,
}

impl Prediction {
    pub fn probability_of(&self, label: CategoryLabel) -> Option<f64> {
        self.probabilities
            .iter()
            .find(|p| p.label == label)
            .map(|p| p.probability)
    }
}

/// A fitted multinomial logistic regression model. Immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedClassifierModel {
    classes: Vec<CategoryLabel>,
    weights: Vec<Vec<f64>>,
    intercepts: Vec<f64>,
    dimension: usize,
    metadata: TrainingMetadata,
}

impl TrainedClassifierModel {
    pub(crate) fn new(
        classes: Vec<CategoryLabel>,
        weights: Vec<Vec<f64>>,
        intercepts: Vec<f64>,
        dimension: usize,
        metadata: TrainingMetadata,
    ) -> Self {
        TrainedClassifierModel {
            classes,
            weights,
            intercepts,
            dimension,
            metadata,
        }
    }

    /// Categories the model can predict, in precedence order.
    pub fn classes(&self) -> &[CategoryLabel] {
        &self.classes
    }

    /// Feature dimensionality the model was trained on.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn metadata(&self) -> &TrainingMetadata {
        &self.metadata
    }

    /// Predict the category of `vector`.
    ///
    /// Fails with [`MailsiftError::DimensionMismatch`] when the vector was not
    /// produced by the vocabulary this model was trained with. Probability
    /// ties go to the class with higher precedence.
    pub fn predict(&self, vector: &FeatureVector) -> Result<Prediction> {
        if vector.dimension() != self.dimension {
            return Err(MailsiftError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.dimension(),
            });
        }

        let mut probabilities = logits(&self.weights, &self.intercepts, vector);
        softmax_in_place(&mut probabilities);

        let mut best = 0;
        for (i, p) in probabilities.iter().enumerate() {
            if *p > probabilities[best] {
                best = i;
            }
        }

        Ok(Prediction {
            label: self.classes[best],
            probabilities: self
                .classes
                .iter()
                .zip(probabilities)
                .map(|(&label, probability)| ClassProbability { label, probability })
                .collect(),
        })
    }

    fn validate(&self) -> Result<()> {
        if self.classes.len() != self.weights.len() || self.classes.len() != self.intercepts.len()
        {
            return Err(MailsiftError::artifact_corrupted(
                "class count does not match the weight matrix",
            ));
        }
        if let Some(row) = self.weights.iter().find(|row| row.len() != self.dimension) {
            return Err(MailsiftError::artifact_corrupted(format!(
                "weight row of length {} in a model of dimension {}",
                row.len(),
                self.dimension
            )));
        }
        Ok(())
    }
}

/// A vocabulary and the model trained on its vectors, persisted together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierBundle {
    vocabulary: FeatureVocabulary,
    model: TrainedClassifierModel,
}

impl ClassifierBundle {
    /// Pair a vocabulary with its model; their dimensions must agree.
    pub fn new(vocabulary: FeatureVocabulary, model: TrainedClassifierModel) -> Result<Self> {
        if vocabulary.len() != model.dimension() {
            return Err(MailsiftError::DimensionMismatch {
                expected: model.dimension(),
                actual: vocabulary.len(),
            });
        }
        Ok(ClassifierBundle { vocabulary, model })
    }

    pub fn vocabulary(&self) -> &FeatureVocabulary {
        &self.vocabulary
    }

    pub fn model(&self) -> &TrainedClassifierModel {
        &self.model
    }

    /// Vectorize `text` with the bundled vocabulary and predict.
    pub fn classify_text(&self, text: &str) -> Result<Prediction> {
        let vector = self.vocabulary.transform(text)?;
        self.model.predict(&vector)
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a bundle and check that its parts fit together.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        let bundle: ClassifierBundle = serde_json::from_slice(bytes)?;
        bundle.model.validate()?;
        Self::new(bundle.vocabulary, bundle.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::logistic::LogisticRegression;
    use crate::features::vocabulary::VocabularyConfig;

    fn trained_bundle() -> ClassifierBundle {
        let documents = vec![
            "invoice payment due",
            "invoice for the purchase",
            "salary review meeting",
            "holiday leave request",
            "lunch on friday",
            "coffee tomorrow morning",
        ];
        let labels = vec![
            CategoryLabel::Financial,
            CategoryLabel::Financial,
            CategoryLabel::Hr,
            CategoryLabel::Hr,
            CategoryLabel::General,
            CategoryLabel::General,
        ];
        let vocabulary = FeatureVocabulary::fit(&documents, &VocabularyConfig::training()).unwrap();
        let features = vocabulary.transform_batch(&documents).unwrap();
        let model = LogisticRegression::default().fit(&features, &labels).unwrap();
        ClassifierBundle::new(vocabulary, model).unwrap()
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let bundle = trained_bundle();
        let prediction = bundle.classify_text("please pay the invoice").unwrap();

        assert_eq!(prediction.label, CategoryLabel::Financial);
        assert_eq!(prediction.probabilities.len(), 3);
        let total: f64 = prediction.probabilities.iter().map(|p| p.probability).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_dimension_mismatch() {
        let bundle = trained_bundle();
        let wrong = FeatureVector::zeros(bundle.model().dimension() + 1);
        assert!(matches!(
            bundle.model().predict(&wrong),
            Err(MailsiftError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_bundle_rejects_foreign_vocabulary() {
        let bundle = trained_bundle();
        let other = FeatureVocabulary::fit(&["just one document"], &VocabularyConfig::training())
            .unwrap();
        assert!(ClassifierBundle::new(other, bundle.model().clone()).is_err());
    }

    #[test]
    fn test_json_bytes_round_trip() {
        let bundle = trained_bundle();
        let bytes = bundle.to_json_bytes().unwrap();
        let restored = ClassifierBundle::from_json_bytes(&bytes).unwrap();

        let text = "salary and holiday";
        assert_eq!(
            restored.classify_text(text).unwrap(),
            bundle.classify_text(text).unwrap()
        );
        assert!(ClassifierBundle::from_json_bytes(b"{\"vocabulary\": 1}").is_err());
    }

    #[test]
    fn test_zero_vector_tie_goes_to_precedence() {
        let model = TrainedClassifierModel::new(
            vec![CategoryLabel::Financial, CategoryLabel::General],
            vec![vec![0.0; 2], vec![0.0; 2]],
            vec![0.0, 0.0],
            2,
            TrainingMetadata {
                trained_at: Utc::now(),
                n_samples: 0,
                iterations: 0,
                final_loss: 0.0,
                converged: true,
            },
        );
        let prediction = model.predict(&FeatureVector::zeros(2)).unwrap();
        assert_eq!(prediction.label, CategoryLabel::Financial);
        assert_eq!(prediction.probability_of(CategoryLabel::General), Some(0.5));
    }
}
