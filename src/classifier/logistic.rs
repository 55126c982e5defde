//! Multinomial logistic regression.
//!
//! Minimizes the class-weighted mean cross-entropy plus an L2 penalty on the
//! weights (the intercepts are not penalized):
//!
//! ```text
//! L(W, b) = 1/n Σ s_i · −log softmax(W x_i + b)[y_i] + 1/(2·C·n) · ‖W‖²
//! ```
//!
//! using full-batch gradient descent with a backtracking (Armijo) line
//! search. Everything runs sequentially, so training on the same data with
//! the same settings always yields the same model.

use std::collections::BTreeMap;

use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::category::CategoryLabel;
use crate::classifier::model::{TrainedClassifierModel, TrainingMetadata};
use crate::error::{MailsiftError, Result};
use crate::features::vector::FeatureVector;

const ARMIJO_FACTOR: f64 = 1e-4;
const MIN_STEP: f64 = 1e-12;
const MAX_STEP: f64 = 1e4;

/// How training examples are weighted per class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassWeighting {
    /// Weight each class by `n_samples / (n_classes × class_count)`.
    #[default]
    Balanced,
    /// Every example counts the same.
    Uniform,
}

/// Settings for [`LogisticRegression`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegressionConfig {
    /// Upper bound on gradient steps.
    pub max_iterations: usize,
    /// Inverse regularization strength; larger means weaker.
    pub inverse_regularization: f64,
    /// Stop when the gradient norm falls below this value.
    pub tolerance: f64,
    pub class_weighting: ClassWeighting,
}

impl Default for LogisticRegressionConfig {
    fn default() -> Self {
        LogisticRegressionConfig {
            max_iterations: 1000,
            inverse_regularization: 1.0,
            tolerance: 1e-4,
            class_weighting: ClassWeighting::Balanced,
        }
    }
}

/// Trainer for [`TrainedClassifierModel`].
#[derive(Debug, Clone, Default)]
pub struct LogisticRegression {
    config: LogisticRegressionConfig,
}

/// Parameters being optimized.
#[derive(Clone)]
struct Parameters {
    weights: Vec<Vec<f64>>,
    intercepts: Vec<f64>,
}

impl Parameters {
    fn zeros(n_classes: usize, dimension: usize) -> Self {
        Parameters {
            weights: vec![vec![0.0; dimension]; n_classes],
            intercepts: vec![0.0; n_classes],
        }
    }

    fn squared_norm(&self) -> f64 {
        let w: f64 = self.weights.iter().flatten().map(|v| v * v).sum();
        let b: f64 = self.intercepts.iter().map(|v| v * v).sum();
        w + b
    }

    fn stepped(&self, gradient: &Parameters, step: f64) -> Parameters {
        Parameters {
            weights: self
                .weights
                .iter()
                .zip(&gradient.weights)
                .map(|(w, g)| w.iter().zip(g).map(|(w, g)| w - step * g).collect())
                .collect(),
            intercepts: self
                .intercepts
                .iter()
                .zip(&gradient.intercepts)
                .map(|(b, g)| b - step * g)
                .collect(),
        }
    }
}

/// Numerically stable softmax of `logits`, in place.
pub(crate) fn softmax_in_place(logits: &mut [f64]) {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut sum = 0.0;
    for z in logits.iter_mut() {
        *z = (*z - max).exp();
        sum += *z;
    }
    for z in logits.iter_mut() {
        *z /= sum;
    }
}

pub(crate) fn logits(
    weights: &[Vec<f64>],
    intercepts: &[f64],
    vector: &FeatureVector,
) -> Vec<f64> {
    weights
        .iter()
        .zip(intercepts)
        .map(|(w, b)| vector.dot(w) + b)
        .collect()
}

struct Problem<'a> {
    features: &'a [FeatureVector],
    targets: Vec<usize>,
    sample_weights: Vec<f64>,
    penalty: f64,
    dimension: usize,
    n_classes: usize,
}

impl Problem<'_> {
    fn loss(&self, params: &Parameters) -> f64 {
        let n = self.features.len() as f64;
        let mut total = 0.0;

        for ((vector, &target), &weight) in
            self.features.iter().zip(&self.targets).zip(&self.sample_weights)
        {
            let z = logits(&params.weights, &params.intercepts, vector);
            let max = z.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let log_sum = z.iter().map(|v| (v - max).exp()).sum::<f64>().ln() + max;
            total += weight * (log_sum - z[target]);
        }

        let w_norm: f64 = params.weights.iter().flatten().map(|v| v * v).sum();
        total / n + 0.5 * self.penalty * w_norm
    }

    fn gradient(&self, params: &Parameters) -> Parameters {
        let n = self.features.len() as f64;
        let mut gradient = Parameters::zeros(self.n_classes, self.dimension);

        for ((vector, &target), &weight) in
            self.features.iter().zip(&self.targets).zip(&self.sample_weights)
        {
            let mut p = logits(&params.weights, &params.intercepts, vector);
            softmax_in_place(&mut p);

            for (class, probability) in p.iter().enumerate() {
                let indicator = if class == target { 1.0 } else { 0.0 };
                let residual = weight * (probability - indicator) / n;
                if residual == 0.0 {
                    continue;
                }
                let row = &mut gradient.weights[class];
                for (index, value) in vector.iter() {
                    row[index] += residual * value;
                }
                gradient.intercepts[class] += residual;
            }
        }

        for (g_row, w_row) in gradient.weights.iter_mut().zip(&params.weights) {
            for (g, w) in g_row.iter_mut().zip(w_row) {
                *g += self.penalty * w;
            }
        }

        gradient
    }
}

impl LogisticRegression {
    pub fn new(config: LogisticRegressionConfig) -> Self {
        LogisticRegression { config }
    }

    pub fn config(&self) -> &LogisticRegressionConfig {
        &self.config
    }

    /// Fit a model on `features` labeled with `labels`.
    pub fn fit(
        &self,
        features: &[FeatureVector],
        labels: &[CategoryLabel],
    ) -> Result<TrainedClassifierModel> {
        if features.is_empty() {
            return Err(MailsiftError::training_data("no training examples"));
        }
        if features.len() != labels.len() {
            return Err(MailsiftError::invalid_argument(format!(
                "{} feature vectors but {} labels",
                features.len(),
                labels.len()
            )));
        }
        if self.config.inverse_regularization <= 0.0 {
            return Err(MailsiftError::invalid_config(
                "inverse regularization must be positive",
            ));
        }

        let dimension = features[0].dimension();
        if let Some(bad) = features.iter().find(|v| v.dimension() != dimension) {
            return Err(MailsiftError::DimensionMismatch {
                expected: dimension,
                actual: bad.dimension(),
            });
        }

        let mut counts: BTreeMap<CategoryLabel, usize> = BTreeMap::new();
        for label in labels {
            *counts.entry(*label).or_insert(0) += 1;
        }
        if counts.len() < 2 {
            return Err(MailsiftError::training_data(
                "training data must contain at least two categories",
            ));
        }

        let classes: Vec<CategoryLabel> = counts.keys().copied().collect();
        let n = features.len() as f64;
        let n_classes = classes.len();

        let class_weight = |label: &CategoryLabel| match self.config.class_weighting {
            ClassWeighting::Balanced => n / (n_classes as f64 * counts[label] as f64),
            ClassWeighting::Uniform => 1.0,
        };

        let problem = Problem {
            features,
            targets: labels
                .iter()
                .map(|label| classes.iter().position(|c| c == label).unwrap_or(0))
                .collect(),
            sample_weights: labels.iter().map(class_weight).collect(),
            penalty: 1.0 / (self.config.inverse_regularization * n),
            dimension,
            n_classes,
        };

        let mut params = Parameters::zeros(n_classes, dimension);
        let mut loss = problem.loss(&params);
        let mut step = 1.0;
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.config.max_iterations {
            let gradient = problem.gradient(&params);
            let gradient_norm_sq = gradient.squared_norm();
            if gradient_norm_sq.sqrt() < self.config.tolerance {
                converged = true;
                break;
            }

            let mut accepted = None;
            while step >= MIN_STEP {
                let candidate = params.stepped(&gradient, step);
                let candidate_loss = problem.loss(&candidate);
                if candidate_loss <= loss - ARMIJO_FACTOR * step * gradient_norm_sq {
                    accepted = Some((candidate, candidate_loss));
                    break;
                }
                step *= 0.5;
            }

            iterations += 1;
            match accepted {
                Some((candidate, candidate_loss)) => {
                    params = candidate;
                    loss = candidate_loss;
                    step = (step * 2.0).min(MAX_STEP);
                }
                None => {
                    // no descent step left at machine precision
                    converged = true;
                    break;
                }
            }

            if iterations % 100 == 0 {
                debug!("iteration {iterations}: loss {loss:.6}");
            }
        }

        if converged {
            info!("logistic regression converged after {iterations} iterations (loss {loss:.6})");
        } else {
            warn!(
                "logistic regression stopped at the iteration limit ({}) with loss {loss:.6}",
                self.config.max_iterations
            );
        }

        Ok(TrainedClassifierModel::new(
            classes,
            params.weights,
            params.intercepts,
            dimension,
            TrainingMetadata {
                trained_at: Utc::now(),
                n_samples: features.len(),
                iterations,
                final_loss: loss,
                converged,
            },
        ))
    }
}
