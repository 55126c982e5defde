//! Supervised classification over TF-IDF features.
//!
//! Training is an offline step: split the labeled vectors with
//! [`stratified_split`], fit a [`LogisticRegression`], check it with
//! [`evaluate`], then publish the resulting [`ClassifierBundle`]. At serving
//! time the bundle is loaded once and only [`ClassifierBundle::classify_text`]
//! is called.

pub mod logistic;
pub mod metrics;
pub mod model;
pub mod split;

pub use logistic::{ClassWeighting, LogisticRegression, LogisticRegressionConfig};
pub use metrics::{ClassMetrics, ConfusionMatrix, EvaluationReport, evaluate};
pub use model::{ClassProbability, ClassifierBundle, Prediction, TrainedClassifierModel, TrainingMetadata};
pub use split::{DatasetSplit, stratified_split};
