//! Offline jobs: label statistics, model training, index building, smoke
//! checks and the exploratory projection.
//!
//! Every job reads a capped sample of the corpus, labels it with the keyword
//! heuristic, and (for the two build jobs) publishes its artifact atomically
//! only after everything before it succeeded.

use std::io::Write;
use std::path::Path;

use log::{info, warn};
use serde::Serialize;

use crate::category::CategoryLabel;
use crate::classifier::{
    ClassProbability, ClassifierBundle, EvaluationReport, LogisticRegression, Prediction,
    TrainingMetadata, evaluate, stratified_split,
};
use crate::config::MailsiftConfig;
use crate::corpus::{CorpusReader, LabeledDataset};
use crate::embedding::TextEmbedder;
use crate::error::{MailsiftError, Result};
use crate::features::{FeatureVector, FeatureVocabulary, PrincipalProjection};
use crate::heuristic::{HeuristicOutcome, KeywordClassifier};
use crate::message::MessageParser;
use crate::semantic::SemanticIndexBuilder;
use crate::storage::{ArtifactStore, CLASSIFIER_ARTIFACT, SEMANTIC_INDEX_ARTIFACT};

/// Sentences with a known answer, run by [`verify_cases`].
pub const VERIFICATION_CASES: [(&str, CategoryLabel); 8] = [
    ("This is an urgent deadline for the project.", CategoryLabel::Urgent),
    ("Please process this invoice for payment.", CategoryLabel::Financial),
    ("I would like to discuss my performance review.", CategoryLabel::Hr),
    ("Let's grab lunch tomorrow.", CategoryLabel::General),
    ("Immediate action required on the server breach.", CategoryLabel::Urgent),
    ("The quarterly financial report is attached.", CategoryLabel::Financial),
    ("New employee onboarding starts next week.", CategoryLabel::Hr),
    ("Can you send me the meeting notes?", CategoryLabel::General),
];

/// Sentences sent straight to the model to show its probabilities.
pub const MODEL_PROBES: [&str; 6] = [
    "This is urgent, please reply asap.",
    "Here is the invoice for the last month.",
    "I need to discuss my salary and benefits.",
    "Hey, how are you doing today?",
    "URGENT: System failure",
    "Budget report attached",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LabelCount {
    pub label: CategoryLabel,
    pub count: usize,
}

/// Documents per heuristic label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelDistribution {
    pub total: usize,
    /// In precedence order; labels that never occur are omitted.
    pub counts: Vec<LabelCount>,
}

impl LabelDistribution {
    pub fn of(dataset: &LabeledDataset) -> Self {
        LabelDistribution {
            total: dataset.len(),
            counts: dataset
                .label_counts()
                .into_iter()
                .map(|(label, count)| LabelCount { label, count })
                .collect(),
        }
    }

    pub fn count(&self, label: CategoryLabel) -> usize {
        self.counts
            .iter()
            .find(|c| c.label == label)
            .map_or(0, |c| c.count)
    }
}

fn load_dataset(
    config: &MailsiftConfig,
    corpus: &Path,
    limit: Option<usize>,
) -> Result<LabeledDataset> {
    let rows = CorpusReader::new(corpus).limit(limit).read()?;
    if rows.is_empty() {
        return Err(MailsiftError::training_data(format!(
            "{} contains no messages",
            corpus.display()
        )));
    }
    let heuristic = config.keyword_classifier()?;
    Ok(LabeledDataset::from_rows(rows, &MessageParser::new(), &heuristic))
}

/// Parse and label a sample of the corpus and count the labels.
pub fn label_distribution(config: &MailsiftConfig, corpus: &Path) -> Result<LabelDistribution> {
    let dataset = load_dataset(config, corpus, config.training.distribution_row_limit)?;
    Ok(LabelDistribution::of(&dataset))
}

/// Outcome of [`train_classifier`].
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub distribution: LabelDistribution,
    pub n_features: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub evaluation: EvaluationReport,
    pub metadata: TrainingMetadata,
}

/// Fit a vocabulary and a classifier on the heuristic labels, evaluate on a
/// stratified held-out split and publish [`CLASSIFIER_ARTIFACT`].
pub fn train_classifier(
    config: &MailsiftConfig,
    store: &ArtifactStore,
    corpus: &Path,
) -> Result<TrainingReport> {
    store.sweep_temporaries(CLASSIFIER_ARTIFACT)?;

    let dataset = load_dataset(config, corpus, config.training.row_limit)?;
    let distribution = LabelDistribution::of(&dataset);
    info!("Training on {} documents: {:?}", dataset.len(), distribution.counts);

    let texts = dataset.texts();
    let labels = dataset.labels();
    let vocabulary = FeatureVocabulary::fit(&texts, &config.vocabulary())?;
    let vectors = vocabulary.transform_batch(&texts)?;
    info!("Fitted vocabulary with {} features", vocabulary.len());

    let split = stratified_split(&labels, config.training.test_fraction, config.training.seed)?;
    let (train_x, train_y) = select(&vectors, &labels, &split.train);
    let (test_x, test_y) = select(&vectors, &labels, &split.test);

    let model = LogisticRegression::new(config.logistic()).fit(&train_x, &train_y)?;
    let metadata = model.metadata().clone();
    if !metadata.converged {
        warn!(
            "Training stopped after {} iterations without converging (loss {:.6})",
            metadata.iterations, metadata.final_loss
        );
    }

    let evaluation = evaluate(&model, &test_x, &test_y)?;
    info!("Held-out accuracy: {:.4}", evaluation.accuracy);

    let bundle = ClassifierBundle::new(vocabulary, model)?;
    store.publish(CLASSIFIER_ARTIFACT, &bundle.to_json_bytes()?)?;

    Ok(TrainingReport {
        distribution,
        n_features: bundle.vocabulary().len(),
        n_train: split.train.len(),
        n_test: split.test.len(),
        evaluation,
        metadata,
    })
}

fn select(
    vectors: &[FeatureVector],
    labels: &[CategoryLabel],
    rows: &[usize],
) -> (Vec<FeatureVector>, Vec<CategoryLabel>) {
    rows.iter()
        .map(|&row| (vectors[row].clone(), labels[row]))
        .unzip()
}

/// Outcome of [`build_semantic_index`].
#[derive(Debug, Clone, Serialize)]
pub struct IndexReport {
    pub distribution: LabelDistribution,
    pub records: usize,
    pub dimension: usize,
    pub embedder: String,
}

/// Embed the non-empty documents of a corpus sample and publish
/// [`SEMANTIC_INDEX_ARTIFACT`], replacing any previous index.
///
/// Record ids are the documents' corpus row numbers.
pub async fn build_semantic_index(
    config: &MailsiftConfig,
    store: &ArtifactStore,
    corpus: &Path,
    embedder: &dyn TextEmbedder,
) -> Result<IndexReport> {
    store.sweep_temporaries(SEMANTIC_INDEX_ARTIFACT)?;

    let dataset = load_dataset(config, corpus, config.index.row_limit)?.without_empty();
    if dataset.is_empty() {
        return Err(MailsiftError::training_data(
            "no documents with a non-empty body to index",
        ));
    }
    let distribution = LabelDistribution::of(&dataset);

    let documents = dataset.examples().iter().map(|example| {
        (
            example.row.to_string(),
            example.document.text().to_string(),
            example.label,
        )
    });
    let index = SemanticIndexBuilder::new()
        .metric(config.index.metric)
        .batch_size(config.index.batch_size)
        .build(documents, embedder)
        .await?;

    store.publish(SEMANTIC_INDEX_ARTIFACT, &index.to_bytes()?)?;

    Ok(IndexReport {
        distribution,
        records: index.len(),
        dimension: index.dimension(),
        embedder: index.embedder_name().to_string(),
    })
}

/// Which stage produced a verification answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "decided_by", rename_all = "lowercase")]
pub enum CaseSource {
    Heuristic { keyword: String },
    Model { probabilities: Vec<ClassProbability> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseResult {
    pub text: String,
    pub expected: CategoryLabel,
    pub predicted: CategoryLabel,
    pub passed: bool,
    #[serde(flatten)]
    pub source: CaseSource,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelProbe {
    pub text: String,
    pub prediction: Prediction,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationReport {
    pub cases: Vec<CaseResult>,
    pub probes: Vec<ModelProbe>,
}

impl VerificationReport {
    pub fn passed(&self) -> usize {
        self.cases.iter().filter(|c| c.passed).count()
    }

    pub fn all_passed(&self) -> bool {
        self.passed() == self.cases.len()
    }
}

/// Run [`VERIFICATION_CASES`] through the heuristic and, where it is
/// uncertain, the trained model; then run [`MODEL_PROBES`] through the model
/// alone.
pub fn verify_cases(
    heuristic: &KeywordClassifier,
    bundle: &ClassifierBundle,
) -> Result<VerificationReport> {
    let mut cases = Vec::with_capacity(VERIFICATION_CASES.len());
    for (text, expected) in VERIFICATION_CASES {
        let (predicted, source) = match heuristic.classify(text) {
            HeuristicOutcome::Matched { category, keyword } => {
                (category, CaseSource::Heuristic { keyword })
            }
            HeuristicOutcome::Uncertain => {
                let prediction = bundle.classify_text(text)?;
                (
                    prediction.label,
                    CaseSource::Model {
                        probabilities: prediction.probabilities,
                    },
                )
            }
        };
        cases.push(CaseResult {
            text: text.to_string(),
            expected,
            predicted,
            passed: predicted == expected,
            source,
        });
    }

    let probes = MODEL_PROBES
        .iter()
        .map(|text| {
            Ok(ModelProbe {
                text: text.to_string(),
                prediction: bundle.classify_text(text)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(VerificationReport { cases, probes })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedDocument {
    pub label: CategoryLabel,
    pub coordinates: Vec<f64>,
}

/// Documents projected onto their leading principal components.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Exploration {
    pub n_features: usize,
    pub explained_variance: Vec<f64>,
    pub points: Vec<ProjectedDocument>,
}

impl Exploration {
    /// Write `category,pc1,pc2,...` rows with a header.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::Writer::from_writer(writer);

        let mut header = vec!["category".to_string()];
        header.extend((1..=self.explained_variance.len()).map(|i| format!("pc{i}")));
        csv.write_record(&header)?;

        for point in &self.points {
            let mut record = vec![point.label.name().to_string()];
            record.extend(point.coordinates.iter().map(|c| c.to_string()));
            csv.write_record(&record)?;
        }
        csv.flush()?;
        Ok(())
    }
}

/// Fit the exploratory vocabulary on a corpus sample and project every
/// document onto the first principal components.
pub fn explore(config: &MailsiftConfig, corpus: &Path) -> Result<Exploration> {
    let dataset = load_dataset(config, corpus, config.features.explore_row_limit)?;
    let texts = dataset.texts();

    let vocabulary = FeatureVocabulary::fit(&texts, &config.exploratory_vocabulary())?;
    let vectors = vocabulary.transform_batch(&texts)?;
    let components = config.features.explore_components.min(vocabulary.len());
    let projection = PrincipalProjection::fit(&vectors, components, config.training.seed)?;

    let points = vectors
        .iter()
        .zip(dataset.labels())
        .map(|(vector, label)| {
            Ok(ProjectedDocument {
                label,
                coordinates: projection.transform(vector)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Exploration {
        n_features: vocabulary.len(),
        explained_variance: projection.explained_variance().to_vec(),
        points,
    })
}
