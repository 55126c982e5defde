use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use mailsift::category::CategoryLabel;
use mailsift::config::MailsiftConfig;
use mailsift::embedding::{ResilientEmbedder, RetryPolicy, TextEmbedder};
use mailsift::error::{MailsiftError, Result};
use mailsift::features::{FeatureVocabulary, VocabularyConfig};
use mailsift::heuristic::{HeuristicOutcome, KeywordClassifier};
use mailsift::message::MessageParser;
use mailsift::pipeline::{
    ClassificationPipeline, Fallback, FallbackDecision, FallbackStrategy, Outcome, PipelineState,
    Resolution, SemanticFallback, UnclassifiedReason, load_fallback,
};
use mailsift::semantic::{DistanceMetric, EmbeddingRecord, SemanticIndex};
use mailsift::storage::{
    ArtifactStore, CLASSIFIER_ARTIFACT, FileStorage, Storage, StorageBackend, StorageConfig,
};
use mailsift::training;

struct CountingFallback {
    label: CategoryLabel,
    calls: AtomicUsize,
}

impl CountingFallback {
    fn new(label: CategoryLabel) -> Arc<Self> {
        Arc::new(CountingFallback {
            label,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fallback for CountingFallback {
    async fn classify(&self, _text: &str) -> Result<FallbackDecision> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(FallbackDecision::new(self.label))
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// Maps every text onto the same axis-aligned vector.
struct AxisEmbedder {
    dimension: usize,
}

#[async_trait]
impl TextEmbedder for AxisEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0; self.dimension];
        vector[0] = 1.0;
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "axis"
    }
}

/// Never answers.
struct StalledEmbedder;

#[async_trait]
impl TextEmbedder for StalledEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(MailsiftError::other("unreachable"))
    }

    fn dimension(&self) -> usize {
        4
    }

    fn name(&self) -> &str {
        "axis"
    }
}

fn financial_index(len: usize) -> SemanticIndex {
    let records = (0..len)
        .map(|i| {
            let mut embedding = vec![0.1; 4];
            embedding[i % 4] = 1.0;
            EmbeddingRecord::new(i.to_string(), embedding, CategoryLabel::Financial)
        })
        .collect();
    SemanticIndex::from_records(DistanceMetric::Cosine, 4, "axis", records).unwrap()
}

fn write_corpus(dir: &TempDir) -> PathBuf {
    let bodies = [
        "Urgent: the server is down",
        "Deadline moved to friday",
        "Critical outage in production",
        "Invoice attached for march",
        "The budget spreadsheet is ready",
        "Payment received, thanks",
        "Salary adjustments take effect",
        "Holiday schedule for the team",
        "Onboarding starts monday",
        "Shall we get lunch tomorrow?",
        "Nice photos from the picnic",
        "Can you send the slides?",
    ];
    let path = dir.path().join("emails.jsonl");
    let mut file = std::fs::File::create(&path).unwrap();
    for (i, body) in bodies.iter().enumerate() {
        let message = format!("Message-ID: <{i}@example.com>\nSubject: note\n\n{body}");
        writeln!(file, "{}", serde_json::json!({ "message": message })).unwrap();
    }
    path
}

#[test]
fn urgent_wins_over_financial_and_hr_keywords() {
    let heuristic = KeywordClassifier::new();
    let outcome = heuristic.classify("URGENT: the invoice for your salary review");
    assert_eq!(
        outcome,
        HeuristicOutcome::Matched {
            category: CategoryLabel::Urgent,
            keyword: "urgent".into(),
        }
    );
}

#[tokio::test]
async fn uncertain_text_invokes_the_fallback_once() {
    let fallback = CountingFallback::new(CategoryLabel::Hr);
    let pipeline = ClassificationPipeline::new(KeywordClassifier::new(), Some(fallback.clone()));

    let classification = pipeline.classify("Let's grab lunch tomorrow.").await;

    assert_eq!(fallback.calls(), 1);
    assert_eq!(classification.outcome.label(), Some(CategoryLabel::Hr));
    assert!(matches!(
        classification.outcome,
        Outcome::Resolved {
            resolution: Resolution::Fallback { .. },
            ..
        }
    ));
    assert_eq!(
        classification.trace,
        vec![
            PipelineState::Start,
            PipelineState::HeuristicChecked,
            PipelineState::FallbackNeeded,
            PipelineState::Resolved
        ]
    );
}

#[tokio::test]
async fn general_from_the_fallback_is_final() {
    let fallback = CountingFallback::new(CategoryLabel::General);
    let pipeline = ClassificationPipeline::new(KeywordClassifier::new(), Some(fallback.clone()));

    let classification = pipeline.classify("Can you send me the meeting notes?").await;
    assert_eq!(classification.outcome.label(), Some(CategoryLabel::General));
    assert_eq!(fallback.calls(), 1);
}

#[tokio::test]
async fn keyword_match_never_reaches_the_fallback() {
    let fallback = CountingFallback::new(CategoryLabel::General);
    let pipeline = ClassificationPipeline::new(KeywordClassifier::new(), Some(fallback.clone()));

    let classification = pipeline.classify("This is urgent, please reply asap.").await;
    assert_eq!(classification.outcome.label(), Some(CategoryLabel::Urgent));
    assert_eq!(fallback.calls(), 0);
}

#[tokio::test]
async fn missing_fallback_is_unclassified_not_general() {
    let pipeline = ClassificationPipeline::new(KeywordClassifier::new(), None);

    let classification = pipeline.classify("Let's grab lunch tomorrow.").await;
    assert_eq!(
        classification.outcome,
        Outcome::Unclassified {
            reason: UnclassifiedReason::FallbackUnavailable
        }
    );
}

#[test]
fn parse_keeps_body_after_leading_blank_line() {
    let parser = MessageParser::new();
    let body = "  Quarterly numbers attached.\nSee the sheet.  ";
    let document = parser.parse(&format!("\n\n{body}"));
    assert_eq!(document.text(), body.trim());
}

#[test]
fn transform_is_deterministic() {
    let corpus = [
        "invoice payment overdue",
        "lunch plans for friday",
        "payment received for the invoice",
    ];
    let vocabulary = FeatureVocabulary::fit(&corpus, &VocabularyConfig::training()).unwrap();

    let first = vocabulary.transform("the invoice payment").unwrap();
    let second = vocabulary.transform("the invoice payment").unwrap();
    assert_eq!(first, second);

    let refit = FeatureVocabulary::fit(&corpus, &VocabularyConfig::training()).unwrap();
    assert_eq!(refit.transform("the invoice payment").unwrap(), first);
}

#[tokio::test]
async fn single_category_index_always_votes_that_category() {
    let index = financial_index(6);
    let embedder = AxisEmbedder { dimension: 4 };

    for k in 1..=index.len() {
        let vote = index.query("anything at all", k, &embedder).await.unwrap();
        assert_eq!(vote.label, CategoryLabel::Financial, "k = {k}");
        assert_eq!(vote.neighbors.len(), k);
    }
}

#[tokio::test]
async fn stalled_embedder_degrades_to_unclassified() {
    let policy = RetryPolicy {
        timeout: Duration::from_millis(20),
        max_retries: 1,
        backoff: Duration::from_millis(1),
    };
    let embedder: Arc<dyn TextEmbedder> =
        Arc::new(ResilientEmbedder::new(Arc::new(StalledEmbedder), policy));
    let fallback = SemanticFallback::new(Arc::new(financial_index(3)), embedder, 3).unwrap();
    let pipeline = ClassificationPipeline::new(KeywordClassifier::new(), Some(Arc::new(fallback)));

    let classification = pipeline.classify("Let's grab lunch tomorrow.").await;
    assert!(matches!(
        classification.outcome,
        Outcome::Unclassified {
            reason: UnclassifiedReason::EmbeddingUnavailable(_)
        }
    ));
}

#[test]
fn interrupted_publish_leaves_only_a_temporary() {
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(FileStorage::new(dir.path(), StorageConfig::default()).unwrap());
    let store = ArtifactStore::new(storage.clone());

    let mut writer = store.begin(CLASSIFIER_ARTIFACT).unwrap();
    writer.write_all(b"{\"partial\":").unwrap();
    drop(writer);

    assert!(!dir.path().join(CLASSIFIER_ARTIFACT).exists());
    assert_eq!(store.load(CLASSIFIER_ARTIFACT).unwrap(), None);
    let files = storage.list_files().unwrap();
    assert_eq!(files.len(), 1);
    assert!(files[0].ends_with(".tmp"));
}

#[tokio::test]
async fn trained_model_serves_uncertain_messages() {
    let dir = TempDir::new().unwrap();
    let corpus = write_corpus(&dir);
    let config = MailsiftConfig::default().with_artifact_dir(dir.path().join("artifacts"));
    let store = config.artifact_store().unwrap();

    training::train_classifier(&config, &store, &corpus).unwrap();
    let fallback = load_fallback(FallbackStrategy::Supervised, &store, &config)
        .unwrap()
        .unwrap();
    let pipeline = ClassificationPipeline::new(KeywordClassifier::new(), Some(fallback));

    let raw = "From: colleague@example.com\nSubject: hey\n\nShall we get lunch tomorrow?";
    let classification = pipeline.classify_message(raw).await;
    match classification.outcome {
        Outcome::Resolved {
            resolution: Resolution::Fallback { strategy, .. },
            ..
        } => assert_eq!(strategy, "supervised"),
        other => panic!("expected a fallback resolution, got {other:?}"),
    }
}

#[tokio::test]
async fn semantic_index_serves_uncertain_messages() {
    let dir = TempDir::new().unwrap();
    let corpus = write_corpus(&dir);
    let mut config = MailsiftConfig::default();
    config.storage.backend = StorageBackend::Memory;
    config.index.k = 1;
    let store = config.artifact_store().unwrap();
    let embedder = config.embedder().unwrap();

    let report = training::build_semantic_index(&config, &store, &corpus, embedder.as_ref())
        .await
        .unwrap();
    assert_eq!(report.records, 12);

    let fallback = load_fallback(FallbackStrategy::Semantic, &store, &config)
        .unwrap()
        .unwrap();
    let pipeline = ClassificationPipeline::new(KeywordClassifier::new(), Some(fallback));

    let classification = pipeline.classify("Shall we get lunch tomorrow?").await;
    assert_eq!(classification.outcome.label(), Some(CategoryLabel::General));
}
