//! Two-stage classification: keyword heuristic, then one fallback.
//!
//! ```text
//! Start -> HeuristicChecked -> Resolved
//!                           -> FallbackNeeded -> Resolved
//! ```
//!
//! A keyword match resolves immediately and the fallback is never called.
//! When the heuristic is uncertain the configured [`Fallback`] is called
//! exactly once and its label is final. If there is no fallback, or it
//! fails, the outcome is [`Outcome::Unclassified`] rather than a guess.

pub mod fallback;
pub mod loader;
pub mod outcome;

use std::sync::Arc;

use log::{debug, warn};

use crate::error::MailsiftError;
use crate::heuristic::{HeuristicOutcome, KeywordClassifier};
use crate::message::MessageParser;

pub use fallback::{Evidence, Fallback, FallbackDecision, SemanticFallback, SupervisedFallback};
pub use loader::{FallbackStrategy, load_classifier_bundle, load_fallback, load_semantic_index};
pub use outcome::{Classification, Outcome, PipelineState, Resolution, UnclassifiedReason};

/// The serving pipeline. Immutable and shareable across tasks.
#[derive(Clone)]
pub struct ClassificationPipeline {
    parser: MessageParser,
    heuristic: KeywordClassifier,
    fallback: Option<Arc<dyn Fallback>>,
}

impl ClassificationPipeline {
    pub fn new(heuristic: KeywordClassifier, fallback: Option<Arc<dyn Fallback>>) -> Self {
        ClassificationPipeline {
            parser: MessageParser::new(),
            heuristic,
            fallback,
        }
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    pub fn fallback_name(&self) -> Option<&str> {
        self.fallback.as_ref().map(|f| f.name())
    }

    pub fn heuristic(&self) -> &KeywordClassifier {
        &self.heuristic
    }

    /// Classify a message body.
    pub async fn classify(&self, text: &str) -> Classification {
        let mut trace = vec![PipelineState::Start];

        let heuristic = self.heuristic.classify(text);
        trace.push(PipelineState::HeuristicChecked);

        if let HeuristicOutcome::Matched { category, keyword } = heuristic {
            trace.push(PipelineState::Resolved);
            return Classification {
                outcome: Outcome::Resolved {
                    label: category,
                    resolution: Resolution::Heuristic { keyword },
                },
                trace,
            };
        }

        trace.push(PipelineState::FallbackNeeded);
        let Some(fallback) = &self.fallback else {
            debug!("Heuristic uncertain and no fallback configured");
            return Classification {
                outcome: Outcome::Unclassified {
                    reason: UnclassifiedReason::FallbackUnavailable,
                },
                trace,
            };
        };

        let outcome = match fallback.classify(text).await {
            Ok(decision) => {
                trace.push(PipelineState::Resolved);
                Outcome::Resolved {
                    label: decision.label,
                    resolution: Resolution::Fallback {
                        strategy: fallback.name().to_string(),
                        evidence: decision.evidence,
                    },
                }
            }
            Err(MailsiftError::EmbeddingUnavailable(msg)) => {
                warn!("{} fallback could not embed the text: {msg}", fallback.name());
                Outcome::Unclassified {
                    reason: UnclassifiedReason::EmbeddingUnavailable(msg),
                }
            }
            Err(e) => {
                warn!("{} fallback failed: {e}", fallback.name());
                Outcome::Unclassified {
                    reason: UnclassifiedReason::Failed(e.to_string()),
                }
            }
        };

        Classification { outcome, trace }
    }

    /// Extract the body of a raw message and classify it.
    pub async fn classify_message(&self, raw: &str) -> Classification {
        let document = self.parser.parse(raw);
        self.classify(document.text()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::CategoryLabel;
    use crate::error::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedFallback {
        result: std::result::Result<CategoryLabel, String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Fallback for FixedFallback {
        async fn classify(&self, _text: &str) -> Result<FallbackDecision> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.result {
                Ok(label) => Ok(FallbackDecision::new(*label)),
                Err(msg) => Err(MailsiftError::embedding_unavailable(msg.clone())),
            }
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn pipeline_with(
        result: std::result::Result<CategoryLabel, String>,
    ) -> (ClassificationPipeline, Arc<FixedFallback>) {
        let fallback = Arc::new(FixedFallback {
            result,
            calls: AtomicUsize::new(0),
        });
        let pipeline =
            ClassificationPipeline::new(KeywordClassifier::new(), Some(fallback.clone()));
        (pipeline, fallback)
    }

    #[tokio::test]
    async fn test_heuristic_short_circuits() {
        let (pipeline, fallback) = pipeline_with(Ok(CategoryLabel::General));
        let result = pipeline.classify("Budget meeting moved").await;

        assert_eq!(result.outcome.label(), Some(CategoryLabel::Financial));
        assert_eq!(
            result.trace,
            vec![
                PipelineState::Start,
                PipelineState::HeuristicChecked,
                PipelineState::Resolved
            ]
        );
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_general_from_fallback_is_final() {
        let (pipeline, fallback) = pipeline_with(Ok(CategoryLabel::General));
        let result = pipeline.classify("see you soon").await;

        assert_eq!(result.outcome.label(), Some(CategoryLabel::General));
        assert!(matches!(
            result.outcome,
            Outcome::Resolved {
                resolution: Resolution::Fallback { .. },
                ..
            }
        ));
        assert_eq!(result.trace.last(), Some(&PipelineState::Resolved));
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_fallback_is_unclassified() {
        let pipeline = ClassificationPipeline::new(KeywordClassifier::new(), None);
        let result = pipeline.classify("see you soon").await;

        assert_eq!(
            result.outcome,
            Outcome::Unclassified {
                reason: UnclassifiedReason::FallbackUnavailable
            }
        );
        assert_eq!(result.trace.last(), Some(&PipelineState::FallbackNeeded));
        assert!(!pipeline.has_fallback());
    }

    #[tokio::test]
    async fn test_embedding_failure_is_unclassified() {
        let (pipeline, fallback) = pipeline_with(Err("connection refused".into()));
        let result = pipeline.classify("see you soon").await;

        assert!(matches!(
            result.outcome,
            Outcome::Unclassified {
                reason: UnclassifiedReason::EmbeddingUnavailable(_)
            }
        ));
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_classify_message_parses_body() {
        let (pipeline, _) = pipeline_with(Ok(CategoryLabel::General));
        let raw = "Subject: Emergency drill\nFrom: a@example.com\n\nThanks for the invoice.";
        let result = pipeline.classify_message(raw).await;

        // header keywords are not seen
        assert_eq!(result.outcome.label(), Some(CategoryLabel::Financial));
    }
}
