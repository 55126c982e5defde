//! Loading published artifacts into a fallback at process start.

use std::sync::Arc;

use clap::ValueEnum;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::classifier::ClassifierBundle;
use crate::config::MailsiftConfig;
use crate::error::Result;
use crate::pipeline::fallback::{Fallback, SemanticFallback, SupervisedFallback};
use crate::semantic::SemanticIndex;
use crate::storage::{ArtifactStore, CLASSIFIER_ARTIFACT, SEMANTIC_INDEX_ARTIFACT};

/// Which fallback the serving pipeline uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FallbackStrategy {
    /// Nearest neighbors in the semantic index.
    #[default]
    Semantic,
    /// The trained TF-IDF classifier.
    Supervised,
}

/// Read and decode the classifier bundle, if published.
pub fn load_classifier_bundle(store: &ArtifactStore) -> Result<Option<ClassifierBundle>> {
    store
        .load(CLASSIFIER_ARTIFACT)?
        .map(|bytes| ClassifierBundle::from_json_bytes(&bytes))
        .transpose()
}

/// Read and decode the semantic index, if published.
pub fn load_semantic_index(store: &ArtifactStore) -> Result<Option<SemanticIndex>> {
    store
        .load(SEMANTIC_INDEX_ARTIFACT)?
        .map(|bytes| SemanticIndex::from_bytes(&bytes))
        .transpose()
}

/// Build the fallback for `strategy` from published artifacts.
///
/// A missing or unreadable artifact is logged here, once, and yields
/// `Ok(None)` so the pipeline can still serve heuristic answers. Only
/// configuration errors (such as an unusable embedder) are returned.
pub fn load_fallback(
    strategy: FallbackStrategy,
    store: &ArtifactStore,
    config: &MailsiftConfig,
) -> Result<Option<Arc<dyn Fallback>>> {
    match strategy {
        FallbackStrategy::Supervised => match load_classifier_bundle(store) {
            Ok(Some(bundle)) => {
                info!(
                    "Loaded classifier with {} features and classes {:?}",
                    bundle.vocabulary().len(),
                    bundle.model().classes()
                );
                Ok(Some(Arc::new(SupervisedFallback::new(Arc::new(bundle)))))
            }
            Ok(None) => {
                warn!("{CLASSIFIER_ARTIFACT} has not been published; uncertain messages stay unclassified");
                Ok(None)
            }
            Err(e) => {
                error!("Cannot load {CLASSIFIER_ARTIFACT}: {e}");
                Ok(None)
            }
        },
        FallbackStrategy::Semantic => {
            let index = match load_semantic_index(store) {
                Ok(Some(index)) => index,
                Ok(None) => {
                    warn!("{SEMANTIC_INDEX_ARTIFACT} has not been published; uncertain messages stay unclassified");
                    return Ok(None);
                }
                Err(e) => {
                    error!("Cannot load {SEMANTIC_INDEX_ARTIFACT}: {e}");
                    return Ok(None);
                }
            };

            let embedder = config.embedder()?;
            info!(
                "Loaded semantic index with {} records ({} metric)",
                index.len(),
                index.metric().name()
            );
            match SemanticFallback::new(Arc::new(index), embedder, config.index.k) {
                Ok(fallback) => Ok(Some(Arc::new(fallback))),
                Err(e) => {
                    error!("Semantic index does not match the configured embedder: {e}");
                    Ok(None)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::CategoryLabel;
    use crate::semantic::{DistanceMetric, EmbeddingRecord};
    use crate::storage::StorageBackend;

    fn memory_config() -> MailsiftConfig {
        let mut config = MailsiftConfig::default();
        config.storage.backend = StorageBackend::Memory;
        config
    }

    #[test]
    fn test_missing_artifacts_give_no_fallback() {
        let config = memory_config();
        let store = config.artifact_store().unwrap();

        for strategy in [FallbackStrategy::Semantic, FallbackStrategy::Supervised] {
            assert!(load_fallback(strategy, &store, &config).unwrap().is_none());
        }
    }

    #[test]
    fn test_corrupted_artifact_gives_no_fallback() {
        let config = memory_config();
        let store = config.artifact_store().unwrap();
        store.publish(CLASSIFIER_ARTIFACT, b"not json").unwrap();

        assert!(load_classifier_bundle(&store).is_err());
        assert!(
            load_fallback(FallbackStrategy::Supervised, &store, &config)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_semantic_fallback_loaded() {
        let config = memory_config();
        let store = config.artifact_store().unwrap();
        let index = SemanticIndex::from_records(
            DistanceMetric::Cosine,
            384,
            "hashing-384",
            vec![EmbeddingRecord::new("0", vec![1.0; 384], CategoryLabel::Hr)],
        )
        .unwrap();
        store
            .publish(SEMANTIC_INDEX_ARTIFACT, &index.to_bytes().unwrap())
            .unwrap();

        let fallback = load_fallback(FallbackStrategy::Semantic, &store, &config)
            .unwrap()
            .unwrap();
        assert_eq!(fallback.name(), "semantic");
    }

    #[test]
    fn test_semantic_index_with_other_dimension_is_rejected() {
        let config = memory_config();
        let store = config.artifact_store().unwrap();
        let index =
            SemanticIndex::from_records(DistanceMetric::Cosine, 3, "other", Vec::new()).unwrap();
        store
            .publish(SEMANTIC_INDEX_ARTIFACT, &index.to_bytes().unwrap())
            .unwrap();

        assert!(
            load_fallback(FallbackStrategy::Semantic, &store, &config)
                .unwrap()
                .is_none()
        );
    }
}
