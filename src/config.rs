//! Runtime and build configuration.
//!
//! Every field has a default, so an empty JSON object (or no file at all) is
//! a complete configuration. Only the sections that differ need to be given:
//!
//! ```
//! use mailsift::config::MailsiftConfig;
//!
//! let config = MailsiftConfig::from_json(r#"{ "index": { "k": 7 } }"#).unwrap();
//! assert_eq!(config.index.k, 7);
//! assert_eq!(config.training.seed, 42);
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::classifier::{ClassWeighting, LogisticRegressionConfig};
use crate::embedding::{HashingEmbedder, ResilientEmbedder, RetryPolicy, TextEmbedder};
use crate::error::{MailsiftError, Result};
use crate::features::vocabulary::{EXPLORATORY_MAX_FEATURES, TRAINING_MAX_FEATURES, VocabularyConfig};
use crate::heuristic::{KeywordClassifier, KeywordRule};
use crate::semantic::DistanceMetric;
use crate::semantic::index::{DEFAULT_BATCH_SIZE, DEFAULT_K};
use crate::storage::{ArtifactStore, StorageBackend, StorageConfig, StorageFactory};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailsiftConfig {
    /// Replaces the built-in keyword table when set.
    pub keyword_rules: Option<Vec<KeywordRule>>,
    pub features: FeatureSettings,
    pub training: TrainingSettings,
    pub index: IndexSettings,
    pub embedding: EmbeddingSettings,
    pub storage: StorageSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureSettings {
    pub max_features: usize,
    pub exploratory_max_features: usize,
    /// Principal components emitted by `explore`.
    pub explore_components: usize,
    pub explore_row_limit: Option<usize>,
}

impl Default for FeatureSettings {
    fn default() -> Self {
        FeatureSettings {
            max_features: TRAINING_MAX_FEATURES,
            exploratory_max_features: EXPLORATORY_MAX_FEATURES,
            explore_components: 3,
            explore_row_limit: Some(2000),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSettings {
    pub row_limit: Option<usize>,
    pub distribution_row_limit: Option<usize>,
    pub test_fraction: f64,
    pub seed: u64,
    pub max_iterations: usize,
    pub inverse_regularization: f64,
    pub tolerance: f64,
    pub class_weighting: ClassWeighting,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        let logistic = LogisticRegressionConfig::default();
        TrainingSettings {
            row_limit: Some(10_000),
            distribution_row_limit: Some(5000),
            test_fraction: 0.2,
            seed: 42,
            max_iterations: logistic.max_iterations,
            inverse_regularization: logistic.inverse_regularization,
            tolerance: logistic.tolerance,
            class_weighting: logistic.class_weighting,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub row_limit: Option<usize>,
    pub batch_size: usize,
    pub k: usize,
    pub metric: DistanceMetric,
}

impl Default for IndexSettings {
    fn default() -> Self {
        IndexSettings {
            row_limit: Some(2000),
            batch_size: DEFAULT_BATCH_SIZE,
            k: DEFAULT_K,
            metric: DistanceMetric::Cosine,
        }
    }
}

/// Which embedding backend to use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local feature hashing; needs nothing external.
    Hashing { dimension: usize },
    /// An OpenAI-compatible HTTP endpoint (feature `embeddings-openai`).
    Openai {
        base_url: String,
        model: String,
        dimension: usize,
        /// Environment variable holding the API key.
        api_key_env: String,
    },
}

impl Default for EmbeddingProvider {
    fn default() -> Self {
        EmbeddingProvider::Hashing {
            dimension: crate::embedding::hashing::DEFAULT_DIMENSION,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProvider,
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    pub io: StorageConfig,
}

impl MailsiftConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: MailsiftConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            MailsiftError::invalid_config(format!("cannot read {}: {e}", path.display()))
        })?;
        debug!("Loaded configuration from {}", path.display());
        Self::from_json(&json)
    }

    /// Reject values no job could run with.
    pub fn validate(&self) -> Result<()> {
        if self.features.max_features == 0 || self.features.exploratory_max_features == 0 {
            return Err(MailsiftError::invalid_config("max_features must be positive"));
        }
        if self.features.explore_components == 0 {
            return Err(MailsiftError::invalid_config(
                "explore_components must be positive",
            ));
        }
        let t = &self.training;
        if !(t.test_fraction > 0.0 && t.test_fraction < 1.0) {
            return Err(MailsiftError::invalid_config(format!(
                "test_fraction must be in (0, 1), got {}",
                t.test_fraction
            )));
        }
        if t.max_iterations == 0 {
            return Err(MailsiftError::invalid_config("max_iterations must be positive"));
        }
        if !(t.inverse_regularization > 0.0) || !(t.tolerance > 0.0) {
            return Err(MailsiftError::invalid_config(
                "inverse_regularization and tolerance must be positive",
            ));
        }
        for limit in [
            t.row_limit,
            t.distribution_row_limit,
            self.index.row_limit,
            self.features.explore_row_limit,
        ] {
            if limit == Some(0) {
                return Err(MailsiftError::invalid_config("row limits must be positive"));
            }
        }
        if self.index.batch_size == 0 || self.index.k == 0 {
            return Err(MailsiftError::invalid_config(
                "index batch_size and k must be positive",
            ));
        }
        match &self.embedding.provider {
            EmbeddingProvider::Hashing { dimension } | EmbeddingProvider::Openai { dimension, .. }
                if *dimension == 0 =>
            {
                return Err(MailsiftError::invalid_config(
                    "embedding dimension must be positive",
                ));
            }
            _ => {}
        }
        if self.embedding.retry.timeout.is_zero() {
            return Err(MailsiftError::invalid_config(
                "embedding timeout must be positive",
            ));
        }
        if let Some(rules) = &self.keyword_rules {
            KeywordClassifier::with_rules(rules.clone())?;
        }
        Ok(())
    }

    /// Point file storage at `directory`.
    pub fn with_artifact_dir(mut self, directory: PathBuf) -> Self {
        self.storage.backend = StorageBackend::File { directory };
        self
    }

    pub fn vocabulary(&self) -> VocabularyConfig {
        VocabularyConfig {
            max_features: self.features.max_features,
        }
    }

    pub fn exploratory_vocabulary(&self) -> VocabularyConfig {
        VocabularyConfig {
            max_features: self.features.exploratory_max_features,
        }
    }

    pub fn logistic(&self) -> LogisticRegressionConfig {
        LogisticRegressionConfig {
            max_iterations: self.training.max_iterations,
            inverse_regularization: self.training.inverse_regularization,
            tolerance: self.training.tolerance,
            class_weighting: self.training.class_weighting,
        }
    }

    pub fn keyword_classifier(&self) -> Result<KeywordClassifier> {
        match &self.keyword_rules {
            Some(rules) => KeywordClassifier::with_rules(rules.clone()),
            None => Ok(KeywordClassifier::new()),
        }
    }

    pub fn artifact_store(&self) -> Result<ArtifactStore> {
        let storage = StorageFactory::create(&self.storage.backend, self.storage.io.clone())?;
        Ok(ArtifactStore::new(storage))
    }

    /// The configured embedder wrapped with the retry policy.
    pub fn embedder(&self) -> Result<Arc<dyn TextEmbedder>> {
        let inner: Arc<dyn TextEmbedder> = match &self.embedding.provider {
            EmbeddingProvider::Hashing { dimension } => Arc::new(HashingEmbedder::new(*dimension)?),
            EmbeddingProvider::Openai {
                base_url,
                model,
                dimension,
                api_key_env,
            } => openai_embedder(base_url, model, *dimension, api_key_env)?,
        };
        Ok(Arc::new(ResilientEmbedder::new(inner, self.embedding.retry)))
    }
}

#[cfg(feature = "embeddings-openai")]
fn openai_embedder(
    base_url: &str,
    model: &str,
    dimension: usize,
    api_key_env: &str,
) -> Result<Arc<dyn TextEmbedder>> {
    let api_key = std::env::var(api_key_env).map_err(|_| {
        MailsiftError::invalid_config(format!("environment variable {api_key_env} is not set"))
    })?;
    Ok(Arc::new(
        crate::embedding::OpenAITextEmbedder::with_endpoint(
            base_url,
            api_key,
            model.to_string(),
            dimension,
            None,
        )?,
    ))
}

#[cfg(not(feature = "embeddings-openai"))]
fn openai_embedder(
    _base_url: &str,
    _model: &str,
    _dimension: usize,
    _api_key_env: &str,
) -> Result<Arc<dyn TextEmbedder>> {
    Err(MailsiftError::invalid_config(
        "the openai embedding provider needs the `embeddings-openai` feature",
    ))
}
