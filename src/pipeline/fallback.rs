//! Strategies consulted when the heuristic is uncertain.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::category::CategoryLabel;
use crate::classifier::{ClassProbability, ClassifierBundle};
use crate::embedding::TextEmbedder;
use crate::error::Result;
use crate::semantic::{NeighborVote, SemanticIndex};

/// Why a fallback chose its label.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Evidence {
    /// The neighbor vote of a semantic index.
    Neighbors(NeighborVote),
    /// The class distribution of a trained model.
    Probabilities(Vec<ClassProbability>),
    /// Nothing beyond the label.
    Opaque,
}

/// A fallback's answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FallbackDecision {
    pub label: CategoryLabel,
    pub evidence: Evidence,
}

impl FallbackDecision {
    pub fn new(label: CategoryLabel) -> Self {
        FallbackDecision {
            label,
            evidence: Evidence::Opaque,
        }
    }
}

/// A classifier for text the keyword heuristic could not place.
///
/// Whatever label a fallback returns is final, General included.
#[async_trait]
pub trait Fallback: Send + Sync {
    async fn classify(&self, text: &str) -> Result<FallbackDecision>;

    /// Short identifier reported with each resolution.
    fn name(&self) -> &str;
}

/// Majority vote among the nearest records of a semantic index.
pub struct SemanticFallback {
    index: Arc<SemanticIndex>,
    embedder: Arc<dyn TextEmbedder>,
    k: usize,
}

impl SemanticFallback {
    /// Fails if `embedder` cannot produce vectors for `index`.
    pub fn new(index: Arc<SemanticIndex>, embedder: Arc<dyn TextEmbedder>, k: usize) -> Result<Self> {
        index.check_embedder(embedder.as_ref())?;
        Ok(SemanticFallback { index, embedder, k })
    }

    pub fn index(&self) -> &SemanticIndex {
        &self.index
    }
}

#[async_trait]
impl Fallback for SemanticFallback {
    async fn classify(&self, text: &str) -> Result<FallbackDecision> {
        let vote = self.index.query(text, self.k, self.embedder.as_ref()).await?;
        Ok(FallbackDecision {
            label: vote.label,
            evidence: Evidence::Neighbors(vote),
        })
    }

    fn name(&self) -> &str {
        "semantic"
    }
}

/// Prediction of the trained TF-IDF classifier.
pub struct SupervisedFallback {
    bundle: Arc<ClassifierBundle>,
}

impl SupervisedFallback {
    pub fn new(bundle: Arc<ClassifierBundle>) -> Self {
        SupervisedFallback { bundle }
    }
}

#[async_trait]
impl Fallback for SupervisedFallback {
    async fn classify(&self, text: &str) -> Result<FallbackDecision> {
        let prediction = self.bundle.classify_text(text)?;
        Ok(FallbackDecision {
            label: prediction.label,
            evidence: Evidence::Probabilities(prediction.probabilities),
        })
    }

    fn name(&self) -> &str {
        "supervised"
    }
}
