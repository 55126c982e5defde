//! Local feature-hashing embedder.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::analysis::analyzer::{Analyzer, PipelineAnalyzer};
use crate::analysis::token_filter::stop::StopFilter;
use crate::embedding::text_embedder::TextEmbedder;
use crate::error::{MailsiftError, Result};

/// Default dimensionality, matching common sentence-embedding models.
pub const DEFAULT_DIMENSION: usize = 384;

/// Embeds text by hashing its words and word bigrams into a fixed number of
/// signed buckets, then L2-normalizing.
///
/// Needs no model files or network, and is stable across processes and
/// platforms because the bucket hash is CRC32 rather than a seeded hasher.
/// Texts that share vocabulary land close together under cosine distance.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
    analyzer: PipelineAnalyzer,
    name: String,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(MailsiftError::invalid_config(
                "embedding dimension must be greater than zero",
            ));
        }

        Ok(HashingEmbedder {
            dimension,
            analyzer: PipelineAnalyzer::unicode_lowercase().add_filter(Arc::new(StopFilter::new())),
            name: format!("hashing-{dimension}"),
        })
    }

    fn bucket(&self, feature: &str) -> (usize, f32) {
        let hash = crc32fast::hash(feature.as_bytes());
        let index = (hash as usize) % self.dimension;
        let sign = if hash & 0x8000_0000 == 0 { 1.0 } else { -1.0 };
        (index, sign)
    }

    fn embed_sync(&self, text: &str) -> Result<Vec<f32>> {
        let terms = self.analyzer.terms(text)?;

        let mut counts: HashMap<String, f32> = HashMap::new();
        for term in &terms {
            *counts.entry(term.clone()).or_insert(0.0) += 1.0;
        }
        for pair in terms.windows(2) {
            // bigrams weigh half as much as single words
            *counts.entry(format!("{} {}", pair[0], pair[1])).or_insert(0.0) += 0.5;
        }

        let mut vector = vec![0.0f32; self.dimension];
        for (feature, count) in &counts {
            let (index, sign) = self.bucket(feature);
            vector[index] += sign * (1.0 + count.ln());
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(vector)
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        HashingEmbedder {
            dimension: DEFAULT_DIMENSION,
            analyzer: PipelineAnalyzer::unicode_lowercase().add_filter(Arc::new(StopFilter::new())),
            name: format!("hashing-{DEFAULT_DIMENSION}"),
        }
    }
}

#[async_trait]
impl TextEmbedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_sync(text)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.name
    }
}
