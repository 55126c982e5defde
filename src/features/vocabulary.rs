//! TF-IDF vocabulary: fitting and applying.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::analysis::analyzer::{Analyzer, StandardAnalyzer};
use crate::error::{MailsiftError, Result};
use crate::features::vector::FeatureVector;

/// Vocabulary size used for training the classifier.
pub const TRAINING_MAX_FEATURES: usize = 5000;

/// Vocabulary size used for exploratory projections.
pub const EXPLORATORY_MAX_FEATURES: usize = 1000;

/// Settings for fitting a vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyConfig {
    /// Maximum number of retained terms.
    pub max_features: usize,
}

impl Default for VocabularyConfig {
    fn default() -> Self {
        Self::training()
    }
}

impl VocabularyConfig {
    pub fn training() -> Self {
        VocabularyConfig {
            max_features: TRAINING_MAX_FEATURES,
        }
    }

    pub fn exploratory() -> Self {
        VocabularyConfig {
            max_features: EXPLORATORY_MAX_FEATURES,
        }
    }
}

/// Serialized form; the lookup table and analyzer are rebuilt on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct VocabularyData {
    terms: Vec<String>,
    idf: Vec<f64>,
    n_documents: usize,
}

/// A fixed term → dimension mapping with an IDF weight per term.
///
/// Dimensions are assigned in lexicographic term order, so two vocabularies
/// fitted on the same corpus are identical.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "VocabularyData", into = "VocabularyData")]
pub struct FeatureVocabulary {
    terms: Vec<String>,
    idf: Vec<f64>,
    n_documents: usize,
    index: HashMap<String, usize>,
    analyzer: StandardAnalyzer,
}

impl std::fmt::Debug for FeatureVocabulary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureVocabulary")
            .field("vocabulary_size", &self.terms.len())
            .field("n_documents", &self.n_documents)
            .field("analyzer", &self.analyzer.name())
            .finish()
    }
}

impl TryFrom<VocabularyData> for FeatureVocabulary {
    type Error = MailsiftError;

    fn try_from(data: VocabularyData) -> Result<Self> {
        if data.terms.len() != data.idf.len() {
            return Err(MailsiftError::artifact_corrupted(format!(
                "vocabulary has {} terms but {} idf weights",
                data.terms.len(),
                data.idf.len()
            )));
        }
        Self::from_parts(data.terms, data.idf, data.n_documents)
    }
}

impl From<FeatureVocabulary> for VocabularyData {
    fn from(vocabulary: FeatureVocabulary) -> Self {
        VocabularyData {
            terms: vocabulary.terms,
            idf: vocabulary.idf,
            n_documents: vocabulary.n_documents,
        }
    }
}

/// Smoothed inverse document frequency.
fn smoothed_idf(n_documents: usize, document_frequency: usize) -> f64 {
    ((n_documents as f64 + 1.0) / (document_frequency as f64 + 1.0)).ln() + 1.0
}

impl FeatureVocabulary {
    fn from_parts(terms: Vec<String>, idf: Vec<f64>, n_documents: usize) -> Result<Self> {
        let index = terms
            .iter()
            .enumerate()
            .map(|(i, term)| (term.clone(), i))
            .collect();

        Ok(FeatureVocabulary {
            terms,
            idf,
            n_documents,
            index,
            analyzer: StandardAnalyzer::new()?,
        })
    }

    /// Fit a vocabulary on `documents`.
    ///
    /// Terms are ranked by their corpus-wide frequency multiplied by their
    /// IDF; the top `max_features` are kept (ties go to the smaller term).
    pub fn fit<S: AsRef<str>>(documents: &[S], config: &VocabularyConfig) -> Result<Self> {
        if documents.is_empty() {
            return Err(MailsiftError::training_data(
                "cannot fit a vocabulary on an empty corpus",
            ));
        }
        if config.max_features == 0 {
            return Err(MailsiftError::invalid_config(
                "max_features must be greater than zero",
            ));
        }

        let analyzer = StandardAnalyzer::new()?;
        let mut term_frequency: HashMap<String, usize> = HashMap::new();
        let mut document_frequency: HashMap<String, usize> = HashMap::new();

        for document in documents {
            let mut counts: HashMap<String, usize> = HashMap::new();
            for term in analyzer.terms(document.as_ref())? {
                *counts.entry(term).or_insert(0) += 1;
            }
            for (term, count) in counts {
                *term_frequency.entry(term.clone()).or_insert(0) += count;
                *document_frequency.entry(term).or_insert(0) += 1;
            }
        }

        if term_frequency.is_empty() {
            return Err(MailsiftError::training_data(
                "corpus produced an empty vocabulary after stop-word removal",
            ));
        }

        let n_documents = documents.len();
        let mut ranked: Vec<(String, f64, f64)> = term_frequency
            .into_iter()
            .map(|(term, tf)| {
                let df = document_frequency.get(&term).copied().unwrap_or(0);
                let idf = smoothed_idf(n_documents, df);
                (term, tf as f64 * idf, idf)
            })
            .collect();

        ranked.sort_by(|a, b| match b.1.total_cmp(&a.1) {
            Ordering::Equal => a.0.cmp(&b.0),
            other => other,
        });
        let discarded = ranked.len().saturating_sub(config.max_features);
        ranked.truncate(config.max_features);
        ranked.sort_by(|a, b| a.0.cmp(&b.0));

        debug!("discarded {discarded} low-importance terms");
        info!(
            "fitted vocabulary of {} terms on {} documents",
            ranked.len(),
            n_documents
        );

        let (terms, idf): (Vec<String>, Vec<f64>) =
            ranked.into_iter().map(|(term, _, idf)| (term, idf)).unzip();

        Self::from_parts(terms, idf, n_documents)
    }

    /// Map `document` to its TF-IDF vector.
    pub fn transform(&self, document: &str) -> Result<FeatureVector> {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for term in self.analyzer.terms(document)? {
            if let Some(&index) = self.index.get(&term) {
                *counts.entry(index).or_insert(0.0) += 1.0;
            }
        }

        let pairs = counts
            .into_iter()
            .map(|(index, tf)| (index, tf * self.idf[index]))
            .collect();

        FeatureVector::from_pairs(self.terms.len(), pairs)
    }

    /// Transform many documents in parallel, preserving order.
    pub fn transform_batch<S: AsRef<str> + Sync>(
        &self,
        documents: &[S],
    ) -> Result<Vec<FeatureVector>> {
        documents
            .par_iter()
            .map(|document| self.transform(document.as_ref()))
            .collect()
    }

    /// Number of dimensions.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Number of documents the vocabulary was fitted on.
    pub fn n_documents(&self) -> usize {
        self.n_documents
    }

    /// Term at dimension `index`.
    pub fn term(&self, index: usize) -> Option<&str> {
        self.terms.get(index).map(String::as_str)
    }

    /// Dimension of `term`, if retained.
    pub fn index_of(&self, term: &str) -> Option<usize> {
        self.index.get(term).copied()
    }

    /// IDF weight of `term`, if retained.
    pub fn idf(&self, term: &str) -> Option<f64> {
        self.index_of(term).map(|index| self.idf[index])
    }

    /// All retained terms in dimension order.
    pub fn terms(&self) -> &[String] {
        &self.terms
    }
}
