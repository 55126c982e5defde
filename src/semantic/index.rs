//! Flat semantic index with majority-vote querying.

use std::collections::HashSet;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::category::CategoryLabel;
use crate::embedding::TextEmbedder;
use crate::error::{MailsiftError, Result};
use crate::semantic::distance::DistanceMetric;
use crate::semantic::record::EmbeddingRecord;

/// Default number of neighbors consulted per query.
pub const DEFAULT_K: usize = 5;

/// Default number of texts sent to the embedder at once while building.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// One retrieved record and its distance to the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub id: String,
    pub category: CategoryLabel,
    pub distance: f32,
}

/// The winning label of a neighbor vote and how it was reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborVote {
    pub label: CategoryLabel,
    /// Votes per label, winner first.
    pub votes: Vec<(CategoryLabel, usize)>,
    /// Nearest first.
    pub neighbors: Vec<Neighbor>,
}

impl NeighborVote {
    fn empty() -> Self {
        NeighborVote {
            label: CategoryLabel::General,
            votes: Vec::new(),
            neighbors: Vec::new(),
        }
    }

    /// Majority vote over `neighbors`.
    ///
    /// Equal vote counts go to the label whose neighbors are closer on
    /// average, then to the label with higher precedence.
    pub fn tally(neighbors: Vec<Neighbor>) -> Self {
        if neighbors.is_empty() {
            return Self::empty();
        }

        let mut counts = [0usize; 4];
        let mut distance_sums = [0f64; 4];
        for neighbor in &neighbors {
            let slot = neighbor.category.precedence();
            counts[slot] += 1;
            distance_sums[slot] += neighbor.distance as f64;
        }

        let mut ranked: Vec<(CategoryLabel, usize, f64)> = CategoryLabel::ALL
            .iter()
            .filter(|label| counts[label.precedence()] > 0)
            .map(|&label| {
                let slot = label.precedence();
                (label, counts[slot], distance_sums[slot] / counts[slot] as f64)
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.1.cmp(&a.1)
                .then_with(|| a.2.total_cmp(&b.2))
                .then_with(|| a.0.cmp(&b.0))
        });

        NeighborVote {
            label: ranked[0].0,
            votes: ranked.iter().map(|(label, count, _)| (*label, *count)).collect(),
            neighbors,
        }
    }
}

/// An immutable collection of labeled embeddings.
///
/// The distance metric, dimensionality and the name of the embedder that
/// produced the vectors are stored with the records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticIndex {
    metric: DistanceMetric,
    dimension: usize,
    embedder_name: String,
    records: Vec<EmbeddingRecord>,
}

impl SemanticIndex {
    /// Assemble an index from existing records.
    pub fn from_records(
        metric: DistanceMetric,
        dimension: usize,
        embedder_name: impl Into<String>,
        records: Vec<EmbeddingRecord>,
    ) -> Result<Self> {
        let index = SemanticIndex {
            metric,
            dimension,
            embedder_name: embedder_name.into(),
            records,
        };
        index.validate()?;
        Ok(index)
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn embedder_name(&self) -> &str {
        &self.embedder_name
    }

    pub fn records(&self) -> &[EmbeddingRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Check that `embedder` produces vectors this index can be queried with.
    pub fn check_embedder(&self, embedder: &dyn TextEmbedder) -> Result<()> {
        if embedder.dimension() != self.dimension {
            return Err(MailsiftError::DimensionMismatch {
                expected: self.dimension,
                actual: embedder.dimension(),
            });
        }
        if embedder.name() != self.embedder_name {
            warn!(
                "Semantic index was built with '{}' but is queried with '{}'",
                self.embedder_name,
                embedder.name()
            );
        }
        Ok(())
    }

    /// The `k` records closest to `vector`, nearest first.
    ///
    /// Records at equal distance keep their index order.
    pub fn nearest(&self, vector: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if vector.len() != self.dimension {
            return Err(MailsiftError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        if k == 0 || self.records.is_empty() {
            return Ok(Vec::new());
        }

        let embeddings: Vec<&[f32]> = self.records.iter().map(|r| r.embedding.as_slice()).collect();
        let distances = self.metric.batch_distance_parallel(vector, &embeddings)?;

        let mut order: Vec<usize> = (0..self.records.len()).collect();
        order.sort_by(|&a, &b| distances[a].total_cmp(&distances[b]));

        Ok(order
            .into_iter()
            .take(k)
            .map(|i| Neighbor {
                id: self.records[i].id.clone(),
                category: self.records[i].category,
                distance: distances[i],
            })
            .collect())
    }

    /// Vote among the `k` records nearest to `vector`.
    pub fn vote(&self, vector: &[f32], k: usize) -> Result<NeighborVote> {
        Ok(NeighborVote::tally(self.nearest(vector, k)?))
    }

    /// Embed `text` and vote among its `k` nearest records.
    ///
    /// An empty index or `k == 0` answers General without calling the
    /// embedder.
    pub async fn query(
        &self,
        text: &str,
        k: usize,
        embedder: &dyn TextEmbedder,
    ) -> Result<NeighborVote> {
        if k == 0 || self.records.is_empty() {
            return Ok(NeighborVote::empty());
        }
        let vector = embedder.embed(text).await?;
        let vote = self.vote(&vector, k)?;
        debug!("Semantic vote for query: {:?}", vote.votes);
        Ok(vote)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode an index and check that all records share its dimensionality.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let index: SemanticIndex = bincode::deserialize(bytes)?;
        index.validate()?;
        Ok(index)
    }

    fn validate(&self) -> Result<()> {
        if let Some(record) = self.records.iter().find(|r| r.dimension() != self.dimension) {
            return Err(MailsiftError::artifact_corrupted(format!(
                "record '{}' has dimension {} in an index of dimension {}",
                record.id,
                record.dimension(),
                self.dimension
            )));
        }
        Ok(())
    }
}

/// Builds a [`SemanticIndex`] from labeled documents.
#[derive(Debug, Clone)]
pub struct SemanticIndexBuilder {
    metric: DistanceMetric,
    batch_size: usize,
}

impl Default for SemanticIndexBuilder {
    fn default() -> Self {
        SemanticIndexBuilder {
            metric: DistanceMetric::Cosine,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl SemanticIndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Embed `(id, text, label)` documents and collect them into an index.
    ///
    /// Empty texts and texts already seen are skipped, as are repeated ids.
    /// Every vector must have the embedder's dimensionality.
    pub async fn build<I>(&self, documents: I, embedder: &dyn TextEmbedder) -> Result<SemanticIndex>
    where
        I: IntoIterator<Item = (String, String, CategoryLabel)>,
    {
        let dimension = embedder.dimension();
        let mut seen_texts = HashSet::new();
        let mut seen_ids = HashSet::new();
        let mut pending = Vec::new();
        let mut skipped = 0usize;

        for (id, text, label) in documents {
            let text = text.trim().to_string();
            if text.is_empty() || seen_ids.contains(&id) || !seen_texts.insert(text.clone()) {
                skipped += 1;
                continue;
            }
            seen_ids.insert(id.clone());
            pending.push((id, text, label));
        }

        let mut records = Vec::with_capacity(pending.len());
        for (batch_number, batch) in pending.chunks(self.batch_size).enumerate() {
            let texts: Vec<&str> = batch.iter().map(|(_, text, _)| text.as_str()).collect();
            let vectors = embedder.embed_batch(&texts).await?;
            if vectors.len() != batch.len() {
                return Err(MailsiftError::embedding_unavailable(format!(
                    "asked for {} embeddings, got {}",
                    batch.len(),
                    vectors.len()
                )));
            }

            for ((id, _, label), vector) in batch.iter().zip(vectors) {
                if vector.len() != dimension {
                    return Err(MailsiftError::DimensionMismatch {
                        expected: dimension,
                        actual: vector.len(),
                    });
                }
                records.push(EmbeddingRecord::new(id.clone(), vector, *label));
            }
            debug!("Embedded batch {} ({} documents)", batch_number + 1, batch.len());
        }

        info!(
            "Built semantic index with {} records ({} skipped) using {}",
            records.len(),
            skipped,
            embedder.name()
        );

        Ok(SemanticIndex {
            metric: self.metric,
            dimension,
            embedder_name: embedder.name().to_string(),
            records,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;

    fn neighbor(category: CategoryLabel, distance: f32) -> Neighbor {
        Neighbor {
            id: String::new(),
            category,
            distance,
        }
    }

    fn docs(items: &[(&str, CategoryLabel)]) -> Vec<(String, String, CategoryLabel)> {
        items
            .iter()
            .enumerate()
            .map(|(i, (text, label))| (i.to_string(), text.to_string(), *label))
            .collect()
    }

    #[test]
    fn test_majority_wins() {
        let vote = NeighborVote::tally(vec![
            neighbor(CategoryLabel::Hr, 0.1),
            neighbor(CategoryLabel::General, 0.2),
            neighbor(CategoryLabel::General, 0.3),
        ]);
        assert_eq!(vote.label, CategoryLabel::General);
        assert_eq!(vote.votes[0], (CategoryLabel::General, 2));
    }

    #[test]
    fn test_tie_goes_to_closer_label() {
        let vote = NeighborVote::tally(vec![
            neighbor(CategoryLabel::Urgent, 0.4),
            neighbor(CategoryLabel::General, 0.1),
            neighbor(CategoryLabel::General, 0.5),
            neighbor(CategoryLabel::Urgent, 0.4),
        ]);
        assert_eq!(vote.label, CategoryLabel::General);
    }

    #[test]
    fn test_exact_tie_goes_to_precedence() {
        let vote = NeighborVote::tally(vec![
            neighbor(CategoryLabel::General, 0.25),
            neighbor(CategoryLabel::Financial, 0.25),
        ]);
        assert_eq!(vote.label, CategoryLabel::Financial);
    }

    #[test]
    fn test_nearest_orders_by_distance() {
        let index = SemanticIndex::from_records(
            DistanceMetric::Euclidean,
            2,
            "test",
            vec![
                EmbeddingRecord::new("far", vec![10.0, 0.0], CategoryLabel::Hr),
                EmbeddingRecord::new("near", vec![1.0, 0.0], CategoryLabel::Urgent),
                EmbeddingRecord::new("mid", vec![3.0, 0.0], CategoryLabel::General),
            ],
        )
        .unwrap();

        let neighbors = index.nearest(&[0.0, 0.0], 2).unwrap();
        let ids: Vec<&str> = neighbors.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid"]);
        assert!(index.nearest(&[0.0], 2).is_err());
    }

    #[tokio::test]
    async fn test_build_skips_empty_and_duplicates() {
        let embedder = HashingEmbedder::new(32).unwrap();
        let index = SemanticIndexBuilder::new()
            .batch_size(2)
            .build(
                docs(&[
                    ("quarterly budget numbers", CategoryLabel::Financial),
                    ("   ", CategoryLabel::General),
                    ("quarterly budget numbers", CategoryLabel::Financial),
                    ("team lunch on friday", CategoryLabel::General),
                    ("salary review", CategoryLabel::Hr),
                ]),
                &embedder,
            )
            .await
            .unwrap();

        assert_eq!(index.len(), 3);
        assert_eq!(index.dimension(), 32);
        assert_eq!(index.embedder_name(), "hashing-32");
        assert!(index.check_embedder(&embedder).is_ok());
        assert!(index.check_embedder(&HashingEmbedder::new(16).unwrap()).is_err());
    }

    #[tokio::test]
    async fn test_query_empty_index_is_general() {
        let embedder = HashingEmbedder::new(8).unwrap();
        let index = SemanticIndexBuilder::new()
            .build(Vec::new(), &embedder)
            .await
            .unwrap();

        let vote = index.query("anything at all", DEFAULT_K, &embedder).await.unwrap();
        assert_eq!(vote.label, CategoryLabel::General);
        assert!(vote.neighbors.is_empty());
    }

    #[tokio::test]
    async fn test_query_finds_similar_document() {
        let embedder = HashingEmbedder::default();
        let index = SemanticIndexBuilder::new()
            .build(
                docs(&[
                    ("let us grab lunch tomorrow at noon", CategoryLabel::General),
                    ("please approve the invoice payment", CategoryLabel::Financial),
                    ("salary and holiday leave policy", CategoryLabel::Hr),
                ]),
                &embedder,
            )
            .await
            .unwrap();

        let vote = index.query("grab lunch tomorrow?", 1, &embedder).await.unwrap();
        assert_eq!(vote.label, CategoryLabel::General);
        assert_eq!(vote.neighbors[0].id, "0");
    }

    #[tokio::test]
    async fn test_bytes_round_trip() {
        let embedder = HashingEmbedder::new(16).unwrap();
        let index = SemanticIndexBuilder::new()
            .metric(DistanceMetric::Euclidean)
            .build(docs(&[("audit findings", CategoryLabel::Financial)]), &embedder)
            .await
            .unwrap();

        let restored = SemanticIndex::from_bytes(&index.to_bytes().unwrap()).unwrap();
        assert_eq!(restored, index);
        assert!(SemanticIndex::from_bytes(b"garbage").is_err());
    }
}
