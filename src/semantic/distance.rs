//! How far apart two embeddings are.

use std::fmt;
use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{MailsiftError, Result};

/// Below this many candidates the scan stays on the calling thread.
const PARALLEL_THRESHOLD: usize = 100;

/// Metric used to rank neighbors. Smaller is closer for both.
///
/// Persisted inside the index artifact, so a query is always scored the way
/// the index was built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// `1 - cos(a, b)`; a zero vector is at distance 1 from everything.
    #[default]
    #[serde(alias = "Cosine")]
    Cosine,
    /// L2 norm of `a - b`.
    #[serde(alias = "Euclidean", alias = "l2")]
    Euclidean,
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let denominator = dot(a, a).sqrt() * dot(b, b).sqrt();
    if denominator == 0.0 {
        1.0
    } else {
        1.0 - dot(a, b) / denominator
    }
}

fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f32>()
        .sqrt()
}

impl DistanceMetric {
    /// Distance between `a` and `b`, which must have equal length.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> Result<f32> {
        if a.len() != b.len() {
            return Err(MailsiftError::DimensionMismatch {
                expected: a.len(),
                actual: b.len(),
            });
        }
        Ok(match self {
            DistanceMetric::Cosine => cosine_distance(a, b),
            DistanceMetric::Euclidean => euclidean_distance(a, b),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::Euclidean => "euclidean",
        }
    }

    /// Distances from `query` to every candidate, in candidate order.
    ///
    /// Large candidate sets are scored on the rayon pool.
    pub fn batch_distance_parallel(&self, query: &[f32], vectors: &[&[f32]]) -> Result<Vec<f32>> {
        if vectors.len() < PARALLEL_THRESHOLD {
            vectors.iter().map(|v| self.distance(query, v)).collect()
        } else {
            vectors.par_iter().map(|v| self.distance(query, v)).collect()
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DistanceMetric {
    type Err = MailsiftError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "euclidean" | "l2" => Ok(DistanceMetric::Euclidean),
            other => Err(MailsiftError::invalid_argument(format!(
                "unknown distance metric '{other}'"
            ))),
        }
    }
}
