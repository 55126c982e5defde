//! Sparse feature vectors.

use serde::{Deserialize, Serialize};

use crate::error::{MailsiftError, Result};

/// A sparse vector over the dimensions of a vocabulary.
///
/// Entries are kept sorted by index with no duplicates and no explicit zeros.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    dimension: usize,
    indices: Vec<usize>,
    values: Vec<f64>,
}

impl FeatureVector {
    /// An all-zero vector.
    pub fn zeros(dimension: usize) -> Self {
        FeatureVector {
            dimension,
            indices: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Build a vector from `(index, value)` pairs.
    ///
    /// Pairs are sorted; repeated indices are summed and zeros dropped.
    pub fn from_pairs(dimension: usize, mut pairs: Vec<(usize, f64)>) -> Result<Self> {
        pairs.sort_by_key(|(index, _)| *index);

        let mut indices = Vec::with_capacity(pairs.len());
        let mut values: Vec<f64> = Vec::with_capacity(pairs.len());

        for (index, value) in pairs {
            if index >= dimension {
                return Err(MailsiftError::invalid_argument(format!(
                    "index {index} out of range for dimension {dimension}"
                )));
            }
            if indices.last() == Some(&index) {
                if let Some(last) = values.last_mut() {
                    *last += value;
                }
            } else {
                indices.push(index);
                values.push(value);
            }
        }

        let (indices, values) = indices
            .into_iter()
            .zip(values)
            .filter(|(_, value)| *value != 0.0)
            .unzip();

        Ok(FeatureVector {
            dimension,
            indices,
            values,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of non-zero entries.
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn is_zero(&self) -> bool {
        self.indices.is_empty()
    }

    /// Value at `index` (zero when absent).
    pub fn get(&self, index: usize) -> f64 {
        match self.indices.binary_search(&index) {
            Ok(pos) => self.values[pos],
            Err(_) => 0.0,
        }
    }

    /// Iterate the non-zero entries in index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }

    /// Dot product with a dense vector of the same dimension.
    pub fn dot(&self, dense: &[f64]) -> f64 {
        self.iter().map(|(index, value)| value * dense[index]).sum()
    }

    pub fn squared_norm(&self) -> f64 {
        self.values.iter().map(|v| v * v).sum()
    }

    pub fn to_dense(&self) -> Vec<f64> {
        let mut dense = vec![0.0; self.dimension];
        for (index, value) in self.iter() {
            dense[index] = value;
        }
        dense
    }
}
