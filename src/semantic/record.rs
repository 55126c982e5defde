//! A single indexed document.

use serde::{Deserialize, Serialize};

use crate::category::CategoryLabel;

/// One indexed document: its identifier, embedding and label.
///
/// Records are created when the index is built and never change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub id: String,
    pub embedding: Vec<f32>,
    pub category: CategoryLabel,
}

impl EmbeddingRecord {
    pub fn new<S: Into<String>>(id: S, embedding: Vec<f32>, category: CategoryLabel) -> Self {
        EmbeddingRecord {
            id: id.into(),
            embedding,
            category,
        }
    }

    pub fn dimension(&self) -> usize {
        self.embedding.len()
    }
}
