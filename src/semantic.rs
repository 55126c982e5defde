//! Semantic nearest-neighbor index over labeled embeddings.
//!
//! The index is built offline from labeled documents and queried at serving
//! time: the query text is embedded with the same [`TextEmbedder`] and the
//! labels of its k nearest records vote on the answer.
//!
//! [`TextEmbedder`]: crate::embedding::TextEmbedder

pub mod distance;
pub mod index;
pub mod record;

pub use distance::DistanceMetric;
pub use index::{Neighbor, NeighborVote, SemanticIndex, SemanticIndexBuilder};
pub use record::EmbeddingRecord;
