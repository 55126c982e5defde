//! Text embedding capability used by the semantic index.
//!
//! [`TextEmbedder`] is the seam: the index and the serving pipeline only see
//! the trait. [`HashingEmbedder`] is a deterministic local implementation,
//! [`ResilientEmbedder`] wraps any embedder with a timeout and retries, and
//! `OpenAITextEmbedder` (feature `embeddings-openai`) calls an
//! OpenAI-compatible HTTP endpoint.

pub mod hashing;
#[cfg(feature = "embeddings-openai")]
pub mod openai_text_embedder;
pub mod resilient;
pub mod text_embedder;

pub use hashing::HashingEmbedder;
#[cfg(feature = "embeddings-openai")]
pub use openai_text_embedder::OpenAITextEmbedder;
pub use resilient::{ResilientEmbedder, RetryPolicy};
pub use text_embedder::TextEmbedder;
