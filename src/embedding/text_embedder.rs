//! Text embedding trait.

use async_trait::async_trait;

use crate::error::Result;

/// Trait for converting text to vector embeddings.
///
/// Implementations may be local models or remote services. The index build
/// and every query must use the same embedder, so the semantic index
/// records [`name`](TextEmbedder::name) and
/// [`dimension`](TextEmbedder::dimension) next to its vectors.
///
/// # Custom implementation
///
/// ```
/// use async_trait::async_trait;
/// use mailsift::embedding::TextEmbedder;
/// use mailsift::error::Result;
///
/// struct ConstantEmbedder;
///
/// #[async_trait]
/// impl TextEmbedder for ConstantEmbedder {
///     async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
///         Ok(vec![1.0, 0.0])
///     }
///
///     fn dimension(&self) -> usize {
///         2
///     }
/// }
/// ```
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    /// Generate an embedding vector for the given text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts.
    ///
    /// The default implementation calls `embed` sequentially. Override it
    /// when the backend supports batching.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Get the dimension of generated embeddings.
    fn dimension(&self) -> usize;

    /// Get the name/identifier of this embedder.
    fn name(&self) -> &str {
        "unknown"
    }
}
