//! OpenAI API-based text embedder implementation.
//!
//! Works against any endpoint that speaks the OpenAI embeddings protocol.
//! Requires the `embeddings-openai` feature to be enabled.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::embedding::text_embedder::TextEmbedder;
use crate::error::{MailsiftError, Result};

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Request structure for the embeddings endpoint.
#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// OpenAI API-based text embedder.
///
/// # Examples
///
/// ```no_run
/// use mailsift::embedding::{OpenAITextEmbedder, TextEmbedder};
///
/// # async fn example() -> mailsift::error::Result<()> {
/// let embedder = OpenAITextEmbedder::new(
///     std::env::var("OPENAI_API_KEY").unwrap_or_default(),
///     "text-embedding-3-small".to_string(),
/// )?;
/// let vector = embedder.embed("Quarterly budget attached").await?;
/// assert_eq!(vector.len(), embedder.dimension());
/// # Ok(())
/// # }
/// ```
pub struct OpenAITextEmbedder {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    dimension: usize,
}

impl OpenAITextEmbedder {
    /// Create an embedder for one of the known OpenAI models.
    pub fn new(api_key: String, model: String) -> Result<Self> {
        let dimension = Self::default_dimension(&model).ok_or_else(|| {
            MailsiftError::invalid_config(format!(
                "Unknown OpenAI embedding model: {model}. Supported models: \
                 text-embedding-3-small, text-embedding-3-large, text-embedding-ada-002"
            ))
        })?;
        Self::with_endpoint(DEFAULT_BASE_URL, api_key, model, dimension, None)
    }

    /// Create an embedder for an arbitrary compatible endpoint.
    ///
    /// `dimension` must be what the endpoint returns; a request timeout can be
    /// set on the HTTP client itself.
    pub fn with_endpoint(
        base_url: &str,
        api_key: String,
        model: String,
        dimension: usize,
        request_timeout: Option<Duration>,
    ) -> Result<Self> {
        if dimension == 0 {
            return Err(MailsiftError::invalid_config(
                "embedding dimension must be greater than zero",
            ));
        }

        let mut builder = Client::builder();
        if let Some(limit) = request_timeout {
            builder = builder.timeout(limit);
        }
        let client = builder.build().map_err(|e| {
            MailsiftError::embedding_unavailable(format!("failed to build HTTP client: {e}"))
        })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            dimension,
        })
    }

    fn default_dimension(model: &str) -> Option<usize> {
        match model {
            "text-embedding-3-small" => Some(1536),
            "text-embedding-3-large" => Some(3072),
            "text-embedding-ada-002" => Some(1536),
            _ => None,
        }
    }

    async fn request(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let dimensions = match Self::default_dimension(&self.model) {
            Some(d) if d == self.dimension => None,
            Some(_) => Some(self.dimension),
            None => None,
        };

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts.to_vec(),
            dimensions,
        };

        let http_response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                MailsiftError::embedding_unavailable(format!("embedding request failed: {e}"))
            })?;

        let status = http_response.status();
        let response_text = http_response.text().await.map_err(|e| {
            MailsiftError::embedding_unavailable(format!("failed to read response text: {e}"))
        })?;

        if !status.is_success() {
            return Err(MailsiftError::embedding_unavailable(format!(
                "embedding API error (status {status}): {response_text}"
            )));
        }

        let mut response: EmbeddingResponse =
            serde_json::from_str(&response_text).map_err(|e| {
                MailsiftError::embedding_unavailable(format!(
                    "failed to parse embedding response: {e}"
                ))
            })?;

        if response.data.len() != texts.len() {
            return Err(MailsiftError::embedding_unavailable(format!(
                "asked for {} embeddings, got {}",
                texts.len(),
                response.data.len()
            )));
        }
        response.data.sort_by_key(|d| d.index);

        let mut vectors = Vec::with_capacity(response.data.len());
        for data in response.data {
            if data.embedding.len() != self.dimension {
                return Err(MailsiftError::DimensionMismatch {
                    expected: self.dimension,
                    actual: data.embedding.len(),
                });
            }
            vectors.push(data.embedding);
        }
        Ok(vectors)
    }
}

#[async_trait]
impl TextEmbedder for OpenAITextEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.request(&[text])
            .await?
            .pop()
            .ok_or_else(|| MailsiftError::embedding_unavailable("no embedding in response"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model
    }
}
