//! Timeout and retry wrapper around any [`TextEmbedder`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::warn;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, timeout};

use crate::embedding::text_embedder::TextEmbedder;
use crate::error::{MailsiftError, Result};

/// How long one embedding attempt may take and how often to retry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Per-attempt limit.
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Base delay, doubled on each further retry.
    #[serde(with = "duration_millis")]
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            timeout: Duration::from_secs(10),
            max_retries: 1,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based), capped at 32x the base.
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.backoff * 2u32.pow(retry.min(5))
    }
}

/// Wraps an embedder so a hung or failing backend turns into
/// [`MailsiftError::EmbeddingUnavailable`] after a bounded amount of time.
pub struct ResilientEmbedder {
    inner: Arc<dyn TextEmbedder>,
    policy: RetryPolicy,
}

impl ResilientEmbedder {
    pub fn new(inner: Arc<dyn TextEmbedder>, policy: RetryPolicy) -> Self {
        ResilientEmbedder { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn attempt_embed(&self, text: &str) -> Result<Vec<f32>> {
        match timeout(self.policy.timeout, self.inner.embed(text)).await {
            Ok(result) => result,
            Err(_) => Err(MailsiftError::timeout(format!(
                "{} did not answer within {:?}",
                self.inner.name(),
                self.policy.timeout
            ))),
        }
    }

    async fn attempt_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        match timeout(self.policy.timeout, self.inner.embed_batch(texts)).await {
            Ok(result) => result,
            Err(_) => Err(MailsiftError::timeout(format!(
                "{} did not answer a batch of {} within {:?}",
                self.inner.name(),
                texts.len(),
                self.policy.timeout
            ))),
        }
    }

    fn exhausted(&self, attempts: u32, last: MailsiftError) -> MailsiftError {
        match last {
            MailsiftError::EmbeddingUnavailable(msg) => MailsiftError::embedding_unavailable(
                format!("{msg} (after {attempts} attempts)"),
            ),
            other => MailsiftError::embedding_unavailable(format!(
                "{} failed after {attempts} attempts: {other}",
                self.inner.name()
            )),
        }
    }
}

#[async_trait]
impl TextEmbedder for ResilientEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.attempt_embed(text).await {
                Ok(vector) => return Ok(vector),
                Err(e) => {
                    if attempt > self.policy.max_retries {
                        return Err(self.exhausted(attempt, e));
                    }
                    warn!(
                        "Embedding attempt {attempt} with {} failed: {e}",
                        self.inner.name()
                    );
                    sleep(self.policy.delay_for(attempt - 1)).await;
                }
            }
        }
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.attempt_batch(texts).await {
                Ok(vectors) => return Ok(vectors),
                Err(e) => {
                    if attempt > self.policy.max_retries {
                        return Err(self.exhausted(attempt, e));
                    }
                    warn!(
                        "Batch embedding attempt {attempt} with {} failed: {e}",
                        self.inner.name()
                    );
                    sleep(self.policy.delay_for(attempt - 1)).await;
                }
            }
        }
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyEmbedder {
        calls: AtomicUsize,
        failures: usize,
    }

    #[async_trait]
    impl TextEmbedder for FlakyEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(MailsiftError::other("connection reset"))
            } else {
                Ok(vec![1.0, 0.0])
            }
        }

        fn dimension(&self) -> usize {
            2
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    struct HangingEmbedder;

    #[async_trait]
    impl TextEmbedder for HangingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            sleep(Duration::from_secs(3600)).await;
            Ok(vec![0.0])
        }

        fn dimension(&self) -> usize {
            1
        }
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_millis(50),
            max_retries,
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_single_retry_recovers() {
        let inner = Arc::new(FlakyEmbedder {
            calls: AtomicUsize::new(0),
            failures: 1,
        });
        let embedder = ResilientEmbedder::new(inner.clone(), fast_policy(1));

        assert_eq!(embedder.embed("hello").await.unwrap(), vec![1.0, 0.0]);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_exhausted_retries_are_unavailable() {
        let inner = Arc::new(FlakyEmbedder {
            calls: AtomicUsize::new(0),
            failures: 10,
        });
        let embedder = ResilientEmbedder::new(inner.clone(), fast_policy(1));

        let err = embedder.embed("hello").await.unwrap_err();
        assert!(matches!(err, MailsiftError::EmbeddingUnavailable(_)));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_timeout_is_unavailable() {
        let embedder = ResilientEmbedder::new(Arc::new(HangingEmbedder), fast_policy(0));
        let err = embedder.embed("hello").await.unwrap_err();
        assert!(matches!(err, MailsiftError::EmbeddingUnavailable(_)));
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(500));
        assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(9), Duration::from_millis(16000));
    }

    #[test]
    fn test_policy_serializes_millis() {
        let json = serde_json::to_string(&RetryPolicy::default()).unwrap();
        assert_eq!(json, r#"{"timeout":10000,"max_retries":1,"backoff":500}"#);
    }
}
