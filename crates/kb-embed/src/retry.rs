//! Timeout and bounded exponential backoff around an embedder.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use kb_core::{DocumentText, Embedder, EmbeddingConfig, KbError, Result};

/// Retry settings for embedding calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts before giving up (at least one is always made).
    pub max_attempts: u32,

    /// Deadline for a single attempt.
    pub timeout: Duration,

    /// Delay after the first failure; doubled after each further failure.
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            timeout: Duration::from_secs(10),
            initial_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Policy from the embedding configuration.
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            timeout: Duration::from_millis(config.timeout_ms),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
        }
    }

    /// Delay after the given failed attempt (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.initial_backoff * (1u32 << attempt.min(5))
    }
}

/// Wraps an embedder so every call gets a timeout and bounded retries.
pub struct RetryingEmbedder<E> {
    inner: E,
    policy: RetryPolicy,
}

impl<E: Embedder> RetryingEmbedder<E> {
    /// Wrap `inner` with `policy`.
    pub fn new(inner: E, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// The wrapped embedder.
    pub fn inner(&self) -> &E {
        &self.inner
    }

    async fn with_retry<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let attempts = self.policy.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 0..attempts {
            match tokio::time::timeout(self.policy.timeout, op()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => last_error = e.to_string(),
                Err(_) => {
                    last_error = format!("timed out after {:?}", self.policy.timeout);
                }
            }

            warn!(
                "{} via {} failed (attempt {}/{}): {}",
                what,
                self.inner.name(),
                attempt + 1,
                attempts,
                last_error
            );

            if attempt + 1 < attempts {
                tokio::time::sleep(self.policy.backoff(attempt)).await;
            }
        }

        Err(KbError::embedding(format!(
            "{} failed after {} attempts: {}",
            what, attempts, last_error
        )))
    }
}

#[async_trait]
impl<E: Embedder> Embedder for RetryingEmbedder<E> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.with_retry("embed", || self.inner.embed(text)).await
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.with_retry("embed_batch", || self.inner.embed_batch(texts))
            .await
    }

    async fn embed_documents(&self, docs: &[DocumentText<'_>]) -> Result<Vec<Vec<f32>>> {
        self.with_retry("embed_documents", || self.inner.embed_documents(docs))
            .await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
