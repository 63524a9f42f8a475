//! kb-embed - Embedding providers
//!
//! The knowledge base treats "embed this string" as an external capability.
//! This crate provides the implementations of [`Embedder`]:
//!
//! - [`GeminiEmbedder`]: Gemini embedding REST API
//! - [`RetryingEmbedder`]: per-attempt timeout and exponential backoff around
//!   any other embedder
//! - [`HashEmbedder`]: deterministic local vectors for tests and offline use
//! - [`DisabledEmbedder`]: always unavailable, for lexical-only serving

mod gemini;
mod local;
mod retry;

use std::sync::Arc;
use std::time::Duration;

pub use gemini::GeminiEmbedder;
pub use local::{DisabledEmbedder, HashEmbedder};
pub use retry::{RetryPolicy, RetryingEmbedder};

// Re-export the Embedder trait for convenience
pub use kb_core::Embedder;

use kb_core::{EmbeddingConfig, EmbeddingProvider, KbError, Result};

/// Build the embedder selected by configuration.
///
/// The Gemini provider reads its API key from the configured environment
/// variable and is wrapped in a [`RetryingEmbedder`].
pub fn embedder_from_config(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider {
        EmbeddingProvider::Gemini => {
            let api_key = std::env::var(&config.api_key_env).map_err(|_| {
                KbError::config(format!(
                    "API key missing: set {} or choose another embedding provider",
                    config.api_key_env
                ))
            })?;
            let gemini = GeminiEmbedder::new(
                api_key,
                config.base_url.clone(),
                config.model.clone(),
                Duration::from_millis(config.timeout_ms),
            )?;
            Ok(Arc::new(RetryingEmbedder::new(
                gemini,
                RetryPolicy::from_config(config),
            )))
        }
        EmbeddingProvider::Hash => Ok(Arc::new(HashEmbedder::new(config.dimension))),
        EmbeddingProvider::None => Ok(Arc::new(DisabledEmbedder)),
    }
}
