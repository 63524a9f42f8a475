//! Core traits defining the interfaces between components.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::DocumentText;

/// External embedding capability.
///
/// Implementations may fail; callers on the search path treat a failure as
/// "no dense score" rather than an error.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text (a query or a chunk).
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of document texts.
    ///
    /// The default implementation embeds one text at a time.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Embed a batch of documents, passing each one's title where the
    /// provider supports it.
    ///
    /// The default implementation ignores titles and calls [`embed_batch`](Self::embed_batch).
    async fn embed_documents(&self, docs: &[DocumentText<'_>]) -> Result<Vec<Vec<f32>>> {
        let texts: Vec<&str> = docs.iter().map(|doc| doc.text).collect();
        self.embed_batch(&texts).await
    }

    /// Short provider name for logs.
    fn name(&self) -> &str;
}

#[async_trait]
impl<E: Embedder + ?Sized> Embedder for Arc<E> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        (**self).embed(text).await
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        (**self).embed_batch(texts).await
    }

    async fn embed_documents(&self, docs: &[DocumentText<'_>]) -> Result<Vec<Vec<f32>>> {
        (**self).embed_documents(docs).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[async_trait]
impl<E: Embedder + ?Sized> Embedder for Box<E> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        (**self).embed(text).await
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        (**self).embed_batch(texts).await
    }

    async fn embed_documents(&self, docs: &[DocumentText<'_>]) -> Result<Vec<Vec<f32>>> {
        (**self).embed_documents(docs).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
