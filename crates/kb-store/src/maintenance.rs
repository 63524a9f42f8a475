//! Bulk re-embedding of every chunk.

use tracing::{info, warn};

use kb_core::{Embedder, Result};

use crate::knowledge_base::KnowledgeBase;

/// Counts from a re-embedding run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReembedReport {
    /// Chunks that received a fresh vector.
    pub embedded: usize,

    /// Chunks whose embedding failed and were stored without one.
    pub failed: usize,
}

/// Re-embed every chunk and return a new knowledge base.
///
/// The input is left untouched; publish the result with
/// [`KbHandle::swap`](crate::KbHandle::swap). A chunk whose embedding fails
/// is kept with no vector.
pub async fn reembed<E>(kb: &KnowledgeBase, embedder: &E) -> Result<(KnowledgeBase, ReembedReport)>
where
    E: Embedder + ?Sized,
{
    info!(
        "Re-embedding {} chunks with {}",
        kb.len(),
        embedder.name()
    );

    let mut report = ReembedReport::default();
    let mut embeddings = Vec::with_capacity(kb.len());

    for (i, chunk) in kb.chunks().iter().enumerate() {
        match embedder.embed(&chunk.text).await {
            Ok(vector) => {
                report.embedded += 1;
                embeddings.push(Some(vector));
            }
            Err(e) => {
                warn!("Failed to embed chunk {} ({:?}): {}", i, chunk.id, e);
                report.failed += 1;
                embeddings.push(None);
            }
        }
    }

    info!(
        "Re-embedding complete: {} embedded, {} failed",
        report.embedded, report.failed
    );

    Ok((kb.with_embeddings(embeddings)?, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kb_core::{Chunk, IndexConfig, KbError, SynonymTable};

    /// Fails for any text containing "fail".
    struct PickyEmbedder;

    #[async_trait]
    impl Embedder for PickyEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.contains("fail") {
                Err(KbError::embedding("rejected"))
            } else {
                Ok(vec![text.len() as f32])
            }
        }

        fn name(&self) -> &str {
            "picky"
        }
    }

    #[tokio::test]
    async fn test_reembed_replaces_vectors() {
        let chunks = vec![
            Chunk::new(None, None, "abc", Some(vec![0.0])),
            Chunk::new(None, None, "please fail", Some(vec![0.0])),
        ];
        let kb = KnowledgeBase::build(chunks, SynonymTable::new(), &IndexConfig::default());

        let (updated, report) = reembed(&kb, &PickyEmbedder).await.unwrap();

        assert_eq!(report, ReembedReport { embedded: 1, failed: 1 });
        assert_eq!(updated.chunks()[0].embedding, Some(vec![3.0]));
        assert!(updated.chunks()[1].embedding.is_none());
        assert_eq!(updated.index().vocabulary(), kb.index().vocabulary());
        assert_eq!(kb.chunks()[0].embedding, Some(vec![0.0]));
    }
}
