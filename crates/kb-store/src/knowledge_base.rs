//! The immutable knowledge base.

use std::sync::Arc;

use tracing::info;

use kb_core::{ArchiveConfig, Chunk, IndexConfig, KbError, KbStats, Result, SynonymTable};

use crate::archive::load_archives;
use crate::index::InvertedIndex;

/// Chunk sequence, inverted index and synonym table.
///
/// Never mutated after construction. Index and synonyms sit behind `Arc` so
/// a re-embedded copy shares them with the original.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    chunks: Vec<Chunk>,
    index: Arc<InvertedIndex>,
    synonyms: Arc<SynonymTable>,
}

impl KnowledgeBase {
    /// An empty knowledge base.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from an ordered chunk sequence.
    pub fn build(chunks: Vec<Chunk>, synonyms: SynonymTable, config: &IndexConfig) -> Self {
        let index = InvertedIndex::build(&chunks, config.max_doc_tokens);

        info!(
            "Indexed {} chunks: vocabulary={}, avgdl={:.1}",
            chunks.len(),
            index.vocabulary(),
            index.avgdl()
        );

        Self {
            chunks,
            index: Arc::new(index),
            synonyms: Arc::new(synonyms),
        }
    }

    /// Load archives and the optional synonym file, then build.
    ///
    /// Any unreadable or malformed archive aborts the load.
    pub fn load(archive: &ArchiveConfig, index: &IndexConfig) -> Result<Self> {
        let synonyms = match &archive.synonyms {
            Some(path) => SynonymTable::from_json_file(path)?,
            None => SynonymTable::new(),
        };

        let load = load_archives(&archive.dir, &archive.suffix)?;
        Ok(Self::build(load.chunks, synonyms, index))
    }

    /// A copy of this knowledge base with every chunk's embedding replaced.
    ///
    /// The chunk sequence and index are unchanged.
    pub fn with_embeddings(&self, embeddings: Vec<Option<Vec<f32>>>) -> Result<Self> {
        if embeddings.len() != self.chunks.len() {
            return Err(KbError::invalid_argument(format!(
                "expected {} embeddings, got {}",
                self.chunks.len(),
                embeddings.len()
            )));
        }

        let chunks = self
            .chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| chunk.with_embedding(embedding))
            .collect();

        Ok(Self {
            chunks,
            index: Arc::clone(&self.index),
            synonyms: Arc::clone(&self.synonyms),
        })
    }

    /// Chunks in stable order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Chunk at a position.
    pub fn chunk(&self, doc: usize) -> Option<&Chunk> {
        self.chunks.get(doc)
    }

    /// The inverted index.
    pub fn index(&self) -> &InvertedIndex {
        &self.index
    }

    /// The synonym table used for query expansion.
    pub fn synonyms(&self) -> &SynonymTable {
        &self.synonyms
    }

    /// Number of chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether there are no chunks.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Summary statistics.
    pub fn stats(&self) -> KbStats {
        KbStats {
            chunks: self.chunks.len(),
            embedded_chunks: self
                .chunks
                .iter()
                .filter(|c| c.embedding.is_some())
                .count(),
            vocabulary: self.index.vocabulary(),
            avg_doc_len: self.index.avgdl(),
        }
    }
}
