//! Core domain types for the knowledge base.

use serde::{Deserialize, Serialize};

use crate::text::normalize;

/// A chunk of the corpus, held in memory for the lifetime of the process.
///
/// Its position in the knowledge base's chunk sequence is the join key used
/// by the inverted index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Identifier from the archive, if any.
    pub id: Option<String>,

    /// Source label (usually the originating file name).
    pub source: Option<String>,

    /// Raw chunk text.
    pub text: String,

    /// Lowercased text with diacritics stripped.
    pub norm_text: String,

    /// Precomputed embedding. `None` when embedding generation failed.
    pub embedding: Option<Vec<f32>>,
}

impl Chunk {
    /// Create a new chunk, computing its normalized text.
    pub fn new(
        id: Option<String>,
        source: Option<String>,
        text: impl Into<String>,
        embedding: Option<Vec<f32>>,
    ) -> Self {
        let text = text.into();
        let norm_text = normalize(&text);

        Self {
            id,
            source,
            text,
            norm_text,
            embedding,
        }
    }

    /// Replace the embedding, keeping everything else.
    pub fn with_embedding(&self, embedding: Option<Vec<f32>>) -> Self {
        Self {
            embedding,
            ..self.clone()
        }
    }
}

/// A record as stored in a corpus archive.
///
/// Every field is optional at the parsing level; records without text or
/// without an embedding are skipped by the loader.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveRecord {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub source: Option<String>,

    #[serde(default)]
    pub text: Option<String>,

    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

impl ArchiveRecord {
    /// Convert into a chunk, or `None` if text or embedding is missing.
    pub fn into_chunk(self) -> Option<Chunk> {
        let text = self.text.filter(|t| !t.is_empty())?;
        let embedding = self.embedding?;
        Some(Chunk::new(self.id, self.source, text, Some(embedding)))
    }
}

impl From<&Chunk> for ArchiveRecord {
    fn from(chunk: &Chunk) -> Self {
        Self {
            id: chunk.id.clone(),
            source: chunk.source.clone(),
            text: Some(chunk.text.clone()),
            embedding: chunk.embedding.clone(),
        }
    }
}

/// A document text handed to an embedder, with the title of the file it
/// came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentText<'a> {
    pub text: &'a str,
    pub title: Option<&'a str>,
}

/// A single ranked search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    /// Chunk identifier.
    pub id: Option<String>,

    /// Chunk source label.
    pub source: Option<String>,

    /// Blended relevance score (higher is better).
    pub score: f32,

    /// Raw BM25 score before compression.
    pub keyword_score: f32,

    /// Cosine similarity with the query embedding.
    pub semantic_score: f32,

    /// Chunk text.
    pub text: String,
}

/// Search results container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResults {
    /// The original query.
    pub query: String,

    /// Terms the query expanded to (order not significant).
    pub expanded_terms: Vec<String>,

    /// Total results returned.
    pub total_results: usize,

    /// Search latency in milliseconds.
    pub latency_ms: u64,

    /// Whether the results came from the substring fallback scan.
    pub fallback: bool,

    /// Whether the query embedding was unavailable.
    pub semantic_degraded: bool,

    /// Ranked hits.
    pub results: Vec<SearchHit>,
}

/// Statistics about the loaded knowledge base.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KbStats {
    /// Number of chunks.
    pub chunks: usize,

    /// Number of chunks carrying an embedding.
    pub embedded_chunks: usize,

    /// Number of distinct indexed tokens.
    pub vocabulary: usize,

    /// Average (truncated) document length in tokens.
    pub avg_doc_len: f32,
}
