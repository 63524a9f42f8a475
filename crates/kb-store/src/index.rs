//! Inverted index over normalized chunk text.

use std::collections::HashMap;

use kb_core::{tokenize, Chunk};

/// One entry of a posting list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    /// Position of the chunk in the knowledge base.
    pub doc: usize,

    /// Occurrences of the term within the indexed prefix of the chunk.
    pub tf: u32,
}

/// Token -> postings, plus the per-document lengths BM25 needs.
#[derive(Debug, Clone, Default)]
pub struct InvertedIndex {
    postings: HashMap<String, Vec<Posting>>,
    doc_lens: Vec<usize>,
    avgdl: f32,
}

impl InvertedIndex {
    /// Build the index, counting only the first `max_doc_tokens` tokens of
    /// each chunk.
    pub fn build(chunks: &[Chunk], max_doc_tokens: usize) -> Self {
        let mut postings: HashMap<String, Vec<Posting>> = HashMap::new();
        let mut doc_lens = Vec::with_capacity(chunks.len());

        for (doc, chunk) in chunks.iter().enumerate() {
            let mut counts: HashMap<&str, u32> = HashMap::new();
            let mut len = 0;
            for token in tokenize(&chunk.norm_text).take(max_doc_tokens) {
                *counts.entry(token).or_default() += 1;
                len += 1;
            }
            doc_lens.push(len);

            for (token, tf) in counts {
                postings
                    .entry(token.to_string())
                    .or_default()
                    .push(Posting { doc, tf });
            }
        }

        let total: usize = doc_lens.iter().sum();
        let avgdl = total as f32 / chunks.len().max(1) as f32;

        Self {
            postings,
            doc_lens,
            avgdl,
        }
    }

    /// Postings for a normalized term (empty if the term is not indexed).
    pub fn postings(&self, term: &str) -> &[Posting] {
        self.postings.get(term).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Truncated token count of a document.
    pub fn doc_len(&self, doc: usize) -> usize {
        self.doc_lens.get(doc).copied().unwrap_or(0)
    }

    /// Truncated token counts of all documents, in chunk order.
    pub fn doc_lens(&self) -> &[usize] {
        &self.doc_lens
    }

    /// Average document length.
    pub fn avgdl(&self) -> f32 {
        self.avgdl
    }

    /// Number of indexed documents.
    pub fn num_docs(&self) -> usize {
        self.doc_lens.len()
    }

    /// Number of distinct tokens.
    pub fn vocabulary(&self) -> usize {
        self.postings.len()
    }
}
