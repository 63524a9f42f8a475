//! BM25-lite lexical scoring over the inverted index.

use std::collections::{HashMap, HashSet};

use kb_core::SearchConfig;
use kb_store::InvertedIndex;

/// BM25 tuning constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    /// Term frequency saturation.
    pub k1: f32,

    /// Document length normalization.
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

impl From<&SearchConfig> for Bm25Params {
    fn from(config: &SearchConfig) -> Self {
        Self {
            k1: config.bm25_k1,
            b: config.bm25_b,
        }
    }
}

/// `ln(1 + (N - df + 0.5) / (df + 0.5))`
pub fn idf(num_docs: usize, df: usize) -> f32 {
    let n = num_docs as f32;
    let df = df as f32;
    (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
}

/// Contribution of one term to one document.
pub fn term_score(tf: u32, doc_len: usize, avgdl: f32, idf: f32, params: Bm25Params) -> f32 {
    let tf = tf as f32;
    let avgdl = if avgdl > 0.0 { avgdl } else { 1.0 };
    let denom = tf + params.k1 * (1.0 - params.b + params.b * doc_len as f32 / avgdl);
    idf * (tf * (params.k1 + 1.0)) / denom
}

/// Score every document containing at least one of `terms`.
///
/// Returns a sparse map from chunk position to score; absent keys mean 0.
/// Repeated terms are counted once.
pub fn bm25_scores(terms: &[String], index: &InvertedIndex, params: Bm25Params) -> HashMap<usize, f32> {
    let num_docs = index.num_docs();
    let avgdl = index.avgdl();
    let mut scores: HashMap<usize, f32> = HashMap::new();
    let mut seen: HashSet<&str> = HashSet::new();

    for term in terms {
        if !seen.insert(term.as_str()) {
            continue;
        }

        let postings = index.postings(term);
        if postings.is_empty() {
            continue;
        }

        let term_idf = idf(num_docs, postings.len());
        for posting in postings {
            let contribution = term_score(
                posting.tf,
                index.doc_len(posting.doc),
                avgdl,
                term_idf,
                params,
            );
            *scores.entry(posting.doc).or_default() += contribution;
        }
    }

    scores
}
