//! Dense (embedding) similarity.

use kb_store::KnowledgeBase;

/// Cosine similarity.
///
/// The dot product runs over the shorter vector's length so embeddings of
/// different dimensions can still be compared; magnitudes use each full
/// vector. Returns 0 when either vector is empty or has zero magnitude.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let dot: f64 = a
        .iter()
        .zip(b)
        .map(|(x, y)| *x as f64 * *y as f64)
        .sum();
    let norm_a: f64 = a.iter().map(|x| *x as f64 * *x as f64).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| *x as f64 * *x as f64).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0) as f32
}

/// Scores candidate chunks against a query embedding.
///
/// The ranker only depends on this trait, so an approximate nearest-neighbor
/// structure can replace the brute-force scan.
pub trait DenseScorer: Send + Sync {
    /// One score per candidate, in candidate order. Every score is 0 when
    /// `query` is `None`; a candidate without an embedding scores 0.
    fn score(&self, kb: &KnowledgeBase, query: Option<&[f32]>, candidates: &[usize]) -> Vec<f32>;
}

/// Computes cosine similarity for every candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct BruteForceScorer;

impl DenseScorer for BruteForceScorer {
    fn score(&self, kb: &KnowledgeBase, query: Option<&[f32]>, candidates: &[usize]) -> Vec<f32> {
        let Some(query) = query else {
            return vec![0.0; candidates.len()];
        };

        candidates
            .iter()
            .map(|&doc| {
                kb.chunk(doc)
                    .and_then(|c| c.embedding.as_deref())
                    .map(|embedding| cosine(query, embedding))
                    .unwrap_or(0.0)
            })
            .collect()
    }
}
