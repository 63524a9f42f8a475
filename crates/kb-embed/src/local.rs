//! Embedders that run without any model.

use async_trait::async_trait;

use kb_core::{normalize, tokenize, Embedder, KbError, Result};

/// Deterministic feature-hashing embedder.
///
/// Each normalized token is hashed into one of `dimension` buckets with a
/// sign bit, then the vector is L2-normalized. Texts sharing tokens get a
/// positive cosine, which makes it usable for tests and offline demos.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    /// Create an embedder producing vectors of `dimension` components.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    /// Output dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let normalized = normalize(text);
        let mut embedding = vec![0.0f32; self.dimension];

        for token in tokenize(&normalized) {
            let hash = fnv1a(token.as_bytes());
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            embedding[bucket] += sign;
        }

        // L2 normalize
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut embedding {
                *x /= norm;
            }
        }
        embedding
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(768)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf29ce484222325u64, |acc, b| {
        (acc ^ *b as u64).wrapping_mul(0x100000001b3)
    })
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vectorize(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }

    fn name(&self) -> &str {
        "hash"
    }
}

/// An embedder that is never available.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(KbError::embedding("embeddings are disabled"))
    }

    fn name(&self) -> &str {
        "disabled"
    }
}
