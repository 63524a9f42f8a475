//! kb-query - Search and ranking engine
//!
//! This crate blends a BM25-style lexical signal with cosine similarity
//! between embeddings into a single ranked result list.
//!
//! # Pipeline
//!
//! 1. Normalize the query and expand it with the synonym table
//! 2. Score every chunk lexically (BM25-lite over the inverted index)
//! 3. Preselect the best lexical candidates (or a corpus prefix when no
//!    term matched)
//! 4. Score candidates semantically against the query embedding
//! 5. Blend, sort, truncate; fall back to a substring scan when empty
//!
//! # Example
//!
//! ```rust,ignore
//! use kb_query::{HybridEngine, SearchOptions};
//! use std::sync::Arc;
//!
//! let engine = HybridEngine::new(handle, embedder, config.search.clone());
//! let results = engine.search("calendula ointment", SearchOptions::default()).await;
//! ```

mod bm25;
mod dense;
mod engine;
mod expand;

pub use bm25::{bm25_scores, idf, term_score, Bm25Params};
pub use dense::{cosine, BruteForceScorer, DenseScorer};
pub use engine::{fallback_scan, preselect, rank, HybridEngine, SearchOptions};
pub use expand::expand_query;

// Re-export for convenience
pub use kb_core::{SearchHit, SearchResults};
