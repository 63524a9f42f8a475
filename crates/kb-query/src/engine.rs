//! Hybrid search engine.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use kb_core::{normalize, Embedder, SearchConfig, SearchHit, SearchResults};
use kb_store::{KbHandle, KnowledgeBase};

use crate::bm25::{bm25_scores, Bm25Params};
use crate::dense::{BruteForceScorer, DenseScorer};
use crate::expand::expand_query;

/// Per-call search options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchOptions {
    /// Maximum number of results.
    pub k: usize,

    /// Number of lexical candidates passed to semantic scoring.
    pub k_kw: usize,

    /// Blend weight: 0 = lexical only, 1 = semantic only.
    pub alpha: f32,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            k: 12,
            k_kw: 80,
            alpha: 0.55,
        }
    }
}

impl From<&SearchConfig> for SearchOptions {
    fn from(config: &SearchConfig) -> Self {
        Self {
            k: config.top_k,
            k_kw: config.keyword_candidates,
            alpha: config.alpha,
        }
    }
}

/// Hybrid search query engine.
///
/// Reads the knowledge base through a [`KbHandle`] snapshot, so searches
/// never block each other and a concurrent swap is invisible to a running
/// search.
pub struct HybridEngine<E: ?Sized> {
    /// Published knowledge base.
    kb: Arc<KbHandle>,

    /// Query embedding capability.
    embedder: Arc<E>,

    /// Candidate scorer for the dense signal.
    dense: Arc<dyn DenseScorer>,

    /// Ranking configuration.
    config: SearchConfig,
}

impl<E> HybridEngine<E>
where
    E: Embedder + ?Sized,
{
    /// Create an engine with the brute-force dense scorer.
    pub fn new(kb: Arc<KbHandle>, embedder: Arc<E>, config: SearchConfig) -> Self {
        Self::with_dense_scorer(kb, embedder, Arc::new(BruteForceScorer), config)
    }

    /// Create an engine with a custom dense scorer.
    pub fn with_dense_scorer(
        kb: Arc<KbHandle>,
        embedder: Arc<E>,
        dense: Arc<dyn DenseScorer>,
        config: SearchConfig,
    ) -> Self {
        Self {
            kb,
            embedder,
            dense,
            config,
        }
    }

    /// The handle searches read from.
    pub fn handle(&self) -> &Arc<KbHandle> {
        &self.kb
    }

    /// The ranking configuration.
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Default options derived from the configuration.
    pub fn default_options(&self) -> SearchOptions {
        SearchOptions::from(&self.config)
    }

    /// Expand a query against the current synonym table.
    pub fn expand(&self, query: &str) -> Vec<String> {
        expand_query(query, self.kb.snapshot().synonyms())
    }

    /// Perform a hybrid search.
    ///
    /// Never fails: an unavailable embedding degrades to lexical scoring and
    /// an empty ranking falls back to a substring scan. A blank query or
    /// `k == 0` yields no results.
    pub async fn search(&self, query: &str, options: SearchOptions) -> SearchResults {
        let start = Instant::now();

        if options.k == 0 || normalize(query).trim().is_empty() {
            debug!("Nothing to search for: {:?} (k={})", query, options.k);
            return SearchResults {
                query: query.to_string(),
                ..Default::default()
            };
        }

        let kb = self.kb.snapshot();

        info!("Searching for: {:?}", query);

        let terms = expand_query(query, kb.synonyms());
        let lexical = bm25_scores(&terms, kb.index(), Bm25Params::from(&self.config));
        let candidates = preselect(
            &lexical,
            kb.len(),
            options.k_kw,
            self.config.semantic_prefix_cap,
        );

        debug!(
            "Expanded to {} terms, {} lexical matches, {} candidates",
            terms.len(),
            lexical.len(),
            candidates.len()
        );

        let mut semantic_degraded = false;
        let query_embedding = if candidates.is_empty() {
            None
        } else {
            match self.embedder.embed(query).await {
                Ok(embedding) => Some(embedding),
                Err(e) => {
                    warn!("Query embedding unavailable, scoring lexically: {}", e);
                    semantic_degraded = true;
                    None
                }
            }
        };

        let semantic = self
            .dense
            .score(&kb, query_embedding.as_deref(), &candidates);

        let mut results = rank(&kb, &candidates, &lexical, &semantic, &options, &self.config);

        let mut fallback = false;
        if results.is_empty() {
            results = fallback_scan(&kb, query, options.k, self.config.fallback_score);
            fallback = !results.is_empty();
            debug!("Fallback scan returned {} results", results.len());
        }

        let latency_ms = start.elapsed().as_millis() as u64;

        info!(
            "Search completed in {}ms, returned {} results",
            latency_ms,
            results.len()
        );

        SearchResults {
            query: query.to_string(),
            expanded_terms: terms,
            total_results: results.len(),
            latency_ms,
            fallback,
            semantic_degraded,
            results,
        }
    }
}

/// Choose the chunks that get a semantic score.
///
/// The top `k_kw` chunks by lexical score (ties by position). When nothing
/// matched lexically, the first `prefix_cap` chunks so purely semantic
/// queries are still scored.
pub fn preselect(
    lexical: &HashMap<usize, f32>,
    num_docs: usize,
    k_kw: usize,
    prefix_cap: usize,
) -> Vec<usize> {
    if lexical.is_empty() {
        return (0..num_docs.min(prefix_cap)).collect();
    }

    let mut ranked: Vec<(usize, f32)> = lexical.iter().map(|(doc, s)| (*doc, *s)).collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    ranked.truncate(k_kw);

    ranked.into_iter().map(|(doc, _)| doc).collect()
}

/// Blend, filter, sort and truncate the candidates.
///
/// `semantic[i]` is the dense score of `candidates[i]`. Candidates at or
/// below `config.min_score` are dropped; equal scores keep chunk order.
pub fn rank(
    kb: &KnowledgeBase,
    candidates: &[usize],
    lexical: &HashMap<usize, f32>,
    semantic: &[f32],
    options: &SearchOptions,
    config: &SearchConfig,
) -> Vec<SearchHit> {
    let alpha = options.alpha.clamp(0.0, 1.0);

    let mut scored: Vec<(usize, f32, f32, f32)> = candidates
        .iter()
        .enumerate()
        .map(|(i, &doc)| {
            let keyword = lexical.get(&doc).copied().unwrap_or(0.0);
            let dense = semantic.get(i).copied().unwrap_or(0.0);
            let hybrid = alpha * dense + (1.0 - alpha) * config.compression.apply(keyword);
            (doc, hybrid, keyword, dense)
        })
        .filter(|(_, hybrid, _, _)| *hybrid > config.min_score)
        .collect();

    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    scored.truncate(options.k);

    scored
        .into_iter()
        .filter_map(|(doc, score, keyword_score, semantic_score)| {
            let chunk = kb.chunk(doc)?;
            Some(SearchHit {
                id: chunk.id.clone(),
                source: chunk.source.clone(),
                score,
                keyword_score,
                semantic_score,
                text: chunk.text.clone(),
            })
        })
        .collect()
}

/// Last-resort scan: chunks whose normalized text contains the normalized
/// query, in chunk order, each with the nominal `score`.
pub fn fallback_scan(kb: &KnowledgeBase, query: &str, k: usize, score: f32) -> Vec<SearchHit> {
    let normalized = normalize(query);
    let needle = normalized.trim();
    if needle.is_empty() {
        return Vec::new();
    }

    kb.chunks()
        .iter()
        .filter(|chunk| chunk.norm_text.contains(needle))
        .take(k)
        .map(|chunk| SearchHit {
            id: chunk.id.clone(),
            source: chunk.source.clone(),
            score,
            keyword_score: 0.0,
            semantic_score: 0.0,
            text: chunk.text.clone(),
        })
        .collect()
}
