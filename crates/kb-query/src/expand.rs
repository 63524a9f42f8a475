//! Query normalization and synonym expansion.

use std::collections::HashSet;

use kb_core::{normalize, SynonymTable};

/// Normalize `query`, split it on whitespace and add the synonyms of every
/// term.
///
/// The result is deduplicated. Order carries no meaning and every term is
/// weighted equally by the scorer.
pub fn expand_query(query: &str, synonyms: &SynonymTable) -> Vec<String> {
    let normalized = normalize(query);
    let mut seen: HashSet<String> = HashSet::new();
    let mut terms = Vec::new();

    let base: Vec<&str> = normalized.split_whitespace().collect();
    for term in &base {
        if seen.insert(term.to_string()) {
            terms.push(term.to_string());
        }
    }

    for term in &base {
        for synonym in synonyms.synonyms(term) {
            if seen.insert(synonym.clone()) {
                terms.push(synonym.clone());
            }
        }
    }

    terms
}
