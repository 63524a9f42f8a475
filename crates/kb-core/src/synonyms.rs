//! Data-driven, bidirectional synonym table used for query expansion.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{KbError, Result};
use crate::text::normalize;

/// Bidirectional synonym lookup keyed by normalized term.
///
/// Built from synonym groups: every member of a group is a synonym of every
/// other member. Keys and values are stored normalized, so lookups take the
/// output of [`normalize`] directly.
#[derive(Debug, Clone, Default)]
pub struct SynonymTable {
    entries: HashMap<String, Vec<String>>,
}

impl SynonymTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from synonym groups.
    ///
    /// ```
    /// use kb_core::SynonymTable;
    ///
    /// let table = SynonymTable::from_groups([["calendula", "körömvirág", "marigold"]]);
    /// assert!(table.synonyms("koromvirag").contains(&"calendula".to_string()));
    /// ```
    pub fn from_groups<G, T>(groups: impl IntoIterator<Item = G>) -> Self
    where
        G: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut table = Self::new();
        for group in groups {
            let terms: Vec<String> = group
                .into_iter()
                .map(|t| normalize(t.as_ref().trim()))
                .filter(|t| !t.is_empty())
                .collect();
            table.add_group(&terms);
        }
        table
    }

    /// Load synonym groups from a JSON file: an array of string arrays.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let groups: Vec<Vec<String>> = serde_json::from_str(&content).map_err(|e| {
            KbError::config(format!(
                "Failed to parse synonyms file {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self::from_groups(groups))
    }

    fn add_group(&mut self, terms: &[String]) {
        for term in terms {
            let entry = self.entries.entry(term.clone()).or_default();
            for other in terms {
                if other != term && !entry.contains(other) {
                    entry.push(other.clone());
                }
            }
        }
    }

    /// Synonyms of a normalized term (empty if unknown).
    pub fn synonyms(&self, term: &str) -> &[String] {
        self.entries.get(term).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of distinct terms in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
