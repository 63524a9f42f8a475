//! Configuration types for the knowledge base.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KbConfig {
    /// Archive location configuration.
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Lexical index configuration.
    #[serde(default)]
    pub index: IndexConfig,

    /// Search configuration.
    #[serde(default)]
    pub search: SearchConfig,

    /// Embedding configuration.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Ingestion configuration.
    #[serde(default)]
    pub ingest: IngestConfig,
}

/// Where the corpus archives live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Directory scanned for archives.
    #[serde(default = "default_archive_dir")]
    pub dir: PathBuf,

    /// File name suffix of archives.
    #[serde(default = "default_archive_suffix")]
    pub suffix: String,

    /// Optional JSON file of synonym groups.
    #[serde(default)]
    pub synonyms: Option<PathBuf>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            dir: default_archive_dir(),
            suffix: default_archive_suffix(),
            synonyms: None,
        }
    }
}

/// Lexical index configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Only the first `max_doc_tokens` tokens of a chunk are indexed.
    #[serde(default = "default_max_doc_tokens")]
    pub max_doc_tokens: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            max_doc_tokens: default_max_doc_tokens(),
        }
    }
}

/// How the unbounded BM25 score is mapped before blending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LexicalCompression {
    /// `tanh(x)`.
    #[default]
    Tanh,
    /// `x / (1 + x)`.
    Saturate,
    /// No compression.
    Identity,
}

impl LexicalCompression {
    /// Apply the compression to a lexical score.
    pub fn apply(self, x: f32) -> f32 {
        match self {
            Self::Tanh => x.tanh(),
            Self::Saturate => x / (1.0 + x.abs()),
            Self::Identity => x,
        }
    }
}

/// Search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Default number of results.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Number of lexical candidates scored semantically.
    #[serde(default = "default_keyword_candidates")]
    pub keyword_candidates: usize,

    /// Blend weight (0 = keyword only, 1 = semantic only).
    #[serde(default = "default_alpha")]
    pub alpha: f32,

    /// Prefix of the corpus scored when no query term matches.
    #[serde(default = "default_semantic_prefix_cap")]
    pub semantic_prefix_cap: usize,

    /// Nominal score of substring fallback hits.
    #[serde(default = "default_fallback_score")]
    pub fallback_score: f32,

    /// Candidates must score strictly above this to be returned.
    #[serde(default)]
    pub min_score: f32,

    /// BM25 term frequency saturation.
    #[serde(default = "default_bm25_k1")]
    pub bm25_k1: f32,

    /// BM25 length normalization.
    #[serde(default = "default_bm25_b")]
    pub bm25_b: f32,

    /// Lexical score compression.
    #[serde(default)]
    pub compression: LexicalCompression,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            keyword_candidates: default_keyword_candidates(),
            alpha: default_alpha(),
            semantic_prefix_cap: default_semantic_prefix_cap(),
            fallback_score: default_fallback_score(),
            min_score: 0.0,
            bm25_k1: default_bm25_k1(),
            bm25_b: default_bm25_b(),
            compression: LexicalCompression::Tanh,
        }
    }
}

/// Which embedding capability to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Remote Gemini embedding API.
    #[default]
    Gemini,
    /// Deterministic local hash vectors.
    Hash,
    /// No embeddings; search is lexical only.
    None,
}

/// Embedding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider selection.
    #[serde(default)]
    pub provider: EmbeddingProvider,

    /// API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Embedding model name.
    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Per-attempt timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Attempts before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry; doubled on each further retry.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Batch size for document embedding.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Vector dimension of the hash provider.
    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Gemini,
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_ms: default_timeout_ms(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            batch_size: default_batch_size(),
            dimension: default_dimension(),
        }
    }
}

/// Ingestion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Chunk window size in characters.
    #[serde(default = "default_chunk_chars")]
    pub chunk_chars: usize,

    /// Overlap between consecutive windows in characters.
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,

    /// Records per archive shard.
    #[serde(default = "default_shard_size")]
    pub shard_size: usize,

    /// Decimal places kept in stored embeddings.
    #[serde(default = "default_decimals")]
    pub decimals: u32,

    /// Archive file name prefix.
    #[serde(default = "default_output_prefix")]
    pub output_prefix: String,

    /// Pause between embedding batches in milliseconds.
    #[serde(default = "default_batch_pause_ms")]
    pub batch_pause_ms: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_chars: default_chunk_chars(),
            overlap_chars: default_overlap_chars(),
            shard_size: default_shard_size(),
            decimals: default_decimals(),
            output_prefix: default_output_prefix(),
            batch_pause_ms: default_batch_pause_ms(),
        }
    }
}

// Default value functions

fn default_archive_dir() -> PathBuf {
    PathBuf::from("kb")
}

fn default_archive_suffix() -> String {
    ".json.gz".to_string()
}

fn default_max_doc_tokens() -> usize {
    500
}

fn default_top_k() -> usize {
    12
}

fn default_keyword_candidates() -> usize {
    80
}

fn default_alpha() -> f32 {
    0.55
}

fn default_semantic_prefix_cap() -> usize {
    2000
}

fn default_fallback_score() -> f32 {
    0.01
}

fn default_bm25_k1() -> f32 {
    1.2
}

fn default_bm25_b() -> f32 {
    0.75
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_model() -> String {
    "text-embedding-004".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_batch_size() -> usize {
    64
}

fn default_dimension() -> usize {
    768
}

fn default_chunk_chars() -> usize {
    900
}

fn default_overlap_chars() -> usize {
    150
}

fn default_shard_size() -> usize {
    2500
}

fn default_decimals() -> u32 {
    4
}

fn default_output_prefix() -> String {
    "kb_store-".to_string()
}

fn default_batch_pause_ms() -> u64 {
    500
}

impl KbConfig {
    /// Load configuration from file.
    pub fn load(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            crate::error::KbError::config(format!("Failed to parse config: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default paths.
    pub fn load_default() -> crate::error::Result<Self> {
        // Try user config first
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("kb").join("config.toml");
            if user_config.exists() {
                return Self::load(&user_config);
            }
        }

        // Try local config
        let local_config = PathBuf::from("kb.toml");
        if local_config.exists() {
            return Self::load(&local_config);
        }

        Ok(Self::default())
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> crate::error::Result<()> {
        let search = &self.search;
        if !(0.0..=1.0).contains(&search.alpha) {
            return Err(crate::error::KbError::config(format!(
                "search.alpha must be within [0, 1], got {}",
                search.alpha
            )));
        }
        if !(0.0..=1.0).contains(&search.bm25_b) {
            return Err(crate::error::KbError::config(format!(
                "search.bm25_b must be within [0, 1], got {}",
                search.bm25_b
            )));
        }
        if self.ingest.overlap_chars >= self.ingest.chunk_chars {
            return Err(crate::error::KbError::config(
                "ingest.overlap_chars must be smaller than ingest.chunk_chars",
            ));
        }
        if self.ingest.shard_size == 0 {
            return Err(crate::error::KbError::config("ingest.shard_size must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = KbConfig::default();
        assert_eq!(config.search.top_k, 12);
        assert_eq!(config.search.keyword_candidates, 80);
        assert!((config.search.alpha - 0.55).abs() < f32::EPSILON);
        assert_eq!(config.index.max_doc_tokens, 500);
        assert_eq!(config.archive.suffix, ".json.gz");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config: KbConfig = toml::from_str(
            r#"
            [search]
            alpha = 0.3
            compression = "saturate"

            [embedding]
            provider = "hash"
            dimension = 16
            "#,
        )
        .unwrap();

        assert!((config.search.alpha - 0.3).abs() < f32::EPSILON);
        assert_eq!(config.search.compression, LexicalCompression::Saturate);
        assert_eq!(config.search.top_k, 12);
        assert_eq!(config.embedding.provider, EmbeddingProvider::Hash);
        assert_eq!(config.embedding.dimension, 16);
        assert_eq!(config.embedding.max_attempts, 5);
    }

    #[test]
    fn test_validate_rejects_bad_alpha() {
        let mut config = KbConfig::default();
        config.search.alpha = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kb.toml");
        std::fs::write(&path, "[archive]\ndir = \"/srv/kb\"\n").unwrap();

        let config = KbConfig::load(&path).unwrap();
        assert_eq!(config.archive.dir, PathBuf::from("/srv/kb"));
    }

    #[test]
    fn test_compression() {
        assert_eq!(LexicalCompression::Identity.apply(3.0), 3.0);
        assert!((LexicalCompression::Saturate.apply(1.0) - 0.5).abs() < 1e-6);
        assert!(LexicalCompression::Tanh.apply(100.0) <= 1.0);
        assert_eq!(LexicalCompression::Tanh.apply(0.0), 0.0);
    }
}
