//! Knowledge base service.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use kb_chunk::ArchiveWriter;
use kb_core::{ArchiveRecord, Embedder, KbConfig, Result, SearchResults};
use kb_embed::embedder_from_config;
use kb_query::{HybridEngine, SearchOptions};
use kb_store::{reembed, KbHandle, KnowledgeBase};

/// Characters of chunk text shown by the debug listing.
const PREVIEW_CHARS: usize = 180;

/// Results returned by the debug listing.
const DEBUG_TOP_K: usize = 6;

/// Knowledge base service state.
pub struct KbService {
    config: KbConfig,

    /// Published knowledge base, shared with the engine.
    handle: Arc<KbHandle>,

    embedder: Arc<dyn Embedder>,

    engine: HybridEngine<dyn Embedder>,

    /// Serializes reload and re-embedding so swaps never race each other.
    maintenance: Mutex<()>,
}

/// Search request parameters. Unset options use the configured defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SearchParams {
    /// The search query.
    pub query: String,

    /// Maximum number of results.
    #[serde(default)]
    pub top_k: Option<usize>,

    /// Lexical candidates passed to semantic scoring.
    #[serde(default)]
    pub keyword_candidates: Option<usize>,

    /// Blend weight in [0, 1].
    #[serde(default)]
    pub alpha: Option<f32>,
}

impl SearchParams {
    /// Parameters for `query` with every option defaulted.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }
}

/// Tool result.
#[derive(Debug, Serialize)]
pub struct ToolResult {
    /// Whether the operation was successful.
    pub success: bool,

    /// Result message or content.
    pub message: String,
}

impl ToolResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// One entry of the debug listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugHit {
    pub source: Option<String>,
    pub score: f32,
    pub preview: String,
}

impl KbService {
    /// Load the archives and build the embedder named by `config`.
    ///
    /// Fails if any archive cannot be read; the service never starts with a
    /// partial knowledge base.
    pub fn open(config: KbConfig) -> Result<Self> {
        info!("Loading knowledge base from {:?}", config.archive.dir);

        let kb = KnowledgeBase::load(&config.archive, &config.index)?;
        let embedder = embedder_from_config(&config.embedding)?;
        Ok(Self::from_parts(config, kb, embedder))
    }

    /// Create a service around an already built knowledge base.
    pub fn from_parts(config: KbConfig, kb: KnowledgeBase, embedder: Arc<dyn Embedder>) -> Self {
        let handle = Arc::new(KbHandle::new(kb));
        let engine = HybridEngine::new(
            Arc::clone(&handle),
            Arc::clone(&embedder),
            config.search.clone(),
        );

        Self {
            config,
            handle,
            embedder,
            engine,
            maintenance: Mutex::new(()),
        }
    }

    /// Get the service info.
    pub fn info() -> ServiceInfo {
        ServiceInfo {
            name: "kb".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: "Hybrid lexical and semantic knowledge base search".to_string(),
        }
    }

    /// List available tools.
    pub fn tools() -> Vec<ToolInfo> {
        vec![
            ToolInfo {
                name: "kb_search".to_string(),
                description: "Search the knowledge base for relevant chunks".to_string(),
            },
            ToolInfo {
                name: "kb_search_debug".to_string(),
                description: "List source, score and a preview of the top chunks".to_string(),
            },
            ToolInfo {
                name: "kb_stats".to_string(),
                description: "Get statistics about the knowledge base".to_string(),
            },
            ToolInfo {
                name: "kb_reload".to_string(),
                description: "Reload the knowledge base from its archives".to_string(),
            },
            ToolInfo {
                name: "kb_reembed".to_string(),
                description: "Recompute the embedding of every chunk".to_string(),
            },
        ]
    }

    /// The configuration the service was built with.
    pub fn config(&self) -> &KbConfig {
        &self.config
    }

    /// The knowledge base currently being served.
    pub fn knowledge_base(&self) -> Arc<KnowledgeBase> {
        self.handle.snapshot()
    }

    /// Resolve request parameters against the configured defaults.
    ///
    /// `alpha` is clamped to [0, 1].
    pub fn options(&self, params: &SearchParams) -> SearchOptions {
        let defaults = self.engine.default_options();
        SearchOptions {
            k: params.top_k.unwrap_or(defaults.k),
            k_kw: params.keyword_candidates.unwrap_or(defaults.k_kw),
            alpha: params.alpha.unwrap_or(defaults.alpha).clamp(0.0, 1.0),
        }
    }

    /// Run a search and return the structured results.
    ///
    /// Never fails; a blank query or `top_k = 0` gives an empty result set.
    pub async fn query(&self, params: &SearchParams) -> SearchResults {
        let options = self.options(params);
        self.engine.search(&params.query, options).await
    }

    /// Search the knowledge base.
    pub async fn search(&self, params: SearchParams) -> ToolResult {
        let results = self.query(&params).await;

        let mut output = format!(
            "Found {} results in {}ms",
            results.total_results, results.latency_ms
        );
        if results.fallback {
            output.push_str(" (substring fallback)");
        }
        if results.semantic_degraded {
            output.push_str(" (keyword only)");
        }
        output.push_str(":\n\n");

        for (rank, hit) in results.results.iter().enumerate() {
            output.push_str(&format!(
                "---\n[{}] {} (score: {:.3}, keyword: {:.3}, semantic: {:.3})\n",
                rank + 1,
                hit.source.as_deref().unwrap_or("(unknown source)"),
                hit.score,
                hit.keyword_score,
                hit.semantic_score
            ));
            output.push_str(&format!("{}\n\n", hit.text));
        }

        ToolResult::success(output)
    }

    /// Compact listing of the top hits for `query` as a JSON array.
    pub async fn search_debug(&self, query: &str) -> ToolResult {
        let params = SearchParams {
            query: query.to_string(),
            top_k: Some(DEBUG_TOP_K),
            ..Default::default()
        };
        let results = self.query(&params).await;

        let hits: Vec<DebugHit> = results
            .results
            .iter()
            .map(|hit| DebugHit {
                source: hit.source.clone(),
                score: hit.score,
                preview: hit.text.chars().take(PREVIEW_CHARS).collect(),
            })
            .collect();

        match serde_json::to_string_pretty(&hits) {
            Ok(json) => ToolResult::success(json),
            Err(e) => ToolResult::error(format!("Failed to encode results: {}", e)),
        }
    }

    /// Get statistics.
    pub fn stats(&self) -> ToolResult {
        let stats = self.handle.snapshot().stats();

        let mut output = String::from("Knowledge base statistics:\n\n");
        output.push_str(&format!("- Chunks: {}\n", stats.chunks));
        output.push_str(&format!("- Embedded chunks: {}\n", stats.embedded_chunks));
        output.push_str(&format!("- Vocabulary: {}\n", stats.vocabulary));
        output.push_str(&format!("- Average length: {:.1} tokens\n", stats.avg_doc_len));
        output.push_str(&format!("- Embedder: {}\n", self.embedder.name()));

        ToolResult::success(output)
    }

    /// Rebuild the knowledge base from the configured archives and swap it
    /// in. On failure the current knowledge base keeps serving.
    pub async fn reload(&self) -> ToolResult {
        let _guard = self.maintenance.lock().await;
        info!("Reloading knowledge base from {:?}", self.config.archive.dir);

        match KnowledgeBase::load(&self.config.archive, &self.config.index) {
            Ok(kb) => {
                let chunks = kb.len();
                self.handle.swap(kb);
                ToolResult::success(format!("Reloaded {} chunks.", chunks))
            }
            Err(e) => {
                warn!("Reload failed, keeping current knowledge base: {}", e);
                ToolResult::error(format!("Reload failed: {}", e))
            }
        }
    }

    /// Re-embed every chunk, swap the result in and, when `out` is given,
    /// replace the archives there with the result.
    ///
    /// Searches keep using the previous knowledge base until the swap. A
    /// chunk whose new embedding failed is persisted with its previous
    /// vector, so a later load still finds every chunk.
    pub async fn reembed(&self, out: Option<&Path>) -> ToolResult {
        let _guard = self.maintenance.lock().await;
        let current = self.handle.snapshot();

        let (next, report) = match reembed(&current, self.embedder.as_ref()).await {
            Ok(result) => result,
            Err(e) => return ToolResult::error(format!("Re-embedding failed: {}", e)),
        };

        let records = persisted_records(&current, &next);
        self.handle.swap(next);

        let mut message = format!(
            "Re-embedded {} chunks ({} failed).",
            report.embedded, report.failed
        );

        if let Some(dir) = out {
            let writer = ArchiveWriter::from_config(dir, &self.config.ingest);
            match writer.replace(&records, &self.config.archive.suffix) {
                Ok(paths) => {
                    message.push_str(&format!(" Wrote {} archives to {:?}.", paths.len(), dir));
                }
                Err(e) => {
                    return ToolResult::error(format!(
                        "{} Failed to persist archives: {}",
                        message, e
                    ));
                }
            }
        }

        ToolResult::success(message)
    }
}

/// Records for `next`, falling back to the vector in `previous` wherever
/// re-embedding left a chunk without one.
fn persisted_records(previous: &KnowledgeBase, next: &KnowledgeBase) -> Vec<ArchiveRecord> {
    next.chunks()
        .iter()
        .zip(previous.chunks())
        .map(|(chunk, old)| {
            let mut record = ArchiveRecord::from(chunk);
            if record.embedding.is_none() {
                record.embedding = old.embedding.clone();
            }
            record
        })
        .collect()
}

/// Service info.
#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub description: String,
}

/// Tool info.
#[derive(Debug, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use kb_core::EmbeddingProvider;
    use kb_embed::{DisabledEmbedder, HashEmbedder};
    use std::io::Write;
    use tempfile::TempDir;

    /// Maps each text to a fixed two-dimensional vector.
    struct KeywordEmbedder;

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.contains("tea") {
                Ok(vec![0.0, 1.0])
            } else {
                Ok(vec![1.0, 0.0])
            }
        }

        fn name(&self) -> &str {
            "keyword"
        }
    }

    fn write_archive(dir: &Path, name: &str, json: &str) {
        let file = std::fs::File::create(dir.join(name)).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(json.as_bytes()).unwrap();
        encoder.finish().unwrap();
    }

    /// Archive dir with the three herbal chunks plus a synonym file.
    fn herbal_config(temp: &TempDir) -> KbConfig {
        write_archive(
            temp.path(),
            "kb_store-000.json.gz",
            r#"[
                {"id": "A", "source": "tea.txt", "text": "soothing chamomile tea", "embedding": [0.2, 1.0]},
                {"id": "B", "source": "salve.txt", "text": "calendula wound healing ointment", "embedding": [1.0, 0.1]},
                {"id": "C", "source": "root.txt", "text": "ginger relieves nausea", "embedding": [0.7, 0.7]},
                {"id": "D", "source": "broken.txt", "embedding": [1.0, 1.0]}
            ]"#,
        );
        let synonyms = temp.path().join("synonyms.json");
        std::fs::write(&synonyms, r#"[["calendula", "körömvirág"]]"#).unwrap();

        let mut config = KbConfig::default();
        config.archive.dir = temp.path().to_path_buf();
        config.archive.synonyms = Some(synonyms);
        config.embedding.provider = EmbeddingProvider::None;
        config
    }

    #[tokio::test]
    async fn test_service_info() {
        let info = KbService::info();
        assert_eq!(info.name, "kb");
    }

    #[tokio::test]
    async fn test_tools_list() {
        let tools = KbService::tools();
        assert!(!tools.is_empty());
        assert!(tools.iter().any(|t| t.name == "kb_search"));
    }

    #[tokio::test]
    async fn test_open_skips_incomplete_records() {
        let temp = TempDir::new().unwrap();
        let service = KbService::open(herbal_config(&temp)).unwrap();

        assert_eq!(service.knowledge_base().len(), 3);
    }

    #[tokio::test]
    async fn test_open_fails_on_corrupt_archive() {
        let temp = TempDir::new().unwrap();
        let config = herbal_config(&temp);
        std::fs::write(temp.path().join("kb_store-001.json.gz"), b"not gzip").unwrap();

        let err = KbService::open(config).err().unwrap();
        assert!(err.is_fatal_load());
    }

    #[tokio::test]
    async fn test_vernacular_query_end_to_end() {
        let temp = TempDir::new().unwrap();
        let service = KbService::open(herbal_config(&temp)).unwrap();

        let params = SearchParams {
            query: "körömvirág".to_string(),
            alpha: Some(0.0),
            ..Default::default()
        };
        let results = service.query(&params).await;

        assert_eq!(results.results[0].id.as_deref(), Some("B"));
        assert!(results.results[0].keyword_score > 0.0);
        assert!(results.results[1..]
            .iter()
            .all(|hit| hit.score < results.results[0].score));

        let result = service.search(params).await;
        assert!(result.success);
        assert!(result.message.contains("salve.txt"));
    }

    #[tokio::test]
    async fn test_nonsense_query_end_to_end() {
        let temp = TempDir::new().unwrap();
        let service = KbService::open(herbal_config(&temp)).unwrap();

        let results = service.query(&SearchParams::new("zzqxj")).await;

        assert!(results.results.is_empty());
        assert!(!results.fallback);
    }

    #[tokio::test]
    async fn test_blank_query_and_zero_top_k_are_empty() {
        let temp = TempDir::new().unwrap();
        let service = KbService::open(herbal_config(&temp)).unwrap();

        assert!(service.query(&SearchParams::new("")).await.results.is_empty());
        assert!(service.query(&SearchParams::new("   ")).await.results.is_empty());

        let params = SearchParams {
            query: "ginger".to_string(),
            top_k: Some(0),
            ..Default::default()
        };
        assert!(service.query(&params).await.results.is_empty());

        let result = service.search(SearchParams::new("  ")).await;
        assert!(result.success);
        assert!(result.message.contains("Found 0 results"));
    }

    #[tokio::test]
    async fn test_alpha_is_clamped() {
        let service =
            KbService::from_parts(KbConfig::default(), KnowledgeBase::empty(), Arc::new(DisabledEmbedder));

        let params = SearchParams {
            query: "ginger".to_string(),
            alpha: Some(1.5),
            ..Default::default()
        };
        assert_eq!(service.options(&params).alpha, 1.0);
        assert!(service.search(params).await.success);

        let params = SearchParams {
            query: "ginger".to_string(),
            alpha: Some(-0.5),
            ..Default::default()
        };
        assert_eq!(service.options(&params).alpha, 0.0);
    }

    #[tokio::test]
    async fn test_search_empty_kb() {
        let service =
            KbService::from_parts(KbConfig::default(), KnowledgeBase::empty(), Arc::new(HashEmbedder::new(8)));

        let result = service.search(SearchParams::new("ginger")).await;
        assert!(result.success);
        assert!(result.message.contains("Found 0 results"));
    }

    #[tokio::test]
    async fn test_search_debug_preview() {
        let temp = TempDir::new().unwrap();
        let long_text = "ginger ".repeat(60);
        write_archive(
            temp.path(),
            "kb_store-000.json.gz",
            &format!(r#"[{{"source": "long.txt", "text": "{}", "embedding": [1.0]}}]"#, long_text),
        );
        let mut config = KbConfig::default();
        config.archive.dir = temp.path().to_path_buf();
        config.embedding.provider = EmbeddingProvider::None;
        let service = KbService::open(config).unwrap();

        let result = service.search_debug("ginger").await;
        assert!(result.success);

        let hits: Vec<DebugHit> = serde_json::from_str(&result.message).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source.as_deref(), Some("long.txt"));
        assert_eq!(hits[0].preview.chars().count(), 180);
    }

    #[tokio::test]
    async fn test_stats() {
        let temp = TempDir::new().unwrap();
        let service = KbService::open(herbal_config(&temp)).unwrap();

        let result = service.stats();
        assert!(result.success);
        assert!(result.message.contains("Chunks: 3"));
        assert!(result.message.contains("Embedded chunks: 3"));
    }

    #[tokio::test]
    async fn test_reload_picks_up_new_archives() {
        let temp = TempDir::new().unwrap();
        let service = KbService::open(herbal_config(&temp)).unwrap();

        write_archive(
            temp.path(),
            "kb_store-001.json.gz",
            r#"[{"id": "E", "text": "peppermint oil", "embedding": [0.5, 0.5]}]"#,
        );
        let result = service.reload().await;

        assert!(result.success, "Reload failed: {}", result.message);
        assert_eq!(service.knowledge_base().len(), 4);
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_serving() {
        let temp = TempDir::new().unwrap();
        let service = KbService::open(herbal_config(&temp)).unwrap();

        std::fs::write(temp.path().join("kb_store-001.json.gz"), b"garbage").unwrap();
        let result = service.reload().await;

        assert!(!result.success);
        assert_eq!(service.knowledge_base().len(), 3);
    }

    #[tokio::test]
    async fn test_reembed_swaps_and_persists() {
        let temp = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let kb = KnowledgeBase::load(&herbal_config(&temp).archive, &Default::default()).unwrap();
        let service = KbService::from_parts(herbal_config(&temp), kb, Arc::new(KeywordEmbedder));

        let before = service.knowledge_base();
        let result = service.reembed(Some(out.path())).await;
        assert!(result.success, "Re-embed failed: {}", result.message);

        let after = service.knowledge_base();
        assert_eq!(after.chunk(0).unwrap().embedding, Some(vec![0.0, 1.0]));
        assert_eq!(after.chunk(1).unwrap().embedding, Some(vec![1.0, 0.0]));
        assert_eq!(before.chunk(0).unwrap().embedding, Some(vec![0.2, 1.0]));

        let written = kb_store::load_archives(out.path(), ".json.gz").unwrap();
        assert_eq!(written.chunks.len(), 3);
        assert_eq!(written.chunks[2].id.as_deref(), Some("C"));
    }

    #[tokio::test]
    async fn test_reembed_with_unavailable_embedder() {
        let temp = TempDir::new().unwrap();
        let service = KbService::open(herbal_config(&temp)).unwrap();

        let result = service.reembed(None).await;

        assert!(result.success);
        assert!(result.message.contains("3 failed"));
        assert_eq!(service.knowledge_base().stats().embedded_chunks, 0);
    }

    #[tokio::test]
    async fn test_reembed_failure_keeps_archived_vectors() {
        let temp = TempDir::new().unwrap();
        let config = herbal_config(&temp);
        let service = KbService::open(config.clone()).unwrap();

        let result = service.reembed(Some(temp.path())).await;
        assert!(result.success, "Re-embed failed: {}", result.message);
        assert_eq!(service.knowledge_base().stats().embedded_chunks, 0);

        let reloaded = KnowledgeBase::load(&config.archive, &config.index).unwrap();
        assert_eq!(reloaded.len(), 3);
        assert_eq!(reloaded.chunk(0).unwrap().embedding, Some(vec![0.2, 1.0]));
        assert!(temp.path().join("synonyms.json").exists());
        assert!(!temp.path().join(".kb-staging").exists());
    }

    #[tokio::test]
    async fn test_reembed_replaces_foreign_archives() {
        let temp = TempDir::new().unwrap();
        write_archive(
            temp.path(),
            "corpus.json.gz",
            r#"[{"id": "A", "source": "tea.txt", "text": "soothing chamomile tea", "embedding": [0.2, 1.0]}]"#,
        );
        let mut config = KbConfig::default();
        config.archive.dir = temp.path().to_path_buf();
        let kb = KnowledgeBase::load(&config.archive, &config.index).unwrap();
        let service = KbService::from_parts(config.clone(), kb, Arc::new(KeywordEmbedder));

        let result = service.reembed(Some(temp.path())).await;
        assert!(result.success, "Re-embed failed: {}", result.message);

        assert!(!temp.path().join("corpus.json.gz").exists());
        let reloaded = KnowledgeBase::load(&config.archive, &config.index).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.chunk(0).unwrap().embedding, Some(vec![0.0, 1.0]));
    }
}
