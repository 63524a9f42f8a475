//! Source directory ingestion.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use kb_core::{ArchiveRecord, DocumentText, Embedder, IngestConfig, KbError, Result};

use crate::window::WindowChunker;
use crate::writer::round_embedding;

/// A chunk of a source file waiting to be embedded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// `"{file}#{index}"`.
    pub id: String,

    /// Source file name.
    pub source: String,

    /// Window text.
    pub text: String,
}

/// Result of an ingestion run.
#[derive(Debug, Default)]
pub struct Ingested {
    /// Embedded records, in source order.
    pub records: Vec<ArchiveRecord>,

    /// Number of chunks produced by the chunker.
    pub chunks: usize,

    /// Batches that failed to embed and were skipped.
    pub failed_batches: usize,
}

/// Read every `.txt` file of `dir` (sorted by name) and split it into
/// windows.
pub fn load_documents(dir: &Path, chunker: &WindowChunker) -> Result<Vec<Document>> {
    if !dir.is_dir() {
        return Err(KbError::ingest(format!(
            "Source directory not found: {}",
            dir.display()
        )));
    }

    let mut files: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().map(|e| e == "txt").unwrap_or(false))
        .collect();
    files.sort();

    let mut documents = Vec::new();
    for path in files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            KbError::ingest(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let windows = chunker.chunk(&content);
        debug!("{}: {} chunks", name, windows.len());

        documents.extend(windows.into_iter().enumerate().map(|(i, text)| Document {
            id: format!("{}#{}", name, i),
            source: name.clone(),
            text: text.to_string(),
        }));
    }

    Ok(documents)
}

/// Chunks a source directory and embeds every chunk in batches.
pub struct IngestPipeline<E: ?Sized> {
    embedder: Arc<E>,
    chunker: WindowChunker,
    batch_size: usize,
    decimals: u32,
    pause: Duration,
}

impl<E> IngestPipeline<E>
where
    E: Embedder + ?Sized,
{
    /// Create a pipeline from the ingest configuration.
    pub fn new(embedder: Arc<E>, config: &IngestConfig, batch_size: usize) -> Result<Self> {
        Ok(Self {
            embedder,
            chunker: WindowChunker::from_config(config)?,
            batch_size: batch_size.max(1),
            decimals: config.decimals,
            pause: Duration::from_millis(config.batch_pause_ms),
        })
    }

    /// Chunk and embed every `.txt` file in `dir`.
    ///
    /// A batch whose embedding call fails is logged and dropped; the run
    /// continues with the next batch.
    pub async fn ingest(&self, dir: &Path) -> Result<Ingested> {
        let documents = load_documents(dir, &self.chunker)?;
        let mut ingested = Ingested {
            chunks: documents.len(),
            ..Default::default()
        };

        if documents.is_empty() {
            warn!("No .txt files found in {:?}", dir);
            return Ok(ingested);
        }

        info!(
            "Embedding {} chunks with {}",
            documents.len(),
            self.embedder.name()
        );

        let batches = documents.chunks(self.batch_size);
        let total_batches = batches.len();
        for (n, batch) in batches.enumerate() {
            let texts: Vec<DocumentText<'_>> = batch
                .iter()
                .map(|d| DocumentText {
                    text: &d.text,
                    title: Some(&d.source),
                })
                .collect();

            match self.embedder.embed_documents(&texts).await {
                Ok(embeddings) if embeddings.len() == batch.len() => {
                    ingested
                        .records
                        .extend(batch.iter().zip(embeddings).map(|(doc, embedding)| {
                            ArchiveRecord {
                                id: Some(doc.id.clone()),
                                source: Some(doc.source.clone()),
                                text: Some(doc.text.clone()),
                                embedding: Some(round_embedding(&embedding, self.decimals)),
                            }
                        }));
                    info!(
                        "Embedded {} / {}",
                        (n * self.batch_size + batch.len()).min(documents.len()),
                        documents.len()
                    );
                }
                Ok(embeddings) => {
                    warn!(
                        "Batch {} returned {} embeddings for {} chunks, skipping",
                        n,
                        embeddings.len(),
                        batch.len()
                    );
                    ingested.failed_batches += 1;
                }
                Err(e) => {
                    warn!("Batch {} failed, skipping: {}", n, e);
                    ingested.failed_batches += 1;
                }
            }

            if n + 1 < total_batches && !self.pause.is_zero() {
                tokio::time::sleep(self.pause).await;
            }
        }

        Ok(ingested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kb_embed::HashEmbedder;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn config(chunk_chars: usize, overlap_chars: usize) -> IngestConfig {
        IngestConfig {
            chunk_chars,
            overlap_chars,
            batch_pause_ms: 0,
            ..Default::default()
        }
    }

    fn source_dir(files: &[(&str, &str)]) -> TempDir {
        let temp = TempDir::new().unwrap();
        for (name, content) in files {
            std::fs::write(temp.path().join(name), content).unwrap();
        }
        temp
    }

    /// Fails every other batch.
    struct FlakyBatches {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for FlakyBatches {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.123456, 1.0])
        }

        async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) % 2 == 1 {
                return Err(KbError::embedding("rate limited"));
            }
            Ok(texts.iter().map(|_| vec![0.123456, 1.0]).collect())
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    /// Records the title sent with every document.
    #[derive(Default)]
    struct TitleRecorder {
        titles: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl Embedder for TitleRecorder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0])
        }

        async fn embed_documents(&self, docs: &[DocumentText<'_>]) -> Result<Vec<Vec<f32>>> {
            let mut titles = self.titles.lock().unwrap();
            titles.extend(docs.iter().map(|doc| doc.title.map(str::to_string)));
            Ok(docs.iter().map(|_| vec![1.0]).collect())
        }

        fn name(&self) -> &str {
            "titles"
        }
    }

    #[test]
    fn test_load_documents_ids_and_order() {
        let dir = source_dir(&[
            ("b.txt", "abcdefghij"),
            ("a.txt", "short"),
            ("notes.md", "ignored"),
        ]);
        let chunker = WindowChunker::new(6, 2).unwrap();

        let docs = load_documents(dir.path(), &chunker).unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();

        assert_eq!(ids, vec!["a.txt#0", "b.txt#0", "b.txt#1", "b.txt#2"]);
        assert_eq!(docs[1].source, "b.txt");
        assert_eq!(docs[2].text, "efghij");
    }

    #[test]
    fn test_missing_source_dir() {
        let temp = TempDir::new().unwrap();
        let err = load_documents(&temp.path().join("missing"), &WindowChunker::default())
            .unwrap_err();
        assert_eq!(err.error_code(), "INGEST_ERROR");
    }

    #[tokio::test]
    async fn test_ingest_embeds_every_chunk() {
        let dir = source_dir(&[("herbs.txt", "calendula wound healing ointment")]);
        let pipeline =
            IngestPipeline::new(Arc::new(HashEmbedder::new(16)), &config(10, 2), 2).unwrap();

        let ingested = pipeline.ingest(dir.path()).await.unwrap();

        assert_eq!(ingested.chunks, 4);
        assert_eq!(ingested.records.len(), 4);
        assert_eq!(ingested.failed_batches, 0);
        assert_eq!(ingested.records[0].id.as_deref(), Some("herbs.txt#0"));
        assert!(ingested
            .records
            .iter()
            .all(|r| r.embedding.as_ref().map(|e| e.len()) == Some(16)));
    }

    #[tokio::test]
    async fn test_failed_batches_are_skipped() {
        let dir = source_dir(&[("a.txt", "one"), ("b.txt", "two"), ("c.txt", "three")]);
        let embedder = Arc::new(FlakyBatches {
            calls: AtomicUsize::new(0),
        });
        let pipeline = IngestPipeline::new(embedder, &config(900, 150), 1).unwrap();

        let ingested = pipeline.ingest(dir.path()).await.unwrap();

        assert_eq!(ingested.chunks, 3);
        assert_eq!(ingested.failed_batches, 1);
        let ids: Vec<_> = ingested.records.iter().filter_map(|r| r.id.as_deref()).collect();
        assert_eq!(ids, vec!["a.txt#0", "c.txt#0"]);
        assert_eq!(ingested.records[0].embedding, Some(vec![0.1235, 1.0]));
    }

    #[tokio::test]
    async fn test_documents_are_titled_by_source() {
        let dir = source_dir(&[("salve.txt", "calendula ointment"), ("tea.txt", "chamomile")]);
        let embedder = Arc::new(TitleRecorder::default());
        let pipeline = IngestPipeline::new(embedder.clone(), &config(900, 150), 64).unwrap();

        let ingested = pipeline.ingest(dir.path()).await.unwrap();

        assert_eq!(ingested.records.len(), 2);
        let titles = embedder.titles.lock().unwrap();
        assert_eq!(
            *titles,
            vec![Some("salve.txt".to_string()), Some("tea.txt".to_string())]
        );
    }

    #[tokio::test]
    async fn test_empty_source_dir() {
        let dir = source_dir(&[]);
        let pipeline =
            IngestPipeline::new(Arc::new(HashEmbedder::new(8)), &config(900, 150), 64).unwrap();

        let ingested = pipeline.ingest(dir.path()).await.unwrap();
        assert!(ingested.records.is_empty());
        assert_eq!(ingested.chunks, 0);
    }
}
