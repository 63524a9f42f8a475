//! kb-chunk - Ingestion tooling
//!
//! Turns a directory of plain-text files into the gzip archives the
//! knowledge base loads.
//!
//! - [`WindowChunker`]: fixed-size character windows with overlap
//! - [`IngestPipeline`]: read, chunk and embed a source directory
//! - [`ArchiveWriter`]: write records as numbered gzip JSON shards
//!
//! # Example
//!
//! ```rust,ignore
//! use kb_chunk::{ArchiveWriter, IngestPipeline};
//!
//! let pipeline = IngestPipeline::new(embedder, &config.ingest, config.embedding.batch_size);
//! let ingested = pipeline.ingest(Path::new("kb")).await?;
//! let writer = ArchiveWriter::from_config(".", &config.ingest);
//! writer.write(&ingested.records)?;
//! ```

mod pipeline;
mod window;
mod writer;

pub use pipeline::{load_documents, Document, IngestPipeline, Ingested};
pub use window::WindowChunker;
pub use writer::{round_embedding, ArchiveWriter};

// Re-export types for convenience
pub use kb_core::{ArchiveRecord, IngestConfig};
