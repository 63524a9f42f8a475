//! kb-store - In-memory knowledge base
//!
//! Loads gzip-compressed corpus archives into an ordered chunk sequence and
//! builds the inverted index used by the lexical scorer. A built
//! [`KnowledgeBase`] is immutable; reloads and re-embedding produce a new
//! value that is published through a [`KbHandle`].

mod archive;
mod handle;
mod index;
mod knowledge_base;
mod maintenance;

pub use archive::{archive_paths, load_archives, read_archive, ArchiveLoad};
pub use handle::KbHandle;
pub use index::{InvertedIndex, Posting};
pub use knowledge_base::KnowledgeBase;
pub use maintenance::{reembed, ReembedReport};

// Re-export types for convenience
pub use kb_core::{Chunk, KbStats, SynonymTable};
