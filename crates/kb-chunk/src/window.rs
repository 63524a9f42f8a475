//! Fixed-size sliding window chunker.

use kb_core::{IngestConfig, KbError, Result};

/// Splits text into windows of `size` characters, each starting
/// `size - overlap` characters after the previous one.
///
/// Windows are measured in characters, not bytes, so multi-byte text is
/// never cut inside a code point. The last window may be shorter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowChunker {
    size: usize,
    overlap: usize,
}

impl WindowChunker {
    /// Create a chunker. `overlap` must be smaller than `size`.
    pub fn new(size: usize, overlap: usize) -> Result<Self> {
        if size == 0 {
            return Err(KbError::invalid_argument("chunk size must be positive"));
        }
        if overlap >= size {
            return Err(KbError::invalid_argument(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                overlap, size
            )));
        }
        Ok(Self { size, overlap })
    }

    /// Create a chunker from the ingest configuration.
    pub fn from_config(config: &IngestConfig) -> Result<Self> {
        Self::new(config.chunk_chars, config.overlap_chars)
    }

    /// Window size in characters.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Overlap between consecutive windows in characters.
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `text` into windows. Empty text yields no windows.
    pub fn chunk<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let offsets: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let chars = offsets.len() - 1;
        let step = self.size - self.overlap;

        (0..chars)
            .step_by(step)
            .map(|start| {
                let end = (start + self.size).min(chars);
                &text[offsets[start]..offsets[end]]
            })
            .collect()
    }
}

impl Default for WindowChunker {
    fn default() -> Self {
        Self {
            size: 900,
            overlap: 150,
        }
    }
}
