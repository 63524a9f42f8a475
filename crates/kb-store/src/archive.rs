//! Corpus archive loading.
//!
//! An archive is a gzip stream holding a JSON array of
//! [`ArchiveRecord`](kb_core::ArchiveRecord)s. Any archive that cannot be
//! read or parsed fails the whole load.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use tracing::{debug, info};

use kb_core::{ArchiveRecord, Chunk, KbError, Result};

/// Outcome of loading a directory of archives.
#[derive(Debug, Default)]
pub struct ArchiveLoad {
    /// Valid chunks in archive order.
    pub chunks: Vec<Chunk>,

    /// Number of archives read.
    pub archives: usize,

    /// Records dropped for missing text or embedding.
    pub skipped: usize,
}

/// List archives in `dir` whose file name ends with `suffix`, sorted by name.
pub fn archive_paths(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| KbError::archive_load(dir.display(), e))?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| KbError::archive_load(dir.display(), e))?;
        let path = entry.path();
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.ends_with(suffix))
            .unwrap_or(false);
        if matches && path.is_file() {
            paths.push(path);
        }
    }

    paths.sort();
    Ok(paths)
}

/// Decompress and parse a single archive.
pub fn read_archive(path: &Path) -> Result<Vec<ArchiveRecord>> {
    let file = File::open(path).map_err(|e| KbError::archive_load(path.display(), e))?;
    let reader = BufReader::new(MultiGzDecoder::new(BufReader::new(file)));

    serde_json::from_reader(reader).map_err(|e| KbError::archive_load(path.display(), e))
}

/// Load every archive in `dir` into an ordered chunk sequence.
pub fn load_archives(dir: &Path, suffix: &str) -> Result<ArchiveLoad> {
    let paths = archive_paths(dir, suffix)?;
    let mut load = ArchiveLoad {
        archives: paths.len(),
        ..Default::default()
    };

    for path in &paths {
        let records = read_archive(path)?;
        let total = records.len();
        let before = load.chunks.len();

        load.chunks
            .extend(records.into_iter().filter_map(ArchiveRecord::into_chunk));

        let kept = load.chunks.len() - before;
        load.skipped += total - kept;
        debug!("Read {:?}: {} records, {} kept", path, total, kept);
    }

    info!(
        "Loaded {} chunks from {} archives in {:?} ({} records skipped)",
        load.chunks.len(),
        load.archives,
        dir,
        load.skipped
    );

    Ok(load)
}
