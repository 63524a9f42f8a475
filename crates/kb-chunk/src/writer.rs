//! Archive shard writer.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::info;

use kb_core::{ArchiveRecord, IngestConfig, KbError, Result};

/// Subdirectory of the target that [`ArchiveWriter::replace`] stages
/// shards in. Not an archive, so the loader ignores it.
const STAGING_DIR: &str = ".kb-staging";

/// Writes records as gzip-compressed JSON arrays, `shard_size` records per
/// file, named `{prefix}000.json.gz`, `{prefix}001.json.gz`, ...
#[derive(Debug, Clone)]
pub struct ArchiveWriter {
    dir: PathBuf,
    prefix: String,
    shard_size: usize,
}

impl ArchiveWriter {
    /// Create a writer targeting `dir`.
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, shard_size: usize) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            shard_size: shard_size.max(1),
        }
    }

    /// Create a writer using the ingest configuration's prefix and shard size.
    pub fn from_config(dir: impl Into<PathBuf>, config: &IngestConfig) -> Self {
        Self::new(dir, config.output_prefix.clone(), config.shard_size)
    }

    /// File name of shard `index`.
    pub fn shard_name(&self, index: usize) -> String {
        format!("{}{:03}.json.gz", self.prefix, index)
    }

    /// Write all records, returning the shard paths in order.
    ///
    /// No file is written for an empty record list.
    pub fn write(&self, records: &[ArchiveRecord]) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(&self.dir)?;

        let mut paths = Vec::new();
        for (index, shard) in records.chunks(self.shard_size).enumerate() {
            let path = self.dir.join(self.shard_name(index));
            write_shard(&path, shard)?;

            let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            info!(
                "Saved {:?} ({:.1} MB, {} chunks)",
                path,
                size as f64 / 1024.0 / 1024.0,
                shard.len()
            );
            paths.push(path);
        }

        Ok(paths)
    }

    /// Replace every archive in the target directory (any file ending in
    /// `suffix`) with `records`.
    ///
    /// All shards are written to a staging directory first; the previous
    /// archives are only removed once that succeeded. Other files in the
    /// directory are left alone.
    pub fn replace(&self, records: &[ArchiveRecord], suffix: &str) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(&self.dir)?;

        let staging = self.dir.join(STAGING_DIR);
        if staging.exists() {
            std::fs::remove_dir_all(&staging)?;
        }

        let staged = Self {
            dir: staging.clone(),
            ..self.clone()
        }
        .write(records)?;

        let stale = kb_store::archive_paths(&self.dir, suffix)?;
        for path in &stale {
            std::fs::remove_file(path)?;
        }

        let mut paths = Vec::with_capacity(staged.len());
        for (index, path) in staged.iter().enumerate() {
            let target = self.dir.join(self.shard_name(index));
            std::fs::rename(path, &target)?;
            paths.push(target);
        }
        std::fs::remove_dir_all(&staging)?;

        info!(
            "Replaced {} archives in {:?} with {}",
            stale.len(),
            self.dir,
            paths.len()
        );
        Ok(paths)
    }
}

fn write_shard(path: &Path, records: &[ArchiveRecord]) -> Result<()> {
    let file = File::create(path).map_err(|e| {
        KbError::ingest(format!("Failed to create {}: {}", path.display(), e))
    })?;
    let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    serde_json::to_writer(&mut encoder, records)?;
    encoder.finish()?.flush()?;
    Ok(())
}

/// Round every component to `decimals` decimal places.
pub fn round_embedding(embedding: &[f32], decimals: u32) -> Vec<f32> {
    let factor = 10f64.powi(decimals as i32);
    embedding
        .iter()
        .map(|v| ((*v as f64 * factor).round() / factor) as f32)
        .collect()
}
