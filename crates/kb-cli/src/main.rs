//! KB CLI - Command-line interface for the hybrid knowledge base.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use kb_chunk::{ArchiveWriter, IngestPipeline};
use kb_core::KbConfig;
use kb_embed::embedder_from_config;
use kb_service::{KbService, SearchParams, ToolResult};

/// KB - Hybrid lexical and semantic knowledge base search
#[derive(Parser)]
#[command(name = "kb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.config/kb/config.toml, then ./kb.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Archive directory, overriding the configuration
    #[arg(long, global = true)]
    kb_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the knowledge base
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Lexical candidates passed to semantic scoring
        #[arg(long)]
        k_kw: Option<usize>,

        /// Blend weight: 0 = keyword only, 1 = semantic only
        #[arg(short, long)]
        alpha: Option<f32>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show source, score and a preview of the top hits
    Debug {
        /// Search query
        query: String,
    },

    /// Show statistics
    Stats,

    /// Chunk and embed a directory of .txt files into archives
    Ingest {
        /// Directory holding the source .txt files
        src: PathBuf,

        /// Output directory (default: the archive directory)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Recompute every chunk's embedding and rewrite the archives
    Reembed {
        /// Output directory (default: the archive directory)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn load_config(path: Option<&Path>, kb_dir: Option<PathBuf>) -> kb_core::Result<KbConfig> {
    let mut config = match path {
        Some(path) => KbConfig::load(path)?,
        None => KbConfig::load_default()?,
    };

    if let Some(dir) = kb_dir {
        config.archive.dir = dir;
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let config = load_config(cli.config.as_deref(), cli.kb_dir)?;

    match cli.command {
        Commands::Search {
            query,
            top_k,
            k_kw,
            alpha,
            json,
        } => {
            let service = KbService::open(config)?;
            let params = SearchParams {
                query,
                top_k,
                keyword_candidates: k_kw,
                alpha,
            };
            if json {
                let results = service.query(&params).await;
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                report(service.search(params).await);
            }
        }
        Commands::Debug { query } => {
            let service = KbService::open(config)?;
            report(service.search_debug(&query).await);
        }
        Commands::Stats => {
            let service = KbService::open(config)?;
            report(service.stats());
        }
        Commands::Ingest { src, out } => {
            let out = out.unwrap_or_else(|| config.archive.dir.clone());
            ingest(&config, &src, &out).await?;
        }
        Commands::Reembed { out } => {
            let out = out.unwrap_or_else(|| config.archive.dir.clone());
            let service = KbService::open(config)?;
            report(service.reembed(Some(&out)).await);
        }
    }

    Ok(())
}

fn report(result: ToolResult) {
    if result.success {
        println!("{}", result.message);
    } else {
        eprintln!("Error: {}", result.message);
        std::process::exit(1);
    }
}

async fn ingest(config: &KbConfig, src: &Path, out: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let embedder = embedder_from_config(&config.embedding)?;
    let pipeline = IngestPipeline::new(embedder, &config.ingest, config.embedding.batch_size)?;

    println!("Ingesting {}...", src.display());
    let ingested = pipeline.ingest(src).await?;

    if ingested.chunks == 0 {
        println!("No .txt files found in {}. Add some first.", src.display());
        return Ok(());
    }

    if ingested.records.is_empty() {
        println!(
            "No chunk of {} could be embedded; leaving {} untouched.",
            ingested.chunks,
            out.display()
        );
        return Ok(());
    }

    let writer = ArchiveWriter::from_config(out, &config.ingest);
    let paths = writer.replace(&ingested.records, &config.archive.suffix)?;

    for path in &paths {
        println!("  {}", path.display());
    }
    println!(
        "\nComplete: {} of {} chunks embedded, {} batch(es) failed, {} archive(s) written",
        ingested.records.len(),
        ingested.chunks,
        ingested.failed_batches,
        paths.len()
    );

    Ok(())
}
