//! # Research Assistant CLI (`research-assistant`)
//!
//! Ingest PDFs and web pages into a local vector index, then ask questions
//! answered by a language model with citations.
//!
//! ## Usage
//!
//! ```bash
//! research-assistant --config ./config/research.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `init` | Create data directories and the index schema |
//! | `ingest <PDF>...` | Ingest one or more PDF files |
//! | `ingest-url <URL>` | Fetch and ingest a web page |
//! | `ask "<question>"` | Answer a question from the indexed documents |
//! | `stats` | Show record counts per source |
//! | `serve` | Start the HTTP API |
//!
//! ## Examples
//!
//! ```bash
//! research-assistant ingest papers/attention.pdf papers/bert.pdf
//! research-assistant ingest-url https://en.wikipedia.org/wiki/Transformer_(deep_learning_architecture)
//! research-assistant ask "What problem does self-attention solve?" --top-k 8
//! RUST_LOG=debug research-assistant serve
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use research_assistant::{answer, config, index::VectorIndex, ingest, server};

/// Research assistant: retrieval-augmented question answering over your
/// PDFs and web pages.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file means built-in defaults.
#[derive(Parser)]
#[command(
    name = "research-assistant",
    about = "Ingest documents and ask cited questions about them",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/research.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directories and the index schema. Idempotent.
    Init,

    /// Ingest PDF files.
    ///
    /// Each file is processed independently; a file that fails to load is
    /// reported and the rest continue.
    Ingest {
        /// PDF files to ingest.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Fetch a web page and ingest its text.
    IngestUrl {
        /// `http://` or `https://` URL.
        url: String,
    },

    /// Answer a question from the indexed documents.
    Ask {
        question: String,

        /// Number of chunks to retrieve (default: `[retrieval].default_top_k`).
        #[arg(long)]
        top_k: Option<usize>,

        /// Print the answer as JSON (same shape as `POST /ask`).
        #[arg(long)]
        json: bool,
    },

    /// Show index statistics.
    Stats,

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Init => {
            config::ensure_dirs(&cfg)?;
            let index = VectorIndex::from_config(&cfg).await?;
            println!("Index ready at {}", cfg.index.path.display());
            println!("  collection: {}", index.collection());
            println!("  embedding model: {}", index.embedder().model_name());
            index.close().await;
        }
        Commands::Ingest { paths } => {
            let report = ingest::ingest_pdfs(&cfg, &paths).await?;
            println!("ingest");
            for source in &report.ingested {
                println!("  ok      {}", source);
            }
            for failure in &report.failed {
                println!("  failed  {}: {}", failure.source, failure.error);
            }
            println!("  chunks written: {}", report.chunks);
            if !report.failed.is_empty() && report.ingested.is_empty() {
                anyhow::bail!("no files were ingested");
            }
        }
        Commands::IngestUrl { url } => {
            let outcome = ingest::ingest_url(&cfg, &url).await?;
            println!("ingest-url");
            println!("  source: {}", outcome.source);
            println!("  chunks written: {}", outcome.chunks);
        }
        Commands::Ask {
            question,
            top_k,
            json,
        } => {
            let result = answer::ask(&cfg, &question, top_k).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", result.answer.trim());
                if !result.citations.is_empty() {
                    println!();
                    println!("Sources:");
                    for (i, c) in result.citations.iter().enumerate() {
                        match c.page {
                            Some(page) => println!("  [{}] {} p. {}", i + 1, c.source, page),
                            None => println!("  [{}] {}", i + 1, c.source),
                        }
                    }
                }
            }
        }
        Commands::Stats => {
            let index = VectorIndex::from_config(&cfg).await?;
            let stats = index.stats().await?;
            index.close().await;

            println!("Index: {}", cfg.index.path.display());
            println!("  collection: {}", stats.collection);
            println!("  model: {} ({} dims)", stats.model, stats.dims);
            println!("  records: {}", stats.records);
            if !stats.sources.is_empty() {
                println!();
                println!("  {:<60} {:>8}", "SOURCE", "CHUNKS");
                for (source, n) in &stats.sources {
                    println!("  {:<60} {:>8}", source, n);
                }
            }
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
