//! # WebQuery RAG CLI (`wq`)
//!
//! Ingest web pages or PDFs into a local vector store and ask questions
//! answered from them, with the sources each answer drew on.
//!
//! ## Usage
//!
//! ```bash
//! wq --config ./config/wq.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `wq ingest urls <URL>...` | Fetch up to three pages and index them |
//! | `wq ingest pdf <FILE>...` | Extract and index PDF files |
//! | `wq ingest text <FILE>...` | Index plain-text files |
//! | `wq ask "<question>"` | Answer a question from the indexed collection |
//! | `wq status` | Show the collection, its size, and configured providers |
//! | `wq reset` | Delete every entry in the collection |
//!
//! ## Examples
//!
//! ```bash
//! # Replace the collection with two articles
//! wq ingest urls https://example.com/rates https://example.com/market
//!
//! # Add a report without discarding what is already indexed
//! wq ingest pdf ./report.pdf --append
//!
//! # Ask; summary questions retrieve more context
//! wq ask "Summarize the mortgage rate outlook"
//! ```

use anyhow::bail;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use webquery_rag::config::{self, Config};
use webquery_rag::context::RagContext;
use webquery_rag::ingest::IngestStatus;
use webquery_rag::loader::{PdfUpload, SourceBatch};
use webquery_rag::models::Document;
use webquery_rag::progress::ProgressMode;
use webquery_rag::{answer, store};

/// WebQuery RAG: question answering over ingested web pages and PDFs.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file means built-in defaults.
#[derive(Parser)]
#[command(
    name = "wq",
    about = "WebQuery RAG: ask questions about web pages and PDFs you ingest",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/wq.toml`. Store, chunking, retrieval,
    /// embedding, model and loader settings are read from this file.
    #[arg(long, global = true, default_value = "./config/wq.toml")]
    config: PathBuf,

    /// Ingestion progress on stderr. Defaults to `human` when stderr is a
    /// terminal and `off` otherwise.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Load, split, embed and store documents.
    ///
    /// By default the collection is emptied before the first unit is
    /// indexed. Pass `--append` to keep existing entries.
    Ingest {
        #[command(subcommand)]
        source: IngestSource,
    },

    /// Answer a question from the indexed collection.
    Ask {
        /// The question to answer.
        question: String,

        /// Print the answer and sources as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the collection, its entry count, and configured providers.
    Status,

    /// Delete every entry in the collection.
    Reset,
}

/// What to ingest.
#[derive(Subcommand)]
enum IngestSource {
    /// Fetch web pages (at most `loader.max_urls`, default 3) as one unit.
    Urls {
        #[arg(required = true)]
        urls: Vec<String>,

        /// Keep existing entries instead of resetting the collection.
        #[arg(long)]
        append: bool,
    },

    /// Extract text from PDF files, one unit per file.
    Pdf {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Keep existing entries instead of resetting the collection.
        #[arg(long)]
        append: bool,
    },

    /// Index UTF-8 text files, one unit per file.
    Text {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Keep existing entries instead of resetting the collection.
        #[arg(long)]
        append: bool,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "webquery_rag=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Ingest { source } => {
            let progress = cli.progress.unwrap_or_else(ProgressMode::default_for_tty);
            run_ingest(cfg, source, progress).await?;
        }
        Commands::Ask { question, json } => {
            run_ask(cfg, &question, json).await?;
        }
        Commands::Status => {
            run_status(&cfg).await?;
        }
        Commands::Reset => {
            let store = store::open_store(&cfg.store).await?;
            let before = store.count().await?;
            store.reset().await?;
            println!(
                "Reset collection '{}' ({} entries removed)",
                store.collection(),
                before
            );
        }
    }

    Ok(())
}

async fn run_ingest(
    cfg: Config,
    source: IngestSource,
    progress: ProgressMode,
) -> anyhow::Result<()> {
    let (batch, append) = match source {
        IngestSource::Urls { urls, append } => (SourceBatch::Urls(urls), append),
        IngestSource::Pdf { files, append } => {
            let uploads = files
                .iter()
                .map(|path| PdfUpload::from_path(path))
                .collect::<anyhow::Result<Vec<_>>>()?;
            (SourceBatch::Pdfs(uploads), append)
        }
        IngestSource::Text { files, append } => {
            let mut docs = Vec::with_capacity(files.len());
            for path in &files {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                docs.push(Document::new(text, name).with_metadata("content_type", "text/plain"));
            }
            (SourceBatch::Documents(docs), append)
        }
    };

    let reporter = progress.reporter();
    let mut ctx = RagContext::new(cfg)?;
    let outcome = ctx
        .ingest(batch, !append)
        .run_to_end(|status| reporter.report(status))
        .await;

    match outcome {
        IngestStatus::Complete { units, chunks } => {
            println!("Indexed {} chunks from {} unit(s)", chunks, units);
            Ok(())
        }
        IngestStatus::Failed { message } => bail!("{}", message),
        other => bail!("Ingestion stopped early at: {}", other),
    }
}

async fn run_ask(cfg: Config, question: &str, json: bool) -> anyhow::Result<()> {
    answer::validate_question(question)?;

    let entries = store::open_store(&cfg.store).await?.count().await?;
    if entries == 0 {
        bail!(
            "Collection '{}' is empty; run `wq ingest` first",
            cfg.store.collection
        );
    }

    let mut ctx = RagContext::new(cfg)?;
    ctx.open_existing().await?;
    let result = ctx.answer(question).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("Answer:\n{}\n", result.answer);
        println!("Sources:\n{}", result.formatted_sources());
    }
    Ok(())
}

async fn run_status(cfg: &Config) -> anyhow::Result<()> {
    let store = store::open_store(&cfg.store).await?;
    let entries = store.count().await?;

    println!("collection: {}", store.collection());
    println!("store:      {}", cfg.store.db_path().display());
    println!("entries:    {}", entries);
    println!(
        "embedding:  {} ({})",
        cfg.embedding.provider,
        cfg.embedding.model.as_deref().unwrap_or("default model")
    );
    println!("llm:        {} ({})", cfg.llm.provider, cfg.llm.model);

    let sources = store.sources().await?;
    if !sources.is_empty() {
        println!("sources:");
        for (source, count) in sources {
            println!("  {:>6}  {}", count, source);
        }
    }
    Ok(())
}
