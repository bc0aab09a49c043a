//! # Knowledge Agent CLI (`kb`)
//!
//! The `kb` binary drives the knowledge base: database initialization,
//! source ingestion, one-shot grounded questions, and the HTTP server used
//! by the chat widget.
//!
//! ## Usage
//!
//! ```bash
//! kb --config ./config/kb.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kb init` | Create the SQLite database and run schema migrations |
//! | `kb ingest` | Fetch, chunk, embed, and store the configured sources |
//! | `kb ask "<question>"` | Answer a question from the indexed content |
//! | `kb serve` | Start the HTTP API (`POST /ask`) |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use knowledge_agent::models::SourceStatus;
use knowledge_agent::{answer, config, db, embedding, fetch, ingest, llm, logging, migrate, server, store};

/// Knowledge Agent — a web-ingesting RAG knowledge base with grounded,
/// cited answers.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/kb.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "kb",
    about = "Knowledge Agent — a web-ingesting RAG knowledge base with grounded, cited answers",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/kb.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the documents/chunks tables.
    /// Safe to run repeatedly.
    Init,

    /// Ingest the configured source URLs.
    ///
    /// Fetches each source, chunks and embeds its text, and replaces the
    /// stored chunk set. Re-running refreshes existing documents without
    /// creating duplicates.
    Ingest {
        /// Maximum number of sources to process.
        #[arg(long)]
        limit: Option<usize>,

        /// Fetch and count chunks without writing to the database.
        #[arg(long)]
        dry_run: bool,
    },

    /// Answer a question from the indexed content.
    Ask {
        /// The question to answer.
        question: String,

        /// Number of chunks to retrieve as context (config default: 6).
        #[arg(long)]
        top_k: Option<i64>,
    },

    /// Start the HTTP API server.
    ///
    /// Exposes `POST /ask` and `GET /health` on the address configured in
    /// `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.db.path).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { limit, dry_run } => {
            let pool = db::connect(&cfg.db.path).await?;
            let store = store::DocumentStore::new(pool);
            let fetcher = fetch::HttpFetcher::new(cfg.ingest.fetch_timeout_secs)?;
            let embedder = embedding::create_embedder(&cfg.embedding)?;

            let mut ingest_cfg = cfg.ingest.clone();
            if let Some(limit) = limit {
                ingest_cfg.sources.truncate(limit);
            }

            let report = ingest::run_ingest(
                &store,
                &fetcher,
                embedder.as_ref(),
                &cfg.chunking,
                &ingest_cfg,
                cfg.embedding.batch_size,
                dry_run,
            )
            .await?;

            println!("ingest{}", if dry_run { " (dry-run)" } else { "" });
            println!("  sources: {}", report.outcomes.len());
            println!("  ingested: {}", report.ingested());
            println!("  skipped: {}", report.skipped());
            println!("  failed: {}", report.failed());
            println!("  chunks written: {}", report.chunks_written());
            for outcome in &report.outcomes {
                match &outcome.status {
                    SourceStatus::Skipped { reason } => {
                        println!("  skip {}: {}", outcome.source, reason)
                    }
                    SourceStatus::Failed { reason } => {
                        println!("  fail {}: {}", outcome.source, reason)
                    }
                    SourceStatus::Ingested { .. } => {}
                }
            }
            if !dry_run {
                println!("  documents total: {}", store.document_count().await?);
                println!("  chunks total: {}", store.chunk_count().await?);
            }
            println!("ok");
        }
        Commands::Ask { question, top_k } => {
            let pool = db::connect(&cfg.db.path).await?;
            let store = Arc::new(store::DocumentStore::new(pool));
            let embedder: Arc<dyn embedding::EmbeddingClient> =
                Arc::from(embedding::create_embedder(&cfg.embedding)?);
            let chat: Arc<dyn llm::ChatClient> = Arc::from(llm::create_chat(&cfg.llm)?);
            let engine = answer::AnswerEngine::new(store, embedder, chat);

            let result = engine
                .answer(&question, top_k.unwrap_or(cfg.retrieval.top_k))
                .await?;

            println!("{}", result.answer);
            if !result.sources.is_empty() {
                println!();
                println!("Sources:");
                for source in &result.sources {
                    println!(
                        "  [{}] {} (chunk {}, distance {:.3})",
                        source.reference, source.source, source.chunk_index, source.distance
                    );
                }
            }
        }
        Commands::Serve => {
            let pool = db::connect(&cfg.db.path).await?;
            let store = Arc::new(store::DocumentStore::new(pool));
            let embedder: Arc<dyn embedding::EmbeddingClient> =
                Arc::from(embedding::create_embedder(&cfg.embedding)?);
            let chat: Arc<dyn llm::ChatClient> = Arc::from(llm::create_chat(&cfg.llm)?);
            let engine = Arc::new(answer::AnswerEngine::new(store, embedder, chat));

            server::run_server(&cfg.server.bind, engine, cfg.retrieval.top_k).await?;
        }
    }

    Ok(())
}
