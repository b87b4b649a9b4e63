//! # Guidebase CLI (`gbase`)
//!
//! The `gbase` binary is the operational interface for Guidebase. It
//! provides commands for database initialization, document ingestion,
//! retrieval, and starting the HTTP server the chat orchestrator talks to.
//!
//! ## Usage
//!
//! ```bash
//! gbase --config ./config/gbase.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `gbase init` | Create the SQLite database and run schema migrations |
//! | `gbase ingest <file>` | Ingest a PDF or HTML document |
//! | `gbase search "<question>"` | Retrieve grounding chunks for a question |
//! | `gbase serve` | Start the HTTP server |
//!
//! `ingest` and `search` take `--multimodal` to use the 1024-dim
//! image-aware pipeline instead of the text pipeline.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use guidebase::config::{load_config, Config};
use guidebase::pipeline::{self, IngestOptions};
use guidebase::providers::{create_multimodal_embedder, create_text_embedder};
use guidebase::sqlite_store::SqliteStore;
use guidebase::{db, migrate, server};
use guidebase_core::retrieve::{retrieve_guides, retrieve_multimodal, RetrievalPolicy};

/// Guidebase — a retrieval-augmented knowledge base for grounding chat
/// assistants.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/gbase.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "gbase",
    about = "Guidebase — a retrieval-augmented knowledge base for grounding chat assistants",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/gbase.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables (resources,
    /// embeddings, embeddings_multimodal, image_resources). Idempotent.
    Init,

    /// Ingest a document into the knowledge base.
    ///
    /// Accepts `.pdf` and `.html` files; anything else is rejected before
    /// any work happens.
    Ingest {
        /// Path to the file to ingest.
        file: PathBuf,

        /// Use the multimodal (image-aware) pipeline.
        #[arg(long)]
        multimodal: bool,
    },

    /// Retrieve grounding chunks for a question.
    Search {
        /// The question to search with.
        question: String,

        /// Query the multimodal chunk table instead of the text table.
        #[arg(long)]
        multimodal: bool,
    },

    /// Start the HTTP server (uploads + retrieval tool API).
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&config).await?;
            println!("database initialized at {}", config.db.path.display());
        }
        Commands::Ingest { file, multimodal } => {
            run_ingest(&config, &file, multimodal).await?;
        }
        Commands::Search {
            question,
            multimodal,
        } => {
            run_search(&config, &question, multimodal).await?;
        }
        Commands::Serve => {
            server::run_server(&config).await?;
        }
    }

    Ok(())
}

async fn run_ingest(config: &Config, file: &PathBuf, multimodal: bool) -> anyhow::Result<()> {
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow::anyhow!("not a file path: {}", file.display()))?;
    let bytes = tokio::fs::read(file).await?;

    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool);
    let opts = IngestOptions::from_config(config);
    let created_at = chrono::Utc::now().timestamp();

    let resource_id = if multimodal {
        let embedder = create_multimodal_embedder(&config.embedding.multimodal)?;
        pipeline::ingest_multimodal(&store, embedder.as_ref(), &opts, &file_name, &bytes, created_at)
            .await?
    } else {
        let embedder = create_text_embedder(&config.embedding.text)?;
        pipeline::ingest_text(&store, embedder.as_ref(), &opts, &file_name, &bytes, created_at)
            .await?
    };

    println!("ingested {file_name}");
    println!("  resource: {resource_id}");
    println!("ok");

    store.pool().close().await;
    Ok(())
}

async fn run_search(config: &Config, question: &str, multimodal: bool) -> anyhow::Result<()> {
    if question.trim().is_empty() {
        anyhow::bail!("question must not be empty");
    }

    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool);
    let policy = RetrievalPolicy {
        similarity_threshold: config.retrieval.similarity_threshold,
        limit: config.retrieval.limit,
    };

    if multimodal {
        let embedder: Arc<dyn guidebase_core::embedding::MultimodalEmbedder> =
            Arc::from(create_multimodal_embedder(&config.embedding.multimodal)?);
        let query_vec = embedder.embed_query(question).await?;
        let guides = retrieve_multimodal(&store, &query_vec, &policy).await?;

        if guides.is_empty() {
            println!("no results above similarity {}", policy.similarity_threshold);
        }
        for guide in &guides {
            println!("[{:.3}] {}", guide.similarity, guide.text);
            for url in &guide.image_urls {
                println!("        image: {url}");
            }
        }
    } else {
        let embedder: Arc<dyn guidebase_core::embedding::TextEmbedder> =
            Arc::from(create_text_embedder(&config.embedding.text)?);
        let query_vec = embedder.embed_query(question).await?;
        let result = retrieve_guides(&store, &query_vec, &policy).await?;

        if result.guides.is_empty() {
            println!("no results above similarity {}", policy.similarity_threshold);
        }
        for guide in &result.guides {
            println!("[{:.3}] {}", guide.similarity, guide.text);
        }
        if !result.sources.is_empty() {
            println!("sources: {}", result.sources.join(", "));
        }
    }

    store.pool().close().await;
    Ok(())
}
