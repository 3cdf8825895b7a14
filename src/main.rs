//! # docquery CLI (`docq`)
//!
//! ## Usage
//!
//! ```bash
//! docq --config ./config/docq.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docq init` | Create the database schema and the configured collection |
//! | `docq sources` | List configured data sources and check their types |
//! | `docq ingest` | Read every source and append it to the index |
//! | `docq query "<text>"` | Answer a question from the index |
//! | `docq admit` | Move validated uploads into the source folder |
//! | `docq serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Rebuild the index from scratch
//! docq ingest --reset
//!
//! # Check what a sources file would produce without embedding anything
//! docq ingest --sources-file ./config/sources.json --dry-run
//!
//! # Ask a question with more context
//! docq query "what is the refund policy?" --top-k 8
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use docquery::{config, ingest, migrate, query, server, sources, upload};

/// docquery: multi-source document ingestion and retrieval-augmented
/// question answering.
#[derive(Parser)]
#[command(
    name = "docq",
    about = "Ingest documents from many sources and answer questions over them",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docq.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database schema and the configured collection.
    ///
    /// Idempotent. Fails if the collection already exists with a different
    /// embedding profile.
    Init,

    /// List configured data sources and whether they look usable.
    Sources {
        /// Also list sources from this JSON file (`{"data_sources": [...]}`).
        #[arg(long)]
        sources_file: Option<PathBuf>,
    },

    /// Read every configured source and append its documents to the index.
    ///
    /// Any unreadable source aborts the run. Documents are appended; use
    /// `--reset` to start from an empty collection.
    Ingest {
        /// Read sources from this JSON file instead of the config.
        #[arg(long)]
        sources_file: Option<PathBuf>,

        /// Target collection (defaults to `[index].collection`).
        #[arg(long)]
        collection: Option<String>,

        /// Drop the collection before building.
        #[arg(long)]
        reset: bool,

        /// Read sources and report counts without embedding or writing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Answer a question using the indexed documents.
    Query {
        /// The question.
        text: String,

        /// Number of documents to retrieve (defaults to `[retrieval].top_k`).
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Validate files in the upload folder and move accepted ones into the
    /// data folder.
    Admit {
        #[arg(long)]
        upload_dir: Option<PathBuf>,

        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Start the HTTP server (`/get`, `/health`).
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
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_init(&cfg).await?;
        }
        Commands::Sources { sources_file } => {
            sources::list_sources(&cfg, sources_file.as_deref())?;
        }
        Commands::Ingest {
            sources_file,
            collection,
            reset,
            dry_run,
        } => {
            let opts = ingest::IngestOptions {
                sources_file,
                collection,
                reset,
                dry_run,
            };
            ingest::run_ingest(&cfg, &opts).await?;
        }
        Commands::Query { text, top_k } => {
            query::run_query(&cfg, &text, top_k).await?;
        }
        Commands::Admit {
            upload_dir,
            data_dir,
        } => {
            upload::run_admit(&cfg.upload, upload_dir, data_dir).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
