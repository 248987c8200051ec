//! # doc-lens CLI (`lens`)
//!
//! The `lens` binary is the primary interface for doc-lens. It provides
//! commands for database initialization, document ingestion, dry-run
//! extraction, question answering, and collection management.
//!
//! ## Usage
//!
//! ```bash
//! lens --config ./config/lens.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lens init` | Create the SQLite database and run schema migrations |
//! | `lens add <paths…>` | Extract, chunk, embed and index files or directories |
//! | `lens extract <path>` | Print the elements of one file without indexing |
//! | `lens query "<question>"` | Answer a question with cited sources |
//! | `lens stats` | Collection summary |
//! | `lens list` | Indexed documents |
//! | `lens remove <filename>` | Delete one document from the index |
//! | `lens clear` | Delete every document |
//!
//! ## Examples
//!
//! ```bash
//! # Index a folder of reports, skipping OCR
//! lens add ./reports --no-ocr
//!
//! # Ask a question and get JSON back
//! lens query "Which region grew fastest?" --top-k 8 --json
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use doc_lens::commands;
use doc_lens::config;
use doc_lens::extract::ExtractOptions;
use doc_lens::progress::ProgressMode;
use doc_lens::rag::RagOrchestrator;
use doc_lens::stats;

/// doc-lens CLI: local document question answering with cited sources.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/lens.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "lens",
    about = "doc-lens: ask questions about your documents and get cited answers",
    version,
    long_about = "doc-lens extracts text, tables and charts from PDFs, scanned images and \
    text files, indexes them for semantic retrieval, and answers questions with citations \
    to the exact document, page and element they came from."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/lens.toml`. Database, extraction, embedding,
    /// retrieval and LLM settings are read from this file.
    #[arg(long, global = true, default_value = "./config/lens.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Extraction switches shared by `add` and `extract`.
#[derive(clap::Args, Clone, Copy)]
struct ExtractFlags {
    /// Do not OCR images or scanned PDF pages.
    #[arg(long)]
    no_ocr: bool,
    /// Leave table-like lines as plain text.
    #[arg(long)]
    no_tables: bool,
    /// Skip chart and figure detection.
    #[arg(long)]
    no_charts: bool,
}

impl ExtractFlags {
    /// Config defaults, with any `--no-*` flag switching a feature off.
    fn apply(self, defaults: ExtractOptions) -> ExtractOptions {
        ExtractOptions {
            use_ocr: defaults.use_ocr && !self.no_ocr,
            extract_tables: defaults.extract_tables && !self.no_tables,
            extract_charts: defaults.extract_charts && !self.no_charts,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ProgressArg {
    Human,
    Json,
    Off,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the chunk and vector tables.
    /// Running it again is safe.
    Init,

    /// Ingest files or directories.
    ///
    /// Directories are walked recursively; only supported extensions
    /// (pdf, png, jpg, jpeg, tiff, tif, bmp, txt, md) are picked up.
    /// Re-adding a file replaces its previous version.
    Add {
        /// Files or directories to ingest.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        #[command(flatten)]
        flags: ExtractFlags,

        /// Progress output on stderr. Defaults to human when stderr is a TTY.
        #[arg(long, value_enum)]
        progress: Option<ProgressArg>,
    },

    /// Extract one file and print its elements (nothing is indexed).
    Extract {
        path: PathBuf,

        #[command(flatten)]
        flags: ExtractFlags,

        /// Print the document as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Answer a question from the indexed documents.
    Query {
        question: String,

        /// Maximum number of sources.
        #[arg(long)]
        top_k: Option<usize>,

        /// Similarity floor in [-1, 1].
        #[arg(long)]
        min_similarity: Option<f32>,

        /// Print `{answer, sources}` as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show collection statistics.
    Stats,

    /// List indexed documents.
    List,

    /// Remove one document by filename.
    Remove { filename: String },

    /// Delete every indexed document.
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    // Dry-run extraction never touches the database.
    if let Commands::Extract { path, flags, json } = &cli.command {
        let options = flags.apply(cfg.extraction.options());
        return commands::run_extract(&cfg, path, options, *json);
    }

    let orchestrator = RagOrchestrator::from_config(cfg).await?;

    match cli.command {
        Commands::Init => {
            println!("Database initialized successfully.");
        }
        Commands::Add {
            paths,
            flags,
            progress,
        } => {
            let options = flags.apply(orchestrator.config().extraction.options());
            let mode = match progress {
                Some(ProgressArg::Human) => ProgressMode::Human,
                Some(ProgressArg::Json) => ProgressMode::Json,
                Some(ProgressArg::Off) => ProgressMode::Off,
                None => ProgressMode::default_for_tty(),
            };
            commands::run_add(&orchestrator, &paths, options, mode).await?;
        }
        Commands::Extract { .. } => {}
        Commands::Query {
            question,
            top_k,
            min_similarity,
            json,
        } => {
            commands::run_query(&orchestrator, &question, top_k, min_similarity, json).await?;
        }
        Commands::Stats => {
            stats::run_stats(&orchestrator).await?;
        }
        Commands::List => {
            stats::run_list(&orchestrator).await?;
        }
        Commands::Remove { filename } => {
            commands::run_remove(&orchestrator, &filename).await?;
        }
        Commands::Clear => {
            commands::run_clear(&orchestrator).await?;
        }
    }

    Ok(())
}
