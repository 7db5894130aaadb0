//! # Portfolio assistant CLI (`folio`)
//!
//! The `folio` binary manages the vector store, answers questions from the
//! terminal, and runs the HTTP API.
//!
//! ## Usage
//!
//! ```bash
//! folio --config ./config/folio.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `folio init` | Create empty index and metadata files |
//! | `folio ingest --text "<T>"` | Embed and store a snippet |
//! | `folio ingest --file <PATH>` | Extract, embed, and store a txt/pdf/csv file |
//! | `folio chat "<query>"` | Print the nearest stored chunk |
//! | `folio ask "<query>"` | Answer through retrieval and the LLM |
//! | `folio inspect` | Show stored chunk count and previews |
//! | `folio serve` | Start the HTTP API |
//!
//! Log verbosity follows `RUST_LOG` (default `info`); logs go to stderr.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use portfolio_rag::{commands, config, server};

/// Portfolio assistant: retrieval-augmented answers about one person's
/// skills, projects, and contact details.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/folio.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "folio",
    about = "Portfolio assistant: retrieval-augmented answers over a personal knowledge base",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/folio.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create empty index and metadata files. Safe to run repeatedly.
    Init,

    /// Embed one text snippet or file and append it to the store.
    ///
    /// The whole input becomes a single chunk.
    Ingest {
        /// Text to store.
        #[arg(long)]
        text: Option<String>,

        /// File to extract and store (txt, pdf, csv; anything else is read as text).
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Print the stored chunk nearest to the query, without the LLM.
    Chat {
        query: String,
    },

    /// Answer a question from retrieved context via the LLM.
    Ask {
        query: String,

        /// Also print the detected intent and the retrieved context.
        #[arg(long)]
        show_context: bool,
    },

    /// Show how many chunks are stored, with a preview of each.
    Inspect,

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
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => commands::run_init(&cfg)?,
        Commands::Ingest { text, file } => {
            commands::run_ingest(&cfg, text, file.as_deref()).await?;
        }
        Commands::Chat { query } => commands::run_chat(&cfg, &query).await?,
        Commands::Ask {
            query,
            show_context,
        } => commands::run_ask(&cfg, &query, show_context).await?,
        Commands::Inspect => commands::run_inspect(&cfg)?,
        Commands::Serve => server::run_server(&cfg).await?,
    }

    Ok(())
}
