//! # PageIndex CLI (`pageindex`)
//!
//! ## Usage
//!
//! ```bash
//! pageindex --config ./config/pageindex.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pageindex index <file>` | Build (or reuse) the index and print all page summaries |
//! | `pageindex index <file> --query "<q>"` | Print the pages most relevant to a query |
//! | `pageindex detail <file> <page>` | Print the stored text and summary of one page |
//! | `pageindex serve mcp` | Serve the tools over MCP stdio |
//! | `pageindex serve http` | Serve the tools over HTTP |
//! | `pageindex completions <shell>` | Print shell completions |
//!
//! Results are printed to stdout as JSON; logs and progress go to stderr.

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::sync::Arc;

use pageindex::config::{self, ConfigSource};
use pageindex::indexer::{IndexError, PageIndexer, DEFAULT_TOP_K};
use pageindex::progress::{ProgressMode, ProgressReporter};
use pageindex::{logging, mcp, server};

/// PageIndex: page-level PDF indexing and retrieval.
#[derive(Parser)]
#[command(name = "pageindex", version, about)]
struct Cli {
    /// Path to configuration file (TOML). A missing file means defaults.
    #[arg(long, global = true, default_value = "./config/pageindex.toml")]
    config: PathBuf,

    /// Debug-level logging (also `PAGEINDEX_VERBOSE=1`).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a PDF and print its page summaries, or the pages matching a query.
    Index {
        /// Path to the PDF file.
        file: String,

        /// Rank pages against this query instead of listing them all.
        #[arg(long)]
        query: Option<String>,

        /// Maximum number of pages returned for a query.
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,

        /// Progress output on stderr. Defaults to `human` on a terminal, else `off`.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },

    /// Print the stored text and summary of one page. Never builds.
    Detail {
        /// Path to the PDF file.
        file: String,

        /// Page number, starting at 1.
        page: u32,
    },

    /// Serve the tools to agents.
    Serve {
        #[command(subcommand)]
        service: ServeService,
    },

    /// Print shell completions to stdout.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ServeService {
    /// MCP over stdin/stdout.
    Mcp,
    /// JSON HTTP API on `[server].bind`.
    Http,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(*shell, &mut Cli::command(), "pageindex", &mut std::io::stdout());
        return Ok(());
    }

    logging::init(cli.verbose);

    let cfg = config::load_config(&cli.config)?;
    let indexer = Arc::new(PageIndexer::from_config(&cfg, ConfigSource::new(cli.config.clone())));
    if !cfg.is_llm_configured() {
        tracing::warn!("no completion endpoint configured; set [llm] base_url and api_key");
    }

    match cli.command {
        Commands::Index {
            file,
            query,
            top_k,
            progress,
        } => {
            let mode = progress.unwrap_or_else(ProgressMode::default_for_tty);
            let reporter: Arc<dyn ProgressReporter> = Arc::from(mode.reporter());
            let outcome = indexer
                .get_index(&file, query.as_deref(), top_k, reporter)
                .await;
            print_outcome(outcome)?;
        }
        Commands::Detail { file, page } => {
            print_outcome(indexer.get_detail(&file, page).await)?;
        }
        Commands::Serve { service } => match service {
            ServeService::Mcp => mcp::serve_stdio(indexer).await?,
            ServeService::Http => server::run_server(indexer, &cfg.server.bind).await?,
        },
        Commands::Completions { .. } => {}
    }

    Ok(())
}

/// Prints the result as JSON. Input errors print their error body and exit non-zero.
fn print_outcome<T: serde::Serialize>(outcome: Result<T, IndexError>) -> anyhow::Result<()> {
    match outcome {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(IndexError::Internal(e)) => Err(e),
        Err(e) => {
            if let Some(body) = e.to_error_body() {
                println!("{}", serde_json::to_string_pretty(&body)?);
            }
            std::process::exit(1);
        }
    }
}
