//! # Grounded QA CLI (`gqa`)
//!
//! Ingest plain-text documents, then ask questions that are answered only
//! from them.
//!
//! ## Usage
//!
//! ```bash
//! gqa --config ./config/gqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `gqa ingest <paths...>` | Chunk files and directories into the index |
//! | `gqa ask "<question>"` | Answer from the index, or refuse |
//! | `gqa history` | Print a session's logged events |
//! | `gqa stats` | Summarize the index |
//! | `gqa serve` | Start the HTTP server |
//! | `gqa sanity <paths...>` | Ingest, run fixed questions, write a JSON report |
//!
//! ## Examples
//!
//! ```bash
//! gqa ingest ./docs
//! gqa ingest ./more-notes --append
//! gqa ask "What are the supply risks?" --session team-a
//! gqa history --session-id team-a --limit 20
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use grounded_qa::history::{SessionLog, DEFAULT_SESSION};
use grounded_qa::{ask, config, ingest, sanity, server, stats};

/// Grounded QA: answers questions strictly from your own documents.
#[derive(Parser)]
#[command(
    name = "gqa",
    about = "Grounded QA: answers questions from a local document corpus, or refuses",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Built-in defaults are used when
    /// the file does not exist.
    #[arg(long, global = true, default_value = "./config/gqa.toml")]
    config: PathBuf,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk files and directories into the index.
    ///
    /// Directories are walked recursively; only text files matching the
    /// configured include globs are read.
    Ingest {
        /// Files or directories to ingest.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Merge into the existing index instead of replacing it.
        #[arg(long)]
        append: bool,
    },

    /// Answer a question from the index.
    Ask {
        question: String,

        /// Number of passages to retrieve (defaults to `[retrieval].top_k`).
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        top_k: Option<u64>,

        /// Log the result to this session.
        #[arg(long)]
        session: Option<String>,
    },

    /// Print a session's logged events.
    History {
        #[arg(long, default_value = DEFAULT_SESSION)]
        session_id: String,

        /// Most recent events to show; 0 shows all (defaults to `[history].limit`).
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Summarize the index.
    Stats,

    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Ingest `paths`, answer a fixed question set, and write a JSON report.
    Sanity {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Where to write the report.
        #[arg(long, default_value = sanity::DEFAULT_OUTPUT)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "gqa=debug,grounded_qa=debug,grounded_qa_core=debug,tower_http=debug"
    } else {
        "gqa=info,grounded_qa=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cfg = config::load_config_or_default(&cli.config)?;

    match cli.command {
        Commands::Ingest { paths, append } => {
            ingest::run_ingest(&cfg, &paths, append)?;
        }
        Commands::Ask {
            question,
            top_k,
            session,
        } => {
            let top_k = top_k.map(|k| k as usize);
            ask::run_ask(&cfg, &question, top_k, session.as_deref())?;
        }
        Commands::History { session_id, limit } => {
            let limit = limit.unwrap_or(cfg.history.limit);
            let events = SessionLog::new(&cfg.history.dir).read(&session_id, limit)?;
            let out = serde_json::json!({ "session_id": session_id, "history": events });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Commands::Stats => {
            stats::run_stats(&cfg)?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Sanity { paths, output } => {
            sanity::run_sanity(&cfg, &paths, &output)?;
        }
    }

    Ok(())
}
