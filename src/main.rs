//! # Project Chat CLI (`pchat`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pchat init` | Create the SQLite database and the `Files` table |
//! | `pchat upload <paths>...` | Store files; zip archives are expanded |
//! | `pchat files` | List stored files |
//! | `pchat ask "<query>"` | Answer a question from the stored files |
//! | `pchat serve` | Start the web page and JSON API |
//!
//! Every command accepts `--config <path>` (default `./config/pchat.toml`).
//! When that file does not exist, built-in defaults are used.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use project_chat::config::{self, Config};
use project_chat::query::QueryEngine;
use project_chat::summarize::Summarizer;
use project_chat::{ingest, migrate, server, store};

/// Project Chat: upload project files, then ask which file a question is about.
#[derive(Parser)]
#[command(name = "pchat", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/pchat.toml")]
    config: PathBuf,

    /// Log at debug level (overridden by `RUST_LOG`).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent: running it on an existing database changes nothing.
    Init,

    /// Upload files. Zip archives are unpacked and every member stored.
    Upload {
        /// Files to upload (txt, py, md, jpg, png, zip).
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// List stored files.
    Files,

    /// Ask a question about the stored files.
    Ask {
        /// The question.
        query: String,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("project_chat={}", level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Upload { paths } => {
            migrate::run_migrations(&cfg).await?;
            let uploaded = ingest::upload_paths(&cfg, &paths).await?;
            for file in &uploaded {
                println!("stored #{} {} ({})", file.id, file.file_name, file.file_type);
            }
            println!("Files uploaded and processed successfully ({} stored).", uploaded.len());
        }
        Commands::Files => {
            migrate::run_migrations(&cfg).await?;
            list_files(&cfg).await?;
        }
        Commands::Ask { query } => {
            migrate::run_migrations(&cfg).await?;
            ask(&cfg, &query).await?;
        }
        Commands::Serve => {
            migrate::run_migrations(&cfg).await?;
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

async fn list_files(cfg: &Config) -> Result<()> {
    let files = store::list_file_info(cfg).await?;
    if files.is_empty() {
        println!("No files stored.");
        return Ok(());
    }
    for f in files {
        println!(
            "{:>5}  {:<32}  {:<26}  {}  {} bytes",
            f.id, f.file_name, f.file_type, f.upload_date, f.size_bytes
        );
    }
    println!("{} file(s) stored.", store::count_files(cfg).await?);
    Ok(())
}

async fn ask(cfg: &Config, query: &str) -> Result<()> {
    let summarizer = Arc::new(Summarizer::from_config(&cfg.summarizer)?);
    let engine = QueryEngine::new(summarizer.clone(), cfg.summarizer.cache_summaries);

    let result = engine.answer(cfg, query).await;
    summarizer.shutdown().await?;

    let answer = result?;
    println!("Answer: {}", answer.text);
    Ok(())
}
