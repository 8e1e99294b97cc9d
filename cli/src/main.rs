//! Lexicon CLI
//!
//! Semantic lookup in a Portuguese dictionary: describe a meaning, get the
//! words that carry it.
//!
//! # Usage
//!
//! ```bash
//! # Dependency health
//! lexicon status
//!
//! # Closest words for a description
//! lexicon search "local onde alguém vive" --limit 5
//!
//! # Insert an entry
//! lexicon add cachorro "animal doméstico que late"
//!
//! # Re-encode everything after changing the model
//! lexicon --config lexicon.toml reindex
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use lexicon_service::{DictionaryConfig, DictionaryService, SEED_ENTRIES};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "lexicon")]
#[command(about = "Semantic search over a word→definition dictionary")]
#[command(version)]
struct Cli {
    /// TOML configuration file. Environment variables override it.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
enum Command {
    /// Report encoder and index health
    Status,

    /// Show collection statistics
    Stats,

    /// Find the words closest in meaning to a description
    Search {
        /// Free-text description of the meaning
        query: String,

        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Add a word with its definition
    Add {
        /// Headword
        word: String,

        /// Definition text
        definition: String,
    },

    /// Re-encode every stored entry with the configured model
    Reindex,
}

#[derive(Serialize)]
struct ReindexOutput {
    reindexed: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries only the JSON result.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_deref())?;
    let service = DictionaryService::from_config(config)
        .await
        .context("starting dictionary service")?;

    let result = run(&service, cli.command).await;
    service.close().await;

    println!("{}", result?);
    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<DictionaryConfig> {
    let config = match path {
        Some(path) => DictionaryConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => DictionaryConfig::default(),
    };
    config
        .with_env()
        .context("applying environment overrides")
}

async fn run(service: &DictionaryService, command: Command) -> anyhow::Result<String> {
    let initialized = service.initialize(SEED_ENTRIES).await;

    // Status is still useful when initialization failed.
    if command == Command::Status {
        if let Err(err) = initialized {
            tracing::warn!("Initialization failed: {err}");
        }
        return to_json(&service.status().await);
    }
    initialized.context("initializing dictionary")?;

    match command {
        Command::Status => to_json(&service.status().await),
        Command::Stats => to_json(&service.statistics().await?),
        Command::Search { query, limit } => {
            let response = match limit {
                Some(limit) => service.search(&query, limit).await?,
                None => service.search_default(&query).await?,
            };
            to_json(&response)
        }
        Command::Add { word, definition } => to_json(&service.add(&word, &definition).await?),
        Command::Reindex => to_json(&ReindexOutput {
            reindexed: service.reindex().await?,
        }),
    }
}

fn to_json<T: Serialize>(value: &T) -> anyhow::Result<String> {
    serde_json::to_string_pretty(value).context("serializing output")
}
