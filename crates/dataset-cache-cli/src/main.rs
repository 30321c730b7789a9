mod commands;
mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dataset_cache_loader::LoadOrchestrator;
use dataset_cache_store::CacheStore;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dataset-cache")]
#[command(about = "Cache heavy report datasets locally and keep them fresh")]
struct Cli {
    /// Catalog file (defaults to the per-user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Cache directory override
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a dataset, serving the local cache while it is still fresh
    Load {
        /// Dataset name from the catalog
        name: String,
        /// Comma-separated column projection
        #[arg(long, value_delimiter = ',')]
        columns: Option<Vec<String>>,
        /// Bearer token for remote origins (or DATASET_CACHE_TOKEN)
        #[arg(long)]
        token: Option<String>,
    },
    /// Ask the origin whether it holds a newer copy than the cache
    Check {
        name: String,
        #[arg(long)]
        token: Option<String>,
    },
    /// Show cached state for every cacheable dataset
    Status,
    /// Drop the cached copy of a dataset
    Clear { name: String },
}

fn cache_dir(explicit: Option<PathBuf>) -> Result<PathBuf> {
    let dir = match explicit {
        Some(dir) => dir,
        None => dirs::cache_dir()
            .context("could not determine cache directory")?
            .join("dataset-cache"),
    };
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create cache directory: {}", dir.display()))?;
    Ok(dir)
}

fn access_token(flag: Option<String>) -> Option<String> {
    flag.or_else(|| std::env::var("DATASET_CACHE_TOKEN").ok())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let catalog = Arc::new(config::load_catalog(cli.config.as_deref())?);
    let store = CacheStore::open(cache_dir(cli.cache_dir)?, Arc::clone(&catalog))
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    let orchestrator = LoadOrchestrator::new(catalog, Arc::new(store));

    match cli.command {
        Command::Load {
            name,
            columns,
            token,
        } => commands::load::run(&orchestrator, &name, columns, access_token(token)).await,
        Command::Check { name, token } => {
            commands::check::run(&orchestrator, &name, access_token(token)).await
        }
        Command::Status => commands::status::run(&orchestrator),
        Command::Clear { name } => commands::clear::run(&orchestrator, &name),
    }
}
