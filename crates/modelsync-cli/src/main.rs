//! Modelsync CLI - resolve local model files against Civitai and HuggingFace.
//!
//! Every command prints its result as JSON on stdout; logs go to stderr.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use modelsync_core::config::StoreConfig;
use modelsync_core::{MetadataManager, Provider, ResolverConfig};
use std::path::PathBuf;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "modelsync")]
#[command(about = "Identify local model files on Civitai and HuggingFace")]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Metadata store file (defaults to the user data directory)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Resolver config file (JSON, defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Civitai API key (overrides config and CIVITAI_API_KEY)
    #[arg(long, global = true)]
    civitai_key: Option<String>,

    /// HuggingFace token (overrides config and HF_TOKEN)
    #[arg(long, global = true)]
    hf_token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a single model file
    Resolve {
        path: PathBuf,
        /// Ignore a fresh cached record
        #[arg(short, long)]
        force: bool,
        /// Only consult this provider (civitai | huggingface)
        #[arg(long)]
        provider: Option<Provider>,
    },
    /// Resolve every model file under the given files or directories
    Scan {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Force re-resolution of one file, or of every cached record
    Refresh {
        path: Option<PathBuf>,
        /// Re-resolve every cached record against this provider only
        #[arg(long, conflicts_with = "path")]
        provider: Option<Provider>,
    },
    /// Show the cached record for a file
    Show { path: PathBuf },
    /// List cached records related to a file
    Related { path: PathBuf },
    /// Summarise the metadata store
    Stats,
    /// Drop one cached record
    Remove { path: PathBuf },
    /// Drop cached records for non-model paths
    Cleanup,
    /// Drop every cached record and response memo
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let config = match args.config.clone().or_else(default_config_path) {
        Some(path) => ResolverConfig::load(&path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ResolverConfig::default(),
    }
    .with_env_overrides();

    let store_path = match args.store.clone() {
        Some(path) => path,
        None => default_store_path()?,
    };
    debug!("Metadata store: {}", store_path.display());

    let manager = MetadataManager::from_config(config, &store_path)?;
    if let Some(key) = args.civitai_key.clone() {
        manager.set_api_key(Provider::Civitai, Some(key)).await?;
    }
    if let Some(token) = args.hf_token.clone() {
        manager.set_api_key(Provider::HuggingFace, Some(token)).await?;
    }

    let output = commands::run(&manager, args.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn default_store_path() -> Result<PathBuf> {
    let base = dirs::data_dir().context("No user data directory on this platform")?;
    Ok(base.join("modelsync").join(StoreConfig::DEFAULT_FILENAME))
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("modelsync").join("config.json"))
}
