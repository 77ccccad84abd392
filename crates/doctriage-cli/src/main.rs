//! `doctriage` -- operations CLI for the classification pipeline.
//!
//! Provides the following subcommands:
//!
//! - `doctriage health` -- Probe the remote classification service.
//! - `doctriage cache stats` -- Show result-cache statistics.
//! - `doctriage cache cleanup` -- Run one maintenance sweep now.

use std::path::Path;

use clap::{Parser, Subcommand};

use doctriage_client::{Classifier, ClassifierClient, ClientConfig};
use doctriage_core::ResultCache;
use doctriage_types::AnalyzerConfig;

/// doctriage pipeline CLI.
#[derive(Parser)]
#[command(name = "doctriage", about = "document classification pipeline CLI", version)]
struct Cli {
    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path (defaults to ./doctriage.yaml when present).
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Probe the remote classification service.
    Health,

    /// Inspect or maintain the result cache.
    Cache {
        #[command(subcommand)]
        action: CacheCmd,
    },
}

/// Subcommands for `doctriage cache`.
#[derive(Subcommand)]
enum CacheCmd {
    /// Show cache statistics.
    Stats,

    /// Delete expired entries and enforce the storage cap now.
    Cleanup,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Health => health(&config).await?,
        Commands::Cache { action } => match action {
            CacheCmd::Stats => cache_stats(&config).await?,
            CacheCmd::Cleanup => cache_cleanup(&config).await?,
        },
    }
    Ok(())
}

fn load_config(path: Option<&str>) -> anyhow::Result<AnalyzerConfig> {
    match path {
        Some(path) => Ok(AnalyzerConfig::load(path)?),
        None => {
            let default = Path::new("doctriage.yaml");
            if default.exists() {
                Ok(AnalyzerConfig::load(default)?)
            } else {
                Ok(AnalyzerConfig::default())
            }
        }
    }
}

async fn health(config: &AnalyzerConfig) -> anyhow::Result<()> {
    let client = ClassifierClient::new(ClientConfig::from_api(&config.api));
    if client.health_check().await {
        println!("service healthy: {}", config.api.base_url);
        Ok(())
    } else {
        anyhow::bail!("service unhealthy: {}", config.api.base_url)
    }
}

async fn cache_stats(config: &AnalyzerConfig) -> anyhow::Result<()> {
    let cache = ResultCache::open(&config.cache)?;
    let stats = cache.stats().await?;
    println!("cache: {}", config.cache.db_path);
    println!("  entries:      {}", stats.total_entries);
    println!("  total hits:   {}", stats.total_hits);
    println!("  hit rate:     {:.1}%", stats.hit_rate);
    println!("  stored bytes: {}", stats.stored_bytes);
    if let Some(oldest) = stats.oldest_created_at {
        println!("  oldest entry: {oldest} (unix seconds)");
    }
    Ok(())
}

async fn cache_cleanup(config: &AnalyzerConfig) -> anyhow::Result<()> {
    let cache = ResultCache::open(&config.cache)?;
    let swept = cache.cleanup().await?;
    println!(
        "cleanup: {} expired deleted, {} evicted",
        swept.expired_deleted, swept.evicted
    );
    Ok(())
}
