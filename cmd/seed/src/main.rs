//! Writes the sample posts into the configured local cache.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use configs::AppConfig;
use services::{seed, LocalCache};
use storage_adapters::FileKeyValueStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "seed", about = "Seed the local cache with sample posts")]
struct Args {
    #[arg(long, short, env = "RUSTY_BOARD_CONFIG")]
    config: Option<PathBuf>,

    /// Overwrite a cache that already holds posts
    #[arg(long)]
    force: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = AppConfig::load(args.config.as_deref()).context("loading configuration")?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut kv = FileKeyValueStore::new(&config.cache.dir);
    if let Some(quota) = config.cache.quota_bytes {
        kv = kv.with_quota(quota);
    }
    let cache = LocalCache::new(Arc::new(kv), config.cache.snapshot_key.clone());

    let written = seed::seed_if_empty(&cache, args.force)
        .await
        .context("writing sample posts")?;
    info!(written, dir = %config.cache.dir.display(), "seed finished");
    Ok(())
}
