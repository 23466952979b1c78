//! tierctl - command-line client for tiercache

mod commands;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tiercache::{CacheRegistry, DiskErrorPolicy, HttpFetcher, HttpFetcherConfig};
use tierstore::BlobStore;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Cache directory
    #[arg(short, long, env = "TIERCACHE_DATA", default_value = "./cache", global = true)]
    data: PathBuf,

    /// Cache name (namespace)
    #[arg(short, long, env = "TIERCACHE_NAME", default_value = "default", global = true)]
    name: String,

    /// Network fetch timeout in seconds
    #[arg(short, long, env = "TIERCACHE_TIMEOUT_SECS", default_value_t = 30, global = true)]
    timeout: u64,

    /// Fail instead of refetching when a cached blob is unreadable
    #[arg(long, global = true)]
    strict_disk: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Retrieve URLs through the cache
    Get {
        /// URLs to retrieve (concurrently)
        #[arg(required = true)]
        urls: Vec<String>,

        /// Write the payload here (`-` for stdout); needs exactly one URL
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List keys stored on disk for the cache
    Ls,

    /// Delete the cache's blobs from disk
    Purge,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing; stdout is reserved for payloads and listings
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    let store = Arc::new(BlobStore::open(&args.data)?);
    info!("Cache directory: {}", args.data.display());

    match args.command {
        Command::Get { urls, output } => {
            let fetcher = HttpFetcher::new(HttpFetcherConfig {
                timeout: Duration::from_secs(args.timeout),
                ..HttpFetcherConfig::default()
            })?;
            let policy = if args.strict_disk {
                DiskErrorPolicy::Surface
            } else {
                DiskErrorPolicy::FallThrough
            };

            let registry = CacheRegistry::builder(store, Arc::new(fetcher))
                .disk_errors(policy)
                .build()?;
            let cache = registry.cache_with_name(&args.name)?;

            let mut report = std::io::stderr();
            let failed = commands::get(&cache, &urls, output.as_deref(), &mut report).await?;
            if failed > 0 {
                anyhow::bail!("{} of {} retrievals failed", failed, urls.len());
            }
        }
        Command::Ls => {
            let mut out = std::io::stdout().lock();
            commands::list(&store, &args.name, &mut out)?;
        }
        Command::Purge => {
            let removed = commands::purge(&store, &args.name)?;
            println!("{} blobs removed from {}", removed, args.name);
        }
    }

    Ok(())
}
